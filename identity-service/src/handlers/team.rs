use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::AppState;
use crate::dtos::{
    CreateTeamRequest, InviteRequest, TransferOwnershipRequest, UpdateRoleRequest,
    UpdateTeamRequest,
};
use crate::dtos::MessageResponse;
use crate::middleware::AuthUser;
use crate::models::TeamRole;
use crate::services::{ServiceError, UpdateTeam};
use crate::utils::ValidatedJson;

fn parse_role(role: &str) -> Result<TeamRole, AppError> {
    TeamRole::parse(role)
        .ok_or_else(|| ServiceError::Validation(format!("Unknown role: {}", role)).into())
}

pub async fn create_team(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateTeamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let team = state
        .teams
        .create_team(
            claims.user_id,
            req.name,
            req.max_members,
            req.is_private,
            req.tags,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(team)))
}

pub async fn list_teams(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let teams = state.teams.list_teams(claims.user_id).await?;
    Ok(Json(teams))
}

pub async fn get_team(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(team_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let team = state.teams.get_team(team_id, claims.user_id).await?;
    Ok(Json(team))
}

pub async fn update_team(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(team_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateTeamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let team = state
        .teams
        .update_team(
            team_id,
            claims.user_id,
            UpdateTeam {
                name: req.name,
                max_members: req.max_members,
                is_private: req.is_private,
                tags: req.tags,
            },
        )
        .await?;
    Ok(Json(team))
}

pub async fn delete_team(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(team_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.teams.delete_team(team_id, claims.user_id).await?;
    Ok(Json(MessageResponse {
        message: "Team deleted".to_string(),
    }))
}

pub async fn list_members(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(team_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let members = state.teams.list_members(team_id, claims.user_id).await?;
    Ok(Json(members))
}

pub async fn invite_user(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(team_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<InviteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let role = parse_role(&req.role)?;
    let member = state
        .teams
        .invite_user(team_id, claims.user_id, &req.email, role)
        .await?;
    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn accept_invitation(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(team_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let member = state
        .teams
        .accept_invitation(team_id, claims.user_id)
        .await?;
    Ok(Json(member))
}

pub async fn update_member_role(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path((team_id, member_id)): Path<(Uuid, Uuid)>,
    ValidatedJson(req): ValidatedJson<UpdateRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let role = parse_role(&req.role)?;
    let member = state
        .teams
        .update_member_role(team_id, member_id, claims.user_id, role)
        .await?;
    Ok(Json(member))
}

pub async fn remove_member(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path((team_id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    state
        .teams
        .remove_member(team_id, member_id, claims.user_id)
        .await?;
    Ok(Json(MessageResponse {
        message: "Member removed".to_string(),
    }))
}

pub async fn leave_team(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(team_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.teams.leave_team(team_id, claims.user_id).await?;
    Ok(Json(MessageResponse {
        message: "Left team".to_string(),
    }))
}

pub async fn transfer_ownership(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(team_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<TransferOwnershipRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .teams
        .transfer_ownership(team_id, claims.user_id, req.new_owner_user_id)
        .await?;
    Ok(Json(MessageResponse {
        message: "Ownership transferred".to_string(),
    }))
}
