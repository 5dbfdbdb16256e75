//! Team membership manager.
//!
//! Enforces the single-owner invariant and the role/status transition
//! rules. Authorization failures for team-scoped actions are raised
//! here, through the permission engine, and nowhere else.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::models::{
    MemberStatus, Team, TeamMember, TeamMemberResponse, TeamResponse, TeamRole,
};
use crate::repo::{CredentialRepo, TeamRepo};
use crate::services::audit::{AuditEvent, AuditSink, RiskLevel};
use crate::services::error::ServiceError;
use crate::services::permission::require_team_permission;

#[derive(Clone)]
pub struct TeamService {
    teams: Arc<dyn TeamRepo>,
    users: Arc<dyn CredentialRepo>,
    audit: Arc<dyn AuditSink>,
}

pub struct UpdateTeam {
    pub name: Option<String>,
    pub max_members: Option<i32>,
    pub is_private: Option<bool>,
    pub tags: Option<Vec<String>>,
}

impl TeamService {
    pub fn new(
        teams: Arc<dyn TeamRepo>,
        users: Arc<dyn CredentialRepo>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            teams,
            users,
            audit,
        }
    }

    /// The caller's active membership row, or NOT_MEMBER.
    async fn active_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<TeamMember, ServiceError> {
        match self.teams.find_member_by_user(team_id, user_id).await? {
            Some(m) if m.is_active() => Ok(m),
            _ => Err(ServiceError::NotMember),
        }
    }

    async fn team_or_not_found(&self, team_id: Uuid) -> Result<Team, ServiceError> {
        self.teams
            .find_team(team_id)
            .await?
            .ok_or(ServiceError::NotFound("Team"))
    }

    /// Create a team. The creator becomes its owner; the team row and
    /// the owner membership row are written in one transaction.
    pub async fn create_team(
        &self,
        creator_id: Uuid,
        name: String,
        max_members: i32,
        is_private: bool,
        tags: Vec<String>,
    ) -> Result<TeamResponse, ServiceError> {
        let team = Team::new(name, creator_id, max_members, is_private, tags);
        let owner = TeamMember::new(team.team_id, creator_id, TeamRole::Owner, MemberStatus::Active);

        self.teams.create_team_with_owner(&team, &owner).await?;

        self.audit
            .record(AuditEvent::success(
                Some(creator_id),
                "team.create",
                "team",
                Some(team.team_id),
                RiskLevel::Low,
            ))
            .await;

        info!(team_id = %team.team_id, owner_id = %creator_id, "Team created");
        Ok(team.into())
    }

    /// Fetch a team the caller belongs to.
    pub async fn get_team(&self, team_id: Uuid, user_id: Uuid) -> Result<TeamResponse, ServiceError> {
        let team = self.team_or_not_found(team_id).await?;
        let member = self.active_member(team_id, user_id).await?;
        require_team_permission(&member, "team", "view", Some(team_id))?;
        Ok(team.into())
    }

    /// Teams where the caller holds an active membership.
    pub async fn list_teams(&self, user_id: Uuid) -> Result<Vec<TeamResponse>, ServiceError> {
        let teams = self.teams.list_teams_for_user(user_id).await?;
        Ok(teams.into_iter().map(Into::into).collect())
    }

    pub async fn update_team(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        changes: UpdateTeam,
    ) -> Result<TeamResponse, ServiceError> {
        let mut team = self.team_or_not_found(team_id).await?;
        let member = self.active_member(team_id, user_id).await?;
        require_team_permission(&member, "team", "update", Some(team_id))?;

        if let Some(name) = changes.name {
            team.name = name;
        }
        if let Some(max_members) = changes.max_members {
            team.max_members = max_members;
        }
        if let Some(is_private) = changes.is_private {
            team.is_private = is_private;
        }
        if let Some(tags) = changes.tags {
            team.tags = tags;
        }

        self.teams.update_team(&team).await?;

        self.audit
            .record(AuditEvent::success(
                Some(user_id),
                "team.update",
                "team",
                Some(team_id),
                RiskLevel::Low,
            ))
            .await;

        Ok(team.into())
    }

    /// Soft-delete a team. Owner only.
    pub async fn delete_team(&self, team_id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
        self.team_or_not_found(team_id).await?;
        let member = self.active_member(team_id, user_id).await?;
        require_team_permission(&member, "team", "delete", Some(team_id))?;

        if !self.teams.soft_delete_team(team_id).await? {
            return Err(ServiceError::NotFound("Team"));
        }

        self.audit
            .record(AuditEvent::success(
                Some(user_id),
                "team.delete",
                "team",
                Some(team_id),
                RiskLevel::High,
            ))
            .await;

        Ok(())
    }

    pub async fn list_members(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<TeamMemberResponse>, ServiceError> {
        self.team_or_not_found(team_id).await?;
        let member = self.active_member(team_id, user_id).await?;
        require_team_permission(&member, "team_member", "view", Some(team_id))?;

        let members = self.teams.list_members(team_id).await?;
        Ok(members.into_iter().map(Into::into).collect())
    }

    /// Invite an existing user to the team.
    ///
    /// Inviter must be owner or admin; the requested role must not be
    /// owner (ownership moves only through an explicit transfer); a user
    /// with an active or pending row cannot be invited again, but an
    /// inactive (removed) row is revived with the new role.
    pub async fn invite_user(
        &self,
        team_id: Uuid,
        inviter_id: Uuid,
        invitee_email: &str,
        role: TeamRole,
    ) -> Result<TeamMemberResponse, ServiceError> {
        let team = self.team_or_not_found(team_id).await?;
        let inviter = self.active_member(team_id, inviter_id).await?;
        require_team_permission(&inviter, "team_member", "invite", Some(team_id))?;

        if role == TeamRole::Owner {
            return Err(ServiceError::InvalidOperation(
                "Cannot invite a user as owner".to_string(),
            ));
        }

        let invitee = self
            .users
            .find_user_by_email(invitee_email)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        if let Some(existing) = self
            .teams
            .find_member_by_user(team_id, invitee.user_id)
            .await?
        {
            if existing.occupies_membership() {
                return Err(ServiceError::AlreadyMember);
            }
        }

        let active = self.teams.count_active_members(team_id).await?;
        if active >= team.max_members as i64 {
            return Err(ServiceError::InvalidOperation(
                "Team is at its member limit".to_string(),
            ));
        }

        let candidate = TeamMember::new(team_id, invitee.user_id, role, MemberStatus::Pending);
        // On a revived tombstone the stored row keeps its original id,
        // so the response must come from what the store kept.
        let member = self.teams.upsert_member(&candidate).await?;

        self.audit
            .record(AuditEvent::success(
                Some(inviter_id),
                "team_member.invite",
                "team_member",
                Some(member.member_id),
                RiskLevel::Medium,
            ))
            .await;

        info!(team_id = %team_id, user_id = %invitee.user_id, role = role.as_str(), "Member invited");
        Ok(member.into())
    }

    /// Accept a pending invitation, activating the membership.
    pub async fn accept_invitation(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<TeamMemberResponse, ServiceError> {
        self.team_or_not_found(team_id).await?;

        let mut member = self
            .teams
            .find_member_by_user(team_id, user_id)
            .await?
            .ok_or(ServiceError::NotMember)?;

        if !member.is_pending() {
            return Err(ServiceError::InvalidOperation(
                "No pending invitation for this team".to_string(),
            ));
        }

        self.teams
            .update_member_status(member.member_id, MemberStatus::Active)
            .await?;
        member.status_code = MemberStatus::Active.as_str().to_string();

        self.audit
            .record(AuditEvent::success(
                Some(user_id),
                "team_member.accept",
                "team_member",
                Some(member.member_id),
                RiskLevel::Low,
            ))
            .await;

        Ok(member.into())
    }

    /// Change a member's role.
    ///
    /// Owner roles are immutable through this path, and only the owner
    /// may promote to admin.
    pub async fn update_member_role(
        &self,
        team_id: Uuid,
        member_id: Uuid,
        updater_id: Uuid,
        new_role: TeamRole,
    ) -> Result<TeamMemberResponse, ServiceError> {
        self.team_or_not_found(team_id).await?;
        let updater = self.active_member(team_id, updater_id).await?;
        require_team_permission(&updater, "team_member", "update_role", Some(team_id))?;

        let mut target = self
            .teams
            .find_member(team_id, member_id)
            .await?
            .ok_or(ServiceError::NotFound("Member"))?;

        if target.role() == Some(TeamRole::Owner) {
            return Err(ServiceError::InvalidOperation(
                "Owner role cannot be changed".to_string(),
            ));
        }
        if new_role == TeamRole::Owner {
            return Err(ServiceError::InvalidOperation(
                "Ownership is assigned only by transfer".to_string(),
            ));
        }
        if new_role == TeamRole::Admin {
            require_team_permission(&updater, "team_member", "promote_admin", Some(team_id))?;
        }

        self.teams.update_member_role(member_id, new_role).await?;
        target.role_code = new_role.as_str().to_string();

        self.audit
            .record(AuditEvent::success(
                Some(updater_id),
                "team_member.update_role",
                "team_member",
                Some(member_id),
                RiskLevel::Medium,
            ))
            .await;

        Ok(target.into())
    }

    /// Remove a member (status transition to inactive, never a physical
    /// delete). Owner/admin may remove others; any member may remove
    /// themselves; the owner cannot be removed by anyone through this
    /// path.
    pub async fn remove_member(
        &self,
        team_id: Uuid,
        member_id: Uuid,
        remover_id: Uuid,
    ) -> Result<(), ServiceError> {
        self.team_or_not_found(team_id).await?;
        let remover = self.active_member(team_id, remover_id).await?;

        let target = self
            .teams
            .find_member(team_id, member_id)
            .await?
            .ok_or(ServiceError::NotFound("Member"))?;

        if target.role() == Some(TeamRole::Owner) {
            return Err(ServiceError::InvalidOperation(
                "The owner cannot be removed".to_string(),
            ));
        }

        let is_self = target.user_id == remover_id;
        if !is_self {
            require_team_permission(&remover, "team_member", "remove", Some(team_id))?;
        }

        self.teams
            .update_member_status(member_id, MemberStatus::Inactive)
            .await?;

        self.audit
            .record(AuditEvent::success(
                Some(remover_id),
                "team_member.remove",
                "team_member",
                Some(member_id),
                RiskLevel::Medium,
            ))
            .await;

        Ok(())
    }

    /// Leave a team. Owners must transfer ownership first.
    pub async fn leave_team(&self, team_id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
        self.team_or_not_found(team_id).await?;
        let member = self.active_member(team_id, user_id).await?;

        if member.role() == Some(TeamRole::Owner) {
            return Err(ServiceError::InvalidOperation(
                "The owner must transfer ownership before leaving".to_string(),
            ));
        }

        self.teams
            .update_member_status(member.member_id, MemberStatus::Inactive)
            .await?;

        self.audit
            .record(AuditEvent::success(
                Some(user_id),
                "team_member.leave",
                "team_member",
                Some(member.member_id),
                RiskLevel::Low,
            ))
            .await;

        Ok(())
    }

    /// Transfer ownership to another active member. Owner only. One
    /// transaction updates the team's owner reference, demotes the old
    /// owner to admin, and promotes the target, so exactly one owner
    /// exists at every point.
    pub async fn transfer_ownership(
        &self,
        team_id: Uuid,
        owner_id: Uuid,
        new_owner_user_id: Uuid,
    ) -> Result<(), ServiceError> {
        self.team_or_not_found(team_id).await?;
        let owner = self.active_member(team_id, owner_id).await?;
        require_team_permission(&owner, "team", "transfer_ownership", Some(team_id))?;

        if owner.role() != Some(TeamRole::Owner) {
            return Err(ServiceError::AccessDenied);
        }
        if new_owner_user_id == owner_id {
            return Err(ServiceError::InvalidOperation(
                "Cannot transfer ownership to yourself".to_string(),
            ));
        }

        let target = self.active_member(team_id, new_owner_user_id).await.map_err(
            |_| ServiceError::InvalidOperation("New owner must be an active member".to_string()),
        )?;

        self.teams
            .transfer_ownership(team_id, owner.member_id, target.member_id, new_owner_user_id)
            .await?;

        self.audit
            .record(AuditEvent::success(
                Some(owner_id),
                "team.transfer_ownership",
                "team",
                Some(team_id),
                RiskLevel::High,
            ))
            .await;

        info!(team_id = %team_id, new_owner = %new_owner_user_id, "Ownership transferred");
        Ok(())
    }
}
