//! In-memory repositories.
//!
//! Backs the integration tests (no Postgres required) while honoring
//! the same atomic contracts as the SQL implementation: every unit the
//! traits declare atomic executes under a single mutex guard.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    MemberStatus, PasswordAlgo, PasswordResetToken, Session, Team, TeamMember, TeamRole,
    TeamStatus, User, UserStatus,
};
use crate::services::error::ServiceError;

use super::{CredentialRepo, LoginFailure, TeamRepo};

#[derive(Default)]
struct StoreState {
    users: HashMap<Uuid, User>,
    sessions: HashMap<Uuid, Session>,
    resets: HashMap<Uuid, PasswordResetToken>,
    teams: HashMap<Uuid, Team>,
    members: HashMap<Uuid, TeamMember>,
}

/// In-memory store implementing both repository traits.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoreState>, ServiceError> {
        self.state
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("store mutex poisoned: {e}")))
    }
}

#[async_trait]
impl CredentialRepo for InMemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        let duplicate = state.users.values().any(|u| {
            u.status_code != UserStatus::Deleted.as_str()
                && (u.username == user.username || u.email == user.email)
        });
        if duplicate {
            return Err(ServiceError::Conflict(
                "Username or email already registered".to_string(),
            ));
        }
        state.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        let state = self.lock()?;
        Ok(state
            .users
            .get(&user_id)
            .filter(|u| u.status_code != UserStatus::Deleted.as_str())
            .cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, ServiceError> {
        let state = self.lock()?;
        Ok(state
            .users
            .values()
            .find(|u| u.username == username && u.status_code != UserStatus::Deleted.as_str())
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let state = self.lock()?;
        Ok(state
            .users
            .values()
            .find(|u| u.email == email && u.status_code != UserStatus::Deleted.as_str())
            .cloned())
    }

    async fn activate_user(&self, user_id: Uuid) -> Result<bool, ServiceError> {
        let mut state = self.lock()?;
        match state.users.get_mut(&user_id) {
            Some(user) if user.status_code != UserStatus::Deleted.as_str() => {
                user.email_verified = true;
                if user.status_code == UserStatus::PendingVerification.as_str() {
                    user.status_code = UserStatus::Active.as_str().to_string();
                }
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_login_failure(
        &self,
        user_id: Uuid,
        threshold: i32,
        lockout: Duration,
    ) -> Result<LoginFailure, ServiceError> {
        let mut state = self.lock()?;
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or(ServiceError::NotFound("User"))?;
        user.failed_login_attempts += 1;
        if user.failed_login_attempts >= threshold {
            user.locked_until = Some(Utc::now() + lockout);
        }
        user.updated_at = Utc::now();
        Ok(LoginFailure {
            attempts: user.failed_login_attempts,
            locked_until: user.locked_until,
        })
    }

    async fn record_login_success(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        if let Some(user) = state.users.get_mut(&user_id) {
            user.failed_login_attempts = 0;
            user.locked_until = None;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn upgrade_password_hash(
        &self,
        user_id: Uuid,
        hash: &str,
        algo: PasswordAlgo,
    ) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        if let Some(user) = state.users.get_mut(&user_id) {
            user.password_hash = hash.to_string();
            user.password_algo = algo.as_str().to_string();
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_password(
        &self,
        user_id: Uuid,
        hash: &str,
        algo: PasswordAlgo,
    ) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        if let Some(user) = state.users.get_mut(&user_id) {
            user.password_hash = hash.to_string();
            user.password_algo = algo.as_str().to_string();
            user.password_changed_at = Some(Utc::now());
            user.updated_at = Utc::now();
        }
        let now = Utc::now();
        for session in state.sessions.values_mut() {
            if session.user_id == user_id && session.revoked_at.is_none() {
                session.revoked_at = Some(now);
            }
        }
        Ok(())
    }

    async fn insert_session(&self, session: &Session) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        state.sessions.insert(session.session_id, session.clone());
        Ok(())
    }

    async fn rotate_session(
        &self,
        refresh_hash: &str,
        replacement: &Session,
    ) -> Result<Option<Session>, ServiceError> {
        // Claim and insert under one guard: only one concurrent caller
        // can observe the live session.
        let mut state = self.lock()?;
        let claimed = state
            .sessions
            .values_mut()
            .find(|s| s.refresh_token_hash == refresh_hash && s.is_valid());
        let Some(claimed) = claimed else {
            return Ok(None);
        };
        claimed.revoked_at = Some(Utc::now());
        let claimed = claimed.clone();
        state
            .sessions
            .insert(replacement.session_id, replacement.clone());
        Ok(Some(claimed))
    }

    async fn delete_session_by_token(
        &self,
        session_token: &str,
    ) -> Result<Option<Session>, ServiceError> {
        let mut state = self.lock()?;
        let id = state
            .sessions
            .values()
            .find(|s| s.session_token == session_token)
            .map(|s| s.session_id);
        Ok(id.and_then(|id| state.sessions.remove(&id)))
    }

    async fn delete_expired_sessions(&self) -> Result<u64, ServiceError> {
        let mut state = self.lock()?;
        let before = state.sessions.len();
        state.sessions.retain(|_, s| !s.is_expired());
        Ok((before - state.sessions.len()) as u64)
    }

    async fn insert_password_reset(
        &self,
        token: &PasswordResetToken,
    ) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        state.resets.insert(token.reset_id, token.clone());
        Ok(())
    }

    async fn consume_password_reset(
        &self,
        token_hash: &str,
    ) -> Result<Option<PasswordResetToken>, ServiceError> {
        let mut state = self.lock()?;
        let token = state
            .resets
            .values_mut()
            .find(|t| t.token_hash == token_hash && t.is_usable());
        Ok(token.map(|t| {
            t.used_at = Some(Utc::now());
            t.clone()
        }))
    }

    async fn delete_expired_password_resets(&self) -> Result<u64, ServiceError> {
        let mut state = self.lock()?;
        let before = state.resets.len();
        let now = Utc::now();
        state.resets.retain(|_, t| t.expires_at >= now);
        Ok((before - state.resets.len()) as u64)
    }
}

#[async_trait]
impl TeamRepo for InMemoryStore {
    async fn create_team_with_owner(
        &self,
        team: &Team,
        owner: &TeamMember,
    ) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        let duplicate = state
            .teams
            .values()
            .any(|t| t.name == team.name && t.status_code != TeamStatus::Deleted.as_str());
        if duplicate {
            return Err(ServiceError::Conflict("Team name already taken".to_string()));
        }
        state.teams.insert(team.team_id, team.clone());
        state.members.insert(owner.member_id, owner.clone());
        Ok(())
    }

    async fn find_team(&self, team_id: Uuid) -> Result<Option<Team>, ServiceError> {
        let state = self.lock()?;
        Ok(state
            .teams
            .get(&team_id)
            .filter(|t| t.status_code != TeamStatus::Deleted.as_str())
            .cloned())
    }

    async fn list_teams_for_user(&self, user_id: Uuid) -> Result<Vec<Team>, ServiceError> {
        let state = self.lock()?;
        let mut teams: Vec<Team> = state
            .members
            .values()
            .filter(|m| m.user_id == user_id && m.is_active())
            .filter_map(|m| state.teams.get(&m.team_id))
            .filter(|t| t.status_code != TeamStatus::Deleted.as_str())
            .cloned()
            .collect();
        teams.sort_by_key(|t| t.created_at);
        Ok(teams)
    }

    async fn update_team(&self, team: &Team) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        let duplicate = state.teams.values().any(|t| {
            t.team_id != team.team_id
                && t.name == team.name
                && t.status_code != TeamStatus::Deleted.as_str()
        });
        if duplicate {
            return Err(ServiceError::Conflict("Team name already taken".to_string()));
        }
        let mut updated = team.clone();
        updated.updated_at = Utc::now();
        state.teams.insert(team.team_id, updated);
        Ok(())
    }

    async fn soft_delete_team(&self, team_id: Uuid) -> Result<bool, ServiceError> {
        let mut state = self.lock()?;
        match state.teams.get_mut(&team_id) {
            Some(team) if team.status_code != TeamStatus::Deleted.as_str() => {
                team.status_code = TeamStatus::Deleted.as_str().to_string();
                team.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_members(&self, team_id: Uuid) -> Result<Vec<TeamMember>, ServiceError> {
        let state = self.lock()?;
        let mut members: Vec<TeamMember> = state
            .members
            .values()
            .filter(|m| m.team_id == team_id && m.occupies_membership())
            .cloned()
            .collect();
        members.sort_by_key(|m| m.joined_at);
        Ok(members)
    }

    async fn find_member_by_user(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TeamMember>, ServiceError> {
        let state = self.lock()?;
        Ok(state
            .members
            .values()
            .find(|m| m.team_id == team_id && m.user_id == user_id)
            .cloned())
    }

    async fn find_member(
        &self,
        team_id: Uuid,
        member_id: Uuid,
    ) -> Result<Option<TeamMember>, ServiceError> {
        let state = self.lock()?;
        Ok(state
            .members
            .get(&member_id)
            .filter(|m| m.team_id == team_id)
            .cloned())
    }

    async fn upsert_member(&self, member: &TeamMember) -> Result<TeamMember, ServiceError> {
        let mut state = self.lock()?;
        // Revive the existing (team, user) row if one exists, keeping
        // its original member_id.
        let existing = state
            .members
            .values()
            .find(|m| m.team_id == member.team_id && m.user_id == member.user_id)
            .map(|m| m.member_id);
        let stored = match existing {
            Some(id) => {
                let row = state.members.get_mut(&id).expect("member row exists");
                row.role_code = member.role_code.clone();
                row.status_code = member.status_code.clone();
                row.permissions = member.permissions.clone();
                row.joined_at = member.joined_at;
                row.updated_at = Utc::now();
                row.clone()
            }
            None => {
                state.members.insert(member.member_id, member.clone());
                member.clone()
            }
        };
        Ok(stored)
    }

    async fn update_member_role(
        &self,
        member_id: Uuid,
        role: TeamRole,
    ) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        if let Some(member) = state.members.get_mut(&member_id) {
            member.role_code = role.as_str().to_string();
            member.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_member_status(
        &self,
        member_id: Uuid,
        status: MemberStatus,
    ) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        if let Some(member) = state.members.get_mut(&member_id) {
            member.status_code = status.as_str().to_string();
            member.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn transfer_ownership(
        &self,
        team_id: Uuid,
        old_owner_member_id: Uuid,
        new_owner_member_id: Uuid,
        new_owner_user_id: Uuid,
    ) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        if let Some(team) = state.teams.get_mut(&team_id) {
            team.owner_id = new_owner_user_id;
            team.updated_at = Utc::now();
        }
        if let Some(old_owner) = state.members.get_mut(&old_owner_member_id) {
            old_owner.role_code = TeamRole::Admin.as_str().to_string();
            old_owner.updated_at = Utc::now();
        }
        if let Some(new_owner) = state.members.get_mut(&new_owner_member_id) {
            new_owner.role_code = TeamRole::Owner.as_str().to_string();
            new_owner.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn count_active_members(&self, team_id: Uuid) -> Result<i64, ServiceError> {
        let state = self.lock()?;
        Ok(state
            .members
            .values()
            .filter(|m| m.team_id == team_id && m.occupies_membership())
            .count() as i64)
    }
}
