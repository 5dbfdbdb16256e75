//! Repository traits for the credential and team stores.
//!
//! Constructor-injected so services can run against Postgres in
//! production and the in-memory implementation in tests. Every
//! operation the domain requires to be atomic (failure counting,
//! rotation claims, team-plus-owner creation, ownership transfer,
//! reset-token consumption) is a single method here; implementations
//! must not split them into separate reads and writes.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::{
    MemberStatus, PasswordAlgo, PasswordResetToken, Session, Team, TeamMember, TeamRole, User,
};
use crate::services::error::ServiceError;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Outcome of an atomic failed-login increment.
#[derive(Debug, Clone, Copy)]
pub struct LoginFailure {
    pub attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
}

/// Persistence for users, sessions, and password-reset tokens.
/// Pure data access; lockout policy and token semantics live above.
#[async_trait]
pub trait CredentialRepo: Send + Sync {
    /// Insert a new user. Fails with `Conflict` on duplicate username or
    /// email.
    async fn insert_user(&self, user: &User) -> Result<(), ServiceError>;

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, ServiceError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError>;

    /// Mark the user's email verified and activate the account.
    /// Returns false if no such user exists.
    async fn activate_user(&self, user_id: Uuid) -> Result<bool, ServiceError>;

    /// Atomically increment the failed-login counter and, if the new
    /// value reaches `threshold`, set the lockout window in the same
    /// statement. Never read-then-write.
    async fn record_login_failure(
        &self,
        user_id: Uuid,
        threshold: i32,
        lockout: Duration,
    ) -> Result<LoginFailure, ServiceError>;

    /// Reset the failure counter and lockout after a successful login.
    async fn record_login_success(&self, user_id: Uuid) -> Result<(), ServiceError>;

    /// Replace the stored hash in place (legacy-hash upgrade). Does not
    /// touch `password_changed_at` or sessions.
    async fn upgrade_password_hash(
        &self,
        user_id: Uuid,
        hash: &str,
        algo: PasswordAlgo,
    ) -> Result<(), ServiceError>;

    /// Set a new password: updates hash + algo, bumps
    /// `password_changed_at`, and revokes every session for the user in
    /// the same transaction.
    async fn set_password(
        &self,
        user_id: Uuid,
        hash: &str,
        algo: PasswordAlgo,
    ) -> Result<(), ServiceError>;

    async fn insert_session(&self, session: &Session) -> Result<(), ServiceError>;

    /// Claim the live session holding `refresh_hash` and insert its
    /// replacement in one transaction. Returns the claimed session, or
    /// None when no live session matches (already rotated, revoked, or
    /// expired) - exactly one of two concurrent callers can win.
    async fn rotate_session(
        &self,
        refresh_hash: &str,
        replacement: &Session,
    ) -> Result<Option<Session>, ServiceError>;

    /// Delete the session identified by its access-token jti (logout).
    async fn delete_session_by_token(
        &self,
        session_token: &str,
    ) -> Result<Option<Session>, ServiceError>;

    /// Idempotent sweep of expired sessions. Safe to run concurrently.
    async fn delete_expired_sessions(&self) -> Result<u64, ServiceError>;

    async fn insert_password_reset(
        &self,
        token: &PasswordResetToken,
    ) -> Result<(), ServiceError>;

    /// Atomically mark the reset token used if it is unused and
    /// unexpired, returning it. None means invalid, expired, or already
    /// consumed.
    async fn consume_password_reset(
        &self,
        token_hash: &str,
    ) -> Result<Option<PasswordResetToken>, ServiceError>;

    /// Idempotent sweep of expired reset tokens.
    async fn delete_expired_password_resets(&self) -> Result<u64, ServiceError>;
}

/// Persistence for teams and membership rows.
#[async_trait]
pub trait TeamRepo: Send + Sync {
    /// Create the team and its owner member row in one transaction.
    /// Fails with `Conflict` on duplicate team name.
    async fn create_team_with_owner(
        &self,
        team: &Team,
        owner: &TeamMember,
    ) -> Result<(), ServiceError>;

    /// Find a team by id. Deleted teams are filtered here, not at call
    /// sites.
    async fn find_team(&self, team_id: Uuid) -> Result<Option<Team>, ServiceError>;

    /// Teams where the user holds an active membership.
    async fn list_teams_for_user(&self, user_id: Uuid) -> Result<Vec<Team>, ServiceError>;

    async fn update_team(&self, team: &Team) -> Result<(), ServiceError>;

    /// Tombstone the team (status -> deleted). Returns false if absent.
    async fn soft_delete_team(&self, team_id: Uuid) -> Result<bool, ServiceError>;

    /// Active and pending members; tombstoned rows are excluded here.
    async fn list_members(&self, team_id: Uuid) -> Result<Vec<TeamMember>, ServiceError>;

    /// The (unique) membership row for a user, whatever its status.
    async fn find_member_by_user(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TeamMember>, ServiceError>;

    async fn find_member(
        &self,
        team_id: Uuid,
        member_id: Uuid,
    ) -> Result<Option<TeamMember>, ServiceError>;

    /// Insert a membership row, or revive the tombstoned row for the
    /// same (team, user) pair with the new role and status. Returns the
    /// stored row; on a revival its id is the original one, not the id
    /// of the candidate passed in.
    async fn upsert_member(&self, member: &TeamMember) -> Result<TeamMember, ServiceError>;

    async fn update_member_role(
        &self,
        member_id: Uuid,
        role: TeamRole,
    ) -> Result<(), ServiceError>;

    async fn update_member_status(
        &self,
        member_id: Uuid,
        status: MemberStatus,
    ) -> Result<(), ServiceError>;

    /// Transfer ownership in one transaction: point the team at the new
    /// owner, demote the old owner row to admin, promote the new one.
    async fn transfer_ownership(
        &self,
        team_id: Uuid,
        old_owner_member_id: Uuid,
        new_owner_member_id: Uuid,
        new_owner_user_id: Uuid,
    ) -> Result<(), ServiceError>;

    async fn count_active_members(&self, team_id: Uuid) -> Result<i64, ServiceError>;
}
