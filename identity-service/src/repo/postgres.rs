//! PostgreSQL repositories.
//!
//! All atomic units are single statements or single transactions; none
//! of them read first and write second.

use async_trait::async_trait;
use chrono::Duration;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::models::{
    MemberStatus, PasswordAlgo, PasswordResetToken, Session, Team, TeamMember, TeamRole, User,
};
use crate::services::error::ServiceError;

use super::{CredentialRepo, LoginFailure, TeamRepo};

/// PostgreSQL-backed store implementing both repository traits.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Health check - ping the database.
    pub async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn map_unique_violation(err: sqlx::Error, conflict: &str) -> ServiceError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return ServiceError::Conflict(conflict.to_string());
        }
    }
    ServiceError::Database(err)
}

#[async_trait]
impl CredentialRepo for PgStore {
    async fn insert_user(&self, user: &User) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                user_id, username, email, password_hash, password_algo,
                status_code, failed_login_attempts, locked_until,
                email_verified, enterprise_id, password_changed_at,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(user.user_id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.password_algo)
        .bind(&user.status_code)
        .bind(user.failed_login_attempts)
        .bind(user.locked_until)
        .bind(user.email_verified)
        .bind(user.enterprise_id)
        .bind(user.password_changed_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "Username or email already registered"))?;
        Ok(())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE user_id = $1 AND status_code <> 'deleted'",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE username = $1 AND status_code <> 'deleted'",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE email = $1 AND status_code <> 'deleted'",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn activate_user(&self, user_id: Uuid) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email_verified = TRUE,
                status_code = CASE
                    WHEN status_code = 'pending_verification' THEN 'active'
                    ELSE status_code
                END,
                updated_at = now()
            WHERE user_id = $1 AND status_code <> 'deleted'
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_login_failure(
        &self,
        user_id: Uuid,
        threshold: i32,
        lockout: Duration,
    ) -> Result<LoginFailure, ServiceError> {
        // Increment and conditionally lock in one statement so two
        // concurrent failures cannot both observe "not yet locked".
        let row = sqlx::query_as::<_, (i32, Option<chrono::DateTime<chrono::Utc>>)>(
            r#"
            UPDATE users
            SET failed_login_attempts = failed_login_attempts + 1,
                locked_until = CASE
                    WHEN failed_login_attempts + 1 >= $2
                        THEN now() + ($3 * interval '1 second')
                    ELSE locked_until
                END,
                updated_at = now()
            WHERE user_id = $1
            RETURNING failed_login_attempts, locked_until
            "#,
        )
        .bind(user_id)
        .bind(threshold)
        .bind(lockout.num_seconds() as f64)
        .fetch_one(&self.pool)
        .await?;

        Ok(LoginFailure {
            attempts: row.0,
            locked_until: row.1,
        })
    }

    async fn record_login_success(&self, user_id: Uuid) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            UPDATE users
            SET failed_login_attempts = 0, locked_until = NULL, updated_at = now()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upgrade_password_hash(
        &self,
        user_id: Uuid,
        hash: &str,
        algo: PasswordAlgo,
    ) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, password_algo = $3, updated_at = now()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(hash)
        .bind(algo.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_password(
        &self,
        user_id: Uuid,
        hash: &str,
        algo: PasswordAlgo,
    ) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, password_algo = $3,
                password_changed_at = now(), updated_at = now()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(hash)
        .bind(algo.as_str())
        .execute(&mut *tx)
        .await?;

        // Every open session dies with the old password.
        sqlx::query(
            "UPDATE sessions SET revoked_at = now() WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn insert_session(&self, session: &Session) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (
                session_id, user_id, session_token, refresh_token_hash,
                ip_address, user_agent, expires_at, revoked_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(session.session_id)
        .bind(session.user_id)
        .bind(&session.session_token)
        .bind(&session.refresh_token_hash)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.expires_at)
        .bind(session.revoked_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn rotate_session(
        &self,
        refresh_hash: &str,
        replacement: &Session,
    ) -> Result<Option<Session>, ServiceError> {
        let mut tx = self.pool.begin().await?;

        // Claim the live session; the row-level lock taken by UPDATE
        // guarantees exactly one concurrent rotation wins.
        let claimed = sqlx::query_as::<_, Session>(
            r#"
            UPDATE sessions
            SET revoked_at = now()
            WHERE refresh_token_hash = $1
              AND revoked_at IS NULL
              AND expires_at > now()
            RETURNING *
            "#,
        )
        .bind(refresh_hash)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(claimed) = claimed else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO sessions (
                session_id, user_id, session_token, refresh_token_hash,
                ip_address, user_agent, expires_at, revoked_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(replacement.session_id)
        .bind(replacement.user_id)
        .bind(&replacement.session_token)
        .bind(&replacement.refresh_token_hash)
        .bind(&replacement.ip_address)
        .bind(&replacement.user_agent)
        .bind(replacement.expires_at)
        .bind(replacement.revoked_at)
        .bind(replacement.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(claimed))
    }

    async fn delete_session_by_token(
        &self,
        session_token: &str,
    ) -> Result<Option<Session>, ServiceError> {
        let session = sqlx::query_as::<_, Session>(
            "DELETE FROM sessions WHERE session_token = $1 RETURNING *",
        )
        .bind(session_token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn delete_expired_sessions(&self) -> Result<u64, ServiceError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_password_reset(
        &self,
        token: &PasswordResetToken,
    ) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (
                reset_id, user_id, token_hash, expires_at, used_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(token.reset_id)
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(token.used_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn consume_password_reset(
        &self,
        token_hash: &str,
    ) -> Result<Option<PasswordResetToken>, ServiceError> {
        // Single-use: the same UPDATE that validates the token marks it
        // consumed.
        let token = sqlx::query_as::<_, PasswordResetToken>(
            r#"
            UPDATE password_reset_tokens
            SET used_at = now()
            WHERE token_hash = $1 AND used_at IS NULL AND expires_at > now()
            RETURNING *
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(token)
    }

    async fn delete_expired_password_resets(&self) -> Result<u64, ServiceError> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at < now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TeamRepo for PgStore {
    async fn create_team_with_owner(
        &self,
        team: &Team,
        owner: &TeamMember,
    ) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO teams (
                team_id, name, owner_id, status_code, max_members,
                is_private, tags, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(team.team_id)
        .bind(&team.name)
        .bind(team.owner_id)
        .bind(&team.status_code)
        .bind(team.max_members)
        .bind(team.is_private)
        .bind(&team.tags)
        .bind(team.created_at)
        .bind(team.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "Team name already taken"))?;

        sqlx::query(
            r#"
            INSERT INTO team_members (
                member_id, team_id, user_id, role_code, status_code,
                permissions, joined_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(owner.member_id)
        .bind(owner.team_id)
        .bind(owner.user_id)
        .bind(&owner.role_code)
        .bind(&owner.status_code)
        .bind(&owner.permissions)
        .bind(owner.joined_at)
        .bind(owner.created_at)
        .bind(owner.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_team(&self, team_id: Uuid) -> Result<Option<Team>, ServiceError> {
        let team = sqlx::query_as::<_, Team>(
            "SELECT * FROM teams WHERE team_id = $1 AND status_code <> 'deleted'",
        )
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(team)
    }

    async fn list_teams_for_user(&self, user_id: Uuid) -> Result<Vec<Team>, ServiceError> {
        let teams = sqlx::query_as::<_, Team>(
            r#"
            SELECT t.* FROM teams t
            JOIN team_members m ON m.team_id = t.team_id
            WHERE m.user_id = $1
              AND m.status_code = 'active'
              AND t.status_code <> 'deleted'
            ORDER BY t.created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(teams)
    }

    async fn update_team(&self, team: &Team) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            UPDATE teams
            SET name = $2, max_members = $3, is_private = $4, tags = $5,
                status_code = $6, updated_at = now()
            WHERE team_id = $1
            "#,
        )
        .bind(team.team_id)
        .bind(&team.name)
        .bind(team.max_members)
        .bind(team.is_private)
        .bind(&team.tags)
        .bind(&team.status_code)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "Team name already taken"))?;
        Ok(())
    }

    async fn soft_delete_team(&self, team_id: Uuid) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE teams
            SET status_code = 'deleted', updated_at = now()
            WHERE team_id = $1 AND status_code <> 'deleted'
            "#,
        )
        .bind(team_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_members(&self, team_id: Uuid) -> Result<Vec<TeamMember>, ServiceError> {
        let members = sqlx::query_as::<_, TeamMember>(
            r#"
            SELECT * FROM team_members
            WHERE team_id = $1 AND status_code IN ('active', 'pending')
            ORDER BY joined_at
            "#,
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }

    async fn find_member_by_user(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TeamMember>, ServiceError> {
        let member = sqlx::query_as::<_, TeamMember>(
            "SELECT * FROM team_members WHERE team_id = $1 AND user_id = $2",
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    async fn find_member(
        &self,
        team_id: Uuid,
        member_id: Uuid,
    ) -> Result<Option<TeamMember>, ServiceError> {
        let member = sqlx::query_as::<_, TeamMember>(
            "SELECT * FROM team_members WHERE team_id = $1 AND member_id = $2",
        )
        .bind(team_id)
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    async fn upsert_member(&self, member: &TeamMember) -> Result<TeamMember, ServiceError> {
        // A tombstoned (team, user) row is revived rather than
        // duplicated; the unique pair constraint stays intact and the
        // revived row keeps its original member_id.
        let stored = sqlx::query_as::<_, TeamMember>(
            r#"
            INSERT INTO team_members (
                member_id, team_id, user_id, role_code, status_code,
                permissions, joined_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (team_id, user_id) DO UPDATE
            SET role_code = EXCLUDED.role_code,
                status_code = EXCLUDED.status_code,
                permissions = EXCLUDED.permissions,
                joined_at = EXCLUDED.joined_at,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(member.member_id)
        .bind(member.team_id)
        .bind(member.user_id)
        .bind(&member.role_code)
        .bind(&member.status_code)
        .bind(&member.permissions)
        .bind(member.joined_at)
        .bind(member.created_at)
        .bind(member.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(stored)
    }

    async fn update_member_role(
        &self,
        member_id: Uuid,
        role: TeamRole,
    ) -> Result<(), ServiceError> {
        sqlx::query(
            "UPDATE team_members SET role_code = $2, updated_at = now() WHERE member_id = $1",
        )
        .bind(member_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_member_status(
        &self,
        member_id: Uuid,
        status: MemberStatus,
    ) -> Result<(), ServiceError> {
        sqlx::query(
            "UPDATE team_members SET status_code = $2, updated_at = now() WHERE member_id = $1",
        )
        .bind(member_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn transfer_ownership(
        &self,
        team_id: Uuid,
        old_owner_member_id: Uuid,
        new_owner_member_id: Uuid,
        new_owner_user_id: Uuid,
    ) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE teams SET owner_id = $2, updated_at = now() WHERE team_id = $1")
            .bind(team_id)
            .bind(new_owner_user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE team_members SET role_code = 'admin', updated_at = now() WHERE member_id = $1",
        )
        .bind(old_owner_member_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE team_members SET role_code = 'owner', updated_at = now() WHERE member_id = $1",
        )
        .bind(new_owner_member_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn count_active_members(&self, team_id: Uuid) -> Result<i64, ServiceError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM team_members
            WHERE team_id = $1 AND status_code IN ('active', 'pending')
            "#,
        )
        .bind(team_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
