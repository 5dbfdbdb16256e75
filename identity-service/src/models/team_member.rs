//! Team member model - membership rows with tombstone semantics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

use super::permission::PermissionRule;

/// Team-scoped roles, strictly ordered by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Owner,
    Admin,
    Member,
    Viewer,
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Owner => "owner",
            TeamRole::Admin => "admin",
            TeamRole::Member => "member",
            TeamRole::Viewer => "viewer",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "owner" => Some(TeamRole::Owner),
            "admin" => Some(TeamRole::Admin),
            "member" => Some(TeamRole::Member),
            "viewer" => Some(TeamRole::Viewer),
            _ => None,
        }
    }

    /// Owner or admin: may manage membership.
    pub fn can_manage_members(&self) -> bool {
        matches!(self, TeamRole::Owner | TeamRole::Admin)
    }
}

/// Member state codes. `inactive` is terminal: removal is a status
/// transition, never a physical delete, so audit references stay valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Pending,
    Active,
    Suspended,
    Inactive,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Pending => "pending",
            MemberStatus::Active => "active",
            MemberStatus::Suspended => "suspended",
            MemberStatus::Inactive => "inactive",
        }
    }
}

/// Team member entity. Unique on (team_id, user_id).
#[derive(Debug, Clone, FromRow)]
pub struct TeamMember {
    pub member_id: Uuid,
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role_code: String,
    pub status_code: String,
    pub permissions: Json<Vec<PermissionRule>>,
    pub joined_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TeamMember {
    pub fn new(team_id: Uuid, user_id: Uuid, role: TeamRole, status: MemberStatus) -> Self {
        let now = Utc::now();
        Self {
            member_id: Uuid::new_v4(),
            team_id,
            user_id,
            role_code: role.as_str().to_string(),
            status_code: status.as_str().to_string(),
            permissions: Json(Vec::new()),
            joined_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn role(&self) -> Option<TeamRole> {
        TeamRole::parse(&self.role_code)
    }

    pub fn is_active(&self) -> bool {
        self.status_code == MemberStatus::Active.as_str()
    }

    pub fn is_pending(&self) -> bool {
        self.status_code == MemberStatus::Pending.as_str()
    }

    /// Active or pending rows block a new invitation for the same user.
    pub fn occupies_membership(&self) -> bool {
        self.is_active() || self.is_pending()
    }
}

/// Member response for API.
#[derive(Debug, Serialize)]
pub struct TeamMemberResponse {
    pub member_id: Uuid,
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub status: String,
    pub joined_at: DateTime<Utc>,
}

impl From<TeamMember> for TeamMemberResponse {
    fn from(m: TeamMember) -> Self {
        Self {
            member_id: m.member_id,
            team_id: m.team_id,
            user_id: m.user_id,
            role: m.role_code,
            status: m.status_code,
            joined_at: m.joined_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_codes_round_trip() {
        for role in [
            TeamRole::Owner,
            TeamRole::Admin,
            TeamRole::Member,
            TeamRole::Viewer,
        ] {
            assert_eq!(TeamRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(TeamRole::parse("superuser"), None);
    }

    #[test]
    fn inactive_member_does_not_occupy_membership() {
        let mut m = TeamMember::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            TeamRole::Member,
            MemberStatus::Active,
        );
        assert!(m.occupies_membership());
        m.status_code = MemberStatus::Inactive.as_str().to_string();
        assert!(!m.occupies_membership());
    }
}
