//! Team model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Team state codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamStatus {
    Active,
    Inactive,
    Suspended,
    Deleted,
}

impl TeamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamStatus::Active => "active",
            TeamStatus::Inactive => "inactive",
            TeamStatus::Suspended => "suspended",
            TeamStatus::Deleted => "deleted",
        }
    }
}

/// Team entity.
///
/// Invariant: `owner_id` always equals the user_id of exactly one active
/// member row with the owner role. Team creation and ownership transfer
/// maintain this transactionally.
#[derive(Debug, Clone, FromRow)]
pub struct Team {
    pub team_id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub status_code: String,
    pub max_members: i32,
    pub is_private: bool,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Team {
    pub fn new(
        name: String,
        owner_id: Uuid,
        max_members: i32,
        is_private: bool,
        tags: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            team_id: Uuid::new_v4(),
            name,
            owner_id,
            status_code: TeamStatus::Active.as_str().to_string(),
            max_members,
            is_private,
            tags,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status_code == TeamStatus::Active.as_str()
    }
}

/// Team response for API.
#[derive(Debug, Serialize)]
pub struct TeamResponse {
    pub team_id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub status: String,
    pub max_members: i32,
    pub is_private: bool,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Team> for TeamResponse {
    fn from(t: Team) -> Self {
        Self {
            team_id: t.team_id,
            name: t.name,
            owner_id: t.owner_id,
            status: t.status_code,
            max_members: t.max_members,
            is_private: t.is_private,
            tags: t.tags,
            created_at: t.created_at,
        }
    }
}
