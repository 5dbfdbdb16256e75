use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTeamRequest {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(range(min = 1, max = 10_000))]
    #[serde(rename = "maxMembers", default = "default_max_members")]
    pub max_members: i32,
    #[serde(rename = "isPrivate", default)]
    pub is_private: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_max_members() -> i32 {
    50
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTeamRequest {
    #[validate(length(min = 1, max = 64))]
    pub name: Option<String>,
    #[validate(range(min = 1, max = 10_000))]
    #[serde(rename = "maxMembers")]
    pub max_members: Option<i32>,
    #[serde(rename = "isPrivate")]
    pub is_private: Option<bool>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct InviteRequest {
    #[validate(email)]
    pub email: String,
    pub role: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TransferOwnershipRequest {
    #[serde(rename = "newOwnerUserId")]
    pub new_owner_user_id: uuid::Uuid,
}
