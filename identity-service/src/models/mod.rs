pub mod password_reset;
pub mod permission;
pub mod session;
pub mod team;
pub mod team_member;
pub mod user;

pub use password_reset::PasswordResetToken;
pub use permission::{Effect, PermissionRule};
pub use session::Session;
pub use team::{Team, TeamResponse, TeamStatus};
pub use team_member::{MemberStatus, TeamMember, TeamMemberResponse, TeamRole};
pub use user::{PasswordAlgo, User, UserResponse, UserStatus};
