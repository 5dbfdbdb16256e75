mod auth;
mod team;

pub use auth::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, LoginResponse, MessageResponse,
    RefreshRequest, RefreshResponse, RegisterRequest, RegisterResponse, ResetPasswordRequest,
    VerifyEmailQuery,
};
pub use team::{
    CreateTeamRequest, InviteRequest, TransferOwnershipRequest, UpdateRoleRequest,
    UpdateTeamRequest,
};
