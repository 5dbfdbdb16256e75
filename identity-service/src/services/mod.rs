mod audit;
mod auth;
mod cache;
mod email;
pub mod error;
pub mod password;
mod permission;
mod team;
mod token;

pub use audit::{AuditEvent, AuditSink, MockAudit, RiskLevel, TracingAudit};
pub use auth::{AuthService, SecurityPolicy, hash_token};
pub use cache::{CacheStore, InMemoryCache, RedisCache};
pub use email::{EmailKind, EmailProvider, MockEmailService, SmtpEmailService};
pub use error::ServiceError;
pub use permission::{
    effective_rules, evaluate, merge_rules, require_team_permission, system_admin_rules,
};
pub use team::{TeamService, UpdateTeam};
pub use token::{IssuedTokens, TokenClaims, TokenService, TokenType};
