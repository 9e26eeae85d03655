//! Services layer: credential checks, token lifecycle, lockout, policy
//! enforcement and administration, and the stores they persist through.

pub mod access;
mod auth;
mod credential;
mod database;
pub mod enforcer;
pub mod error;
pub mod jwt;
pub mod lockout;
pub mod memory;
mod policy;
pub mod redis;
pub mod store;
mod user;

pub use access::{validate_user_state, AccessGate, ElementId};
pub use auth::AuthService;
pub use credential::CredentialValidator;
pub use database::Database;
pub use enforcer::{PathMatcher, PolicyEngine, PolicyRule};
pub use error::ServiceError;
pub use jwt::{JwtService, TokenClaims, TokenKind, TokenPair};
pub use lockout::LockoutService;
pub use memory::{MemoryAttemptStore, MemoryCredentialStore, MemoryPolicyStore, MemorySessionStore};
pub use policy::PolicyAdminService;
pub use self::redis::RedisService;
pub use store::{CredentialStore, LoginAttemptStore, PolicyStore, SessionStore};
pub use user::UserService;
