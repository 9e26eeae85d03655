pub mod login_attempt;
pub mod policy;
pub mod session;
pub mod user;

pub use login_attempt::LoginAttempt;
pub use policy::{
    NewPermission, NewResource, NewRole, Permission, Policy, Resource, Role, ServiceType,
};
pub use session::{ClientInfo, Session};
pub use user::{Identity, NewUser, User, UserProfile, UserStatus};
