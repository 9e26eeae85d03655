//! Persistence seams. Postgres and Redis back these in production; the
//! in-memory implementations in [`super::memory`] back the tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::ServiceError;
use crate::models::{
    LoginAttempt, NewPermission, NewResource, NewRole, NewUser, Permission, Policy, Resource,
    Role, ServiceType, Session, User, UserStatus,
};

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, ServiceError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError>;
    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, ServiceError>;
    async fn create_user(&self, user: &NewUser) -> Result<User, ServiceError>;
    async fn update_user_status(
        &self,
        user_id: i64,
        status: UserStatus,
    ) -> Result<(), ServiceError>;

    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, session: &Session) -> Result<(), ServiceError>;
    async fn find_session_by_id(&self, token_id: &str) -> Result<Option<Session>, ServiceError>;
    /// Deleting a missing session is not an error.
    async fn delete_session(&self, token_id: &str) -> Result<(), ServiceError>;
    async fn touch_session(
        &self,
        token_id: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait LoginAttemptStore: Send + Sync {
    async fn get_login_attempt(&self, user_id: i64) -> Result<Option<LoginAttempt>, ServiceError>;
    /// Stores the record for `ttl_seconds`; a TTL of zero or less deletes it.
    async fn set_login_attempt(
        &self,
        user_id: i64,
        attempt: &LoginAttempt,
        ttl_seconds: i64,
    ) -> Result<(), ServiceError>;

    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// Role, permission and resource tables plus their join tables.
///
/// Multi-row writes must be all-or-nothing. Assigning a link that already
/// exists is a no-op, as is removing one that does not.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    // ===== Roles =====
    async fn create_role(&self, role: &NewRole, permission_ids: &[i64])
        -> Result<Role, ServiceError>;
    async fn update_role(&self, role_id: i64, role: &NewRole) -> Result<Role, ServiceError>;
    async fn delete_role(&self, role_id: i64) -> Result<(), ServiceError>;
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, ServiceError>;

    // ===== Permissions =====
    async fn create_permission(
        &self,
        permission: &NewPermission,
        resource_ids: &[i64],
    ) -> Result<Permission, ServiceError>;
    async fn update_permission(
        &self,
        permission_id: i64,
        permission: &NewPermission,
    ) -> Result<Permission, ServiceError>;
    async fn delete_permission(&self, permission_id: i64) -> Result<(), ServiceError>;

    // ===== Resources =====
    async fn create_resource(&self, resource: &NewResource) -> Result<Resource, ServiceError>;
    async fn update_resource(
        &self,
        resource_id: i64,
        resource: &NewResource,
    ) -> Result<Resource, ServiceError>;
    async fn delete_resource(&self, resource_id: i64) -> Result<(), ServiceError>;

    // ===== Assignments =====
    async fn assign_permissions(
        &self,
        role_id: i64,
        permission_ids: &[i64],
    ) -> Result<(), ServiceError>;
    async fn remove_permissions(
        &self,
        role_id: i64,
        permission_ids: &[i64],
    ) -> Result<(), ServiceError>;
    async fn assign_resources(
        &self,
        permission_id: i64,
        resource_ids: &[i64],
    ) -> Result<(), ServiceError>;
    async fn remove_resources(
        &self,
        permission_id: i64,
        resource_ids: &[i64],
    ) -> Result<(), ServiceError>;
    async fn assign_role(&self, user_id: i64, role_id: i64) -> Result<(), ServiceError>;
    async fn revoke_role(&self, user_id: i64, role_id: i64) -> Result<(), ServiceError>;

    // ===== Queries =====
    async fn load_policies(&self, service_type: ServiceType) -> Result<Vec<Policy>, ServiceError>;
    /// Roles ordered by role id, oldest first.
    async fn get_roles_by_user_id(&self, user_id: i64) -> Result<Vec<Role>, ServiceError>;
    async fn get_permissions_by_user_id(&self, user_id: i64)
        -> Result<Vec<Permission>, ServiceError>;
    async fn get_all_permissions(&self) -> Result<Vec<Permission>, ServiceError>;
}
