use std::sync::Arc;
use validator::Validate;

use super::enforcer::{PolicyEngine, PolicyRule};
use super::error::ServiceError;
use super::store::PolicyStore;
use crate::config::PolicyConfig;
use crate::dtos::policy::{PermissionRequest, ResourceRequest, RoleRequest};
use crate::models::{Permission, Resource, Role, ServiceType};

/// Administration of roles, permissions and resources, and the bridge that
/// loads the stored grants into the [`PolicyEngine`].
#[derive(Clone)]
pub struct PolicyAdminService {
    store: Arc<dyn PolicyStore>,
    engine: Arc<PolicyEngine>,
    config: PolicyConfig,
}

impl PolicyAdminService {
    pub fn new(store: Arc<dyn PolicyStore>, engine: Arc<PolicyEngine>, config: PolicyConfig) -> Self {
        Self {
            store,
            engine,
            config,
        }
    }

    pub fn engine(&self) -> &Arc<PolicyEngine> {
        &self.engine
    }

    /// Rebuild the engine from every grant of `service_type`. On failure the
    /// previous rule set stays in force.
    pub async fn load_policy(&self, service_type: ServiceType) -> Result<usize, ServiceError> {
        let policies = self.store.load_policies(service_type).await?;
        let count = self
            .engine
            .replace_policy(policies.iter().map(PolicyRule::from))
            .await?;

        tracing::info!(service_type = %service_type, rules = count, "Policy loaded");
        Ok(count)
    }

    pub async fn reload(&self) -> Result<usize, ServiceError> {
        self.load_policy(self.config.service_type).await
    }

    async fn after_mutation(&self) -> Result<(), ServiceError> {
        if self.config.auto_reload {
            self.reload().await?;
        }
        Ok(())
    }

    // ===== Roles =====

    pub async fn add_role(&self, req: RoleRequest) -> Result<Role, ServiceError> {
        req.validate()?;
        let role = self
            .store
            .create_role(&req.to_new_role(), &req.permission_ids)
            .await?;
        tracing::info!(role_id = role.role_id, name = %role.name, "Role created");
        self.after_mutation().await?;
        Ok(role)
    }

    pub async fn update_role(&self, role_id: i64, req: RoleRequest) -> Result<Role, ServiceError> {
        req.validate()?;
        let role = self.store.update_role(role_id, &req.to_new_role()).await?;
        tracing::info!(role_id, name = %role.name, "Role updated");
        self.after_mutation().await?;
        Ok(role)
    }

    pub async fn delete_role(&self, role_id: i64) -> Result<(), ServiceError> {
        self.store.delete_role(role_id).await?;
        tracing::info!(role_id, "Role deleted");
        self.after_mutation().await
    }

    // ===== Permissions =====

    pub async fn add_permission(&self, req: PermissionRequest) -> Result<Permission, ServiceError> {
        req.validate()?;
        let permission = self
            .store
            .create_permission(&req.to_new_permission(), &req.resource_ids)
            .await?;
        tracing::info!(permission_id = permission.permission_id, "Permission created");
        self.after_mutation().await?;
        Ok(permission)
    }

    pub async fn update_permission(
        &self,
        permission_id: i64,
        req: PermissionRequest,
    ) -> Result<Permission, ServiceError> {
        req.validate()?;
        let permission = self
            .store
            .update_permission(permission_id, &req.to_new_permission())
            .await?;
        tracing::info!(permission_id, "Permission updated");
        self.after_mutation().await?;
        Ok(permission)
    }

    pub async fn delete_permission(&self, permission_id: i64) -> Result<(), ServiceError> {
        self.store.delete_permission(permission_id).await?;
        tracing::info!(permission_id, "Permission deleted");
        self.after_mutation().await
    }

    // ===== Resources =====

    pub async fn add_resource(&self, req: ResourceRequest) -> Result<Resource, ServiceError> {
        req.validate()?;
        let resource = self.store.create_resource(&req.to_new_resource()).await?;
        tracing::info!(resource_id = resource.resource_id, "Resource created");
        self.after_mutation().await?;
        Ok(resource)
    }

    pub async fn update_resource(
        &self,
        resource_id: i64,
        req: ResourceRequest,
    ) -> Result<Resource, ServiceError> {
        req.validate()?;
        let resource = self
            .store
            .update_resource(resource_id, &req.to_new_resource())
            .await?;
        tracing::info!(resource_id, "Resource updated");
        self.after_mutation().await?;
        Ok(resource)
    }

    pub async fn delete_resource(&self, resource_id: i64) -> Result<(), ServiceError> {
        self.store.delete_resource(resource_id).await?;
        tracing::info!(resource_id, "Resource deleted");
        self.after_mutation().await
    }

    // ===== Bulk assignments =====

    pub async fn bulk_assign_permissions(
        &self,
        role_id: i64,
        permission_ids: &[i64],
    ) -> Result<(), ServiceError> {
        if permission_ids.is_empty() {
            return Ok(());
        }
        self.store.assign_permissions(role_id, permission_ids).await?;
        tracing::info!(role_id, count = permission_ids.len(), "Permissions assigned to role");
        self.after_mutation().await
    }

    pub async fn bulk_remove_permissions(
        &self,
        role_id: i64,
        permission_ids: &[i64],
    ) -> Result<(), ServiceError> {
        if permission_ids.is_empty() {
            return Ok(());
        }
        self.store.remove_permissions(role_id, permission_ids).await?;
        tracing::info!(role_id, count = permission_ids.len(), "Permissions removed from role");
        self.after_mutation().await
    }

    pub async fn bulk_assign_resources(
        &self,
        permission_id: i64,
        resource_ids: &[i64],
    ) -> Result<(), ServiceError> {
        if resource_ids.is_empty() {
            return Ok(());
        }
        self.store.assign_resources(permission_id, resource_ids).await?;
        tracing::info!(permission_id, count = resource_ids.len(), "Resources assigned to permission");
        self.after_mutation().await
    }

    pub async fn bulk_remove_resources(
        &self,
        permission_id: i64,
        resource_ids: &[i64],
    ) -> Result<(), ServiceError> {
        if resource_ids.is_empty() {
            return Ok(());
        }
        self.store.remove_resources(permission_id, resource_ids).await?;
        tracing::info!(permission_id, count = resource_ids.len(), "Resources removed from permission");
        self.after_mutation().await
    }

    // ===== User roles =====

    pub async fn assign_role(&self, user_id: i64, role_id: i64) -> Result<(), ServiceError> {
        self.store.assign_role(user_id, role_id).await?;
        tracing::info!(user_id, role_id, "Role assigned to user");
        Ok(())
    }

    pub async fn revoke_role(&self, user_id: i64, role_id: i64) -> Result<(), ServiceError> {
        self.store.revoke_role(user_id, role_id).await?;
        tracing::info!(user_id, role_id, "Role revoked from user");
        Ok(())
    }

    /// Every permission reachable through the user's roles; the superadmin
    /// role implies all of them.
    pub async fn get_user_permissions(&self, user_id: i64) -> Result<Vec<Permission>, ServiceError> {
        let roles = self.store.get_roles_by_user_id(user_id).await?;
        if roles
            .iter()
            .any(|role| role.name == self.engine.superadmin_role())
        {
            return self.store.get_all_permissions().await;
        }
        self.store.get_permissions_by_user_id(user_id).await
    }
}
