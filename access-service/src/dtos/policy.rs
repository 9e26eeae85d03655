use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{NewPermission, NewResource, NewRole, Permission, ServiceType};

#[derive(Debug, Deserialize, Validate)]
pub struct RoleRequest {
    #[validate(length(min = 1, max = 64, message = "Role name is required"))]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Only honored on create.
    #[serde(default)]
    pub permission_ids: Vec<i64>,
}

impl RoleRequest {
    pub fn to_new_role(&self) -> NewRole {
        NewRole {
            name: self.name.trim().to_string(),
            description: self.description.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct PermissionRequest {
    #[validate(length(min = 1, max = 64, message = "Permission name is required"))]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Only honored on create.
    #[serde(default)]
    pub resource_ids: Vec<i64>,
}

impl PermissionRequest {
    pub fn to_new_permission(&self) -> NewPermission {
        NewPermission {
            name: self.name.trim().to_string(),
            description: self.description.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResourceRequest {
    #[serde(default)]
    #[validate(length(max = 64, message = "Resource name is too long"))]
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub service_type: ServiceType,

    /// Method pattern; compiled as a regular expression at load time.
    #[validate(length(min = 1, max = 64, message = "Method is required"))]
    pub method: String,

    #[validate(length(min = 1, max = 255, message = "Path is required"))]
    pub path: String,
}

impl ResourceRequest {
    pub fn to_new_resource(&self) -> NewResource {
        NewResource {
            name: self.name.trim().to_string(),
            description: self.description.clone(),
            service_type: self.service_type,
            method: self.method.trim().to_string(),
            path: self.path.trim().to_string(),
        }
    }
}

/// Body of the bulk assign/remove endpoints.
#[derive(Debug, Deserialize, Validate)]
pub struct IdsRequest {
    #[validate(length(min = 1, message = "At least one id is required"))]
    pub ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub role_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserPermissionsResponse {
    pub user_id: i64,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub rules: usize,
}
