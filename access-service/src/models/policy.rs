//! Policy model - roles, permissions, resources and the flattened rule rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Namespace a resource belongs to; forms the prefix of a rule action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Http,
    Rpc,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Http => "http",
            ServiceType::Rpc => "rpc",
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(ServiceType::Http),
            "rpc" => Ok(ServiceType::Rpc),
            _ => Err(format!("Invalid service type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Role {
    pub role_id: i64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Permission {
    pub permission_id: i64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A (service type, method, path) triple that permissions grant access to.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Resource {
    pub resource_id: i64,
    pub name: String,
    pub description: String,
    pub service_type: String,
    pub method: String,
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRole {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct NewPermission {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct NewResource {
    pub name: String,
    pub description: String,
    pub service_type: ServiceType,
    pub method: String,
    pub path: String,
}

/// One role -> resource grant, joined through the permission tables.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Policy {
    pub role: String,
    pub service_type: String,
    pub method: String,
    pub path: String,
}
