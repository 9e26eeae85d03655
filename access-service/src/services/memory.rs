//! In-memory store implementations for tests and local experiments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::error::ServiceError;
use super::store::{CredentialStore, LoginAttemptStore, PolicyStore, SessionStore};
use crate::models::{
    LoginAttempt, NewPermission, NewResource, NewRole, NewUser, Permission, Policy, Resource,
    Role, ServiceType, Session, User, UserStatus,
};

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>, ServiceError> {
    mutex
        .lock()
        .map_err(|_| ServiceError::Internal(anyhow::anyhow!("{} mutex poisoned", name)))
}

// ===== Credentials =====

#[derive(Default)]
pub struct MemoryCredentialStore {
    users: Mutex<BTreeMap<i64, User>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed user, replacing any with the same id.
    pub fn insert(&self, user: User) -> Result<(), ServiceError> {
        lock(&self.users, "users")?.insert(user.user_id, user);
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, ServiceError> {
        Ok(lock(&self.users, "users")?.get(&user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        Ok(lock(&self.users, "users")?
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, ServiceError> {
        Ok(lock(&self.users, "users")?
            .values()
            .find(|u| u.phone == phone)
            .cloned())
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, ServiceError> {
        let mut users = lock(&self.users, "users")?;
        if users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email) || u.phone == user.phone)
        {
            return Err(ServiceError::DuplicateRegistration);
        }

        let now = Utc::now();
        let user_id = users.keys().next_back().copied().unwrap_or(0) + 1;
        let created = User {
            user_id,
            name: user.name.clone(),
            phone: user.phone.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            avatar_url: None,
            phone_verified: user.phone_verified,
            email_verified: false,
            status_code: UserStatus::Active.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };
        users.insert(user_id, created.clone());
        Ok(created)
    }

    async fn update_user_status(
        &self,
        user_id: i64,
        status: UserStatus,
    ) -> Result<(), ServiceError> {
        let mut users = lock(&self.users, "users")?;
        let user = users
            .get_mut(&user_id)
            .ok_or(ServiceError::UserNotFound { user_id })?;
        user.status_code = status.as_str().to_string();
        user.updated_at = Utc::now();
        Ok(())
    }
}

// ===== Sessions =====

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&self, session: &Session) -> Result<(), ServiceError> {
        lock(&self.sessions, "sessions")?.insert(session.token_id.clone(), session.clone());
        Ok(())
    }

    async fn find_session_by_id(&self, token_id: &str) -> Result<Option<Session>, ServiceError> {
        Ok(lock(&self.sessions, "sessions")?.get(token_id).cloned())
    }

    async fn delete_session(&self, token_id: &str) -> Result<(), ServiceError> {
        lock(&self.sessions, "sessions")?.remove(token_id);
        Ok(())
    }

    async fn touch_session(
        &self,
        token_id: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        if let Some(session) = lock(&self.sessions, "sessions")?.get_mut(token_id) {
            session.updated_at = updated_at;
        }
        Ok(())
    }
}

// ===== Login attempts =====

/// Attempt records with Redis-like expiry.
#[derive(Default)]
pub struct MemoryAttemptStore {
    attempts: Mutex<HashMap<i64, (LoginAttempt, DateTime<Utc>)>>,
}

impl MemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LoginAttemptStore for MemoryAttemptStore {
    async fn get_login_attempt(&self, user_id: i64) -> Result<Option<LoginAttempt>, ServiceError> {
        let mut attempts = lock(&self.attempts, "attempts")?;
        match attempts.get(&user_id) {
            Some((_, expires_at)) if *expires_at <= Utc::now() => {
                attempts.remove(&user_id);
                Ok(None)
            }
            Some((record, _)) => Ok(Some(record.clone())),
            None => Ok(None),
        }
    }

    async fn set_login_attempt(
        &self,
        user_id: i64,
        attempt: &LoginAttempt,
        ttl_seconds: i64,
    ) -> Result<(), ServiceError> {
        let mut attempts = lock(&self.attempts, "attempts")?;
        if ttl_seconds <= 0 {
            attempts.remove(&user_id);
        } else {
            let expires_at = Utc::now() + chrono::Duration::seconds(ttl_seconds);
            attempts.insert(user_id, (attempt.clone(), expires_at));
        }
        Ok(())
    }
}

// ===== Policy =====

#[derive(Default)]
struct PolicyTables {
    next_id: i64,
    roles: BTreeMap<i64, Role>,
    permissions: BTreeMap<i64, Permission>,
    resources: BTreeMap<i64, Resource>,
    role_permissions: BTreeSet<(i64, i64)>,
    permission_resources: BTreeSet<(i64, i64)>,
    user_roles: BTreeSet<(i64, i64)>,
}

impl PolicyTables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn ensure_role(&self, role_id: i64) -> Result<(), ServiceError> {
        if self.roles.contains_key(&role_id) {
            Ok(())
        } else {
            Err(ServiceError::NotFound("Role"))
        }
    }

    fn ensure_permission(&self, permission_id: i64) -> Result<(), ServiceError> {
        if self.permissions.contains_key(&permission_id) {
            Ok(())
        } else {
            Err(ServiceError::NotFound("Permission"))
        }
    }

    fn ensure_permissions_exist(&self, ids: &[i64]) -> Result<(), ServiceError> {
        match ids.iter().find(|id| !self.permissions.contains_key(id)) {
            Some(id) => Err(ServiceError::InvalidReference(format!(
                "Permission {} does not exist",
                id
            ))),
            None => Ok(()),
        }
    }

    fn ensure_resources_exist(&self, ids: &[i64]) -> Result<(), ServiceError> {
        match ids.iter().find(|id| !self.resources.contains_key(id)) {
            Some(id) => Err(ServiceError::InvalidReference(format!(
                "Resource {} does not exist",
                id
            ))),
            None => Ok(()),
        }
    }
}

/// Policy tables behind one mutex; every operation validates before it
/// mutates, so a failed call leaves the tables untouched.
#[derive(Default)]
pub struct MemoryPolicyStore {
    tables: Mutex<PolicyTables>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn create_role(
        &self,
        role: &NewRole,
        permission_ids: &[i64],
    ) -> Result<Role, ServiceError> {
        let mut tables = lock(&self.tables, "policy")?;
        if tables.roles.values().any(|r| r.name == role.name) {
            return Err(ServiceError::InvalidReference(format!(
                "Role {} already exists",
                role.name
            )));
        }
        tables.ensure_permissions_exist(permission_ids)?;

        let now = Utc::now();
        let role_id = tables.next_id();
        let created = Role {
            role_id,
            name: role.name.clone(),
            description: role.description.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.roles.insert(role_id, created.clone());
        for permission_id in permission_ids {
            tables.role_permissions.insert((role_id, *permission_id));
        }
        Ok(created)
    }

    async fn update_role(&self, role_id: i64, role: &NewRole) -> Result<Role, ServiceError> {
        let mut tables = lock(&self.tables, "policy")?;
        let existing = tables
            .roles
            .get_mut(&role_id)
            .ok_or(ServiceError::NotFound("Role"))?;
        existing.name = role.name.clone();
        existing.description = role.description.clone();
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn delete_role(&self, role_id: i64) -> Result<(), ServiceError> {
        let mut tables = lock(&self.tables, "policy")?;
        tables
            .roles
            .remove(&role_id)
            .ok_or(ServiceError::NotFound("Role"))?;
        tables.role_permissions.retain(|(r, _)| *r != role_id);
        tables.user_roles.retain(|(_, r)| *r != role_id);
        Ok(())
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, ServiceError> {
        Ok(lock(&self.tables, "policy")?
            .roles
            .values()
            .find(|r| r.name == name)
            .cloned())
    }

    async fn create_permission(
        &self,
        permission: &NewPermission,
        resource_ids: &[i64],
    ) -> Result<Permission, ServiceError> {
        let mut tables = lock(&self.tables, "policy")?;
        tables.ensure_resources_exist(resource_ids)?;

        let now = Utc::now();
        let permission_id = tables.next_id();
        let created = Permission {
            permission_id,
            name: permission.name.clone(),
            description: permission.description.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.permissions.insert(permission_id, created.clone());
        for resource_id in resource_ids {
            tables
                .permission_resources
                .insert((permission_id, *resource_id));
        }
        Ok(created)
    }

    async fn update_permission(
        &self,
        permission_id: i64,
        permission: &NewPermission,
    ) -> Result<Permission, ServiceError> {
        let mut tables = lock(&self.tables, "policy")?;
        let existing = tables
            .permissions
            .get_mut(&permission_id)
            .ok_or(ServiceError::NotFound("Permission"))?;
        existing.name = permission.name.clone();
        existing.description = permission.description.clone();
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn delete_permission(&self, permission_id: i64) -> Result<(), ServiceError> {
        let mut tables = lock(&self.tables, "policy")?;
        tables
            .permissions
            .remove(&permission_id)
            .ok_or(ServiceError::NotFound("Permission"))?;
        tables.role_permissions.retain(|(_, p)| *p != permission_id);
        tables
            .permission_resources
            .retain(|(p, _)| *p != permission_id);
        Ok(())
    }

    async fn create_resource(&self, resource: &NewResource) -> Result<Resource, ServiceError> {
        let mut tables = lock(&self.tables, "policy")?;
        let now = Utc::now();
        let resource_id = tables.next_id();
        let created = Resource {
            resource_id,
            name: resource.name.clone(),
            description: resource.description.clone(),
            service_type: resource.service_type.as_str().to_string(),
            method: resource.method.clone(),
            path: resource.path.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.resources.insert(resource_id, created.clone());
        Ok(created)
    }

    async fn update_resource(
        &self,
        resource_id: i64,
        resource: &NewResource,
    ) -> Result<Resource, ServiceError> {
        let mut tables = lock(&self.tables, "policy")?;
        let existing = tables
            .resources
            .get_mut(&resource_id)
            .ok_or(ServiceError::NotFound("Resource"))?;
        existing.name = resource.name.clone();
        existing.description = resource.description.clone();
        existing.service_type = resource.service_type.as_str().to_string();
        existing.method = resource.method.clone();
        existing.path = resource.path.clone();
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn delete_resource(&self, resource_id: i64) -> Result<(), ServiceError> {
        let mut tables = lock(&self.tables, "policy")?;
        tables
            .resources
            .remove(&resource_id)
            .ok_or(ServiceError::NotFound("Resource"))?;
        tables
            .permission_resources
            .retain(|(_, r)| *r != resource_id);
        Ok(())
    }

    async fn assign_permissions(
        &self,
        role_id: i64,
        permission_ids: &[i64],
    ) -> Result<(), ServiceError> {
        let mut tables = lock(&self.tables, "policy")?;
        tables.ensure_role(role_id)?;
        tables.ensure_permissions_exist(permission_ids)?;
        for permission_id in permission_ids {
            tables.role_permissions.insert((role_id, *permission_id));
        }
        Ok(())
    }

    async fn remove_permissions(
        &self,
        role_id: i64,
        permission_ids: &[i64],
    ) -> Result<(), ServiceError> {
        let mut tables = lock(&self.tables, "policy")?;
        tables.ensure_role(role_id)?;
        for permission_id in permission_ids {
            tables.role_permissions.remove(&(role_id, *permission_id));
        }
        Ok(())
    }

    async fn assign_resources(
        &self,
        permission_id: i64,
        resource_ids: &[i64],
    ) -> Result<(), ServiceError> {
        let mut tables = lock(&self.tables, "policy")?;
        tables.ensure_permission(permission_id)?;
        tables.ensure_resources_exist(resource_ids)?;
        for resource_id in resource_ids {
            tables
                .permission_resources
                .insert((permission_id, *resource_id));
        }
        Ok(())
    }

    async fn remove_resources(
        &self,
        permission_id: i64,
        resource_ids: &[i64],
    ) -> Result<(), ServiceError> {
        let mut tables = lock(&self.tables, "policy")?;
        tables.ensure_permission(permission_id)?;
        for resource_id in resource_ids {
            tables
                .permission_resources
                .remove(&(permission_id, *resource_id));
        }
        Ok(())
    }

    async fn assign_role(&self, user_id: i64, role_id: i64) -> Result<(), ServiceError> {
        let mut tables = lock(&self.tables, "policy")?;
        tables.ensure_role(role_id)?;
        tables.user_roles.insert((user_id, role_id));
        Ok(())
    }

    async fn revoke_role(&self, user_id: i64, role_id: i64) -> Result<(), ServiceError> {
        lock(&self.tables, "policy")?
            .user_roles
            .remove(&(user_id, role_id));
        Ok(())
    }

    async fn load_policies(&self, service_type: ServiceType) -> Result<Vec<Policy>, ServiceError> {
        let tables = lock(&self.tables, "policy")?;
        let mut policies = Vec::new();
        for (role_id, permission_id) in &tables.role_permissions {
            let Some(role) = tables.roles.get(role_id) else {
                continue;
            };
            let granted = tables
                .permission_resources
                .iter()
                .filter(|(p, _)| p == permission_id)
                .filter_map(|(_, r)| tables.resources.get(r))
                .filter(|r| r.service_type == service_type.as_str());
            for resource in granted {
                policies.push(Policy {
                    role: role.name.clone(),
                    service_type: resource.service_type.clone(),
                    method: resource.method.clone(),
                    path: resource.path.clone(),
                });
            }
        }
        Ok(policies)
    }

    async fn get_roles_by_user_id(&self, user_id: i64) -> Result<Vec<Role>, ServiceError> {
        let tables = lock(&self.tables, "policy")?;
        Ok(tables
            .user_roles
            .iter()
            .filter(|(u, _)| *u == user_id)
            .filter_map(|(_, r)| tables.roles.get(r).cloned())
            .collect())
    }

    async fn get_permissions_by_user_id(
        &self,
        user_id: i64,
    ) -> Result<Vec<Permission>, ServiceError> {
        let tables = lock(&self.tables, "policy")?;
        let permission_ids: BTreeSet<i64> = tables
            .user_roles
            .iter()
            .filter(|(u, _)| *u == user_id)
            .flat_map(|(_, role_id)| {
                tables
                    .role_permissions
                    .iter()
                    .filter(move |(r, _)| r == role_id)
                    .map(|(_, p)| *p)
            })
            .collect();
        Ok(permission_ids
            .iter()
            .filter_map(|id| tables.permissions.get(id).cloned())
            .collect())
    }

    async fn get_all_permissions(&self) -> Result<Vec<Permission>, ServiceError> {
        Ok(lock(&self.tables, "policy")?
            .permissions
            .values()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn attempt_store_zero_ttl_deletes() {
        let store = MemoryAttemptStore::new();
        let now = Utc::now();
        let record = LoginAttempt {
            attempt: 2,
            block_time: now,
            refresh_time: now + chrono::Duration::minutes(10),
        };

        store.set_login_attempt(9, &record, 600).await.unwrap();
        assert_eq!(store.get_login_attempt(9).await.unwrap(), Some(record));

        store
            .set_login_attempt(9, &LoginAttempt::cleared(now), 0)
            .await
            .unwrap();
        assert_eq!(store.get_login_attempt(9).await.unwrap(), None);
    }

    #[tokio::test]
    async fn failed_bulk_assign_changes_nothing() {
        let store = MemoryPolicyStore::new();
        let role = store
            .create_role(
                &NewRole {
                    name: "member".to_string(),
                    description: String::new(),
                },
                &[],
            )
            .await
            .unwrap();
        let permission = store
            .create_permission(
                &NewPermission {
                    name: "read".to_string(),
                    description: String::new(),
                },
                &[],
            )
            .await
            .unwrap();

        let result = store
            .assign_permissions(role.role_id, &[permission.permission_id, 9999])
            .await;

        assert!(matches!(result, Err(ServiceError::InvalidReference(_))));
        store.assign_role(1, role.role_id).await.unwrap();
        assert!(store.get_permissions_by_user_id(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn policies_join_through_permissions() {
        let store = MemoryPolicyStore::new();
        let resource = store
            .create_resource(&NewResource {
                name: String::new(),
                description: String::new(),
                service_type: ServiceType::Http,
                method: "GET".to_string(),
                path: "/user/:id".to_string(),
            })
            .await
            .unwrap();
        store
            .create_resource(&NewResource {
                name: String::new(),
                description: String::new(),
                service_type: ServiceType::Rpc,
                method: "Get".to_string(),
                path: "/user.User/Get".to_string(),
            })
            .await
            .unwrap();
        let permission = store
            .create_permission(
                &NewPermission {
                    name: "read-user".to_string(),
                    description: String::new(),
                },
                &[resource.resource_id],
            )
            .await
            .unwrap();
        store
            .create_role(
                &NewRole {
                    name: "member".to_string(),
                    description: String::new(),
                },
                &[permission.permission_id],
            )
            .await
            .unwrap();

        let policies = store.load_policies(ServiceType::Http).await.unwrap();
        assert_eq!(
            policies,
            vec![Policy {
                role: "member".to_string(),
                service_type: "http".to_string(),
                method: "GET".to_string(),
                path: "/user/:id".to_string(),
            }]
        );
    }
}
