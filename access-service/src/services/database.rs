//! PostgreSQL implementation of the credential, session and policy stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;

use super::error::ServiceError;
use super::store::{CredentialStore, PolicyStore, SessionStore};
use crate::models::{
    NewPermission, NewResource, NewRole, NewUser, Permission, Policy, Resource, Role,
    ServiceType, Session, User, UserStatus,
};

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Constraint violations are caller mistakes, everything else is internal.
fn map_write_error(err: sqlx::Error, entity: &str) -> ServiceError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return ServiceError::InvalidReference(format!("{} already exists", entity));
        }
        if db.is_foreign_key_violation() {
            return ServiceError::InvalidReference(format!(
                "{} references a record that does not exist",
                entity
            ));
        }
    }
    ServiceError::Database(err)
}

#[async_trait]
impl CredentialStore for Database {
    async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                ServiceError::Database(e)
            })?;
        Ok(())
    }

    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, ServiceError> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, ServiceError> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE phone = $1")
                .bind(phone)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, ServiceError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, phone, email, password_hash, phone_verified, status_code)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&user.name)
        .bind(&user.phone)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.phone_verified)
        .bind(UserStatus::Active.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return ServiceError::DuplicateRegistration;
                }
            }
            ServiceError::Database(e)
        })
    }

    async fn update_user_status(
        &self,
        user_id: i64,
        status: UserStatus,
    ) -> Result<(), ServiceError> {
        let result = sqlx::query(
            "UPDATE users SET status_code = $2, updated_at = NOW() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::UserNotFound { user_id });
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for Database {
    async fn create_session(&self, session: &Session) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (token_id, user_id, user_agent, ip, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&session.token_id)
        .bind(session.user_id)
        .bind(&session.user_agent)
        .bind(&session.ip)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_session_by_id(&self, token_id: &str) -> Result<Option<Session>, ServiceError> {
        Ok(
            sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE token_id = $1")
                .bind(token_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn delete_session(&self, token_id: &str) -> Result<(), ServiceError> {
        sqlx::query("DELETE FROM sessions WHERE token_id = $1")
            .bind(token_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn touch_session(
        &self,
        token_id: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        sqlx::query("UPDATE sessions SET updated_at = $2 WHERE token_id = $1")
            .bind(token_id)
            .bind(updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PolicyStore for Database {
    // ===== Roles =====

    async fn create_role(
        &self,
        role: &NewRole,
        permission_ids: &[i64],
    ) -> Result<Role, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Role>(
            "INSERT INTO roles (name, description) VALUES ($1, $2) RETURNING *",
        )
        .bind(&role.name)
        .bind(&role.description)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, "Role"))?;

        if !permission_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO role_permissions (role_id, permission_id)
                SELECT $1, UNNEST($2::BIGINT[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(created.role_id)
            .bind(permission_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, "Role permission"))?;
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn update_role(&self, role_id: i64, role: &NewRole) -> Result<Role, ServiceError> {
        sqlx::query_as::<_, Role>(
            r#"
            UPDATE roles SET name = $2, description = $3, updated_at = NOW()
            WHERE role_id = $1
            RETURNING *
            "#,
        )
        .bind(role_id)
        .bind(&role.name)
        .bind(&role.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "Role"))?
        .ok_or(ServiceError::NotFound("Role"))
    }

    async fn delete_role(&self, role_id: i64) -> Result<(), ServiceError> {
        let result = sqlx::query("DELETE FROM roles WHERE role_id = $1")
            .bind(role_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("Role"));
        }
        Ok(())
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, ServiceError> {
        Ok(
            sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    // ===== Permissions =====

    async fn create_permission(
        &self,
        permission: &NewPermission,
        resource_ids: &[i64],
    ) -> Result<Permission, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Permission>(
            "INSERT INTO permissions (name, description) VALUES ($1, $2) RETURNING *",
        )
        .bind(&permission.name)
        .bind(&permission.description)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, "Permission"))?;

        if !resource_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO permission_resources (permission_id, resource_id)
                SELECT $1, UNNEST($2::BIGINT[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(created.permission_id)
            .bind(resource_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, "Permission resource"))?;
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn update_permission(
        &self,
        permission_id: i64,
        permission: &NewPermission,
    ) -> Result<Permission, ServiceError> {
        sqlx::query_as::<_, Permission>(
            r#"
            UPDATE permissions SET name = $2, description = $3, updated_at = NOW()
            WHERE permission_id = $1
            RETURNING *
            "#,
        )
        .bind(permission_id)
        .bind(&permission.name)
        .bind(&permission.description)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ServiceError::NotFound("Permission"))
    }

    async fn delete_permission(&self, permission_id: i64) -> Result<(), ServiceError> {
        let result = sqlx::query("DELETE FROM permissions WHERE permission_id = $1")
            .bind(permission_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("Permission"));
        }
        Ok(())
    }

    // ===== Resources =====

    async fn create_resource(&self, resource: &NewResource) -> Result<Resource, ServiceError> {
        Ok(sqlx::query_as::<_, Resource>(
            r#"
            INSERT INTO resources (name, description, service_type, method, path)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&resource.name)
        .bind(&resource.description)
        .bind(resource.service_type.as_str())
        .bind(&resource.method)
        .bind(&resource.path)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update_resource(
        &self,
        resource_id: i64,
        resource: &NewResource,
    ) -> Result<Resource, ServiceError> {
        sqlx::query_as::<_, Resource>(
            r#"
            UPDATE resources
            SET name = $2, description = $3, service_type = $4, method = $5, path = $6,
                updated_at = NOW()
            WHERE resource_id = $1
            RETURNING *
            "#,
        )
        .bind(resource_id)
        .bind(&resource.name)
        .bind(&resource.description)
        .bind(resource.service_type.as_str())
        .bind(&resource.method)
        .bind(&resource.path)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ServiceError::NotFound("Resource"))
    }

    async fn delete_resource(&self, resource_id: i64) -> Result<(), ServiceError> {
        let result = sqlx::query("DELETE FROM resources WHERE resource_id = $1")
            .bind(resource_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("Resource"));
        }
        Ok(())
    }

    // ===== Assignments =====

    async fn assign_permissions(
        &self,
        role_id: i64,
        permission_ids: &[i64],
    ) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, i64>("SELECT role_id FROM roles WHERE role_id = $1 FOR UPDATE")
            .bind(role_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ServiceError::NotFound("Role"))?;

        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id)
            SELECT $1, UNNEST($2::BIGINT[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(role_id)
        .bind(permission_ids)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, "Role permission"))?;

        tx.commit().await?;
        Ok(())
    }

    async fn remove_permissions(
        &self,
        role_id: i64,
        permission_ids: &[i64],
    ) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, i64>("SELECT role_id FROM roles WHERE role_id = $1 FOR UPDATE")
            .bind(role_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ServiceError::NotFound("Role"))?;

        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = ANY($2)")
            .bind(role_id)
            .bind(permission_ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn assign_resources(
        &self,
        permission_id: i64,
        resource_ids: &[i64],
    ) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, i64>(
            "SELECT permission_id FROM permissions WHERE permission_id = $1 FOR UPDATE",
        )
        .bind(permission_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ServiceError::NotFound("Permission"))?;

        sqlx::query(
            r#"
            INSERT INTO permission_resources (permission_id, resource_id)
            SELECT $1, UNNEST($2::BIGINT[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(permission_id)
        .bind(resource_ids)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, "Permission resource"))?;

        tx.commit().await?;
        Ok(())
    }

    async fn remove_resources(
        &self,
        permission_id: i64,
        resource_ids: &[i64],
    ) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, i64>(
            "SELECT permission_id FROM permissions WHERE permission_id = $1 FOR UPDATE",
        )
        .bind(permission_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ServiceError::NotFound("Permission"))?;

        sqlx::query(
            "DELETE FROM permission_resources WHERE permission_id = $1 AND resource_id = ANY($2)",
        )
        .bind(permission_id)
        .bind(resource_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn assign_role(&self, user_id: i64, role_id: i64) -> Result<(), ServiceError> {
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(role_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "User role"))?;
        Ok(())
    }

    async fn revoke_role(&self, user_id: i64, role_id: i64) -> Result<(), ServiceError> {
        sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ===== Queries =====

    async fn load_policies(&self, service_type: ServiceType) -> Result<Vec<Policy>, ServiceError> {
        Ok(sqlx::query_as::<_, Policy>(
            r#"
            SELECT DISTINCT r.name AS role, res.service_type, res.method, res.path
            FROM role_permissions rp
            JOIN roles r ON r.role_id = rp.role_id
            JOIN permission_resources pr ON pr.permission_id = rp.permission_id
            JOIN resources res ON res.resource_id = pr.resource_id
            WHERE res.service_type = $1
            ORDER BY r.name, res.path, res.method
            "#,
        )
        .bind(service_type.as_str())
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_roles_by_user_id(&self, user_id: i64) -> Result<Vec<Role>, ServiceError> {
        Ok(sqlx::query_as::<_, Role>(
            r#"
            SELECT r.* FROM roles r
            JOIN user_roles ur ON ur.role_id = r.role_id
            WHERE ur.user_id = $1
            ORDER BY r.role_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_permissions_by_user_id(
        &self,
        user_id: i64,
    ) -> Result<Vec<Permission>, ServiceError> {
        Ok(sqlx::query_as::<_, Permission>(
            r#"
            SELECT DISTINCT p.* FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.permission_id
            JOIN user_roles ur ON ur.role_id = rp.role_id
            WHERE ur.user_id = $1
            ORDER BY p.permission_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_all_permissions(&self) -> Result<Vec<Permission>, ServiceError> {
        Ok(
            sqlx::query_as::<_, Permission>("SELECT * FROM permissions ORDER BY permission_id")
                .fetch_all(&self.pool)
                .await?,
        )
    }
}
