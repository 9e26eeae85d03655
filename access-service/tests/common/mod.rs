//! Shared setup for access-service integration tests: in-memory stores, the
//! fixture RSA key pair, and a seeded policy.

#![allow(dead_code)]

use access_service::{
    build_router,
    config::{
        AccessConfig, DatabaseConfig, Environment, JwtConfig, PolicyConfig, RedisConfig,
        RegistrationConfig, SecurityConfig,
    },
    dtos::auth::{LoginRequest, LoginResponse},
    models::{ClientInfo, NewPermission, NewResource, NewRole, ServiceType, User},
    services::{
        JwtService, MemoryAttemptStore, MemoryCredentialStore, MemoryPolicyStore,
        MemorySessionStore, PolicyStore,
    },
    utils::{hash_password, Password},
    AppState, Stores,
};
use axum::Router;
use chrono::Utc;
use std::sync::Arc;

pub const PRIVATE_KEY: &str = include_str!("../fixtures/jwt_private.pem");
pub const PUBLIC_KEY: &str = include_str!("../fixtures/jwt_public.pem");

pub const MEMBER_ID: i64 = 1;
pub const MEMBER_EMAIL: &str = "member@example.com";
pub const MEMBER_PHONE: &str = "+15550100";
pub const ADMIN_ID: i64 = 2;
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const PASSWORD: &str = "correct-horse-battery";

pub fn test_config() -> AccessConfig {
    AccessConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "access-service-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: "postgres://localhost/unused".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        redis: RedisConfig {
            url: "redis://localhost".to_string(),
        },
        jwt: JwtConfig {
            private_key_path: String::new(),
            public_key_path: String::new(),
            issuer: "access-service-test".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 30,
        },
        policy: PolicyConfig::default(),
        registration: RegistrationConfig::default(),
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            request_timeout_seconds: 30,
        },
    }
}

pub fn user(user_id: i64, email: &str, phone: &str) -> User {
    let hash = hash_password(&Password::new(PASSWORD)).expect("hash password");
    User {
        user_id,
        name: format!("User {}", user_id),
        phone: phone.to_string(),
        email: email.to_string(),
        password_hash: hash.into_string(),
        avatar_url: None,
        phone_verified: true,
        email_verified: true,
        status_code: "active".to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn client() -> ClientInfo {
    ClientInfo::new("127.0.0.1", "integration-test")
}

pub struct TestApp {
    pub state: AppState,
    pub jwt: JwtService,
    pub users: Arc<MemoryCredentialStore>,
    pub sessions: Arc<MemorySessionStore>,
    pub attempts: Arc<MemoryAttemptStore>,
    pub policies: Arc<MemoryPolicyStore>,
    pub member_role_id: i64,
}

impl TestApp {
    /// A member (`GET /user/me`, `GET /user/:id`) and a superadmin, with the
    /// policy already loaded.
    pub async fn spawn() -> Self {
        Self::spawn_with(test_config()).await
    }

    pub async fn spawn_with(config: AccessConfig) -> Self {
        let users = Arc::new(MemoryCredentialStore::new());
        let sessions = Arc::new(MemorySessionStore::new());
        let attempts = Arc::new(MemoryAttemptStore::new());
        let policies = Arc::new(MemoryPolicyStore::new());

        users
            .insert(user(MEMBER_ID, MEMBER_EMAIL, MEMBER_PHONE))
            .expect("insert member");
        users
            .insert(user(ADMIN_ID, ADMIN_EMAIL, "+15550200"))
            .expect("insert admin");

        let me = policies
            .create_resource(&NewResource {
                name: String::new(),
                description: String::new(),
                service_type: ServiceType::Http,
                method: "GET".to_string(),
                path: "/user/me".to_string(),
            })
            .await
            .expect("create resource");
        let by_id = policies
            .create_resource(&NewResource {
                name: String::new(),
                description: String::new(),
                service_type: ServiceType::Http,
                method: "GET".to_string(),
                path: "/user/:id".to_string(),
            })
            .await
            .expect("create resource");
        let read_profile = policies
            .create_permission(
                &NewPermission {
                    name: "profile.read".to_string(),
                    description: "Read user profiles".to_string(),
                },
                &[me.resource_id, by_id.resource_id],
            )
            .await
            .expect("create permission");
        let member = policies
            .create_role(
                &NewRole {
                    name: "member".to_string(),
                    description: "Default role".to_string(),
                },
                &[read_profile.permission_id],
            )
            .await
            .expect("create member role");
        let superadmin = policies
            .create_role(
                &NewRole {
                    name: "superadmin".to_string(),
                    description: "Everything".to_string(),
                },
                &[],
            )
            .await
            .expect("create superadmin role");

        policies
            .assign_role(MEMBER_ID, member.role_id)
            .await
            .expect("assign member");
        policies
            .assign_role(ADMIN_ID, superadmin.role_id)
            .await
            .expect("assign superadmin");

        let jwt = JwtService::from_pem(PRIVATE_KEY.as_bytes(), PUBLIC_KEY.as_bytes(), &config.jwt)
            .expect("load fixture keys");

        let stores = Stores {
            users: users.clone(),
            sessions: sessions.clone(),
            attempts: attempts.clone(),
            policies: policies.clone(),
        };
        let state = AppState::new(config, stores, jwt.clone())
            .await
            .expect("build state");
        state.policy.reload().await.expect("load policy");

        Self {
            state,
            jwt,
            users,
            sessions,
            attempts,
            policies,
            member_role_id: member.role_id,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn login(&self, identity: &str) -> LoginResponse {
        self.state
            .auth
            .login(
                LoginRequest {
                    identity: identity.to_string(),
                    password: PASSWORD.to_string(),
                },
                &client(),
            )
            .await
            .expect("login")
    }
}
