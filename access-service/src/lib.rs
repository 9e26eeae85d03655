pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Json, Router,
};
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AccessConfig;
use crate::services::{
    AccessGate, AuthService, CredentialStore, CredentialValidator, JwtService, LockoutService,
    LoginAttemptStore, PolicyAdminService, PolicyEngine, PolicyStore, ServiceError, SessionStore,
    UserService,
};

/// Persistence backends the service runs on.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn CredentialStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub attempts: Arc<dyn LoginAttemptStore>,
    pub policies: Arc<dyn PolicyStore>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: AccessConfig,
    pub credentials: Arc<dyn CredentialStore>,
    pub attempts: Arc<dyn LoginAttemptStore>,
    pub auth: AuthService,
    pub access: AccessGate,
    pub policy: PolicyAdminService,
    pub users: UserService,
}

impl AppState {
    /// Wire the services over `stores`. The policy engine starts empty; call
    /// [`PolicyAdminService::reload`] to load the stored grants.
    pub async fn new(
        config: AccessConfig,
        stores: Stores,
        jwt: JwtService,
    ) -> Result<Self, ServiceError> {
        let engine = Arc::new(PolicyEngine::new(config.policy.superadmin_role.clone()).await?);

        let lockout = LockoutService::new(stores.attempts.clone(), stores.users.clone());
        let credentials = CredentialValidator::new(lockout);

        let auth = AuthService::new(
            stores.users.clone(),
            stores.sessions.clone(),
            stores.policies.clone(),
            jwt.clone(),
            credentials,
            config.registration.clone(),
        );
        let access = AccessGate::new(
            jwt,
            stores.sessions.clone(),
            stores.users.clone(),
            engine.clone(),
            config.policy.service_type,
        );
        let policy = PolicyAdminService::new(stores.policies.clone(), engine, config.policy.clone());
        let users = UserService::new(stores.users.clone());

        Ok(Self {
            config,
            credentials: stores.users,
            attempts: stores.attempts,
            auth,
            access,
            policy,
            users,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/user/me", get(handlers::user::me))
        .route("/user/:id", get(handlers::user::get_user))
        .route("/policy/reload", post(handlers::policy::reload))
        .route("/policy/role", post(handlers::policy::create_role))
        .route(
            "/policy/role/:id",
            put(handlers::policy::update_role).delete(handlers::policy::delete_role),
        )
        .route(
            "/policy/role/:id/permissions",
            post(handlers::policy::assign_permissions)
                .delete(handlers::policy::remove_permissions),
        )
        .route("/policy/permission", post(handlers::policy::create_permission))
        .route(
            "/policy/permission/:id",
            put(handlers::policy::update_permission).delete(handlers::policy::delete_permission),
        )
        .route(
            "/policy/permission/:id/resources",
            post(handlers::policy::assign_resources).delete(handlers::policy::remove_resources),
        )
        .route("/policy/resource", post(handlers::policy::create_resource))
        .route(
            "/policy/resource/:id",
            put(handlers::policy::update_resource).delete(handlers::policy::delete_resource),
        )
        .route(
            "/policy/users/:id/roles",
            post(handlers::policy::assign_user_role),
        )
        .route(
            "/policy/users/:id/roles/:role_id",
            delete(handlers::policy::revoke_user_role),
        )
        .route(
            "/policy/users/:id/permissions",
            get(handlers::policy::user_permissions),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::access_middleware,
        ));

    let timeout = Duration::from_secs(state.config.security.request_timeout_seconds);
    let cors = cors_layer(&state.config.security.allowed_origins);

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout))
        .merge(protected)
        .with_state(state)
        .layer(TimeoutLayer::new(timeout))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Service health check
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.credentials.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Database health check failed");
        AppError::from(e)
    })?;

    state.attempts.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Redis health check failed");
        AppError::from(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "database": "up",
            "redis": "up"
        }
    })))
}
