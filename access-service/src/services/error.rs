use chrono::{DateTime, Utc};
use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Session not found")]
    SessionNotFound,

    #[error("Session {session_id} used from a different client")]
    SessionMismatch { session_id: String },

    #[error("Account not found")]
    AccountNotFound,

    #[error("User {user_id} not found")]
    UserNotFound { user_id: i64 },

    #[error("Session owner {user_id} no longer exists")]
    SessionUserNotFound { user_id: i64 },

    #[error("Password is incorrect")]
    IncorrectPassword,

    #[error("Login locked until {until}")]
    LoginLocked { until: DateTime<Utc> },

    #[error("Max login attempts reached for user {user_id}")]
    MaxAttemptsReached { user_id: i64 },

    #[error("Account is blocked")]
    AccountBlocked,

    #[error("Account is not verified")]
    AccountNotVerified,

    #[error("No role assigned to user {user_id}")]
    RoleNotAssigned { user_id: i64 },

    #[error("User {user_id} is not authorized to access {element_id}")]
    AccessDenied { user_id: i64, element_id: String },

    #[error("Identity already registered")]
    DuplicateRegistration,

    #[error("Invalid element id: {0}")]
    InvalidElementId(String),

    #[error("Invalid policy rule: {0}")]
    InvalidPolicy(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Database(_)
            | ServiceError::Redis(_)
            | ServiceError::Internal(_)
            | ServiceError::InvalidElementId(_)
            | ServiceError::InvalidPolicy(_) => "INTERNAL_ERROR",
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::InvalidToken(_) => "INVALID_TOKEN",
            ServiceError::SessionNotFound | ServiceError::SessionUserNotFound { .. } => {
                "SESSION_NOT_FOUND"
            }
            ServiceError::SessionMismatch { .. } => "SESSION_MISMATCH",
            ServiceError::AccountNotFound => "ACCOUNT_NOT_FOUND",
            ServiceError::UserNotFound { .. } => "USER_NOT_FOUND",
            ServiceError::IncorrectPassword => "INCORRECT_PASSWORD",
            ServiceError::LoginLocked { .. } => "LOGIN_LOCKED",
            ServiceError::MaxAttemptsReached { .. } => "MAX_ATTEMPT_REACHED",
            ServiceError::AccountBlocked => "ACCOUNT_BLOCKED",
            ServiceError::AccountNotVerified => "NOT_VERIFIED",
            ServiceError::RoleNotAssigned { .. } => "ROLE_NOT_ASSIGNED",
            ServiceError::AccessDenied { .. } => "ACCESS_DENIED",
            ServiceError::DuplicateRegistration => "DUPLICATE_REGISTRATION",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::InvalidReference(_) => "INVALID_REFERENCE",
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let code = err.code();
        let detail = err.to_string();
        match err {
            ServiceError::Database(e) => AppError::InternalError(anyhow::Error::new(e)),
            ServiceError::Redis(e) => AppError::InternalError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::Validation(e) => AppError::ValidationError(e),
            ServiceError::InvalidElementId(_) | ServiceError::InvalidPolicy(_) => {
                AppError::InternalError(anyhow::anyhow!(detail))
            }
            ServiceError::InvalidToken(_) => AppError::unauthorized(code, "Unauthorized"),
            ServiceError::SessionMismatch { .. } => {
                AppError::unauthorized(code, "Session is no longer valid, please login again")
            }
            ServiceError::AccessDenied { element_id, .. } => {
                AppError::unauthorized(code, format!("Not authorized to access {}", element_id))
            }
            ServiceError::SessionNotFound | ServiceError::SessionUserNotFound { .. } => {
                AppError::forbidden(code, "Session not found, please login again")
            }
            ServiceError::MaxAttemptsReached { .. } => {
                AppError::forbidden(code, "Max attempt reached, we have blocked your account")
            }
            ServiceError::AccountBlocked => AppError::forbidden(
                code,
                "Your account is blocked, please contact the administrator",
            ),
            ServiceError::AccountNotVerified => {
                AppError::forbidden(code, "Please verify your account first")
            }
            ServiceError::RoleNotAssigned { .. } => {
                AppError::forbidden(code, "No role has been assigned to your account")
            }
            ServiceError::AccountNotFound => {
                AppError::bad_request(code, "Cannot find your account")
            }
            ServiceError::UserNotFound { .. } => AppError::bad_request(code, "User not found"),
            ServiceError::IncorrectPassword => {
                AppError::bad_request(code, "Password is incorrect")
            }
            ServiceError::LoginLocked { until } => AppError::bad_request(
                code,
                format!(
                    "Too many login attempts, your account is locked until {}",
                    until.format("%Y-%m-%d %H:%M:%S UTC")
                ),
            ),
            ServiceError::DuplicateRegistration => {
                AppError::bad_request(code, "Email or phone is already registered")
            }
            ServiceError::NotFound(entity) => {
                AppError::bad_request(code, format!("{} not found", entity))
            }
            ServiceError::InvalidReference(reason) => AppError::bad_request(code, reason),
        }
    }
}
