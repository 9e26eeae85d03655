//! Per-request access decision: token, session, account state, then policy.

use std::fmt;
use std::sync::Arc;

use super::enforcer::PolicyEngine;
use super::error::ServiceError;
use super::jwt::{strip_bearer, JwtService, TokenKind};
use super::store::{CredentialStore, SessionStore};
use crate::models::{ServiceType, User};

/// `METHOD|PATH` identifier of a protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementId {
    pub method: String,
    pub path: String,
}

impl ElementId {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        match raw.split_once('|') {
            Some((method, path)) if !method.is_empty() && !path.is_empty() => {
                Ok(Self::new(method, path))
            }
            _ => Err(ServiceError::InvalidElementId(raw.to_string())),
        }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.method, self.path)
    }
}

/// Blocked accounts and accounts without a verified phone cannot act.
pub fn validate_user_state(user: &User) -> Result<(), ServiceError> {
    if user.is_blocked() {
        return Err(ServiceError::AccountBlocked);
    }
    if !user.phone_verified {
        return Err(ServiceError::AccountNotVerified);
    }
    Ok(())
}

#[derive(Clone)]
pub struct AccessGate {
    jwt: JwtService,
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn CredentialStore>,
    engine: Arc<PolicyEngine>,
    service_type: ServiceType,
}

impl AccessGate {
    pub fn new(
        jwt: JwtService,
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn CredentialStore>,
        engine: Arc<PolicyEngine>,
        service_type: ServiceType,
    ) -> Self {
        Self {
            jwt,
            sessions,
            users,
            engine,
            service_type,
        }
    }

    /// Returns the caller's user id when `bearer` may perform `element_id`.
    #[tracing::instrument(skip(self, bearer))]
    pub async fn authorize(&self, bearer: &str, element_id: &str) -> Result<i64, ServiceError> {
        let claims = self
            .jwt
            .verify_token_kind(strip_bearer(bearer), TokenKind::Access)?;
        let user_id = claims.user_id()?;

        let session = self
            .sessions
            .find_session_by_id(&claims.jti)
            .await?
            .ok_or(ServiceError::SessionNotFound)?;
        if session.user_id != user_id {
            tracing::warn!(
                session_id = %claims.jti,
                token_user = user_id,
                session_user = session.user_id,
                "Token subject does not own its session"
            );
            return Err(ServiceError::SessionNotFound);
        }

        let user = self
            .users
            .find_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::SessionUserNotFound { user_id })?;
        validate_user_state(&user)?;

        let element = ElementId::parse(element_id)?;
        let action = format!("{}:{}", self.service_type, element.method);
        if !self.engine.enforce(&claims.role, &action, &element.path)? {
            tracing::info!(user_id, role = %claims.role, element_id, "Access denied");
            return Err(ServiceError::AccessDenied {
                user_id,
                element_id: element_id.to_string(),
            });
        }

        Ok(user_id)
    }
}
