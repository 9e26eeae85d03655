use chrono::Utc;
use std::sync::Arc;
use validator::Validate;

use super::access::validate_user_state;
use super::credential::CredentialValidator;
use super::error::ServiceError;
use super::jwt::{strip_bearer, JwtService, TokenKind, TokenPair};
use super::store::{CredentialStore, PolicyStore, SessionStore};
use crate::config::RegistrationConfig;
use crate::dtos::auth::{LoginRequest, LoginResponse, RefreshRequest, RegisterRequest};
use crate::models::{ClientInfo, Identity, NewUser, Session, User, UserProfile};
use crate::utils::{hash_password, Password};

/// Login, logout, refresh and registration.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionStore>,
    policies: Arc<dyn PolicyStore>,
    jwt: JwtService,
    credentials: CredentialValidator,
    registration: RegistrationConfig,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
        policies: Arc<dyn PolicyStore>,
        jwt: JwtService,
        credentials: CredentialValidator,
        registration: RegistrationConfig,
    ) -> Self {
        Self {
            users,
            sessions,
            policies,
            jwt,
            credentials,
            registration,
        }
    }

    pub async fn login(
        &self,
        req: LoginRequest,
        client: &ClientInfo,
    ) -> Result<LoginResponse, ServiceError> {
        let user = self
            .find_by_identity(&req.identity)
            .await?
            .ok_or(ServiceError::AccountNotFound)?;

        validate_user_state(&user)?;

        self.credentials
            .validate_password(&user, &Password::new(req.password))
            .await?;

        let role = self.resolve_role(user.user_id).await?;
        let pair = self.jwt.issue_token_pair(user.user_id, &role)?;

        let session = Session::new(pair.session_id.clone(), user.user_id, client);
        self.sessions.create_session(&session).await?;

        tracing::info!(
            user_id = user.user_id,
            session_id = %pair.session_id,
            role = %role,
            "User logged in"
        );

        Ok(self.login_response(pair, &user))
    }

    /// Deletes the session named by the token. Expired tokens are accepted and
    /// a session that is already gone is not an error.
    pub async fn logout(&self, bearer: &str) -> Result<(), ServiceError> {
        let session_id = self.jwt.decode_session_id(strip_bearer(bearer))?;
        self.sessions.delete_session(&session_id).await?;

        tracing::info!(session_id = %session_id, "Session ended");
        Ok(())
    }

    /// New token pair for the same session, only from the originating client.
    pub async fn refresh(
        &self,
        req: RefreshRequest,
        client: &ClientInfo,
    ) -> Result<LoginResponse, ServiceError> {
        let claims = self
            .jwt
            .verify_token_kind(strip_bearer(&req.refresh_token), TokenKind::Refresh)?;
        let user_id = claims.user_id()?;

        let session = self
            .sessions
            .find_session_by_id(&claims.jti)
            .await?
            .ok_or(ServiceError::SessionNotFound)?;

        if session.user_id != user_id {
            return Err(ServiceError::SessionNotFound);
        }

        if !session.matches_client(client) {
            tracing::warn!(
                user_id,
                session_id = %session.token_id,
                session_ip = %session.ip,
                request_ip = %client.ip,
                "Refresh attempted from a different client"
            );
            return Err(ServiceError::SessionMismatch {
                session_id: session.token_id,
            });
        }

        let user = self
            .users
            .find_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::SessionUserNotFound { user_id })?;
        validate_user_state(&user)?;

        let role = self.resolve_role(user_id).await?;
        let pair = self
            .jwt
            .issue_for_session(&session.token_id, user_id, &role)?;
        self.sessions
            .touch_session(&session.token_id, Utc::now())
            .await?;

        tracing::info!(user_id, session_id = %session.token_id, "Session refreshed");

        Ok(self.login_response(pair, &user))
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<UserProfile, ServiceError> {
        req.validate()?;

        let email = req.email.trim().to_lowercase();
        let phone = req.phone.trim().to_string();

        // Check if the identity is already taken
        if self.users.find_user_by_email(&email).await?.is_some()
            || self.users.find_user_by_phone(&phone).await?.is_some()
        {
            return Err(ServiceError::DuplicateRegistration);
        }

        let password_hash = hash_password(&Password::new(req.password)).map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e))
        })?;

        let user = self
            .users
            .create_user(&NewUser {
                name: req.name.trim().to_string(),
                phone,
                email,
                password_hash: password_hash.into_string(),
                phone_verified: !self.registration.verify_on_register,
            })
            .await?;

        match self
            .policies
            .find_role_by_name(&self.registration.default_role)
            .await?
        {
            Some(role) => self.policies.assign_role(user.user_id, role.role_id).await?,
            None => tracing::warn!(
                role = %self.registration.default_role,
                user_id = user.user_id,
                "Default role does not exist; user registered without a role"
            ),
        }

        tracing::info!(user_id = user.user_id, "User registered");
        Ok(user.profile())
    }

    async fn find_by_identity(&self, raw: &str) -> Result<Option<User>, ServiceError> {
        match Identity::parse(raw) {
            Identity::Email(email) => self.users.find_user_by_email(&email.to_lowercase()).await,
            Identity::Phone(phone) => self.users.find_user_by_phone(phone).await,
        }
    }

    /// The role embedded in tokens: the user's earliest granted role.
    async fn resolve_role(&self, user_id: i64) -> Result<String, ServiceError> {
        self.policies
            .get_roles_by_user_id(user_id)
            .await?
            .into_iter()
            .next()
            .map(|role| role.name)
            .ok_or(ServiceError::RoleNotAssigned { user_id })
    }

    fn login_response(&self, pair: TokenPair, user: &User) -> LoginResponse {
        LoginResponse {
            token_type: "Bearer".to_string(),
            session_id: pair.session_id,
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: self.jwt.access_token_expiry_seconds(),
            user: user.profile(),
        }
    }
}
