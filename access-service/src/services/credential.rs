use super::error::ServiceError;
use super::lockout::LockoutService;
use crate::models::User;
use crate::utils::{verify_password, Password, PasswordHashString};

/// Password verification gated by the lockout counter.
#[derive(Clone)]
pub struct CredentialValidator {
    lockout: LockoutService,
}

impl CredentialValidator {
    pub fn new(lockout: LockoutService) -> Self {
        Self { lockout }
    }

    /// The whole check, verify, record-or-reset sequence runs under the
    /// user's lockout mutex.
    pub async fn validate_password(
        &self,
        user: &User,
        password: &Password,
    ) -> Result<(), ServiceError> {
        let guard = self.lockout.acquire(user.user_id).await;
        let result = self.validate_locked(user, password).await;
        self.lockout.release(user.user_id, guard);
        result
    }

    async fn validate_locked(&self, user: &User, password: &Password) -> Result<(), ServiceError> {
        let prior = self.lockout.check_attempt(user).await?;

        let hash = PasswordHashString::new(user.password_hash.as_str());
        if !verify_password(password, &hash)? {
            self.lockout.record_failure(user, prior).await?;
            tracing::info!(user_id = user.user_id, "Password mismatch");
            return Err(ServiceError::IncorrectPassword);
        }

        self.lockout.reset(user.user_id).await
    }
}
