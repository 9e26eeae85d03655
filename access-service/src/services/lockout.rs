//! Escalating login lockout.
//!
//! Every login consults the stored failure count before the password is
//! checked. A count of 2..=7 blocks the login for a growing interval and
//! bumps the count, so hammering a locked account extends the lock; past the
//! end of the table the account itself is blocked.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::error::ServiceError;
use super::store::{CredentialStore, LoginAttemptStore};
use crate::models::{LoginAttempt, User, UserStatus};

/// Extra lifetime of an attempt record per failure, counting the failure
/// being stored.
const COUNTER_GRACE_MINUTES: i64 = 5;

/// Block interval for a stored failure count, or `None` once the count is
/// past the table and the account must be blocked outright.
pub fn block_duration(attempt: u32) -> Option<Duration> {
    match attempt {
        0 | 1 => Some(Duration::zero()),
        2 => Some(Duration::seconds(30)),
        3 => Some(Duration::minutes(1)),
        4 => Some(Duration::minutes(15)),
        5 => Some(Duration::hours(1)),
        6 => Some(Duration::hours(6)),
        7 => Some(Duration::hours(24)),
        _ => None,
    }
}

fn grace(attempt: u32) -> Duration {
    Duration::minutes(COUNTER_GRACE_MINUTES * i64::from(attempt))
}

#[derive(Clone)]
pub struct LockoutService {
    attempts: Arc<dyn LoginAttemptStore>,
    users: Arc<dyn CredentialStore>,
    guards: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl LockoutService {
    pub fn new(attempts: Arc<dyn LoginAttemptStore>, users: Arc<dyn CredentialStore>) -> Self {
        Self {
            attempts,
            users,
            guards: Arc::new(DashMap::new()),
        }
    }

    /// Serialize check/record/reset for one user so concurrent logins cannot
    /// both read the same count.
    pub async fn acquire(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let mutex = self
            .guards
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Drop the per-user mutex once nobody else holds or waits on it.
    pub fn release(&self, user_id: i64, guard: OwnedMutexGuard<()>) {
        drop(guard);
        self.guards
            .remove_if(&user_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    /// Returns the stored failure count when the login may proceed.
    pub async fn check_attempt(&self, user: &User) -> Result<u32, ServiceError> {
        let Some(record) = self.attempts.get_login_attempt(user.user_id).await? else {
            return Ok(0);
        };
        if record.attempt == 0 {
            return Ok(0);
        }

        let Some(delta) = block_duration(record.attempt) else {
            return Err(self.block_account(user).await);
        };

        let now = Utc::now();
        let block_time = now + delta;
        let attempt = record.attempt + 1;
        let next = LoginAttempt {
            attempt,
            block_time,
            refresh_time: block_time + grace(attempt),
        };
        self.store(user.user_id, &next, now).await?;

        if block_time > now {
            tracing::warn!(
                user_id = user.user_id,
                attempt,
                until = %block_time,
                "Login rejected while account is locked"
            );
            return Err(ServiceError::LoginLocked { until: block_time });
        }

        Ok(record.attempt)
    }

    /// Persist one more failure on top of the count returned by `check_attempt`.
    pub async fn record_failure(&self, user: &User, prior: u32) -> Result<(), ServiceError> {
        let Some(delta) = block_duration(prior) else {
            return Err(self.block_account(user).await);
        };

        let now = Utc::now();
        let attempt = prior + 1;
        let next = LoginAttempt {
            attempt,
            block_time: now + delta,
            refresh_time: now + delta + grace(attempt),
        };
        self.store(user.user_id, &next, now).await?;

        tracing::info!(user_id = user.user_id, attempt, "Recorded failed login");
        Ok(())
    }

    pub async fn reset(&self, user_id: i64) -> Result<(), ServiceError> {
        let now = Utc::now();
        self.store(user_id, &LoginAttempt::cleared(now), now).await
    }

    async fn store(
        &self,
        user_id: i64,
        record: &LoginAttempt,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.attempts
            .set_login_attempt(user_id, record, record.ttl_seconds(now))
            .await
    }

    async fn block_account(&self, user: &User) -> ServiceError {
        if let Err(e) = self
            .users
            .update_user_status(user.user_id, UserStatus::Blocked)
            .await
        {
            tracing::error!(user_id = user.user_id, error = %e, "Failed to block account");
            return e;
        }
        tracing::warn!(user_id = user.user_id, "Account blocked after repeated failed logins");
        ServiceError::MaxAttemptsReached {
            user_id: user.user_id,
        }
    }
}
