//! Failed-login counter persisted per user in the attempt store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginAttempt {
    pub attempt: u32,
    pub block_time: DateTime<Utc>,
    pub refresh_time: DateTime<Utc>,
}

impl LoginAttempt {
    /// Cleared counter; storing it with a zero TTL removes the record.
    pub fn cleared(now: DateTime<Utc>) -> Self {
        Self {
            attempt: 0,
            block_time: now,
            refresh_time: now,
        }
    }

    /// Seconds until the record should expire; zero or less means delete.
    pub fn ttl_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.refresh_time - now).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn ttl_tracks_refresh_time() {
        let now = Utc::now();
        let record = LoginAttempt {
            attempt: 3,
            block_time: now + Duration::minutes(1),
            refresh_time: now + Duration::minutes(16),
        };
        assert_eq!(record.ttl_seconds(now), 16 * 60);
        assert_eq!(LoginAttempt::cleared(now).ttl_seconds(now), 0);
    }

    #[test]
    fn serialized_field_names() {
        let now = Utc::now();
        let json = serde_json::to_value(LoginAttempt::cleared(now)).unwrap();
        assert!(json.get("attempt").is_some());
        assert!(json.get("block_time").is_some());
        assert!(json.get("refresh_time").is_some());
    }
}
