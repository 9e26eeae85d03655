use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};

use super::error::ServiceError;
use super::store::LoginAttemptStore;
use crate::models::LoginAttempt;

fn attempt_key(user_id: i64) -> String {
    format!("login_attempt:{}", user_id)
}

/// Redis-backed login attempt counters, stored as JSON with a TTL.
#[derive(Clone)]
pub struct RedisService {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisService {
    pub async fn new(config: &crate::config::RedisConfig) -> Result<Self, anyhow::Error> {
        tracing::info!("Connecting to Redis");
        let client = Client::open(config.url.clone())?;

        // ConnectionManager reconnects on its own
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
        })
    }
}

#[async_trait]
impl LoginAttemptStore for RedisService {
    async fn health_check(&self) -> Result<(), ServiceError> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| {
                tracing::error!("Redis health check failed: {}", e);
                ServiceError::Redis(e)
            })
    }

    async fn get_login_attempt(&self, user_id: i64) -> Result<Option<LoginAttempt>, ServiceError> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(attempt_key(user_id))
            .query_async(&mut conn)
            .await?;

        raw.map(|json| {
            serde_json::from_str(&json).map_err(|e| {
                ServiceError::Internal(anyhow::anyhow!(
                    "Corrupt login attempt record for user {}: {}",
                    user_id,
                    e
                ))
            })
        })
        .transpose()
    }

    async fn set_login_attempt(
        &self,
        user_id: i64,
        attempt: &LoginAttempt,
        ttl_seconds: i64,
    ) -> Result<(), ServiceError> {
        let mut conn = self.manager.clone();
        let key = attempt_key(user_id);

        if ttl_seconds <= 0 {
            redis::cmd("DEL")
                .arg(&key)
                .query_async::<_, ()>(&mut conn)
                .await?;
            return Ok(());
        }

        let json = serde_json::to_string(attempt)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!(e)))?;
        redis::cmd("SET")
            .arg(&key)
            .arg(json)
            .arg("EX")
            .arg(ttl_seconds)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        assert_eq!(attempt_key(42), "login_attempt:42");
    }
}
