//! Login sessions, keyed by the `jti` shared by an access/refresh token pair.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Session {
    pub token_id: String,
    pub user_id: i64,
    pub user_agent: String,
    pub ip: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token_id: String, user_id: i64, client: &ClientInfo) -> Self {
        let now = Utc::now();
        Self {
            token_id,
            user_id,
            user_agent: client.user_agent.clone(),
            ip: client.ip.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Refresh is only honored from the client that created the session.
    pub fn matches_client(&self, client: &ClientInfo) -> bool {
        self.ip == client.ip && self.user_agent == client.user_agent
    }
}

/// Network identity of the caller performing a login or refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: String,
}

impl ClientInfo {
    pub fn new(ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            user_agent: user_agent.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_match_requires_ip_and_agent() {
        let origin = ClientInfo::new("10.0.0.1", "curl/8.0");
        let session = Session::new("jti-1".to_string(), 7, &origin);

        assert!(session.matches_client(&origin));
        assert!(!session.matches_client(&ClientInfo::new("10.0.0.2", "curl/8.0")));
        assert!(!session.matches_client(&ClientInfo::new("10.0.0.1", "Mozilla/5.0")));
    }
}
