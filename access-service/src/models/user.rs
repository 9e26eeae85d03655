//! User model - credential holders that can log in and be granted roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Account status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Blocked,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Blocked => "blocked",
        }
    }
}

/// User entity.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: i64,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub password_hash: String,
    pub avatar_url: Option<String>,
    pub phone_verified: bool,
    pub email_verified: bool,
    pub status_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Any status code other than `active` is treated as blocked.
    pub fn is_blocked(&self) -> bool {
        self.status_code != UserStatus::Active.as_str()
    }

    /// Convert to the sanitized profile (no credential material).
    pub fn profile(&self) -> UserProfile {
        UserProfile::from(self.clone())
    }
}

/// Fields needed to insert a user; ids and timestamps come from the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub password_hash: String,
    pub phone_verified: bool,
}

/// User profile returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub user_id: i64,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub phone_verified: bool,
    pub email_verified: bool,
    pub status_code: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(u: User) -> Self {
        Self {
            user_id: u.user_id,
            name: u.name,
            phone: u.phone,
            email: u.email,
            avatar_url: u.avatar_url,
            phone_verified: u.phone_verified,
            email_verified: u.email_verified,
            status_code: u.status_code,
            created_at: u.created_at,
        }
    }
}

/// How a login identity is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity<'a> {
    Email(&'a str),
    Phone(&'a str),
}

impl<'a> Identity<'a> {
    /// Anything containing `@` is an email address, everything else a phone number.
    pub fn parse(raw: &'a str) -> Self {
        let raw = raw.trim();
        if raw.contains('@') {
            Identity::Email(raw)
        } else {
            Identity::Phone(raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(status: &str) -> User {
        User {
            user_id: 1,
            name: "Jane".to_string(),
            phone: "+15550100".to_string(),
            email: "jane@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            avatar_url: None,
            phone_verified: true,
            email_verified: false,
            status_code: status.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn identity_routing() {
        assert_eq!(
            Identity::parse("jane@example.com"),
            Identity::Email("jane@example.com")
        );
        assert_eq!(Identity::parse(" +15550100 "), Identity::Phone("+15550100"));
    }

    #[test]
    fn unknown_status_counts_as_blocked() {
        assert!(!user("active").is_blocked());
        assert!(user("blocked").is_blocked());
        assert!(user("suspended").is_blocked());
    }

    #[test]
    fn profile_drops_password_hash() {
        let json = serde_json::to_string(&user("active").profile()).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("jane@example.com"));
    }
}
