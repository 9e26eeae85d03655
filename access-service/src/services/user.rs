use std::sync::Arc;

use super::error::ServiceError;
use super::store::CredentialStore;
use crate::models::UserProfile;

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn CredentialStore>,
}

impl UserService {
    pub fn new(users: Arc<dyn CredentialStore>) -> Self {
        Self { users }
    }

    pub async fn get_user_by_id(&self, user_id: i64) -> Result<UserProfile, ServiceError> {
        self.users
            .find_user_by_id(user_id)
            .await?
            .map(|user| user.profile())
            .ok_or(ServiceError::UserNotFound { user_id })
    }
}
