//! User entity and profile updates.

use chrono::{DateTime, Utc};

/// An account signed in through Google.
///
/// `gmail_refresh_token` holds ciphertext produced by
/// [`crate::utils::crypto::TokenCipher`]; it is never returned over the API.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub google_id: Option<String>,
    pub avatar_url: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
    pub gmail_connected: bool,
    pub gmail_refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the user may see records owned by `owner_id`.
    pub fn can_access(&self, owner_id: i64) -> bool {
        self.is_admin || self.id == owner_id
    }
}

/// Input data for creating a user on first sign-in.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub google_id: Option<String>,
    pub avatar_url: Option<String>,
}

/// Partial profile update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub google_id: Option<String>,
}

#[cfg(test)]
pub(crate) fn test_user(id: i64) -> User {
    User {
        id,
        email: format!("user{id}@example.com"),
        name: format!("User {id}"),
        google_id: Some(format!("g-{id}")),
        avatar_url: None,
        is_active: true,
        is_admin: false,
        gmail_connected: false,
        gmail_refresh_token: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
