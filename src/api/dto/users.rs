//! DTOs for the current user and the users API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::entities::User;

/// A user as returned by the API. The Gmail token never leaves the server.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
    pub gmail_connected: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            avatar_url: u.avatar_url,
            is_admin: u.is_admin,
            gmail_connected: u.gmail_connected,
            created_at: u.created_at,
        }
    }
}

/// `PATCH /api/users/{id}` body. Absent fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,

    #[validate(url(message = "Avatar must be a valid URL"))]
    pub avatar_url: Option<String>,
}

/// `code` / `state` returned by Google's consent screen.
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_user_validation() {
        let ok = UpdateUserRequest {
            name: Some("Ada".into()),
            avatar_url: Some("https://example.com/a.png".into()),
        };
        assert!(ok.validate().is_ok());

        let bad = UpdateUserRequest {
            name: Some(String::new()),
            avatar_url: Some("not a url".into()),
        };
        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(errors.field_errors().contains_key("avatar_url"));
    }
}
