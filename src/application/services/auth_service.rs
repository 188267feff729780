//! Google sign-in, Gmail consent and session authentication.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use crate::domain::entities::{NewUser, User, UserPatch};
use crate::domain::providers::{OAuthProfile, OAuthProvider};
use crate::domain::repositories::{Session, SessionRepository, UserRepository};
use crate::error::AppError;
use crate::utils::crypto::{
    OAuthState, StatePurpose, TokenCipher, generate_token, hash_token, nonce_matches, sign_state,
    verify_state,
};

pub const LOGIN_SCOPES: &[&str] = &["openid", "email", "profile"];
pub const GMAIL_SCOPES: &[&str] = &["https://www.googleapis.com/auth/gmail.readonly"];

const STATE_TTL_SECONDS: i64 = 600;
const WEB_SESSION_DAYS: i64 = 30;
const WEB_SESSION_NAME: &str = "web";

/// A consent-screen URL plus the state nonce the browser must present on
/// the callback.
#[derive(Debug, Clone)]
pub struct ConsentRedirect {
    pub url: String,
    pub nonce: String,
}

/// Service for OAuth flows and bearer/cookie session tokens.
///
/// Session tokens are hashed with HMAC-SHA256 (keyed by `signing_secret`)
/// before storage and comparison. The same secret signs OAuth `state` values.
pub struct AuthService<U: UserRepository, S: SessionRepository> {
    users: Arc<U>,
    sessions: Arc<S>,
    oauth: Arc<dyn OAuthProvider>,
    signing_secret: String,
    cipher: TokenCipher,
    public_base_url: String,
}

impl<U: UserRepository, S: SessionRepository> AuthService<U, S> {
    /// Creates a new authentication service.
    ///
    /// # Arguments
    ///
    /// - `signing_secret` - HMAC key; must match the value used when tokens were created
    /// - `cipher` - encrypts Gmail refresh tokens before they are stored
    /// - `public_base_url` - base of the OAuth callback URLs
    pub fn new(
        users: Arc<U>,
        sessions: Arc<S>,
        oauth: Arc<dyn OAuthProvider>,
        signing_secret: String,
        cipher: TokenCipher,
        public_base_url: &str,
    ) -> Self {
        Self {
            users,
            sessions,
            oauth,
            signing_secret,
            cipher,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn login_redirect_uri(&self) -> String {
        format!("{}/api/auth/google/callback", self.public_base_url)
    }

    fn gmail_redirect_uri(&self) -> String {
        format!("{}/api/auth/gmail/callback", self.public_base_url)
    }

    fn new_state(&self, purpose: StatePurpose, user_id: Option<i64>) -> (String, String) {
        let expires_at = Utc::now().timestamp() + STATE_TTL_SECONDS;
        let state = OAuthState::new(purpose, user_id, expires_at);
        (sign_state(&self.signing_secret, &state), state.nonce)
    }

    /// Checks signature, expiry and flow of `state`, and that the browser
    /// completing the flow is the one that started it.
    fn check_state(
        &self,
        state: &str,
        purpose: StatePurpose,
        browser_nonce: Option<&str>,
    ) -> Result<OAuthState, AppError> {
        let parsed = verify_state(&self.signing_secret, state, Utc::now().timestamp()).map_err(
            |e| AppError::bad_request("Invalid OAuth state", json!({ "reason": e.to_string() })),
        )?;

        if parsed.purpose != purpose {
            return Err(AppError::bad_request(
                "Invalid OAuth state",
                json!({ "reason": "state was issued for another flow" }),
            ));
        }

        let bound = browser_nonce
            .is_some_and(|nonce| nonce_matches(&self.signing_secret, &parsed.nonce, nonce));
        if !bound {
            return Err(AppError::bad_request(
                "Invalid OAuth state",
                json!({ "reason": "state does not belong to this browser" }),
            ));
        }

        Ok(parsed)
    }

    /// Consent-screen redirect for signing in.
    pub fn login_url(&self) -> ConsentRedirect {
        let (state, nonce) = self.new_state(StatePurpose::Login, None);
        let url = self
            .oauth
            .authorize_url(LOGIN_SCOPES, &self.login_redirect_uri(), &state, true);
        ConsentRedirect { url, nonce }
    }

    /// Consent-screen redirect granting read access to the user's Gmail.
    pub fn gmail_connect_url(&self, user: &User) -> ConsentRedirect {
        let (state, nonce) = self.new_state(StatePurpose::Gmail, Some(user.id));
        let url = self
            .oauth
            .authorize_url(GMAIL_SCOPES, &self.gmail_redirect_uri(), &state, true);
        ConsentRedirect { url, nonce }
    }

    /// Finishes Google sign-in: verifies `state` against the nonce from the
    /// browser's `oauth_state` cookie, exchanges `code`, upserts the user and
    /// opens a web session.
    ///
    /// Returns the user and the raw session token for the cookie.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for an invalid or expired state, or
    /// one not started by this browser,
    /// [`AppError::Upstream`] if Google rejects the code,
    /// [`AppError::Forbidden`] for deactivated accounts.
    pub async fn complete_login(
        &self,
        code: &str,
        state: &str,
        browser_nonce: Option<&str>,
    ) -> Result<(User, String), AppError> {
        self.check_state(state, StatePurpose::Login, browser_nonce)?;

        let tokens = self
            .oauth
            .exchange_code(code, &self.login_redirect_uri())
            .await
            .map_err(|e| AppError::from_provider("Google code exchange failed", &e))?;

        let profile = self
            .oauth
            .fetch_profile(&tokens.access_token)
            .await
            .map_err(|e| AppError::from_provider("Failed to load Google profile", &e))?;

        let user = self.upsert_user(profile).await?;
        if !user.is_active {
            return Err(AppError::forbidden(
                "Account is disabled",
                json!({ "user_id": user.id }),
            ));
        }

        let expires_at = Utc::now() + Duration::days(WEB_SESSION_DAYS);
        let (_, token) = self
            .issue_token(user.id, WEB_SESSION_NAME, Some(expires_at))
            .await?;

        tracing::info!(user_id = user.id, "User signed in");
        Ok((user, token))
    }

    /// Matches the Google profile to an account by email, then by Google id,
    /// creating one when neither exists.
    async fn upsert_user(&self, profile: OAuthProfile) -> Result<User, AppError> {
        let existing = match self.users.find_by_email(&profile.email).await? {
            Some(user) => Some(user),
            None => self.users.find_by_google_id(&profile.subject).await?,
        };

        match existing {
            Some(user) => {
                let patch = UserPatch {
                    name: (!profile.name.is_empty()).then_some(profile.name),
                    avatar_url: profile.picture,
                    google_id: user.google_id.is_none().then_some(profile.subject),
                };
                self.users.update(user.id, patch).await
            }
            None => {
                self.users
                    .create(NewUser {
                        email: profile.email,
                        name: profile.name,
                        google_id: Some(profile.subject),
                        avatar_url: profile.picture,
                    })
                    .await
            }
        }
    }

    /// Finishes the Gmail consent flow and stores the encrypted refresh token.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for an invalid state, a state issued
    /// to another user, or when Google returns no refresh token.
    pub async fn complete_gmail_connect(
        &self,
        user: &User,
        code: &str,
        state: &str,
        browser_nonce: Option<&str>,
    ) -> Result<User, AppError> {
        let parsed = self.check_state(state, StatePurpose::Gmail, browser_nonce)?;
        if parsed.user_id != Some(user.id) {
            return Err(AppError::bad_request(
                "Invalid OAuth state",
                json!({ "reason": "state was issued to another user" }),
            ));
        }

        let tokens = self
            .oauth
            .exchange_code(code, &self.gmail_redirect_uri())
            .await
            .map_err(|e| AppError::from_provider("Google code exchange failed", &e))?;

        let refresh_token = tokens.refresh_token.ok_or_else(|| {
            AppError::bad_request(
                "Google did not return a refresh token",
                json!({ "hint": "revoke the app's access in your Google account and retry" }),
            )
        })?;

        let encrypted = self.cipher.encrypt(&refresh_token).map_err(|e| {
            AppError::internal("Failed to encrypt token", json!({ "reason": e.to_string() }))
        })?;
        self.users.set_gmail_token(user.id, Some(encrypted)).await?;

        tracing::info!(user_id = user.id, "Gmail connected");
        self.users
            .find_by_id(user.id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found", json!({ "user_id": user.id })))
    }

    /// Resolves a raw session token to its active user.
    ///
    /// On success, updates the session's `last_used_at`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthorized`] if the token is unknown, revoked or
    /// expired, or its user is inactive.
    pub async fn authenticate(&self, token: &str) -> Result<User, AppError> {
        let token_hash = hash_token(&self.signing_secret, token);

        let session = self
            .sessions
            .find_active(&token_hash)
            .await?
            .ok_or_else(|| {
                AppError::unauthorized(
                    "Unauthorized",
                    json!({ "reason": "Invalid, expired or revoked token" }),
                )
            })?;

        let user = self
            .users
            .find_by_id(session.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| {
                AppError::unauthorized("Unauthorized", json!({ "reason": "Account is disabled" }))
            })?;

        let _ = self.sessions.update_last_used(&token_hash).await;

        Ok(user)
    }

    /// Revokes the session behind a raw token.
    pub async fn logout(&self, token: &str) -> Result<(), AppError> {
        let token_hash = hash_token(&self.signing_secret, token);
        self.sessions.revoke_by_hash(&token_hash).await?;
        Ok(())
    }

    /// Creates a session for `user_id` and returns it with the raw token.
    ///
    /// The raw token is never stored and cannot be recovered later.
    pub async fn issue_token(
        &self,
        user_id: i64,
        name: &str,
        expires_at: Option<chrono::DateTime<Utc>>,
    ) -> Result<(Session, String), AppError> {
        let token = generate_token();
        let token_hash = hash_token(&self.signing_secret, &token);
        let session = self
            .sessions
            .create(user_id, name, &token_hash, expires_at)
            .await?;
        Ok((session, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::user::test_user;
    use crate::domain::providers::{MockOAuthProvider, OAuthTokens};
    use crate::domain::repositories::{MockSessionRepository, MockUserRepository};

    const SECRET: &str = "test-signing-secret";
    const KEY: &str = "0123456789abcdef0123456789abcdef";

    fn service(
        users: MockUserRepository,
        sessions: MockSessionRepository,
        oauth: MockOAuthProvider,
    ) -> AuthService<MockUserRepository, MockSessionRepository> {
        AuthService::new(
            Arc::new(users),
            Arc::new(sessions),
            Arc::new(oauth),
            SECRET.to_string(),
            TokenCipher::new(KEY),
            "http://localhost:8000/",
        )
    }

    fn session(user_id: i64, hash: &str) -> Session {
        Session {
            id: 1,
            user_id,
            name: "web".to_string(),
            token_hash: hash.to_string(),
            created_at: Utc::now(),
            last_used_at: None,
            expires_at: None,
            revoked_at: None,
        }
    }

    /// A signed state and its nonce.
    fn state(purpose: StatePurpose, user_id: Option<i64>) -> (String, String) {
        let state = OAuthState::new(purpose, user_id, Utc::now().timestamp() + 60);
        (sign_state(SECRET, &state), state.nonce)
    }

    fn profile() -> OAuthProfile {
        OAuthProfile {
            subject: "g-123".to_string(),
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
            picture: Some("https://example.com/a.png".to_string()),
        }
    }

    #[tokio::test]
    async fn test_authenticate_success() {
        let mut users = MockUserRepository::new();
        let mut sessions = MockSessionRepository::new();

        let expected_hash = hash_token(SECRET, "raw-token");
        let hash = expected_hash.clone();
        sessions
            .expect_find_active()
            .withf(move |h| h == expected_hash)
            .times(1)
            .returning(move |_| Ok(Some(session(7, &hash))));
        sessions
            .expect_update_last_used()
            .times(1)
            .returning(|_| Ok(()));
        users
            .expect_find_by_id()
            .withf(|id| *id == 7)
            .returning(|id| Ok(Some(test_user(id))));

        let service = service(users, sessions, MockOAuthProvider::new());
        let user = service.authenticate("raw-token").await.unwrap();
        assert_eq!(user.id, 7);
    }

    #[tokio::test]
    async fn test_authenticate_unknown_token() {
        let mut sessions = MockSessionRepository::new();
        sessions.expect_find_active().returning(|_| Ok(None));
        sessions.expect_update_last_used().times(0);

        let service = service(MockUserRepository::new(), sessions, MockOAuthProvider::new());
        let err = service.authenticate("nope").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_authenticate_inactive_user() {
        let mut users = MockUserRepository::new();
        let mut sessions = MockSessionRepository::new();
        sessions
            .expect_find_active()
            .returning(|h| Ok(Some(session(3, h))));
        users.expect_find_by_id().returning(|id| {
            let mut user = test_user(id);
            user.is_active = false;
            Ok(Some(user))
        });

        let service = service(users, sessions, MockOAuthProvider::new());
        assert!(matches!(
            service.authenticate("t").await,
            Err(AppError::Unauthorized { .. })
        ));
    }

    #[tokio::test]
    async fn test_login_url_carries_signed_state() {
        let mut oauth = MockOAuthProvider::new();
        oauth
            .expect_authorize_url()
            .withf(|scopes, redirect, state, offline| {
                scopes == LOGIN_SCOPES
                    && redirect == "http://localhost:8000/api/auth/google/callback"
                    && verify_state(SECRET, state, Utc::now().timestamp())
                        .is_ok_and(|s| s.purpose == StatePurpose::Login)
                    && *offline
            })
            .returning(|_, _, _, _| "https://accounts.google.com/o/oauth2/v2/auth?x".to_string());

        let service = service(MockUserRepository::new(), MockSessionRepository::new(), oauth);
        let redirect = service.login_url();
        assert!(redirect.url.starts_with("https://accounts.google.com"));
        assert_eq!(redirect.nonce.len(), 16);
    }

    #[tokio::test]
    async fn test_complete_login_creates_user_and_session() {
        let mut users = MockUserRepository::new();
        let mut sessions = MockSessionRepository::new();
        let mut oauth = MockOAuthProvider::new();

        oauth.expect_exchange_code().returning(|_, _| {
            Ok(OAuthTokens {
                access_token: "at".to_string(),
                refresh_token: None,
            })
        });
        oauth
            .expect_fetch_profile()
            .returning(|_| Ok(profile()));
        users.expect_find_by_email().returning(|_| Ok(None));
        users.expect_find_by_google_id().returning(|_| Ok(None));
        users
            .expect_create()
            .withf(|u| u.email == "ada@example.com" && u.google_id.as_deref() == Some("g-123"))
            .times(1)
            .returning(|u| {
                let mut user = test_user(11);
                user.email = u.email;
                Ok(user)
            });
        sessions
            .expect_create()
            .withf(|user_id, name, hash, expires| {
                *user_id == 11 && name == "web" && hash.len() == 64 && expires.is_some()
            })
            .times(1)
            .returning(|user_id, _, hash, _| Ok(session(user_id, hash)));

        let service = service(users, sessions, oauth);
        let (signed, nonce) = state(StatePurpose::Login, None);
        let (user, token) = service
            .complete_login("code", &signed, Some(&nonce))
            .await
            .unwrap();

        assert_eq!(user.id, 11);
        assert_eq!(token.len(), 48);
    }

    #[tokio::test]
    async fn test_complete_login_updates_existing_user() {
        let mut users = MockUserRepository::new();
        let mut sessions = MockSessionRepository::new();
        let mut oauth = MockOAuthProvider::new();

        oauth.expect_exchange_code().returning(|_, _| {
            Ok(OAuthTokens {
                access_token: "at".to_string(),
                refresh_token: None,
            })
        });
        oauth.expect_fetch_profile().returning(|_| Ok(profile()));
        users.expect_find_by_email().returning(|_| {
            let mut user = test_user(4);
            user.google_id = None;
            Ok(Some(user))
        });
        users
            .expect_update()
            .withf(|id, patch| {
                *id == 4
                    && patch.google_id.as_deref() == Some("g-123")
                    && patch.name.as_deref() == Some("Ada")
            })
            .times(1)
            .returning(|id, _| Ok(test_user(id)));
        users.expect_create().times(0);
        sessions
            .expect_create()
            .returning(|user_id, _, hash, _| Ok(session(user_id, hash)));

        let service = service(users, sessions, oauth);
        let (signed, nonce) = state(StatePurpose::Login, None);
        let (user, _) = service
            .complete_login("code", &signed, Some(&nonce))
            .await
            .unwrap();
        assert_eq!(user.id, 4);
    }

    #[tokio::test]
    async fn test_complete_login_rejects_foreign_state() {
        let mut oauth = MockOAuthProvider::new();
        oauth.expect_exchange_code().times(0);

        let service = service(MockUserRepository::new(), MockSessionRepository::new(), oauth);

        let (gmail_state, nonce) = state(StatePurpose::Gmail, Some(1));
        assert!(matches!(
            service.complete_login("code", &gmail_state, Some(&nonce)).await,
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            service.complete_login("code", "garbage", Some(&nonce)).await,
            Err(AppError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_complete_login_requires_browser_nonce() {
        let mut oauth = MockOAuthProvider::new();
        oauth.expect_exchange_code().times(0);

        let service = service(MockUserRepository::new(), MockSessionRepository::new(), oauth);
        let (signed, _) = state(StatePurpose::Login, None);
        let (_, other_nonce) = state(StatePurpose::Login, None);

        for nonce in [None, Some(""), Some(other_nonce.as_str())] {
            let err = service.complete_login("code", &signed, nonce).await.unwrap_err();
            assert!(matches!(err, AppError::Validation { .. }));
        }
    }

    #[tokio::test]
    async fn test_complete_gmail_connect_requires_browser_nonce() {
        let mut users = MockUserRepository::new();
        let mut oauth = MockOAuthProvider::new();
        oauth.expect_exchange_code().times(0);
        users.expect_set_gmail_token().times(0);

        let service = service(users, MockSessionRepository::new(), oauth);
        let (signed, _) = state(StatePurpose::Gmail, Some(5));
        let err = service
            .complete_gmail_connect(&test_user(5), "code", &signed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_complete_gmail_connect_stores_encrypted_token() {
        let mut users = MockUserRepository::new();
        let mut oauth = MockOAuthProvider::new();

        users
            .expect_find_by_id()
            .returning(|id| Ok(Some(test_user(id))));
        oauth
            .expect_exchange_code()
            .withf(|_, redirect| redirect == "http://localhost:8000/api/auth/gmail/callback")
            .returning(|_, _| {
                Ok(OAuthTokens {
                    access_token: "at".to_string(),
                    refresh_token: Some("1//refresh".to_string()),
                })
            });
        users
            .expect_set_gmail_token()
            .withf(|id, token| {
                *id == 5
                    && token
                        .as_deref()
                        .is_some_and(|t| TokenCipher::new(KEY).decrypt(t).unwrap() == "1//refresh")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let service = service(users, MockSessionRepository::new(), oauth);
        let (signed, nonce) = state(StatePurpose::Gmail, Some(5));
        let user = service
            .complete_gmail_connect(&test_user(5), "code", &signed, Some(&nonce))
            .await
            .unwrap();
        assert_eq!(user.id, 5);
    }

    #[tokio::test]
    async fn test_complete_gmail_connect_requires_refresh_token() {
        let mut users = MockUserRepository::new();
        let mut oauth = MockOAuthProvider::new();
        users
            .expect_find_by_id()
            .returning(|id| Ok(Some(test_user(id))));
        oauth.expect_exchange_code().returning(|_, _| {
            Ok(OAuthTokens {
                access_token: "at".to_string(),
                refresh_token: None,
            })
        });
        users.expect_set_gmail_token().times(0);

        let service = service(users, MockSessionRepository::new(), oauth);
        let (signed, nonce) = state(StatePurpose::Gmail, Some(5));
        let err = service
            .complete_gmail_connect(&test_user(5), "code", &signed, Some(&nonce))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_complete_gmail_connect_rejects_foreign_state() {
        let mut users = MockUserRepository::new();
        let mut oauth = MockOAuthProvider::new();
        oauth.expect_exchange_code().times(0);
        users.expect_set_gmail_token().times(0);

        let service = service(users, MockSessionRepository::new(), oauth);
        let (signed, nonce) = state(StatePurpose::Gmail, Some(5));
        let err = service
            .complete_gmail_connect(&test_user(6), "code", &signed, Some(&nonce))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_logout_revokes_hash() {
        let mut sessions = MockSessionRepository::new();
        let expected = hash_token(SECRET, "tok");
        sessions
            .expect_revoke_by_hash()
            .withf(move |h| h == expected)
            .times(1)
            .returning(|_| Ok(true));

        let service = service(MockUserRepository::new(), sessions, MockOAuthProvider::new());
        service.logout("tok").await.unwrap();
    }
}
