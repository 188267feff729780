//! OAuth 2.0 identity provider.

use async_trait::async_trait;

/// Tokens returned by a code exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Basic profile of the signed-in account.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthProfile {
    pub subject: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

/// Authorization-code flow against an identity provider.
///
/// # Implementations
///
/// - [`crate::infrastructure::google::GoogleOAuthClient`] - Google OAuth 2.0
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Builds the consent-screen URL.
    fn authorize_url(
        &self,
        scopes: &[&'static str],
        redirect_uri: &str,
        state: &str,
        offline: bool,
    ) -> String;

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> anyhow::Result<OAuthTokens>;

    /// Trades a refresh token for a fresh access token.
    async fn refresh_access_token(&self, refresh_token: &str) -> anyhow::Result<String>;

    async fn fetch_profile(&self, access_token: &str) -> anyhow::Result<OAuthProfile>;
}
