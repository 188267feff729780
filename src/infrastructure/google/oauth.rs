//! Google OAuth 2.0 authorization-code client.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::ApiClient;
use crate::domain::providers::{OAuthProfile, OAuthProvider, OAuthTokens};

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// OAuth client for Google sign-in and Gmail consent.
pub struct GoogleOAuthClient {
    api: ApiClient,
    client_id: String,
    client_secret: String,
    auth_url: String,
    token_url: String,
    userinfo_url: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct UserInfo {
    sub: String,
    email: String,
    #[serde(default)]
    name: String,
    picture: Option<String>,
}

impl GoogleOAuthClient {
    pub fn new(
        api: ApiClient,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            api,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_url: AUTH_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            userinfo_url: USERINFO_URL.to_string(),
        }
    }

    /// Sends token and userinfo calls to another host (used by tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        self.token_url = format!("{base}/token");
        self.userinfo_url = format!("{base}/v1/userinfo");
        self
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuthClient {
    fn authorize_url(
        &self,
        scopes: &[&'static str],
        redirect_uri: &str,
        state: &str,
        offline: bool,
    ) -> String {
        let mut url = match Url::parse(&self.auth_url) {
            Ok(url) => url,
            Err(_) => return self.auth_url.clone(),
        };

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("scope", &scopes.join(" "))
                .append_pair("state", state)
                .append_pair("include_granted_scopes", "true");
            if offline {
                query
                    .append_pair("access_type", "offline")
                    .append_pair("prompt", "consent");
            }
        }

        url.to_string()
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> anyhow::Result<OAuthTokens> {
        let request = self.api.http().post(&self.token_url).form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ]);

        let tokens: TokenResponse = self.api.send_json(request, "Google token exchange").await?;
        Ok(OAuthTokens {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> anyhow::Result<String> {
        let request = self.api.http().post(&self.token_url).form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ]);

        let tokens: TokenResponse = self.api.send_json(request, "Google token refresh").await?;
        Ok(tokens.access_token)
    }

    async fn fetch_profile(&self, access_token: &str) -> anyhow::Result<OAuthProfile> {
        let request = self
            .api
            .http()
            .get(&self.userinfo_url)
            .bearer_auth(access_token);

        let info: UserInfo = self.api.send_json(request, "Google userinfo").await?;
        Ok(OAuthProfile {
            subject: info.sub,
            email: info.email,
            name: info.name,
            picture: info.picture,
        })
    }
}
