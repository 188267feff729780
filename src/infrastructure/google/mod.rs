//! Google REST clients: Gemini/Imagen, Gmail and OAuth 2.0.
//!
//! All three share [`ApiClient`], a thin `reqwest` wrapper that retries
//! rate-limit and server errors with exponential backoff.

mod gemini;
mod gmail;
mod oauth;

pub use gemini::GeminiClient;
pub use gmail::GmailClient;
pub use oauth::GoogleOAuthClient;

use std::time::Duration;

use anyhow::{Context, bail};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Shared HTTP client with retry policy.
///
/// - HTTP 429 or 5xx → retry with exponential backoff
/// - other non-success statuses → fail immediately
/// - transport errors → retry
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    max_retries: u32,
    base_delay: Duration,
}

impl ApiClient {
    pub fn new() -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_secs(1),
        })
    }

    /// Overrides the retry budget and first backoff delay.
    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Sends the request and decodes a JSON response body.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        api: &str,
    ) -> anyhow::Result<T> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * (1u32 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let attempt_request = request
                .try_clone()
                .context("request body cannot be retried")?;

            match attempt_request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response
                            .json::<T>()
                            .await
                            .with_context(|| format!("{api}: invalid response body"));
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::warn!(api, %status, attempt, "retryable API error");
                        last_err = Some(anyhow::anyhow!("{api} error {status}: {body_text}"));
                        continue;
                    }

                    bail!("{api} error {status}: {body_text}");
                }
                Err(e) => {
                    tracing::warn!(api, error = %e, attempt, "API request failed");
                    last_err = Some(anyhow::Error::new(e).context(format!("{api} request failed")));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{api} failed after retries")))
    }
}

#[cfg(test)]
pub(crate) fn test_api_client() -> ApiClient {
    ApiClient::new()
        .unwrap()
        .with_retries(2, Duration::from_millis(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_retries_server_errors_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let client = test_api_client();
        let request = client.http().get(format!("{}/flaky", server.uri()));
        let body: Value = client.send_json(request, "test").await.unwrap();
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bad"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad key"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_api_client();
        let request = client.http().get(format!("{}/bad", server.uri()));
        let err = client.send_json::<Value>(request, "test").await.unwrap_err();
        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("bad key"));
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let client = test_api_client();
        let request = client.http().get(format!("{}/down", server.uri()));
        assert!(client.send_json::<Value>(request, "test").await.is_err());
    }
}
