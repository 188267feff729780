//! Gmail REST client.

use std::sync::LazyLock;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;

use super::ApiClient;
use crate::domain::entities::MailMessage;
use crate::domain::providers::MailProvider;

const DEFAULT_BASE_URL: &str = "https://gmail.googleapis.com";

static SENDER_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.+?)\s*<(.+?)>$").unwrap());

/// Read-only Gmail API client. Each call uses the caller's access token.
pub struct GmailClient {
    api: ApiClient,
    base_url: String,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    id: String,
    #[serde(default)]
    thread_id: String,
    #[serde(default)]
    snippet: String,
    payload: Option<Payload>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Payload {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    headers: Vec<Header>,
    body: Option<Body>,
    #[serde(default)]
    parts: Vec<Payload>,
}

#[derive(Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Deserialize)]
struct Body {
    data: Option<String>,
}

impl GmailClient {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Points the client at another host (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl MailProvider for GmailClient {
    async fn list_message_ids(
        &self,
        access_token: &str,
        query: &str,
        max_results: u32,
    ) -> anyhow::Result<Vec<String>> {
        let request = self
            .api
            .http()
            .get(format!("{}/gmail/v1/users/me/messages", self.base_url))
            .bearer_auth(access_token)
            .query(&[("q", query.to_string()), ("maxResults", max_results.to_string())]);

        let response: ListResponse = self.api.send_json(request, "Gmail list").await?;
        Ok(response.messages.into_iter().map(|m| m.id).collect())
    }

    async fn get_message(
        &self,
        access_token: &str,
        message_id: &str,
    ) -> anyhow::Result<MailMessage> {
        let request = self
            .api
            .http()
            .get(format!(
                "{}/gmail/v1/users/me/messages/{message_id}",
                self.base_url
            ))
            .bearer_auth(access_token)
            .query(&[("format", "full")]);

        let raw: RawMessage = self.api.send_json(request, "Gmail get").await?;
        Ok(parse_message(raw))
    }
}

fn parse_message(raw: RawMessage) -> MailMessage {
    let payload = raw.payload.unwrap_or_default();

    let header = |name: &str| {
        payload
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.clone())
            .unwrap_or_default()
    };

    let (sender_name, sender_email) = parse_sender(&header("From"));
    let subject = match header("Subject") {
        s if s.trim().is_empty() => "(No subject)".to_string(),
        s => s,
    };
    let received_date = parse_date(&header("Date"));

    MailMessage {
        id: raw.id,
        thread_id: raw.thread_id,
        snippet: raw.snippet,
        sender_email,
        sender_name,
        subject,
        received_date,
        html: extract_html(&payload).unwrap_or_default(),
    }
}

/// Splits `Name <addr>` into its parts; anything else is a bare address.
fn parse_sender(raw: &str) -> (String, String) {
    let raw = raw.trim();
    match SENDER_REGEX.captures(raw) {
        Some(caps) => (caps[1].trim_matches('"').to_string(), caps[2].to_string()),
        None => (String::new(), raw.to_string()),
    }
}

fn parse_date(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc2822(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// First `text/html` part, depth-first through `multipart/*` containers.
fn extract_html(payload: &Payload) -> Option<String> {
    if payload.mime_type == "text/html" {
        return decode_body(payload);
    }

    for part in &payload.parts {
        if part.mime_type == "text/html" {
            return decode_body(part);
        }
        if part.mime_type.starts_with("multipart/")
            && let Some(html) = extract_html(part).filter(|h| !h.is_empty())
        {
            return Some(html);
        }
    }

    None
}

fn decode_body(part: &Payload) -> Option<String> {
    let data = part.body.as_ref()?.data.as_deref()?;
    let bytes = URL_SAFE
        .decode(data)
        .or_else(|_| URL_SAFE_NO_PAD.decode(data.trim_end_matches('=')))
        .ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::google::test_api_client;
    use serde_json::json;
    use wiremock::matchers::{header as header_matcher, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn b64(s: &str) -> String {
        URL_SAFE.encode(s)
    }

    #[test]
    fn test_parse_sender() {
        assert_eq!(
            parse_sender("\"The Batch\" <batch@example.com>"),
            ("The Batch".to_string(), "batch@example.com".to_string())
        );
        assert_eq!(
            parse_sender("news@example.com"),
            (String::new(), "news@example.com".to_string())
        );
    }

    #[test]
    fn test_parse_date_falls_back_to_now() {
        let parsed = parse_date("Tue, 1 Jul 2025 10:52:37 +0200");
        assert_eq!(parsed.to_rfc3339(), "2025-07-01T08:52:37+00:00");

        let before = Utc::now();
        assert!(parse_date("garbage") >= before);
    }

    #[test]
    fn test_extract_html_descends_into_multipart() {
        let payload: Payload = serde_json::from_value(json!({
            "mimeType": "multipart/mixed",
            "parts": [
                { "mimeType": "text/plain", "body": { "data": b64("plain") } },
                { "mimeType": "multipart/alternative", "parts": [
                    { "mimeType": "text/html", "body": { "data": b64("<p>hi</p>") } }
                ]}
            ]
        }))
        .unwrap();

        assert_eq!(extract_html(&payload).as_deref(), Some("<p>hi</p>"));
    }

    #[tokio::test]
    async fn test_list_and_get_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .and(query_param("q", "label:newsletters"))
            .and(query_param("maxResults", "50"))
            .and(header_matcher("authorization", "Bearer access"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messages": [{ "id": "m1", "threadId": "t1" }, { "id": "m2", "threadId": "t2" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages/m1"))
            .and(query_param("format", "full"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "m1",
                "threadId": "t1",
                "snippet": "This week in AI",
                "payload": {
                    "mimeType": "text/html",
                    "headers": [
                        { "name": "from", "value": "AI Weekly <weekly@example.com>" },
                        { "name": "SUBJECT", "value": "" },
                        { "name": "Date", "value": "Mon, 3 Mar 2025 09:00:00 +0000" }
                    ],
                    "body": { "data": b64("<html><a href=\"https://example.com\">x</a></html>") }
                }
            })))
            .mount(&server)
            .await;

        let client = GmailClient::new(test_api_client()).with_base_url(server.uri());

        let ids = client
            .list_message_ids("access", "label:newsletters", 50)
            .await
            .unwrap();
        assert_eq!(ids, vec!["m1", "m2"]);

        let message = client.get_message("access", "m1").await.unwrap();
        assert_eq!(message.sender_name, "AI Weekly");
        assert_eq!(message.sender_email, "weekly@example.com");
        assert_eq!(message.subject, "(No subject)");
        assert_eq!(message.received_date.to_rfc3339(), "2025-03-03T09:00:00+00:00");
        assert!(message.html.contains("https://example.com"));
        assert_eq!(message.snippet, "This week in AI");
    }

    #[tokio::test]
    async fn test_list_without_messages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "resultSizeEstimate": 0 })))
            .mount(&server)
            .await;

        let client = GmailClient::new(test_api_client()).with_base_url(server.uri());
        assert!(client.list_message_ids("t", "q", 10).await.unwrap().is_empty());
    }
}
