//! Gmail REST mailbox — thin reqwest wrapper over the messages API.
//!
//! Credential acquisition is out of scope: we take a ready bearer token
//! from the environment. `verify()` runs once at startup; a rejected token
//! is fatal for the process (the monitor loop never starts without a
//! working mailbox).

use std::collections::HashSet;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ConfigError, MailboxError};
use crate::mailbox::{Mailbox, MailMessage};

const DEFAULT_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

/// Page size requested from the list endpoint; the monitor applies its own
/// per-cycle bound on top.
const LIST_PAGE_SIZE: usize = 50;

/// Gmail mailbox configuration.
#[derive(Debug, Clone)]
pub struct GmailConfig {
    pub access_token: SecretString,
}

impl GmailConfig {
    /// Build config from the environment. A missing token is an error, not
    /// a disabled feature — there is no monitor without a mailbox.
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = std::env::var("GMAIL_ACCESS_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("GMAIL_ACCESS_TOKEN".to_string()))?;
        Ok(Self {
            access_token: SecretString::from(token),
        })
    }
}

/// Mailbox backed by the Gmail REST API.
pub struct GmailMailbox {
    config: GmailConfig,
    client: reqwest::Client,
    base_url: String,
}

impl GmailMailbox {
    pub fn new(config: GmailConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the mailbox at a different API host (test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/users/me/{path}", self.base_url)
    }

    async fn get_json(&self, url: &str) -> Result<Value, MailboxError> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(self.config.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| MailboxError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MailboxError::Api {
                status: status.as_u16(),
                body,
            });
        }

        resp.json()
            .await
            .map_err(|e| MailboxError::Http(e.to_string()))
    }

    /// Check the token against the profile endpoint.
    pub async fn verify(&self) -> Result<(), MailboxError> {
        let profile = self
            .get_json(&self.endpoint("profile"))
            .await
            .map_err(|e| MailboxError::Auth(e.to_string()))?;
        let address = profile
            .get("emailAddress")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        debug!(mailbox = %address, "Mailbox credentials verified");
        Ok(())
    }
}

#[async_trait]
impl Mailbox for GmailMailbox {
    async fn search(&self, query: &str) -> Result<Vec<String>, MailboxError> {
        let url = format!(
            "{}?q={}&maxResults={LIST_PAGE_SIZE}",
            self.endpoint("messages"),
            urlencoding::encode(query),
        );
        let data = self.get_json(&url).await?;

        let ids = data
            .get("messages")
            .and_then(Value::as_array)
            .map(|msgs| {
                msgs.iter()
                    .filter_map(|m| m.get("id").and_then(Value::as_str))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    async fn get_message(&self, id: &str) -> Result<Option<MailMessage>, MailboxError> {
        let url = format!("{}/{id}?format=full", self.endpoint("messages"));
        let data = match self.get_json(&url).await {
            Ok(data) => data,
            Err(MailboxError::Api { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        match parse_message(&data) {
            Some(msg) => Ok(Some(msg)),
            None => {
                warn!(message_id = %id, "Unparseable message payload, skipping");
                Ok(None)
            }
        }
    }
}

// ── Payload parsing ─────────────────────────────────────────────────

/// Normalize a full-format message payload. Missing headers become empty
/// strings (an absent header is expected, not an error); a message without
/// an id is unusable and yields `None`.
pub(crate) fn parse_message(data: &Value) -> Option<MailMessage> {
    let id = data.get("id").and_then(Value::as_str)?.to_string();
    let thread_id = data
        .get("threadId")
        .and_then(Value::as_str)
        .unwrap_or(&id)
        .to_string();

    let payload = data.get("payload");
    let headers = payload.and_then(|p| p.get("headers")).and_then(Value::as_array);
    let sender = header_value(headers, "From").unwrap_or_default();
    let subject = header_value(headers, "Subject").unwrap_or_default();

    let snippet = data.get("snippet").and_then(Value::as_str).unwrap_or("");
    let body = payload
        .and_then(extract_plain_body)
        .unwrap_or_else(|| snippet.to_string());

    let received_at_millis = data
        .get("internalDate")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    let labels: HashSet<String> = data
        .get("labelIds")
        .and_then(Value::as_array)
        .map(|ls| {
            ls.iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    Some(MailMessage {
        id,
        thread_id,
        sender,
        subject,
        body,
        received_at_millis,
        labels,
    })
}

/// Case-insensitive header lookup.
fn header_value(headers: Option<&Vec<Value>>, name: &str) -> Option<String> {
    headers?.iter().find_map(|h| {
        let header_name = h.get("name").and_then(Value::as_str)?;
        if header_name.eq_ignore_ascii_case(name) {
            h.get("value").and_then(Value::as_str).map(String::from)
        } else {
            None
        }
    })
}

/// Pull the first decodable text/plain body: top-level body data first,
/// then a depth-first walk of the parts tree.
fn extract_plain_body(payload: &Value) -> Option<String> {
    if let Some(data) = payload
        .get("body")
        .and_then(|b| b.get("data"))
        .and_then(Value::as_str)
    {
        if let Some(text) = decode_body(data) {
            return Some(text);
        }
    }

    let parts = payload.get("parts").and_then(Value::as_array)?;
    for part in parts {
        let mime = part.get("mimeType").and_then(Value::as_str).unwrap_or("");
        if mime == "text/plain" {
            if let Some(text) = part
                .get("body")
                .and_then(|b| b.get("data"))
                .and_then(Value::as_str)
                .and_then(decode_body)
            {
                return Some(text);
            }
        }
        // Nested multipart
        if let Some(text) = extract_plain_body(part) {
            return Some(text);
        }
    }
    None
}

/// URL-safe base64, tolerant of both padded and unpadded payloads.
fn decode_body(data: &str) -> Option<String> {
    let bytes = URL_SAFE
        .decode(data)
        .or_else(|_| URL_SAFE_NO_PAD.decode(data))
        .ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(text: &str) -> String {
        URL_SAFE.encode(text.as_bytes())
    }

    #[test]
    fn endpoint_urls() {
        let mailbox = GmailMailbox::new(GmailConfig {
            access_token: SecretString::from("t".to_string()),
        });
        assert_eq!(
            mailbox.endpoint("profile"),
            "https://gmail.googleapis.com/gmail/v1/users/me/profile"
        );
        assert_eq!(
            mailbox.endpoint("messages"),
            "https://gmail.googleapis.com/gmail/v1/users/me/messages"
        );
    }

    #[test]
    fn parses_full_message() {
        let data = json!({
            "id": "m-1",
            "threadId": "t-1",
            "snippet": "short preview",
            "internalDate": "1754600000000",
            "labelIds": ["UNREAD", "INBOX"],
            "payload": {
                "headers": [
                    {"name": "From", "value": "recruiter@example.com"},
                    {"name": "Subject", "value": "Interview invitation"}
                ],
                "body": {"data": encode("Full body text")}
            }
        });
        let msg = parse_message(&data).unwrap();
        assert_eq!(msg.id, "m-1");
        assert_eq!(msg.thread_id, "t-1");
        assert_eq!(msg.sender, "recruiter@example.com");
        assert_eq!(msg.subject, "Interview invitation");
        assert_eq!(msg.body, "Full body text");
        assert_eq!(msg.received_at_millis, 1_754_600_000_000);
        assert!(msg.labels.contains("UNREAD"));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let data = json!({
            "id": "m-2",
            "payload": {
                "headers": [{"name": "FROM", "value": "a@b.c"}]
            }
        });
        let msg = parse_message(&data).unwrap();
        assert_eq!(msg.sender, "a@b.c");
        assert_eq!(msg.subject, "");
    }

    #[test]
    fn body_falls_back_to_nested_text_part() {
        let data = json!({
            "id": "m-3",
            "payload": {
                "headers": [],
                "parts": [
                    {"mimeType": "multipart/alternative", "parts": [
                        {"mimeType": "text/plain", "body": {"data": encode("nested plain")}},
                        {"mimeType": "text/html", "body": {"data": encode("<p>html</p>")}}
                    ]}
                ]
            }
        });
        let msg = parse_message(&data).unwrap();
        assert_eq!(msg.body, "nested plain");
    }

    #[test]
    fn body_falls_back_to_snippet() {
        let data = json!({
            "id": "m-4",
            "snippet": "only a snippet",
            "payload": {"headers": []}
        });
        let msg = parse_message(&data).unwrap();
        assert_eq!(msg.body, "only a snippet");
    }

    #[test]
    fn message_without_id_is_unparseable() {
        assert!(parse_message(&json!({"snippet": "x"})).is_none());
    }

    #[test]
    fn decode_accepts_unpadded_payloads() {
        let unpadded = URL_SAFE_NO_PAD.encode("hi");
        assert_eq!(decode_body(&unpadded).unwrap(), "hi");
    }
}
