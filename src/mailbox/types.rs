//! Normalized message record.

use std::collections::HashSet;

/// A mail message in normalized form, produced once per fetch by the
/// mailbox collaborator. Immutable; `id` is unique within a mailbox and
/// stable across fetches.
#[derive(Debug, Clone)]
pub struct MailMessage {
    /// Mailbox-native message id.
    pub id: String,
    /// Conversation/thread id.
    pub thread_id: String,
    /// Raw `From` header value.
    pub sender: String,
    /// Subject line (empty when the header is absent).
    pub subject: String,
    /// Plain-text body, or the provider snippet when no body part decodes.
    pub body: String,
    /// Receipt time in epoch milliseconds.
    pub received_at_millis: i64,
    /// Provider label ids (e.g. `UNREAD`, `IMPORTANT`).
    pub labels: HashSet<String>,
}

impl MailMessage {
    /// Test/fixture constructor with empty body and labels.
    pub fn stub(id: &str, sender: &str, subject: &str) -> Self {
        Self {
            id: id.to_string(),
            thread_id: id.to_string(),
            sender: sender.to_string(),
            subject: subject.to_string(),
            body: String::new(),
            received_at_millis: 0,
            labels: HashSet::new(),
        }
    }
}
