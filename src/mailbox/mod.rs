//! Mailbox collaborator — narrow search/fetch interface.
//!
//! The monitor never touches mail-store internals; it sees candidate ids
//! from `search` and normalized records from `get_message`. `None` from
//! `get_message` means "not retrievable" and is an expected outcome, not
//! an error.

pub mod gmail;
pub mod query;
pub mod types;

pub use gmail::{GmailConfig, GmailMailbox};
pub use query::SearchQuery;
pub use types::MailMessage;

use async_trait::async_trait;

use crate::error::MailboxError;

/// Backend-agnostic mailbox access.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Search for message ids matching a query in the mailbox's token
    /// grammar (`after:YYYY/MM/DD`, `newer_than:Nd`, `is:unread`, ANDed).
    async fn search(&self, query: &str) -> Result<Vec<String>, MailboxError>;

    /// Fetch one message in normalized form. `Ok(None)` = not retrievable.
    async fn get_message(&self, id: &str) -> Result<Option<MailMessage>, MailboxError>;
}
