//! Notification dispatcher — fans one message out to every registered
//! channel.
//!
//! Failure isolation is the whole point: each channel's error is caught
//! and logged so siblings still get their attempt. The aggregate result
//! (any channel delivered) is used only for logging; there is no retry
//! within a dispatch call.

use std::sync::Arc;

use tracing::{info, warn};

use crate::mailbox::MailMessage;
use crate::notify::NotificationChannel;
use crate::notify::formatter::format_notification;

/// Outcome of one channel attempt. Ephemeral, logged only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub channel: String,
    pub delivered: bool,
}

/// Fans formatted notifications out to all registered channels.
#[derive(Default)]
pub struct NotificationDispatcher {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, channel: Arc<dyn NotificationChannel>) {
        info!(channel = channel.name(), "Registering notification channel");
        self.channels.push(channel);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Format the message once and attempt every channel independently.
    /// Returns true iff at least one channel delivered.
    pub async fn dispatch(&self, msg: &MailMessage) -> bool {
        if self.channels.is_empty() {
            warn!("No notification channels configured, dropping notification");
            return false;
        }

        let text = format_notification(msg);
        let outcomes = self.dispatch_text(&text).await;
        outcomes.iter().any(|o| o.delivered)
    }

    /// Attempt all channels with already-formatted text, collecting one
    /// outcome per channel.
    pub async fn dispatch_text(&self, text: &str) -> Vec<DeliveryOutcome> {
        let mut outcomes = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let delivered = match channel.send(text).await {
                Ok(()) => {
                    info!(channel = channel.name(), "Notification delivered");
                    true
                }
                Err(e) => {
                    warn!(channel = channel.name(), error = %e, "Channel delivery failed");
                    false
                }
            };
            outcomes.push(DeliveryOutcome {
                channel: channel.name().to_string(),
                delivered,
            });
        }
        outcomes
    }
}
