//! Notification channels and dispatch.

pub mod browser;
pub mod dispatcher;
pub mod formatter;
pub mod session;
pub mod telegram;
pub mod whatsapp;

pub use dispatcher::{DeliveryOutcome, NotificationDispatcher};
pub use session::{SessionManager, SessionValidity};
pub use telegram::{TelegramChannel, TelegramConfig};
pub use whatsapp::{WhatsAppChannel, WhatsAppConfig};

use async_trait::async_trait;

use crate::error::ChannelError;

/// An outbound notification backend. Channels are constructed only when
/// their configuration is present; `send` failures are caught by the
/// dispatcher and never cross the monitor-loop boundary.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Channel name for logging ("telegram", "whatsapp").
    fn name(&self) -> &str;

    /// Deliver one formatted notification.
    async fn send(&self, text: &str) -> Result<(), ChannelError>;
}
