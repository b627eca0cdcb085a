//! Telegram channel — one sendMessage call per notification.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::ChannelError;
use crate::notify::NotificationChannel;

/// Telegram channel configuration.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub chat_id: String,
}

impl TelegramConfig {
    /// Build config from environment variables. Returns `None` unless both
    /// `TELEGRAM_BOT_TOKEN` and `TELEGRAM_CHAT_ID` are set (channel
    /// disabled).
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN").ok()?;
        let chat_id = std::env::var("TELEGRAM_CHAT_ID").ok()?;
        Some(Self {
            bot_token: SecretString::from(bot_token),
            chat_id,
        })
    }
}

/// Telegram notification channel — posts to the Bot API.
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.config.bot_token.expose_secret()
        )
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    /// Single POST; non-2xx or transport failure surfaces as `ChannelError`
    /// for the dispatcher to catch. No retry inside one dispatch.
    async fn send(&self, text: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "chat_id": self.config.chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let api_err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".to_string(),
                reason: format!("sendMessage returned {status}: {api_err}"),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(token: &str, chat_id: &str) -> TelegramChannel {
        TelegramChannel::new(TelegramConfig {
            bot_token: SecretString::from(token.to_string()),
            chat_id: chat_id.to_string(),
        })
    }

    #[test]
    fn channel_name() {
        assert_eq!(channel("t", "1").name(), "telegram");
    }

    #[test]
    fn api_url_embeds_token_and_method() {
        let ch = channel("123:ABC", "42");
        assert_eq!(
            ch.api_url("sendMessage"),
            "https://api.telegram.org/bot123:ABC/sendMessage"
        );
    }

    #[tokio::test]
    async fn send_with_bogus_token_fails() {
        // Either the transport fails (no network) or the API answers
        // non-2xx for a fake token; both must surface as Err.
        let ch = channel("0:invalid", "42");
        assert!(ch.send("hello").await.is_err());
    }
}
