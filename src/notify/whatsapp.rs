//! WhatsApp channel — browser-automated delivery over WhatsApp Web.
//!
//! Two strategies, chosen by session validity:
//!
//! - **Headless**: trusted session → deep link straight to the chat,
//!   bounded waits for the compose box and send control, click, settle.
//! - **Visible fallback**: session not valid → interactive QR
//!   authentication first (human-attended), then a visible-browser send
//!   with a longer wait budget.
//!
//! The WebDriver session is scoped to one send attempt and quit on every
//! exit path. Failures leave a screenshot behind for post-mortem; failures
//! that look like authentication problems also invalidate the persisted
//! session so the next cycle re-authenticates instead of failing headlessly
//! again.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use thirtyfour::prelude::*;
use tracing::{error, info, warn};

use crate::config::{env_flag, env_parse};
use crate::error::ChannelError;
use crate::notify::NotificationChannel;
use crate::notify::browser::{DEFAULT_POLL, chrome_capabilities, wait_until};
use crate::notify::session::{SessionManager, SessionValidity};

const WHATSAPP_WEB_URL: &str = "https://web.whatsapp.com";

// WhatsApp Web DOM anchors.
const COMPOSE_BOX: &str = "footer div[contenteditable='true']";
const SEND_BUTTON: &str = "button[aria-label='Send']";
const CHAT_LIST: &str = "#pane-side";
const QR_CANVAS: &str = "div[data-ref] canvas";

const HEADLESS_COMPOSE_TIMEOUT: Duration = Duration::from_secs(30);
const HEADLESS_SEND_TIMEOUT: Duration = Duration::from_secs(10);
const VISIBLE_COMPOSE_TIMEOUT: Duration = Duration::from_secs(60);
const VISIBLE_SEND_TIMEOUT: Duration = Duration::from_secs(20);
/// How long a human gets to scan the QR code.
const AUTH_WAIT: Duration = Duration::from_secs(120);
/// Grace period after clicking send, before the browser is released.
const SETTLE_AFTER_SEND: Duration = Duration::from_secs(5);

/// WhatsApp channel configuration.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    /// Recipient phone number; any formatting, digits are extracted.
    pub phone: String,
    /// WebDriver endpoint (chromedriver).
    pub webdriver_url: String,
    /// Days after which an authenticated session is no longer trusted.
    pub session_expiry_days: i64,
    pub session_file: PathBuf,
    pub profile_dir: PathBuf,
    pub screenshot_dir: PathBuf,
}

impl WhatsAppConfig {
    /// Build config from environment variables. Returns `None` unless
    /// `WHATSAPP_ENABLED` is truthy and `WHATSAPP_PHONE` is set.
    pub fn from_env(data_dir: &Path) -> Option<Self> {
        if !env_flag("WHATSAPP_ENABLED") {
            return None;
        }
        let phone = std::env::var("WHATSAPP_PHONE")
            .ok()
            .filter(|p| !p.trim().is_empty())?;

        Some(Self {
            phone,
            webdriver_url: std::env::var("WEBDRIVER_URL")
                .unwrap_or_else(|_| "http://localhost:9515".to_string()),
            session_expiry_days: env_parse("WHATSAPP_SESSION_EXPIRY_DAYS", 14),
            session_file: data_dir.join("whatsapp_session.json"),
            profile_dir: data_dir.join("chrome_profile"),
            screenshot_dir: data_dir.join("screenshots"),
        })
    }
}

/// WhatsApp notification channel.
pub struct WhatsAppChannel {
    config: WhatsAppConfig,
    session: SessionManager,
}

impl WhatsAppChannel {
    pub fn new(config: WhatsAppConfig) -> Self {
        let session = SessionManager::new(config.session_file.clone(), config.session_expiry_days);
        Self { config, session }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Profile directory backing the browser session (QR link lives here).
    pub fn profile_dir(&self) -> &Path {
        &self.config.profile_dir
    }

    fn deep_link(&self, text: &str) -> String {
        format!(
            "{WHATSAPP_WEB_URL}/send?phone={}&text={}",
            digits_only(&self.config.phone),
            urlencoding::encode(text),
        )
    }

    async fn connect(&self, headless: bool) -> Result<WebDriver, ChannelError> {
        let caps = chrome_capabilities(&self.config.profile_dir, headless)
            .map_err(|e| send_failed(format!("capability setup: {e}")))?;
        WebDriver::new(&self.config.webdriver_url, caps)
            .await
            .map_err(|e| send_failed(format!("WebDriver connect: {e}")))
    }

    /// Make the session usable, running interactive QR authentication if
    /// it is not currently `Valid`. Returns whether it ended up usable.
    pub async fn ensure_usable(&self) -> bool {
        let validity = self.session.validity();
        if validity == SessionValidity::Valid {
            return true;
        }
        info!(state = ?validity, "WhatsApp session not usable, starting interactive authentication");
        match self.authenticate().await {
            Ok(usable) => usable,
            Err(e) => {
                error!(error = %e, "Interactive authentication failed");
                false
            }
        }
    }

    /// Interactive QR authentication in a visible, human-attended browser.
    pub async fn authenticate(&self) -> Result<bool, ChannelError> {
        let driver = self.connect(false).await?;
        let result = self.drive_authentication(&driver).await;
        if let Err(e) = driver.quit().await {
            warn!(error = %e, "Failed to shut down WebDriver session");
        }
        result
    }

    async fn drive_authentication(&self, driver: &WebDriver) -> Result<bool, ChannelError> {
        driver
            .goto(WHATSAPP_WEB_URL)
            .await
            .map_err(|e| send_failed(e.to_string()))?;

        info!("Scan the QR code in the browser window to link this device");
        let outcome = wait_until(
            || async move { driver.find(By::Css(CHAT_LIST)).await.ok() },
            AUTH_WAIT,
            Duration::from_secs(2),
        )
        .await;

        if !outcome.is_found() {
            warn!("Timed out waiting for QR authentication");
            return Ok(false);
        }

        self.session
            .mark_authenticated()
            .map_err(|e| ChannelError::AuthFailed {
                name: "whatsapp".to_string(),
                reason: format!("session record write failed: {e}"),
            })?;
        info!("WhatsApp Web authenticated");
        Ok(true)
    }

    async fn send_with_browser(
        &self,
        text: &str,
        headless: bool,
        compose_timeout: Duration,
        send_timeout: Duration,
    ) -> Result<(), ChannelError> {
        let driver = self.connect(headless).await?;
        let result = self
            .drive_send(&driver, text, compose_timeout, send_timeout)
            .await;
        if result.is_err() {
            self.capture_failure_screenshot(&driver).await;
        }
        if let Err(e) = driver.quit().await {
            warn!(error = %e, "Failed to shut down WebDriver session");
        }
        result
    }

    async fn drive_send(
        &self,
        driver: &WebDriver,
        text: &str,
        compose_timeout: Duration,
        send_timeout: Duration,
    ) -> Result<(), ChannelError> {
        let url = self.deep_link(text);
        driver
            .goto(url)
            .await
            .map_err(|e| send_failed(e.to_string()))?;

        let compose = wait_until(
            || async move { driver.find(By::Css(COMPOSE_BOX)).await.ok() },
            compose_timeout,
            DEFAULT_POLL,
        )
        .await;
        if !compose.is_found() {
            if driver.find(By::Css(QR_CANVAS)).await.is_ok() {
                return Err(ChannelError::AuthFailed {
                    name: "whatsapp".to_string(),
                    reason: "login screen with QR code shown instead of a chat".to_string(),
                });
            }
            return Err(ChannelError::WaitTimeout {
                name: "whatsapp".to_string(),
                what: "message compose box".to_string(),
            });
        }

        let send_control = wait_until(
            || async move {
                let el = driver.find(By::Css(SEND_BUTTON)).await.ok()?;
                match el.is_clickable().await {
                    Ok(true) => Some(el),
                    _ => None,
                }
            },
            send_timeout,
            DEFAULT_POLL,
        )
        .await;
        let Some(button) = send_control.found() else {
            return Err(ChannelError::WaitTimeout {
                name: "whatsapp".to_string(),
                what: "send control".to_string(),
            });
        };

        button
            .click()
            .await
            .map_err(|e| send_failed(e.to_string()))?;

        // Let the outbound message clear before the session drops.
        tokio::time::sleep(SETTLE_AFTER_SEND).await;
        Ok(())
    }

    async fn capture_failure_screenshot(&self, driver: &WebDriver) {
        if let Err(e) = std::fs::create_dir_all(&self.config.screenshot_dir) {
            warn!(error = %e, "Could not create screenshot directory");
            return;
        }
        let path = self
            .config
            .screenshot_dir
            .join(format!("whatsapp-failure-{}.png", Utc::now().format("%Y%m%dT%H%M%S")));
        match driver.screenshot(&path).await {
            Ok(()) => info!(path = %path.display(), "Saved failure screenshot"),
            Err(e) => warn!(error = %e, "Failed to capture screenshot"),
        }
    }
}

#[async_trait]
impl NotificationChannel for WhatsAppChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn send(&self, text: &str) -> Result<(), ChannelError> {
        let result = if self.session.is_valid() {
            self.send_with_browser(text, true, HEADLESS_COMPOSE_TIMEOUT, HEADLESS_SEND_TIMEOUT)
                .await
        } else if self.ensure_usable().await {
            self.send_with_browser(text, false, VISIBLE_COMPOSE_TIMEOUT, VISIBLE_SEND_TIMEOUT)
                .await
        } else {
            return Err(ChannelError::AuthFailed {
                name: "whatsapp".to_string(),
                reason: "session could not be established".to_string(),
            });
        };

        if let Err(ref e) = result {
            if is_auth_failure(e) {
                warn!(error = %e, "Send failure looks like an auth problem, invalidating session");
                if let Err(we) = self.session.invalidate() {
                    error!(error = %we, "Failed to persist session invalidation");
                }
            }
        }
        result
    }
}

fn send_failed(reason: impl Into<String>) -> ChannelError {
    ChannelError::SendFailed {
        name: "whatsapp".to_string(),
        reason: reason.into(),
    }
}

fn is_auth_failure(e: &ChannelError) -> bool {
    matches!(e, ChannelError::AuthFailed { .. }) || looks_like_auth_error(&e.to_string())
}

/// Does an error message suggest the browser session lost authentication?
pub(crate) fn looks_like_auth_error(text: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(qr code|not logged in|logged out|login screen|session (?:expired|invalid)|authenticat)")
            .expect("static regex")
    })
    .is_match(text)
}

/// Deep links want digits only, no leading `+` or separators.
pub(crate) fn digits_only(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}
