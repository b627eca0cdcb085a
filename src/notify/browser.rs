//! Bounded browser-wait primitive and WebDriver session setup.
//!
//! Every DOM wait in the WhatsApp sender goes through `wait_until`: poll a
//! probe until it yields a value or the deadline passes. Hard timeout,
//! never an infinite loop.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use thirtyfour::prelude::*;
use thirtyfour::{ChromeCapabilities, DesiredCapabilities};

/// Default interval between probe attempts.
pub const DEFAULT_POLL: Duration = Duration::from_millis(500);

/// Result of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome<T> {
    Found(T),
    TimedOut,
}

impl<T> WaitOutcome<T> {
    pub fn found(self) -> Option<T> {
        match self {
            WaitOutcome::Found(value) => Some(value),
            WaitOutcome::TimedOut => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, WaitOutcome::Found(_))
    }
}

/// Poll `probe` every `poll_interval` until it returns `Some` or `timeout`
/// elapses. The probe always runs at least once.
pub async fn wait_until<F, Fut, T>(
    mut probe: F,
    timeout: Duration,
    poll_interval: Duration,
) -> WaitOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(value) = probe().await {
            return WaitOutcome::Found(value);
        }
        if tokio::time::Instant::now() >= deadline {
            return WaitOutcome::TimedOut;
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Chrome capabilities with a persistent profile (the authenticated
/// WhatsApp Web session lives in the profile dir).
pub fn chrome_capabilities(profile_dir: &Path, headless: bool) -> WebDriverResult<ChromeCapabilities> {
    let mut caps = DesiredCapabilities::chrome();
    caps.add_arg(&format!("--user-data-dir={}", profile_dir.display()))?;
    caps.add_arg("--no-sandbox")?;
    caps.add_arg("--disable-dev-shm-usage")?;
    if headless {
        caps.add_arg("--headless=new")?;
        caps.add_arg("--window-size=1280,900")?;
    } else {
        caps.add_arg("--start-maximized")?;
    }
    Ok(caps)
}
