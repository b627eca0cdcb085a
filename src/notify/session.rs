//! WhatsApp session lifecycle — persisted validity state machine.
//!
//! The record file holds a single nullable timestamp. Validity is derived
//! lazily on every use, so expiry needs no timer:
//!
//! - no file               → `Uninitialized`
//! - `last_auth_date` null → `Invalid` (cleared after a detected auth failure)
//! - within expiry window  → `Valid`
//! - older than the window → `Expired`
//!
//! Transitions back to `Valid` happen only through interactive QR
//! authentication (`mark_authenticated`), driven by the WhatsApp channel.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::SessionError;

/// Derived session state, checked lazily on use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionValidity {
    Uninitialized,
    Valid,
    Expired,
    Invalid,
}

/// On-disk record: `{"last_auth_date": <ISO-8601 | null>}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionRecord {
    last_auth_date: Option<DateTime<Utc>>,
}

/// Single owner of the persisted session record.
#[derive(Debug)]
pub struct SessionManager {
    path: PathBuf,
    expiry: Duration,
}

impl SessionManager {
    pub fn new(path: impl Into<PathBuf>, expiry_days: i64) -> Self {
        Self {
            path: path.into(),
            expiry: Duration::days(expiry_days),
        }
    }

    fn read_record(&self) -> Result<Option<SessionRecord>, SessionError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn write_record(&self, record: &SessionRecord) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(record)?)?;
        Ok(())
    }

    /// Current validity, re-read from disk. An unreadable record is
    /// treated as `Invalid` so the next use re-authenticates.
    pub fn validity(&self) -> SessionValidity {
        let record = match self.read_record() {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "Unreadable session record");
                return SessionValidity::Invalid;
            }
        };

        match record {
            None => SessionValidity::Uninitialized,
            Some(SessionRecord {
                last_auth_date: None,
            }) => SessionValidity::Invalid,
            Some(SessionRecord {
                last_auth_date: Some(at),
            }) => {
                if Utc::now() - at < self.expiry {
                    SessionValidity::Valid
                } else {
                    SessionValidity::Expired
                }
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validity() == SessionValidity::Valid
    }

    /// When the session last authenticated, if ever.
    pub fn last_authenticated(&self) -> Option<DateTime<Utc>> {
        self.read_record().ok().flatten()?.last_auth_date
    }

    /// Record a successful interactive authentication.
    pub fn mark_authenticated(&self) -> Result<(), SessionError> {
        self.write_record(&SessionRecord {
            last_auth_date: Some(Utc::now()),
        })?;
        info!("WhatsApp session marked authenticated");
        Ok(())
    }

    /// Clear the session after a detected authentication failure. The next
    /// cycle re-authenticates instead of failing headlessly again.
    pub fn invalidate(&self) -> Result<(), SessionError> {
        self.write_record(&SessionRecord {
            last_auth_date: None,
        })?;
        warn!("WhatsApp session invalidated");
        Ok(())
    }

    /// Remove the record file entirely (back to `Uninitialized`).
    pub fn destroy(&self) -> Result<(), SessionError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            info!(path = %self.path.display(), "Session record deleted");
        }
        Ok(())
    }
}
