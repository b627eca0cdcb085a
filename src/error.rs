//! Error types for Inbox Sentinel.

/// Top-level error type for the monitor.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Mailbox collaborator errors (search/fetch over the REST surface).
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Mailbox request failed: {0}")]
    Http(String),

    #[error("Mailbox returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Mailbox credential check failed: {0}")]
    Auth(String),
}

/// Notification channel errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to send on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Authentication failed on channel {name}: {reason}")]
    AuthFailed { name: String, reason: String },

    #[error("Timed out waiting for {what} on channel {name}")]
    WaitTimeout { name: String, what: String },
}

/// WhatsApp session record errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed session record: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type alias for the monitor.
pub type Result<T> = std::result::Result<T, Error>;
