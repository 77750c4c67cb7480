//! Notifier trait definition and shared error types.

use std::collections::HashMap;

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Delivery timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Channel rejected message: {0}")]
    Rejected(String),
}

/// What a channel consumes from a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Rendered text from the channel's template.
    Text,
    /// The collapsed analysis payload, every cycle.
    Structured,
}

/// A notification ready for delivery.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Notification {
    /// Subject/title, used by channels that have one (email).
    pub subject: String,
    /// Rendered text body.
    pub body: String,
    /// Structured payload for [`Delivery::Structured`] channels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// Additional metadata (e.g. exchange, market).
    pub metadata: HashMap<String, String>,
}

impl Notification {
    pub fn text(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            payload: None,
            metadata: HashMap::new(),
        }
    }

    pub fn structured(subject: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            subject: subject.into(),
            body: String::new(),
            payload: Some(payload),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Trait for notification channel implementations.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification through this channel.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Test connectivity with a sample notification.
    async fn test(&self) -> Result<(), NotifyError> {
        let test_notification = Notification::text(
            "[TEST] sigwatch",
            "This is a test notification from sigwatch.",
        )
        .with_metadata("event", "test");
        self.send(&test_notification).await
    }

    /// Human-readable name for this channel (e.g., "slack", "webhook").
    fn channel_name(&self) -> &str;

    fn delivery(&self) -> Delivery {
        Delivery::Text
    }
}

/// Result of delivering one notification to a single channel.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DispatchResult {
    pub channel: String,
    /// What was delivered: `"cycle"` or `"{exchange}:{market}"`.
    pub key: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}
