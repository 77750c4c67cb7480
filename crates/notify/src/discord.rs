//! Discord webhook notifier.

use sigwatch_core::NotifierConfig;

use crate::chunk::chunk_message;
use crate::traits::{Notification, Notifier, NotifyError};

/// Discord's per-message content limit.
const MAX_CONTENT_CHARS: usize = 2000;

/// Posts messages to a Discord channel webhook.
#[derive(Debug)]
pub struct DiscordNotifier {
    webhook: String,
    username: String,
    avatar: Option<String>,
    client: reqwest::Client,
}

impl DiscordNotifier {
    pub fn new(webhook: String, username: String, avatar: Option<String>) -> Result<Self, NotifyError> {
        if webhook.is_empty() {
            return Err(NotifyError::Config("discord webhook must not be empty".to_string()));
        }
        Ok(Self {
            webhook,
            username,
            avatar,
            client: reqwest::Client::new(),
        })
    }

    /// Build from `required.webhook`, `required.username` and
    /// `optional.avatar`.
    pub fn from_config(config: &NotifierConfig) -> Result<Self, NotifyError> {
        Self::new(
            config.required_str("webhook").unwrap_or_default(),
            config.required_str("username").unwrap_or_default(),
            config.optional_str("avatar"),
        )
    }

    fn payload(&self, content: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "content": content,
            "username": self.username,
        });
        if let Some(ref avatar) = self.avatar {
            body["avatar_url"] = serde_json::Value::String(avatar.clone());
        }
        body
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        for chunk in chunk_message(&notification.body, MAX_CONTENT_CHARS) {
            let response = self
                .client
                .post(&self.webhook)
                .json(&self.payload(&chunk))
                .send()
                .await?;

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(NotifyError::RateLimited { retry_after_secs: 5 });
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(NotifyError::Rejected(format!("discord returned {status}: {body}")));
            }
        }

        tracing::info!(username = %self.username, "Discord notification sent");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "discord"
    }
}
