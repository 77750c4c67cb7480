//! Slack incoming-webhook notifier.

use sigwatch_core::NotifierConfig;

use crate::traits::{Notification, Notifier, NotifyError};

/// Posts plain-text messages to a Slack incoming webhook.
#[derive(Debug)]
pub struct SlackNotifier {
    webhook: String,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(webhook: String) -> Result<Self, NotifyError> {
        if webhook.is_empty() {
            return Err(NotifyError::Config("slack webhook must not be empty".to_string()));
        }
        Ok(Self {
            webhook,
            client: reqwest::Client::new(),
        })
    }

    pub fn from_config(config: &NotifierConfig) -> Result<Self, NotifyError> {
        Self::new(config.required_str("webhook").unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::debug!("Sending Slack webhook message");

        let response = self
            .client
            .post(&self.webhook)
            .json(&serde_json::json!({ "text": notification.body }))
            .send()
            .await?;

        if response.status().is_success() {
            tracing::info!("Slack notification sent");
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(NotifyError::RateLimited { retry_after_secs: 60 });
        }

        Err(NotifyError::Rejected(format!("HTTP {status}: {body}")))
    }

    fn channel_name(&self) -> &str {
        "slack"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_config_reads_webhook() {
        let mut cfg = NotifierConfig::default();
        cfg.required.insert("webhook".into(), json!("https://hooks.slack.com/services/T/B/X"));
        let notifier = SlackNotifier::from_config(&cfg).unwrap();
        assert_eq!(notifier.webhook, "https://hooks.slack.com/services/T/B/X");
        assert_eq!(notifier.channel_name(), "slack");
    }

    #[test]
    fn empty_webhook_rejected() {
        assert!(SlackNotifier::from_config(&NotifierConfig::default()).is_err());
    }
}
