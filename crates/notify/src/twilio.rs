//! SMS notifier via the Twilio Messages API.

use sigwatch_core::NotifierConfig;

use crate::chunk::chunk_message;
use crate::traits::{Notification, Notifier, NotifyError};

/// Twilio's concatenated-SMS body limit.
const MAX_BODY_CHARS: usize = 1600;

/// Sends SMS messages through Twilio.
#[derive(Debug)]
pub struct TwilioNotifier {
    key: String,
    secret: String,
    sender_number: String,
    receiver_number: String,
    api_base: String,
    client: reqwest::Client,
}

impl TwilioNotifier {
    pub fn new(
        key: String,
        secret: String,
        sender_number: String,
        receiver_number: String,
    ) -> Result<Self, NotifyError> {
        if key.is_empty() || secret.is_empty() {
            return Err(NotifyError::Config("twilio key and secret are required".to_string()));
        }
        if sender_number.is_empty() || receiver_number.is_empty() {
            return Err(NotifyError::Config(
                "twilio sender and receiver numbers are required".to_string(),
            ));
        }
        Ok(Self {
            key,
            secret,
            sender_number,
            receiver_number,
            api_base: "https://api.twilio.com/2010-04-01".to_string(),
            client: reqwest::Client::new(),
        })
    }

    /// Build from `required.key`, `secret`, `sender_number` and
    /// `receiver_number`.
    pub fn from_config(config: &NotifierConfig) -> Result<Self, NotifyError> {
        Self::new(
            config.required_str("key").unwrap_or_default(),
            config.required_str("secret").unwrap_or_default(),
            config.required_str("sender_number").unwrap_or_default(),
            config.required_str("receiver_number").unwrap_or_default(),
        )
    }

    fn messages_url(&self) -> String {
        format!("{}/Accounts/{}/Messages.json", self.api_base, self.key)
    }
}

#[async_trait::async_trait]
impl Notifier for TwilioNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        for chunk in chunk_message(&notification.body, MAX_BODY_CHARS) {
            let form = [
                ("From", self.sender_number.as_str()),
                ("To", self.receiver_number.as_str()),
                ("Body", chunk.as_str()),
            ];

            let response = self
                .client
                .post(self.messages_url())
                .basic_auth(&self.key, Some(&self.secret))
                .form(&form)
                .send()
                .await?;

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(NotifyError::RateLimited { retry_after_secs: 60 });
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(NotifyError::Rejected(format!("twilio returned {status}: {body}")));
            }
        }

        tracing::info!(to = %self.receiver_number, "Twilio SMS sent");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "twilio"
    }
}
