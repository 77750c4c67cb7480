//! Generic HTTP webhook notifier.
//!
//! Unlike the text channels, the webhook receives the cycle's analysis as
//! JSON, collapsed so every indicator instance is just its latest row.

use std::collections::HashMap;

use sigwatch_core::NotifierConfig;

use crate::traits::{Delivery, Notification, Notifier, NotifyError};

/// Delivers notifications as JSON over HTTP to a configured endpoint.
#[derive(Debug)]
pub struct WebhookNotifier {
    /// Target URL.
    url: String,
    /// HTTP method (defaults to POST).
    method: reqwest::Method,
    /// Basic-auth credentials, sent when a username is configured.
    username: Option<String>,
    password: Option<String>,
    /// Custom headers to include on every request.
    headers: HashMap<String, String>,
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Create a new webhook notifier. `method` defaults to `POST`.
    pub fn new(
        url: String,
        method: Option<reqwest::Method>,
        username: Option<String>,
        password: Option<String>,
        headers: HashMap<String, String>,
    ) -> Result<Self, NotifyError> {
        if url.is_empty() {
            return Err(NotifyError::Config("webhook url must not be empty".to_string()));
        }

        Ok(Self {
            url,
            method: method.unwrap_or(reqwest::Method::POST),
            username,
            password,
            headers,
            client: reqwest::Client::new(),
        })
    }

    /// Build from `required.url`; `optional.username`, `password`,
    /// `method` and `headers` are honored when present.
    ///
    /// Invalid method strings produce [`NotifyError::Config`].
    pub fn from_config(config: &NotifierConfig) -> Result<Self, NotifyError> {
        let parsed_method = match config.optional_str("method") {
            Some(m) => {
                let upper = m.to_uppercase();
                upper
                    .parse::<reqwest::Method>()
                    .map(Some)
                    .map_err(|_| NotifyError::Config(format!("invalid HTTP method: {m}")))?
            }
            None => None,
        };

        let headers = match config.optional.get("headers") {
            Some(serde_json::Value::Object(map)) => map
                .iter()
                .map(|(k, v)| (k.clone(), sigwatch_core::value::display(v)))
                .collect(),
            _ => HashMap::new(),
        };

        Self::new(
            config.required_str("url").unwrap_or_default(),
            parsed_method,
            config.optional_str("username"),
            config.optional_str("password"),
            headers,
        )
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    /// POST the structured payload, or `{"message": body}` when there is none.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let body = match &notification.payload {
            Some(payload) => serde_json::to_string(payload)?,
            None => serde_json::to_string(&serde_json::json!({ "message": notification.body }))?,
        };

        let mut request = self
            .client
            .request(self.method.clone(), &self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);

        if let Some(ref user) = self.username {
            request = request.basic_auth(user, self.password.as_deref());
        }

        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(
                url = %self.url,
                %status,
                body = %body_text,
                "webhook returned non-2xx status"
            );
            return Err(NotifyError::Rejected(format!(
                "webhook returned {status}: {body_text}"
            )));
        }

        tracing::debug!(
            url = %self.url,
            method = %self.method,
            status = %status,
            "webhook notification delivered"
        );

        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }

    fn delivery(&self) -> Delivery {
        Delivery::Structured
    }
}
