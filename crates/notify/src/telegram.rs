//! Telegram Bot API notifier.
//!
//! Delivers notifications via the Telegram Bot API `sendMessage` endpoint.
//! Long messages are split to respect the API's 4096 character cap.

use sigwatch_core::NotifierConfig;

use crate::chunk::chunk_message;
use crate::traits::{Notification, Notifier, NotifyError};

/// Telegram's per-message character limit.
const MAX_MESSAGE_CHARS: usize = 4096;

/// Escapes special characters for Telegram MarkdownV2 parse mode.
///
/// Telegram requires these characters to be escaped with a preceding backslash
/// when using MarkdownV2: `_`, `*`, `[`, `]`, `(`, `)`, `~`, `` ` ``, `>`,
/// `#`, `+`, `-`, `=`, `|`, `{`, `}`, `.`, `!`
pub fn escape_markdown_v2(text: &str) -> String {
    let special = ['_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!'];
    let mut result = String::with_capacity(text.len() * 2);
    for ch in text.chars() {
        if special.contains(&ch) {
            result.push('\\');
        }
        result.push(ch);
    }
    result
}

/// Sends notifications via the Telegram Bot API.
#[derive(Debug)]
pub struct TelegramNotifier {
    token: String,
    chat_id: String,
    parse_mode: Option<String>,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(token: String, chat_id: String, parse_mode: Option<String>) -> Result<Self, NotifyError> {
        if token.is_empty() {
            return Err(NotifyError::Config(
                "Telegram bot token must not be empty".to_string(),
            ));
        }
        if chat_id.is_empty() {
            return Err(NotifyError::Config(
                "Telegram chat_id must not be empty".to_string(),
            ));
        }

        Ok(Self {
            token,
            chat_id,
            parse_mode,
            api_base: "https://api.telegram.org".to_string(),
            client: reqwest::Client::new(),
        })
    }

    /// Build from `required.token`, `required.chat_id` and
    /// `optional.parse_mode`.
    pub fn from_config(config: &NotifierConfig) -> Result<Self, NotifyError> {
        Self::new(
            config.required_str("token").unwrap_or_default(),
            config.required_str("chat_id").unwrap_or_default(),
            config.optional_str("parse_mode"),
        )
    }

    fn prepare_text(&self, body: &str) -> String {
        match self.parse_mode.as_deref() {
            Some(mode) if mode.eq_ignore_ascii_case("markdownv2") => escape_markdown_v2(body),
            _ => body.to_string(),
        }
    }

    /// Escape for the parse mode, then split to the message cap.
    fn prepare_chunks(&self, body: &str) -> Vec<String> {
        chunk_message(&self.prepare_text(body), MAX_MESSAGE_CHARS)
    }

    async fn send_chunk(&self, text: &str) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);

        let mut body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
        });

        if let Some(ref mode) = self.parse_mode {
            body["parse_mode"] = serde_json::Value::String(mode.clone());
        }

        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        let resp_body: serde_json::Value = response.json().await?;

        if resp_body.get("ok") == Some(&serde_json::Value::Bool(true)) {
            return Ok(());
        }

        // Handle rate limiting (HTTP 429).
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp_body
                .get("parameters")
                .and_then(|p| p.get("retry_after"))
                .and_then(|v| v.as_u64())
                .unwrap_or(30);
            return Err(NotifyError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        let description = resp_body
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown Telegram API error");

        Err(NotifyError::Rejected(format!(
            "Telegram API error: {description}"
        )))
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let chunks = self.prepare_chunks(&notification.body);

        tracing::debug!(
            chat_id = %self.chat_id,
            parse_mode = ?self.parse_mode,
            chunks = chunks.len(),
            "Sending Telegram notification"
        );

        for chunk in &chunks {
            self.send_chunk(chunk).await?;
        }

        tracing::info!(chat_id = %self.chat_id, "Telegram notification sent");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "telegram"
    }
}
