//! Gmail notifier: SMTP via `lettre` with STARTTLS.
//!
//! Delivers notifications as one email to every configured destination
//! address, authenticated with the account's credentials.

use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use sigwatch_core::NotifierConfig;

use crate::traits::{Notification, Notifier, NotifyError};

const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
const DEFAULT_SMTP_PORT: u16 = 587;

/// Sends notifications as emails via SMTP.
#[derive(Debug)]
pub struct EmailNotifier {
    /// Async SMTP transport for sending emails.
    transport: AsyncSmtpTransport<Tokio1Executor>,
    /// Sender mailbox (the authenticated account).
    from: Mailbox,
    /// Recipient mailboxes.
    to: Vec<Mailbox>,
}

impl EmailNotifier {
    /// Build an `EmailNotifier` for an SMTP relay.
    ///
    /// - `smtp_host` / `smtp_port`: relay address, STARTTLS is always used.
    /// - `username` / `password`: SMTP credentials; `username` is also the
    ///   sender address.
    /// - `to`: recipient email addresses.
    pub fn new(
        smtp_host: &str,
        smtp_port: u16,
        username: &str,
        password: &str,
        to: &[String],
    ) -> Result<Self, NotifyError> {
        let from_mailbox: Mailbox = username
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))?;

        let to_mailboxes: Vec<Mailbox> = to
            .iter()
            .map(|addr| {
                addr.parse()
                    .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if to_mailboxes.is_empty() {
            return Err(NotifyError::Config(
                "at least one recipient is required".to_string(),
            ));
        }

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(smtp_host)
            .map_err(|e| NotifyError::Config(e.to_string()))?
            .port(smtp_port)
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build();

        Ok(Self {
            transport,
            from: from_mailbox,
            to: to_mailboxes,
        })
    }

    /// Build from `required.username`, `required.password` and
    /// `required.destination_emails`; `optional.smtp_host` / `smtp_port`
    /// override the Gmail relay.
    pub fn from_config(config: &NotifierConfig) -> Result<Self, NotifyError> {
        let host = config
            .optional_str("smtp_host")
            .unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string());
        let port = match config.optional_str("smtp_port") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| NotifyError::Config(format!("invalid smtp_port: {raw}")))?,
            None => DEFAULT_SMTP_PORT,
        };

        Self::new(
            &host,
            port,
            &config.required_str("username").unwrap_or_default(),
            &config.required_str("password").unwrap_or_default(),
            &config.required_list("destination_emails"),
        )
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    /// Send a notification email to all configured recipients.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut message_builder = Message::builder().from(self.from.clone());

        for recipient in &self.to {
            message_builder = message_builder.to(recipient.clone());
        }

        let email = message_builder
            .subject(&notification.subject)
            .body(notification.body.clone())
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        tracing::info!(
            channel = "gmail",
            subject = %notification.subject,
            recipients = self.to.len(),
            "notification delivered"
        );

        Ok(())
    }

    fn channel_name(&self) -> &str {
        "gmail"
    }
}
