//! Notifier that writes messages to standard output.

use tokio::io::AsyncWriteExt;

use crate::traits::{Notification, Notifier, NotifyError};

#[derive(Debug, Default)]
pub struct StdoutNotifier;

impl StdoutNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Notifier for StdoutNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut out = tokio::io::stdout();
        let mut text = notification.body.clone();
        if !text.ends_with('\n') {
            text.push('\n');
        }
        out.write_all(text.as_bytes()).await.map_err(write_failed)?;
        out.flush().await.map_err(write_failed)
    }

    fn channel_name(&self) -> &str {
        "stdout"
    }
}

fn write_failed(e: std::io::Error) -> NotifyError {
    NotifyError::Rejected(format!("stdout write failed: {e}"))
}
