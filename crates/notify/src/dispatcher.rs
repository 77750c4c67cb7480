//! Routes alerts to every enabled channel.
//!
//! Text channels render the cycle's fragments with their own template;
//! structured channels get the collapsed analysis payload. Deliveries run
//! concurrently, each bounded by a timeout, and a failing channel never
//! blocks the others.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::templating::{FragmentContext, TemplateRenderer, DEFAULT_TEMPLATE};
use crate::traits::{Delivery, DispatchResult, Notification, Notifier, NotifyError};

/// Per-channel delivery timeout when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const CYCLE_SUBJECT: &str = "sigwatch alert";

/// An enabled notifier together with its message template.
pub struct Channel {
    notifier: Box<dyn Notifier>,
    template: String,
}

impl Channel {
    pub fn new(notifier: Box<dyn Notifier>, template: Option<String>) -> Self {
        Self {
            notifier,
            template: template.unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        self.notifier.channel_name()
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

/// Dispatches notifications to the configured channels.
pub struct Dispatcher {
    channels: Vec<Channel>,
    /// Channel names that receive composite alerts.
    composite_channels: Vec<String>,
    timeout: Duration,
    renderer: TemplateRenderer,
}

impl Dispatcher {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self {
            channels,
            composite_channels: vec!["telegram".to_string()],
            timeout: DEFAULT_TIMEOUT,
            renderer: TemplateRenderer::new(),
        }
    }

    /// Create an empty dispatcher.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_composite_channels(mut self, names: Vec<String>) -> Self {
        self.composite_channels = names;
        self
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(Channel::name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Deliver one cycle's alerts.
    ///
    /// Text channels whose rendered message is blank are skipped and get
    /// no result entry. Structured channels always receive `payload`.
    pub async fn dispatch_cycle(
        &self,
        fragments: &[FragmentContext],
        payload: &serde_json::Value,
    ) -> Vec<DispatchResult> {
        let mut jobs = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            match channel.notifier.delivery() {
                Delivery::Structured => {
                    jobs.push((channel, Notification::structured(CYCLE_SUBJECT, payload.clone())));
                }
                Delivery::Text => {
                    let message =
                        self.renderer
                            .render_fragments(channel.name(), channel.template(), fragments);
                    if message.trim().is_empty() {
                        tracing::debug!(channel = channel.name(), "Nothing to send this cycle");
                        continue;
                    }
                    jobs.push((channel, Notification::text(CYCLE_SUBJECT, message)));
                }
            }
        }

        self.deliver("cycle", jobs).await
    }

    /// Deliver a composite alert for one market to the composite channels.
    pub async fn dispatch_composite(&self, key: &str, message: &str) -> Vec<DispatchResult> {
        let jobs: Vec<_> = self
            .channels
            .iter()
            .filter(|c| c.notifier.delivery() == Delivery::Text)
            .filter(|c| self.composite_channels.iter().any(|name| name == c.name()))
            .map(|c| {
                let notification =
                    Notification::text(format!("sigwatch composite {key}"), message)
                        .with_metadata("key", key);
                (c, notification)
            })
            .collect();

        if jobs.is_empty() {
            tracing::debug!(key, "No composite channels enabled");
        }

        self.deliver(key, jobs).await
    }

    /// Send each channel's test notification.
    pub async fn test_all(&self) -> Vec<DispatchResult> {
        let deliveries = self
            .channels
            .iter()
            .map(|channel| self.timed(channel, "test", channel.notifier.test()));
        futures::future::join_all(deliveries).await
    }

    async fn deliver(&self, key: &str, jobs: Vec<(&Channel, Notification)>) -> Vec<DispatchResult> {
        let deliveries = jobs
            .iter()
            .map(|(channel, notification)| self.timed(channel, key, channel.notifier.send(notification)));
        futures::future::join_all(deliveries).await
    }

    /// Run one delivery under the timeout and record its outcome.
    async fn timed<F>(&self, channel: &Channel, key: &str, delivery: F) -> DispatchResult
    where
        F: Future<Output = Result<(), NotifyError>>,
    {
        let start = Instant::now();
        let result = match tokio::time::timeout(self.timeout, delivery).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout {
                secs: self.timeout.as_secs(),
            }),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let (success, error) = match result {
            Ok(()) => {
                tracing::info!(
                    key,
                    channel = channel.name(),
                    duration_ms,
                    "Notification delivered"
                );
                (true, None)
            }
            Err(e) => {
                tracing::warn!(
                    key,
                    channel = channel.name(),
                    error = %e,
                    duration_ms,
                    "Notification delivery failed"
                );
                (false, Some(e.to_string()))
            }
        };

        DispatchResult {
            channel: channel.name().to_string(),
            key: key.to_string(),
            success,
            error,
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sigwatch_core::{AnalysisRecord, Status};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct MockNotifier {
        name: String,
        send_count: Arc<AtomicUsize>,
        sent: Arc<Mutex<Vec<Notification>>>,
        should_fail: bool,
        delay: Option<Duration>,
        delivery: Delivery,
    }

    impl MockNotifier {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                send_count: Arc::new(AtomicUsize::new(0)),
                sent: Arc::new(Mutex::new(Vec::new())),
                should_fail: false,
                delay: None,
                delivery: Delivery::Text,
            }
        }
    }

    #[async_trait::async_trait]
    impl Notifier for MockNotifier {
        async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.send_count.fetch_add(1, Ordering::SeqCst);
            self.sent.lock().unwrap().push(notification.clone());
            if self.should_fail {
                Err(NotifyError::Config("mock failure".to_string()))
            } else {
                Ok(())
            }
        }
        fn channel_name(&self) -> &str {
            &self.name
        }
        fn delivery(&self) -> Delivery {
            self.delivery
        }
    }

    fn fragment(indicator: &str) -> FragmentContext {
        FragmentContext {
            values: serde_json::Map::new(),
            exchange: "binance".to_string(),
            market: "ETH/BTC".to_string(),
            base_currency: "ETH".to_string(),
            quote_currency: "BTC".to_string(),
            indicator: indicator.to_string(),
            indicator_number: 0,
            analysis: AnalysisRecord::default(),
            status: Status::Hot,
            last_status: String::new(),
        }
    }

    #[tokio::test]
    async fn dispatch_to_all_channels_with_own_templates() {
        let a = MockNotifier::new("a");
        let b = MockNotifier::new("b");
        let (sent_a, sent_b) = (a.sent.clone(), b.sent.clone());

        let dispatcher = Dispatcher::new(vec![
            Channel::new(Box::new(a), Some("A:{{ indicator }};".to_string())),
            Channel::new(Box::new(b), Some("B:{{ indicator }}|".to_string())),
        ]);

        let results = dispatcher
            .dispatch_cycle(&[fragment("rsi"), fragment("mfi")], &json!({}))
            .await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(sent_a.lock().unwrap()[0].body, "A:rsi;A:mfi;");
        assert_eq!(sent_b.lock().unwrap()[0].body, "B:rsi|B:mfi|");
    }

    #[tokio::test]
    async fn blank_message_is_not_sent() {
        let a = MockNotifier::new("a");
        let count = a.send_count.clone();
        let dispatcher = Dispatcher::new(vec![Channel::new(Box::new(a), Some("   ".to_string()))]);

        let results = dispatcher.dispatch_cycle(&[fragment("rsi")], &json!({})).await;
        assert!(results.is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 0);

        let results = dispatcher.dispatch_cycle(&[], &json!({})).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn structured_channel_gets_payload_every_cycle() {
        let mut hook = MockNotifier::new("webhook");
        hook.delivery = Delivery::Structured;
        let sent = hook.sent.clone();
        let dispatcher = Dispatcher::new(vec![Channel::new(Box::new(hook), None)]);

        let payload = json!({"binance": {}});
        let results = dispatcher.dispatch_cycle(&[], &payload).await;
        assert_eq!(results.len(), 1);
        assert_eq!(sent.lock().unwrap()[0].payload, Some(payload));
    }

    #[tokio::test]
    async fn partial_failure_doesnt_block() {
        let mut failing = MockNotifier::new("fail");
        failing.should_fail = true;
        let ok = MockNotifier::new("ok");
        let count = ok.send_count.clone();

        let dispatcher = Dispatcher::new(vec![
            Channel::new(Box::new(failing), None),
            Channel::new(Box::new(ok), None),
        ]);

        let results = dispatcher.dispatch_cycle(&[fragment("rsi")], &json!({})).await;
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert!(results[0].error.as_deref().unwrap().contains("mock failure"));
        assert!(results[1].success);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_channel_times_out_without_blocking_others() {
        let mut slow = MockNotifier::new("slow");
        slow.delay = Some(Duration::from_secs(5));
        let fast = MockNotifier::new("fast");
        let fast_count = fast.send_count.clone();

        let dispatcher = Dispatcher::new(vec![
            Channel::new(Box::new(slow), None),
            Channel::new(Box::new(fast), None),
        ])
        .with_timeout(Duration::from_millis(50));

        let results = dispatcher.dispatch_cycle(&[fragment("rsi")], &json!({})).await;
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert!(results[0].error.as_deref().unwrap().contains("timed out"));
        assert!(results[1].success);
        assert_eq!(fast_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn composite_goes_only_to_composite_channels() {
        let telegram = MockNotifier::new("telegram");
        let slack = MockNotifier::new("slack");
        let (tg_sent, slack_count) = (telegram.sent.clone(), slack.send_count.clone());

        let dispatcher = Dispatcher::new(vec![
            Channel::new(Box::new(telegram), None),
            Channel::new(Box::new(slack), None),
        ]);

        let results = dispatcher.dispatch_composite("binance:ETH/BTC", "composite body").await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].channel, "telegram");
        assert_eq!(results[0].key, "binance:ETH/BTC");
        assert_eq!(tg_sent.lock().unwrap()[0].body, "composite body");
        assert_eq!(slack_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn composite_channels_are_configurable() {
        let slack = MockNotifier::new("slack");
        let count = slack.send_count.clone();
        let dispatcher = Dispatcher::new(vec![Channel::new(Box::new(slack), None)])
            .with_composite_channels(vec!["slack".to_string()]);

        let results = dispatcher.dispatch_composite("k", "body").await;
        assert_eq!(results.len(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_hits_every_channel() {
        let a = MockNotifier::new("a");
        let sent = a.sent.clone();
        let dispatcher = Dispatcher::new(vec![Channel::new(Box::new(a), None)]);

        let results = dispatcher.test_all().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].key, "test");
        assert!(sent.lock().unwrap()[0].subject.contains("[TEST]"));
    }

    #[tokio::test]
    async fn empty_dispatcher_returns_nothing() {
        let dispatcher = Dispatcher::empty();
        assert!(dispatcher.is_empty());
        assert!(dispatcher.dispatch_cycle(&[fragment("rsi")], &json!({})).await.is_empty());
    }
}
