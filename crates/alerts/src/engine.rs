//! Cycle driver: evaluate, dispatch, then fold the cycle into state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sigwatch_core::payload::collapse_to_latest;
use sigwatch_core::{AlertSettings, Analysis, AppConfig, LastAnalysis};
use sigwatch_notify::{build_channels, DispatchResult, Dispatcher};
use tracing::Instrument;
use uuid::Uuid;

use crate::evaluate::evaluate;
use crate::message::render_composite;

/// What happened to one market's composite alert.
#[derive(Debug, Clone, Serialize)]
pub struct CompositeOutcome {
    /// `exchange:market`.
    pub key: String,
    /// Rendered message, when the composite was complete.
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Summary of one processed cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Alert-eligible instances rendered into the cycle message.
    pub fragments: usize,
    pub composites: Vec<CompositeOutcome>,
    pub deliveries: Vec<DispatchResult>,
}

impl CycleReport {
    pub fn delivered(&self) -> usize {
        self.deliveries.iter().filter(|d| d.success).count()
    }

    pub fn failed(&self) -> usize {
        self.deliveries.iter().filter(|d| !d.success).count()
    }
}

/// Owns the previous-cycle snapshot and runs cycles one at a time.
///
/// `run_cycle` takes `&mut self`, so the snapshot is read and replaced by
/// a single writer and never shared within a cycle.
pub struct AlertEngine {
    settings: AlertSettings,
    dispatcher: Dispatcher,
    last: LastAnalysis,
}

impl AlertEngine {
    pub fn new(settings: AlertSettings, dispatcher: Dispatcher) -> Self {
        Self {
            settings,
            dispatcher,
            last: LastAnalysis::new(),
        }
    }

    /// Build the engine and its channels from configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        let dispatcher = Dispatcher::new(build_channels(&config.notifiers))
            .with_timeout(Duration::from_secs(config.settings.dispatch_timeout_secs))
            .with_composite_channels(config.settings.composite_channels.clone());
        Self::new(config.settings.clone(), dispatcher)
    }

    pub fn settings(&self) -> &AlertSettings {
        &self.settings
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn last_analysis(&self) -> &LastAnalysis {
        &self.last
    }

    /// Process one cycle of analysis end to end.
    ///
    /// Delivery failures are reported, never returned as errors; the
    /// snapshot is updated whatever the dispatch outcome.
    pub async fn run_cycle(&mut self, analysis: Analysis) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let span = tracing::info_span!("cycle", %cycle_id);
        self.process(cycle_id, analysis).instrument(span).await
    }

    async fn process(&mut self, cycle_id: Uuid, mut analysis: Analysis) -> CycleReport {
        let started_at = Utc::now();
        let outcome = evaluate(&mut analysis, &self.last, &self.settings);

        let payload = collapse_to_latest(&analysis);
        let mut deliveries = self.dispatcher.dispatch_cycle(&outcome.fragments, &payload).await;

        let mut composites = Vec::with_capacity(outcome.composites.len());
        for alert in &outcome.composites {
            let key = alert.key();
            match render_composite(alert, &self.settings.period_data) {
                Ok(message) => {
                    deliveries.extend(self.dispatcher.dispatch_composite(&key, &message).await);
                    composites.push(CompositeOutcome {
                        key,
                        message: Some(message),
                        error: None,
                    });
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Composite alert dropped");
                    composites.push(CompositeOutcome {
                        key,
                        message: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        self.last.merge(analysis);

        let report = CycleReport {
            cycle_id,
            started_at,
            fragments: outcome.fragments.len(),
            composites,
            deliveries,
        };

        tracing::info!(
            fragments = report.fragments,
            composites = report.composites.len(),
            delivered = report.delivered(),
            failed = report.failed(),
            elapsed_ms = (Utc::now() - started_at).num_milliseconds(),
            "Cycle complete"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sigwatch_core::{AnalysisRecord, IndicatorConfig, IndicatorFamily, Status};

    fn hot_rsi() -> AnalysisRecord {
        AnalysisRecord::new(
            IndicatorConfig(
                json!({"signal": ["rsi"], "alert_enabled": true, "alert_frequency": "always"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            ),
            vec![json!({"rsi": 22.0, "is_hot": true, "is_cold": false}).as_object().cloned().unwrap()],
        )
    }

    #[tokio::test]
    async fn cycle_updates_last_analysis() {
        let mut engine = AlertEngine::new(AlertSettings::default(), Dispatcher::empty());
        assert!(engine.last_analysis().is_empty());

        let mut analysis = Analysis::new();
        let at = analysis.push("binance", "ETH/BTC", IndicatorFamily::Indicators, "rsi", hot_rsi());

        let report = engine.run_cycle(analysis).await;

        assert_eq!(report.fragments, 1);
        assert!(report.deliveries.is_empty());
        assert_eq!(engine.last_analysis().status_at(&at), Some(Status::Hot));
    }

    #[tokio::test]
    async fn incomplete_composite_is_reported_not_sent() {
        let mut engine = AlertEngine::new(AlertSettings::default(), Dispatcher::empty());

        let mut analysis = Analysis::new();
        for name in ["rsi", "mfi"] {
            analysis.push("binance", "ETH/BTC", IndicatorFamily::Indicators, name, hot_rsi());
        }

        let report = engine.run_cycle(analysis).await;

        assert_eq!(report.composites.len(), 1);
        let composite = &report.composites[0];
        assert_eq!(composite.key, "binance:ETH/BTC");
        assert!(composite.message.is_none());
        assert!(composite.error.as_deref().unwrap_or_default().contains("crossed.ema"));
    }

    #[test]
    fn from_config_wires_settings() {
        let config = AppConfig::from_yaml_str(
            "settings:\n  max_hot_notification: 3\n  dispatch_timeout_secs: 4\nnotifiers: {}\n",
        )
        .unwrap();
        let engine = AlertEngine::from_config(&config);
        assert_eq!(engine.settings().max_hot_notification, 3);
        assert!(engine.dispatcher().is_empty());
    }
}
