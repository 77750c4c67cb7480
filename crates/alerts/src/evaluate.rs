//! One pass of the alert decision engine over a cycle's analysis.
//!
//! Walks every instance in traversal order, grouped by market:
//! classify, write the status back, apply the debounce policy, and
//! collect the per-instance fragments plus each market's composite.

use sigwatch_core::{split_market, AlertSettings, Analysis, Coordinate, LastAnalysis};
use sigwatch_notify::FragmentContext;

use crate::aggregate::{CrossedPair, InformantSnapshot};
use crate::classifier::{classify, Classification};
use crate::composite::{CompositeAlert, CompositeTrigger, JsonIndicator};
use crate::policy::is_eligible;

/// What one evaluation pass decided.
#[derive(Debug, Default)]
pub struct CycleOutcome {
    /// Alert-eligible instances in traversal order.
    pub fragments: Vec<FragmentContext>,
    /// Markets whose composite trigger fired.
    pub composites: Vec<CompositeAlert>,
}

/// Evaluate `analysis` against the previous cycle.
///
/// Classified statuses are written back into `analysis`; nothing else in
/// it is modified.
pub fn evaluate(analysis: &mut Analysis, last: &LastAnalysis, settings: &AlertSettings) -> CycleOutcome {
    let mut outcome = CycleOutcome::default();
    let coordinates = analysis.coordinates();

    for market in coordinates.chunk_by(|a, b| a.exchange == b.exchange && a.market == b.market) {
        let Some(first) = market.first() else { continue };
        let Some((base, quote)) = split_market(&first.market) else {
            tracing::warn!(
                exchange = %first.exchange,
                market = %first.market,
                "Market symbol is not BASE/QUOTE, skipping"
            );
            continue;
        };

        let mut alert = CompositeAlert::new(&first.exchange, &first.market, base, quote);
        let mut trigger = CompositeTrigger::default();

        for at in market {
            evaluate_instance(analysis, last, settings, at, &mut alert, &mut trigger, &mut outcome);
        }

        tracing::debug!(
            exchange = %alert.exchange,
            market = %alert.market,
            hot = trigger.hot_count,
            cold = trigger.cold_count,
            primary = ?trigger.primary_indicators,
            "Market evaluated"
        );

        if trigger.fires(settings) {
            tracing::info!(
                exchange = %alert.exchange,
                market = %alert.market,
                hot = trigger.hot_count,
                cold = trigger.cold_count,
                "Composite alert triggered"
            );
            outcome.composites.push(alert);
        }
    }

    outcome
}

fn evaluate_instance(
    analysis: &mut Analysis,
    last: &LastAnalysis,
    settings: &AlertSettings,
    at: &Coordinate,
    alert: &mut CompositeAlert,
    trigger: &mut CompositeTrigger,
    outcome: &mut CycleOutcome,
) {
    let Some(record) = analysis.get(at) else { return };
    let Some(classification) = classify(at.family, &at.name, record) else {
        return;
    };

    match classification {
        Classification::Informant { values } => {
            let snapshot = InformantSnapshot {
                result: values,
                config: record.config.clone(),
            };
            alert.informants.insert(at.name.clone(), snapshot);
        }
        Classification::Crossover(reading) => {
            let informants = analysis.informants(&at.exchange, &at.market, &reading.base_name);
            match CrossedPair::from_reading(reading, informants) {
                Ok(pair) => {
                    alert.crossed.insert(pair.name.clone(), pair);
                }
                Err(e) => {
                    tracing::warn!(instance = %at, error = %e, "Crossover skipped");
                }
            }
        }
        Classification::Indicator { status, values } => {
            let Some(record) = analysis.get_mut(at) else { return };
            record.status = Some(status);
            let record = record.clone();

            trigger.record_status(&at.name, status);

            let last_status = last.status_at(at);
            let eligible = is_eligible(at, &record.config, status, last_status);
            let primary = eligible && trigger.record_eligible(&at.name, settings.primary_marking);

            alert.indicators.insert(
                at.name.clone(),
                JsonIndicator {
                    values: values.clone(),
                    indicator_number: at.index,
                    config: record.config.clone(),
                    status,
                    last_status,
                    primary,
                },
            );

            if eligible {
                tracing::debug!(instance = %at, %status, ?last_status, "Instance alert-eligible");
                outcome.fragments.push(FragmentContext {
                    values,
                    exchange: at.exchange.clone(),
                    market: at.market.clone(),
                    base_currency: alert.base_currency.clone(),
                    quote_currency: alert.quote_currency.clone(),
                    indicator: at.name.clone(),
                    indicator_number: at.index,
                    analysis: record,
                    status,
                    last_status: last_status.map(|s| s.to_string()).unwrap_or_default(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use sigwatch_core::{AnalysisRecord, IndicatorConfig, IndicatorFamily, PrimaryMarking, Status};

    fn record(config: Value, rows: Vec<Value>) -> AnalysisRecord {
        AnalysisRecord::new(
            IndicatorConfig(config.as_object().cloned().unwrap()),
            rows.into_iter().map(|r| r.as_object().cloned().unwrap()).collect(),
        )
    }

    fn oscillator(name: &str, hot: bool, cold: bool, frequency: &str) -> AnalysisRecord {
        let mut row = json!({"is_hot": hot, "is_cold": cold});
        row[name] = json!(42.5);
        record(
            json!({"signal": [name], "alert_enabled": true, "alert_frequency": frequency}),
            vec![row],
        )
    }

    fn push(analysis: &mut Analysis, family: IndicatorFamily, name: &str, rec: AnalysisRecord) -> Coordinate {
        analysis.push("binance", "ETH/BTC", family, name, rec)
    }

    #[test]
    fn writes_status_back_and_emits_fragment() {
        let mut analysis = Analysis::new();
        let at = push(&mut analysis, IndicatorFamily::Indicators, "rsi", oscillator("rsi", true, false, "always"));

        let outcome = evaluate(&mut analysis, &LastAnalysis::new(), &AlertSettings::default());

        assert_eq!(analysis.status_at(&at), Some(Status::Hot));
        assert_eq!(outcome.fragments.len(), 1);
        let fragment = &outcome.fragments[0];
        assert_eq!(fragment.indicator, "rsi");
        assert_eq!(fragment.base_currency, "ETH");
        assert_eq!(fragment.quote_currency, "BTC");
        assert_eq!(fragment.last_status, "");
        assert_eq!(fragment.values["rsi"], json!("42.50000000"));
        assert_eq!(fragment.analysis.status, Some(Status::Hot));
    }

    #[test]
    fn neutral_status_is_recorded_without_fragment() {
        let mut analysis = Analysis::new();
        let at = push(&mut analysis, IndicatorFamily::Indicators, "mfi", oscillator("mfi", false, false, "always"));

        let outcome = evaluate(&mut analysis, &LastAnalysis::new(), &AlertSettings::default());

        assert_eq!(analysis.status_at(&at), Some(Status::Neutral));
        assert!(outcome.fragments.is_empty());
    }

    #[test]
    fn once_frequency_debounces_against_last_cycle() {
        let mut first = Analysis::new();
        push(&mut first, IndicatorFamily::Indicators, "rsi", oscillator("rsi", true, false, "once"));
        let mut last = LastAnalysis::new();
        let outcome = evaluate(&mut first, &last, &AlertSettings::default());
        assert_eq!(outcome.fragments.len(), 1);
        last.merge(first);

        let mut second = Analysis::new();
        push(&mut second, IndicatorFamily::Indicators, "rsi", oscillator("rsi", true, false, "once"));
        let outcome = evaluate(&mut second, &last, &AlertSettings::default());
        assert!(outcome.fragments.is_empty());
    }

    #[test]
    fn empty_result_is_left_unclassified() {
        let mut analysis = Analysis::new();
        let at = push(
            &mut analysis,
            IndicatorFamily::Indicators,
            "rsi",
            record(json!({"alert_enabled": true, "alert_frequency": "always"}), vec![]),
        );

        let outcome = evaluate(&mut analysis, &LastAnalysis::new(), &AlertSettings::default());
        assert_eq!(analysis.status_at(&at), None);
        assert!(outcome.fragments.is_empty());
    }

    #[test]
    fn crossover_is_paired_with_informant_instances() {
        let mut analysis = Analysis::new();
        push(&mut analysis, IndicatorFamily::Informants, "ema", record(json!({"period_count": 15}), vec![json!({"ema": 1.0})]));
        push(&mut analysis, IndicatorFamily::Informants, "ema", record(json!({"period_count": 50}), vec![json!({"ema": 0.9})]));
        push(
            &mut analysis,
            IndicatorFamily::Crossovers,
            "std_crossover",
            record(
                json!({"key_signal": "ema", "key_indicator_index": 0, "crossed_signal": "ema", "crossed_indicator_index": 1}),
                vec![json!({"ema_0": 1.0, "ema_1": 0.9, "is_hot": true, "is_cold": false})],
            ),
        );
        for name in ["rsi", "mfi"] {
            push(&mut analysis, IndicatorFamily::Indicators, name, oscillator(name, true, false, "always"));
        }

        let outcome = evaluate(&mut analysis, &LastAnalysis::new(), &AlertSettings::default());

        assert_eq!(outcome.composites.len(), 1);
        let alert = &outcome.composites[0];
        let pair = &alert.crossed["ema"];
        assert!(pair.is_hot);
        assert_eq!(pair.key_config.display_field("period_count").as_deref(), Some("15"));
        assert_eq!(pair.crossed_config.display_field("period_count").as_deref(), Some("50"));
        assert_eq!(alert.informants["ema"].config.display_field("period_count").as_deref(), Some("50"));
        // Crossovers never produce fragments of their own.
        assert_eq!(outcome.fragments.len(), 2);
    }

    #[test]
    fn composite_marks_first_eligible_as_primary() {
        let mut analysis = Analysis::new();
        for name in ["mfi", "rsi", "macd"] {
            push(&mut analysis, IndicatorFamily::Indicators, name, oscillator(name, true, false, "always"));
        }

        let outcome = evaluate(&mut analysis, &LastAnalysis::new(), &AlertSettings::default());
        let alert = &outcome.composites[0];
        assert!(alert.indicators["mfi"].primary);
        assert!(!alert.indicators["rsi"].primary);
        assert!(!alert.indicators["macd"].primary);

        let settings = AlertSettings {
            primary_marking: PrimaryMarking::AllEligible,
            ..AlertSettings::default()
        };
        let outcome = evaluate(&mut analysis, &LastAnalysis::new(), &settings);
        assert!(outcome.composites[0].indicators.values().all(|i| i.primary));
    }

    #[test]
    fn malformed_market_symbol_is_skipped() {
        let mut analysis = Analysis::new();
        analysis.push("binance", "ETHBTC", IndicatorFamily::Indicators, "rsi", oscillator("rsi", true, false, "always"));
        let outcome = evaluate(&mut analysis, &LastAnalysis::new(), &AlertSettings::default());
        assert!(outcome.fragments.is_empty());
        assert!(outcome.composites.is_empty());
    }

    #[test]
    fn markets_are_evaluated_independently() {
        let mut analysis = Analysis::new();
        analysis.push("binance", "ETH/BTC", IndicatorFamily::Indicators, "rsi", oscillator("rsi", true, false, "always"));
        analysis.push("binance", "LTC/BTC", IndicatorFamily::Indicators, "rsi", oscillator("rsi", true, false, "always"));

        let outcome = evaluate(&mut analysis, &LastAnalysis::new(), &AlertSettings::default());
        let markets: Vec<&str> = outcome.fragments.iter().map(|f| f.market.as_str()).collect();
        assert_eq!(markets, vec!["ETH/BTC", "LTC/BTC"]);
        // One primary per market is not enough for a composite.
        assert!(outcome.composites.is_empty());
    }
}
