//! Status classification of an instance's latest result row.
//!
//! What comes out depends on the family:
//! - `informants` only report their raw signal values
//! - `indicators` are classified hot/cold/neutral from `is_hot`/`is_cold`
//! - `crossovers` report the key/crossed signal pair and copy the flags

use serde_json::{Map, Value};
use sigwatch_core::value::{format_signal, is_truthy};
use sigwatch_core::{AnalysisRecord, IndicatorFamily, Row, Status};

/// Indicators that are classified but never count toward the hot/cold
/// tallies. Ichimoku confirms a move rather than triggering one.
pub const TALLY_EXCLUDED: &[&str] = &["ichimoku"];

pub fn counts_toward_tally(name: &str) -> bool {
    !TALLY_EXCLUDED.contains(&name)
}

/// Classifier output for one instance.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Informant {
        values: Map<String, Value>,
    },
    Indicator {
        status: Status,
        values: Map<String, Value>,
    },
    Crossover(CrossoverReading),
}

/// The key/crossed signal pair read from a crossover's latest row.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossoverReading {
    /// Key signal name without its index suffix (e.g. `ema`).
    pub base_name: String,
    /// Suffixed signal names as they appear in the row (e.g. `ema_0`).
    pub key_signal: String,
    pub crossed_signal: String,
    pub key_value: Value,
    pub crossed_value: Value,
    pub is_hot: bool,
    pub is_cold: bool,
}

/// Classify `record` for `family`.
///
/// Returns `None` when the instance has no rows yet, or when a crossover
/// is missing its signal configuration; such instances are skipped for
/// the cycle.
pub fn classify(family: IndicatorFamily, name: &str, record: &AnalysisRecord) -> Option<Classification> {
    let row = record.latest_row()?;

    match family {
        IndicatorFamily::Informants => Some(Classification::Informant {
            values: extract_values(name, row, &record.config.signals()),
        }),
        IndicatorFamily::Indicators => Some(Classification::Indicator {
            status: Status::from_row(row),
            values: extract_values(name, row, &record.config.signals()),
        }),
        IndicatorFamily::Crossovers => read_crossover(name, record, row).map(Classification::Crossover),
    }
}

/// Pull the configured signals out of `row`, formatting floats.
fn extract_values(name: &str, row: &Row, signals: &[&str]) -> Map<String, Value> {
    let mut values = Map::new();
    for signal in signals {
        match row.get(*signal) {
            Some(value) => {
                values.insert((*signal).to_string(), format_signal(value));
            }
            None => {
                tracing::debug!(indicator = name, signal, "Signal missing from result row");
            }
        }
    }
    values
}

fn read_crossover(name: &str, record: &AnalysisRecord, row: &Row) -> Option<CrossoverReading> {
    let config = &record.config;
    let (Some(key_base), Some(key_index), Some(crossed_base), Some(crossed_index)) = (
        config.str_field("key_signal"),
        config.display_field("key_indicator_index"),
        config.str_field("crossed_signal"),
        config.display_field("crossed_indicator_index"),
    ) else {
        tracing::warn!(crossover = name, "Crossover config lacks key/crossed signal settings, skipping");
        return None;
    };

    let key_signal = format!("{key_base}_{key_index}");
    let crossed_signal = format!("{crossed_base}_{crossed_index}");

    let lookup = |signal: &str| row.get(signal).map(format_signal).unwrap_or(Value::Null);

    Some(CrossoverReading {
        base_name: key_base.to_string(),
        key_value: lookup(&key_signal),
        crossed_value: lookup(&crossed_signal),
        key_signal,
        crossed_signal,
        is_hot: row.get("is_hot").is_some_and(is_truthy),
        is_cold: row.get("is_cold").is_some_and(is_truthy),
    })
}
