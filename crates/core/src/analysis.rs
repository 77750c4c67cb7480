//! Analysis data model produced by the upstream indicator pipeline.
//!
//! One cycle of analysis is a nested, insertion-ordered structure:
//! exchange → market → family → indicator name → list of configured
//! instances. Each instance carries its config and a tabular result
//! (rows of signal values); only the last row is ever consulted.
//!
//! Lookups go through a typed [`Coordinate`] instead of repeated
//! string indexing.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::value::is_truthy;

/// One row of an indicator's tabular result, signal name → value.
pub type Row = Map<String, Value>;

/// Indicator name → configured instances (position = instance index).
pub type FamilyAnalysis = IndexMap<String, Vec<AnalysisRecord>>;

/// Family → indicators for one market.
pub type MarketAnalysis = IndexMap<IndicatorFamily, FamilyAnalysis>;

/// Market (`BASE/QUOTE`) → analysis for one exchange.
pub type ExchangeAnalysis = IndexMap<String, MarketAnalysis>;

// ── Enums ───────────────────────────────────────────────────────────

/// Indicator family; selects the classification/aggregation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorFamily {
    Indicators,
    Informants,
    Crossovers,
}

impl IndicatorFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorFamily::Indicators => "indicators",
            IndicatorFamily::Informants => "informants",
            IndicatorFamily::Crossovers => "crossovers",
        }
    }
}

impl fmt::Display for IndicatorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified state of an indicator instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Hot,
    Cold,
    #[default]
    Neutral,
}

impl Status {
    /// Classify a result row by its `is_hot` / `is_cold` flags.
    ///
    /// `is_hot` wins when both are set.
    pub fn from_row(row: &Row) -> Self {
        if row.get("is_hot").is_some_and(is_truthy) {
            Status::Hot
        } else if row.get("is_cold").is_some_and(is_truthy) {
            Status::Cold
        } else {
            Status::Neutral
        }
    }

    /// Hot and cold are the only states that can raise an alert.
    pub fn is_alertable(&self) -> bool {
        matches!(self, Status::Hot | Status::Cold)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Hot => "hot",
            Status::Cold => "cold",
            Status::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Coordinate ──────────────────────────────────────────────────────

/// Fully qualified address of one indicator instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    pub exchange: String,
    pub market: String,
    pub family: IndicatorFamily,
    pub name: String,
    pub index: usize,
}

impl Coordinate {
    pub fn new(
        exchange: impl Into<String>,
        market: impl Into<String>,
        family: IndicatorFamily,
        name: impl Into<String>,
        index: usize,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            market: market.into(),
            family,
            name: name.into(),
            index,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}[{}]",
            self.exchange, self.market, self.family, self.name, self.index
        )
    }
}

/// Split a `BASE/QUOTE` market symbol.
pub fn split_market(market: &str) -> Option<(&str, &str)> {
    let (base, quote) = market.split_once('/')?;
    if base.is_empty() || quote.is_empty() || quote.contains('/') {
        return None;
    }
    Some((base, quote))
}

// ── Indicator config ────────────────────────────────────────────────

/// Free-form per-instance configuration mapping.
///
/// Carries the alert policy (`alert_enabled`, `alert_frequency`), the
/// `signal` names of interest, and family-specific keys such as
/// `key_signal` / `crossed_signal` for crossovers or `period_count`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndicatorConfig(pub Map<String, Value>);

impl IndicatorConfig {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Signal names listed under `signal`. A bare string counts as one.
    pub fn signals(&self) -> Vec<&str> {
        match self.0.get("signal") {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(s)) => vec![s.as_str()],
            _ => Vec::new(),
        }
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Render a scalar field as text (`period_count: 50` → `"50"`).
    pub fn display_field(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl From<Map<String, Value>> for IndicatorConfig {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// ── Analysis record ─────────────────────────────────────────────────

/// One indicator instance's computation for the current cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub config: IndicatorConfig,
    #[serde(default)]
    pub result: Vec<Row>,
    /// Written back by the classifier; absent until classified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl AnalysisRecord {
    pub fn new(config: IndicatorConfig, result: Vec<Row>) -> Self {
        Self {
            config,
            result,
            status: None,
        }
    }

    /// The row every decision is based on.
    pub fn latest_row(&self) -> Option<&Row> {
        self.result.last()
    }
}

// ── Analysis ────────────────────────────────────────────────────────

/// One full cycle of analysis, keyed exchange-first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Analysis {
    exchanges: IndexMap<String, ExchangeAnalysis>,
}

impl Analysis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(input: &str) -> serde_json::Result<Self> {
        serde_json::from_str(input)
    }

    /// Append an instance under `name`, returning its coordinate.
    pub fn push(
        &mut self,
        exchange: &str,
        market: &str,
        family: IndicatorFamily,
        name: &str,
        record: AnalysisRecord,
    ) -> Coordinate {
        let instances = self
            .exchanges
            .entry(exchange.to_string())
            .or_default()
            .entry(market.to_string())
            .or_default()
            .entry(family)
            .or_default()
            .entry(name.to_string())
            .or_default();
        instances.push(record);
        Coordinate::new(exchange, market, family, name, instances.len() - 1)
    }

    pub fn get(&self, at: &Coordinate) -> Option<&AnalysisRecord> {
        self.exchanges
            .get(&at.exchange)?
            .get(&at.market)?
            .get(&at.family)?
            .get(&at.name)?
            .get(at.index)
    }

    pub fn get_mut(&mut self, at: &Coordinate) -> Option<&mut AnalysisRecord> {
        self.exchanges
            .get_mut(&at.exchange)?
            .get_mut(&at.market)?
            .get_mut(&at.family)?
            .get_mut(&at.name)?
            .get_mut(at.index)
    }

    /// Status recorded at `at`, if the instance exists and was classified.
    pub fn status_at(&self, at: &Coordinate) -> Option<Status> {
        self.get(at).and_then(|record| record.status)
    }

    /// Instances of an informant for one market, in configuration order.
    pub fn informants(&self, exchange: &str, market: &str, name: &str) -> Option<&[AnalysisRecord]> {
        self.exchanges
            .get(exchange)?
            .get(market)?
            .get(&IndicatorFamily::Informants)?
            .get(name)
            .map(Vec::as_slice)
    }

    pub fn exchanges(&self) -> impl Iterator<Item = (&String, &ExchangeAnalysis)> {
        self.exchanges.iter()
    }

    pub fn exchange(&self, name: &str) -> Option<&ExchangeAnalysis> {
        self.exchanges.get(name)
    }

    pub fn exchange_names(&self) -> impl Iterator<Item = &str> {
        self.exchanges.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// Every instance coordinate in traversal order
    /// (exchange, market, family, indicator, index).
    pub fn coordinates(&self) -> Vec<Coordinate> {
        let mut out = Vec::new();
        for (exchange, markets) in &self.exchanges {
            for (market, families) in markets {
                for (family, indicators) in families {
                    for (name, instances) in indicators {
                        for index in 0..instances.len() {
                            out.push(Coordinate::new(exchange, market, *family, name, index));
                        }
                    }
                }
            }
        }
        out
    }

    /// Replace whole exchanges with the ones in `newer`.
    ///
    /// Exchanges absent from `newer` are left untouched; exchanges present
    /// are swapped wholesale, never deep-merged.
    pub fn merge_exchanges(&mut self, newer: Analysis) {
        for (exchange, markets) in newer.exchanges {
            self.exchanges.insert(exchange, markets);
        }
    }
}
