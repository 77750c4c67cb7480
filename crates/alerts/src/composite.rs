//! Per-market composite alert and the trigger that decides whether it fires.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use sigwatch_core::{AlertSettings, IndicatorConfig, PrimaryMarking, Status};

use crate::aggregate::{CrossedPair, InformantSnapshot};
use crate::classifier::counts_toward_tally;

/// Classified `indicators` instance as carried by the composite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonIndicator {
    pub values: Map<String, Value>,
    pub indicator_number: usize,
    pub config: IndicatorConfig,
    pub status: Status,
    pub last_status: Option<Status>,
    /// Credited as a trigger of this market's composite.
    pub primary: bool,
}

/// Everything known about one market in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeAlert {
    /// `BASE` + `QUOTE`, e.g. `ETHBTC`.
    pub name: String,
    pub exchange: String,
    pub market: String,
    pub base_currency: String,
    pub quote_currency: String,
    pub crossed: IndexMap<String, CrossedPair>,
    pub informants: IndexMap<String, InformantSnapshot>,
    /// Keyed by indicator name; a later instance of the same indicator
    /// replaces an earlier one.
    pub indicators: IndexMap<String, JsonIndicator>,
}

impl CompositeAlert {
    pub fn new(exchange: &str, market: &str, base: &str, quote: &str) -> Self {
        Self {
            name: format!("{base}{quote}"),
            exchange: exchange.to_string(),
            market: market.to_string(),
            base_currency: base.to_string(),
            quote_currency: quote.to_string(),
            crossed: IndexMap::new(),
            informants: IndexMap::new(),
            indicators: IndexMap::new(),
        }
    }

    /// Dispatch key for this market, `exchange:market`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.exchange, self.market)
    }
}

/// Hot/cold tallies and primary indicators for one market.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositeTrigger {
    pub hot_count: usize,
    pub cold_count: usize,
    pub primary_indicators: Vec<String>,
}

impl CompositeTrigger {
    /// Count a classified indicator toward the tallies.
    pub fn record_status(&mut self, name: &str, status: Status) {
        if !counts_toward_tally(name) {
            return;
        }
        match status {
            Status::Hot => self.hot_count += 1,
            Status::Cold => self.cold_count += 1,
            Status::Neutral => {}
        }
    }

    /// Record an alert-eligible indicator and return whether it is marked
    /// primary under `marking`.
    pub fn record_eligible(&mut self, name: &str, marking: PrimaryMarking) -> bool {
        let primary = match marking {
            PrimaryMarking::FirstEligible => self.primary_indicators.is_empty(),
            PrimaryMarking::AllEligible => true,
        };
        self.primary_indicators.push(name.to_string());
        primary
    }

    pub fn fires(&self, settings: &AlertSettings) -> bool {
        self.primary_indicators.len() >= 2
            && (self.hot_count >= settings.max_hot_notification
                || self.cold_count >= settings.max_cold_notification)
    }
}
