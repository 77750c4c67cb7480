//! Previous-cycle snapshot consulted by the debounce policy.

use crate::analysis::{Analysis, Coordinate, Status};

/// The analysis recorded at the end of the previous cycle.
///
/// Empty at process start. Replaced exchange-by-exchange once per cycle
/// by [`LastAnalysis::merge`]; exchanges missing from a cycle keep their
/// older snapshot.
#[derive(Debug, Clone, Default)]
pub struct LastAnalysis {
    snapshot: Analysis,
}

impl LastAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    /// Status recorded for `at` during the previous cycle.
    pub fn status_at(&self, at: &Coordinate) -> Option<Status> {
        self.snapshot.status_at(at)
    }

    /// Fold a finished cycle into the snapshot at the exchange level.
    pub fn merge(&mut self, current: Analysis) {
        self.snapshot.merge_exchanges(current);
    }

    pub fn snapshot(&self) -> &Analysis {
        &self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisRecord, IndicatorFamily};

    fn cycle(exchange: &str, status: Status) -> (Analysis, Coordinate) {
        let mut analysis = Analysis::new();
        let record = AnalysisRecord {
            status: Some(status),
            ..AnalysisRecord::default()
        };
        let at = analysis.push(exchange, "ETH/BTC", IndicatorFamily::Indicators, "rsi", record);
        (analysis, at)
    }

    #[test]
    fn starts_empty() {
        let last = LastAnalysis::new();
        assert!(last.is_empty());
        let at = Coordinate::new("binance", "ETH/BTC", IndicatorFamily::Indicators, "rsi", 0);
        assert_eq!(last.status_at(&at), None);
    }

    #[test]
    fn merge_replaces_present_exchange() {
        let mut last = LastAnalysis::new();
        let (first, at) = cycle("binance", Status::Hot);
        last.merge(first);
        assert_eq!(last.status_at(&at), Some(Status::Hot));

        let (second, _) = cycle("binance", Status::Neutral);
        last.merge(second);
        assert_eq!(last.status_at(&at), Some(Status::Neutral));
    }

    #[test]
    fn merge_replaces_whole_exchange_not_markets() {
        let mut last = LastAnalysis::new();
        let (mut first, _) = cycle("binance", Status::Hot);
        let other = first.push(
            "binance",
            "LTC/BTC",
            IndicatorFamily::Indicators,
            "rsi",
            AnalysisRecord {
                status: Some(Status::Cold),
                ..AnalysisRecord::default()
            },
        );
        last.merge(first);
        assert_eq!(last.status_at(&other), Some(Status::Cold));

        let (second, _) = cycle("binance", Status::Hot);
        last.merge(second);
        assert_eq!(last.status_at(&other), None);
    }

    #[test]
    fn absent_exchange_is_retained_unchanged() {
        let mut last = LastAnalysis::new();
        let (bittrex, _) = cycle("bittrex", Status::Cold);
        last.merge(bittrex);
        let before = serde_json::to_string(last.snapshot().exchange("bittrex").unwrap()).unwrap();

        let (binance, _) = cycle("binance", Status::Hot);
        last.merge(binance);
        let after = serde_json::to_string(last.snapshot().exchange("bittrex").unwrap()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn merge_is_idempotent_for_unchanged_input() {
        let (analysis, _) = cycle("binance", Status::Hot);

        let mut once = LastAnalysis::new();
        once.merge(analysis.clone());

        let mut twice = LastAnalysis::new();
        twice.merge(analysis.clone());
        twice.merge(analysis);

        assert_eq!(once.snapshot(), twice.snapshot());
    }
}
