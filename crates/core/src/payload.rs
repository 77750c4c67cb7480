//! Transport-safe mirror of an analysis for structured channels.

use serde_json::{Map, Value};

use crate::analysis::Analysis;

/// Mirror `analysis` as JSON with every instance collapsed to its last row.
///
/// An instance with no rows becomes `""`. Config and status are dropped;
/// the payload is exchange → market → family → indicator → `[row, ...]`.
pub fn collapse_to_latest(analysis: &Analysis) -> Value {
    let mut exchanges = Map::new();
    for (exchange, markets) in analysis.exchanges() {
        let mut market_map = Map::new();
        for (market, families) in markets {
            let mut family_map = Map::new();
            for (family, indicators) in families {
                let mut indicator_map = Map::new();
                for (name, instances) in indicators {
                    let rows = instances
                        .iter()
                        .map(|record| match record.latest_row() {
                            Some(row) => Value::Object(row.clone()),
                            None => Value::String(String::new()),
                        })
                        .collect();
                    indicator_map.insert(name.clone(), Value::Array(rows));
                }
                family_map.insert(family.as_str().to_string(), Value::Object(indicator_map));
            }
            market_map.insert(market.clone(), Value::Object(family_map));
        }
        exchanges.insert(exchange.clone(), Value::Object(market_map));
    }
    Value::Object(exchanges)
}
