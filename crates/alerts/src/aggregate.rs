//! Per-market aggregation of informant snapshots and crossed pairs.

use serde::Serialize;
use serde_json::{Map, Value};
use sigwatch_core::{AnalysisRecord, IndicatorConfig};
use thiserror::Error;

use crate::classifier::CrossoverReading;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregateError {
    #[error("crossover `{name}` needs two `{name}` informant instances, found {found}")]
    MissingInformants { name: String, found: usize },
}

/// Latest values of one informant instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InformantSnapshot {
    pub result: Map<String, Value>,
    pub config: IndicatorConfig,
}

/// A crossover between two instances of the same informant
/// (e.g. a fast and a slow EMA).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossedPair {
    /// Key signal base name, shared by both informant instances.
    pub name: String,
    pub key_value: Value,
    pub crossed_value: Value,
    pub is_hot: bool,
    pub is_cold: bool,
    /// Config of the key instance (informant index 0).
    pub key_config: IndicatorConfig,
    /// Config of the crossed instance (informant index 1).
    pub crossed_config: IndicatorConfig,
}

impl CrossedPair {
    /// Pair a crossover reading with the informant instances it refers to.
    ///
    /// The key side is the informant's first instance and the crossed side
    /// its second.
    pub fn from_reading(
        reading: CrossoverReading,
        informants: Option<&[AnalysisRecord]>,
    ) -> Result<Self, AggregateError> {
        let instances = informants.unwrap_or_default();
        let [key, crossed, ..] = instances else {
            return Err(AggregateError::MissingInformants {
                name: reading.base_name,
                found: instances.len(),
            });
        };

        Ok(Self {
            key_config: key.config.clone(),
            crossed_config: crossed.config.clone(),
            name: reading.base_name,
            key_value: reading.key_value,
            crossed_value: reading.crossed_value,
            is_hot: reading.is_hot,
            is_cold: reading.is_cold,
        })
    }
}
