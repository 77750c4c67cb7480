//! Per-instance debounce policy.
//!
//! Each indicator instance carries `alert_enabled` and `alert_frequency`
//! in its config. `always` alerts on every alertable cycle; `once` alerts
//! only when the status differs from the previous cycle's.
//!
//! A missing or malformed field never blocks an alert: any fault in
//! either field allows the alert outright, whatever the other field says,
//! and each fault is logged.

use serde_json::Value;
use sigwatch_core::{Coordinate, IndicatorConfig, Status};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertFrequency {
    Always,
    Once,
}

impl AlertFrequency {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "always" => Some(AlertFrequency::Always),
            "once" => Some(AlertFrequency::Once),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyFault {
    #[error("alert_enabled is missing")]
    MissingEnabled,

    #[error("alert_enabled must be a boolean, got {0}")]
    InvalidEnabled(Value),

    #[error("alert_frequency is missing")]
    MissingFrequency,

    #[error("alert_frequency must be \"always\" or \"once\", got {0}")]
    InvalidFrequency(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPolicy {
    pub enabled: bool,
    pub frequency: AlertFrequency,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency: AlertFrequency::Always,
        }
    }
}

impl AlertPolicy {
    /// Read the policy from an instance config, collecting faults for
    /// fields that had to fall back.
    pub fn from_config(config: &IndicatorConfig) -> (Self, Vec<PolicyFault>) {
        let mut policy = Self::default();
        let mut faults = Vec::new();

        match config.get("alert_enabled") {
            Some(Value::Bool(enabled)) => policy.enabled = *enabled,
            Some(other) => faults.push(PolicyFault::InvalidEnabled(other.clone())),
            None => faults.push(PolicyFault::MissingEnabled),
        }

        match config.get("alert_frequency") {
            Some(raw) => match raw.as_str().and_then(AlertFrequency::parse) {
                Some(frequency) => policy.frequency = frequency,
                None => faults.push(PolicyFault::InvalidFrequency(raw.clone())),
            },
            None => faults.push(PolicyFault::MissingFrequency),
        }

        (policy, faults)
    }

    /// Whether `current` passes this policy given the previous status.
    ///
    /// Only decides debounce and enablement; the caller checks that the
    /// status is alertable at all.
    pub fn allows(&self, current: Status, last: Option<Status>) -> bool {
        if !self.enabled {
            return false;
        }
        match self.frequency {
            AlertFrequency::Always => true,
            AlertFrequency::Once => last != Some(current),
        }
    }
}

/// Whether the instance at `at` should contribute an alert this cycle.
pub fn is_eligible(at: &Coordinate, config: &IndicatorConfig, current: Status, last: Option<Status>) -> bool {
    if !current.is_alertable() {
        return false;
    }

    let (policy, faults) = AlertPolicy::from_config(config);
    if !faults.is_empty() {
        for fault in &faults {
            tracing::warn!(instance = %at, error = %fault, "Alert policy fault, failing open");
        }
        return true;
    }

    policy.allows(current, last)
}
