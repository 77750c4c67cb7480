use std::env;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::value::{display, is_truthy};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: AlertSettings,
    /// Channel name → configuration, in dispatch order.
    #[serde(default)]
    pub notifiers: IndexMap<String, NotifierConfig>,
}

impl AppConfig {
    /// Read a YAML config file (call `load_dotenv()` first so `${VAR}`
    /// references can see `.env` values).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&raw)
    }

    /// Parse YAML, resolve `${VAR}` references in notifier settings and
    /// validate the alert settings.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let mut config: AppConfig = serde_yaml::from_str(raw)?;
        for (name, notifier) in config.notifiers.iter_mut() {
            notifier.resolve_env_refs().map_err(|reason| ConfigError::InvalidSetting {
                key: format!("notifiers.{name}"),
                reason,
            })?;
        }
        config.settings.validate()?;
        Ok(config)
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        let s = &self.settings;
        tracing::info!("Config loaded:");
        tracing::info!(
            "  thresholds:  hot={}, cold={}",
            s.max_hot_notification,
            s.max_cold_notification
        );
        tracing::info!("  period:      {}", s.period_data);
        tracing::info!("  dispatch:    timeout={}s", s.dispatch_timeout_secs);
        tracing::info!("  composite:   channels={:?}, primary={:?}", s.composite_channels, s.primary_marking);
        for (name, notifier) in &self.notifiers {
            tracing::info!("  notifier:    {name} configured={}", notifier.is_configured());
        }
    }
}

// ── Alert settings ────────────────────────────────────────────

/// How the composite alert marks its primary indicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryMarking {
    /// Only the first indicator to become eligible in a market is primary.
    #[default]
    FirstEligible,
    /// Every eligible indicator is primary.
    AllEligible,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    /// Hot indicators needed (with two primaries) to fire a composite.
    pub max_hot_notification: usize,
    /// Cold indicators needed (with two primaries) to fire a composite.
    pub max_cold_notification: usize,
    /// Candle period label shown in the composite header.
    pub period_data: String,
    /// Per-channel delivery timeout.
    pub dispatch_timeout_secs: u64,
    /// Channels that receive composite alerts.
    pub composite_channels: Vec<String>,
    pub primary_marking: PrimaryMarking,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            max_hot_notification: 2,
            max_cold_notification: 2,
            period_data: "1h".to_string(),
            dispatch_timeout_secs: 10,
            composite_channels: vec!["telegram".to_string()],
            primary_marking: PrimaryMarking::FirstEligible,
        }
    }
}

impl AlertSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "settings.dispatch_timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

// ── Notifier config ───────────────────────────────────────────

/// Per-channel configuration: credentials under `required`, display
/// options (including `template`) under `optional`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub required: Map<String, Value>,
    #[serde(default)]
    pub optional: Map<String, Value>,
}

impl NotifierConfig {
    /// A channel is enabled iff every required field is truthy.
    pub fn is_configured(&self) -> bool {
        self.required.values().all(is_truthy)
    }

    /// Required fields that are empty or missing-valued.
    pub fn missing_required(&self) -> Vec<&str> {
        self.required
            .iter()
            .filter(|(_, v)| !is_truthy(v))
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn required_str(&self, key: &str) -> Option<String> {
        self.required.get(key).map(display).filter(|s| !s.is_empty())
    }

    pub fn optional_str(&self, key: &str) -> Option<String> {
        self.optional.get(key).map(display).filter(|s| !s.is_empty())
    }

    /// A required list field; accepts a YAML list or a comma-separated string.
    pub fn required_list(&self, key: &str) -> Vec<String> {
        match self.required.get(key) {
            Some(Value::Array(items)) => items.iter().map(display).filter(|s| !s.is_empty()).collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn template(&self) -> Option<String> {
        self.optional_str("template")
    }

    fn resolve_env_refs(&mut self) -> Result<(), String> {
        for value in self.required.values_mut().chain(self.optional.values_mut()) {
            resolve_value(value)?;
        }
        Ok(())
    }
}

fn resolve_value(value: &mut Value) -> Result<(), String> {
    match value {
        Value::String(s) => {
            *s = resolve_env_vars(s)?;
        }
        Value::Array(items) => {
            for item in items {
                resolve_value(item)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Resolve `${VAR_NAME}` patterns in a string.
///
/// Unset variables resolve to an empty string so the owning channel
/// reads as unconfigured instead of failing the whole config.
pub fn resolve_env_vars(input: &str) -> Result<String, String> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            if !closed {
                return Err(format!("unclosed env var reference in: {input}"));
            }
            match env_opt(&var_name) {
                Some(value) => result.push_str(&value),
                None => {
                    tracing::debug!(var = %var_name, "Environment variable not set, resolving to empty");
                }
            }
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}
