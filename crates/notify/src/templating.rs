//! Minijinja template rendering for per-indicator alert fragments.
//!
//! Every channel carries its own user-authored template. The template is
//! rendered once per alert-eligible indicator instance and the fragments
//! are concatenated in traversal order into the channel's cycle message.
//!
//! The variables in [`FragmentContext`] are the whole contract a template
//! may rely on; adding fields is compatible, removing one is not.

use serde_json::{Map, Value};
use sigwatch_core::{AnalysisRecord, Status};

use crate::traits::NotifyError;

/// Template used by channels that do not configure one.
pub const DEFAULT_TEMPLATE: &str =
    "{{ exchange }}-{{ market }}-{{ indicator }}-{{ indicator_number }} is {{ status }}!{{ '\\n' }}";

/// Variables available to a fragment template.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FragmentContext {
    /// Signal name → latest value (floats pre-formatted to 8 decimals).
    pub values: Map<String, Value>,
    pub exchange: String,
    pub market: String,
    pub base_currency: String,
    pub quote_currency: String,
    pub indicator: String,
    pub indicator_number: usize,
    /// The full record, including config and classified status.
    pub analysis: AnalysisRecord,
    pub status: Status,
    /// Previous cycle's status, or `""` when there was none.
    pub last_status: String,
}

/// Renders notification templates using minijinja.
///
/// Templates are arbitrary strings from channel config, so a fresh
/// [`minijinja::Environment`] is built per render call.
#[derive(Debug)]
pub struct TemplateRenderer {
    _private: (),
}

impl TemplateRenderer {
    /// Create a new template renderer.
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Build a configured minijinja environment with custom filters and globals.
    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();

        env.add_filter("round", round_filter);
        env.add_filter("lower", lower_filter);
        env.add_filter("upper", upper_filter);

        env.add_function("env", env_function);

        env
    }

    /// Render a template string for one fragment.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if the template is invalid or
    /// rendering fails.
    pub fn render(&self, template_str: &str, ctx: &FragmentContext) -> Result<String, NotifyError> {
        let env = Self::build_env();
        env.render_str(template_str, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Render every fragment with `template_str` and concatenate the output.
    ///
    /// A fragment that fails to render is logged and skipped; the rest of
    /// the message is still produced. A template that does not parse
    /// yields an empty message.
    pub fn render_fragments(
        &self,
        channel: &str,
        template_str: &str,
        fragments: &[FragmentContext],
    ) -> String {
        if let Err(e) = self.validate(template_str) {
            tracing::warn!(channel, error = %e, "Channel template does not parse, message skipped");
            return String::new();
        }

        let mut message = String::new();
        for ctx in fragments {
            match self.render(template_str, ctx) {
                Ok(fragment) => message.push_str(&fragment),
                Err(e) => {
                    tracing::warn!(
                        channel,
                        exchange = %ctx.exchange,
                        market = %ctx.market,
                        indicator = %ctx.indicator,
                        index = ctx.indicator_number,
                        error = %e,
                        "Fragment rendering failed, skipping"
                    );
                }
            }
        }
        message
    }

    /// Validate that a template string parses without errors.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if the template has syntax errors.
    pub fn validate(&self, template_str: &str) -> Result<(), NotifyError> {
        let env = Self::build_env();
        env.template_from_str(template_str)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        Ok(())
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Custom filter: round a number to N decimal places.
///
/// Signal values arrive as pre-formatted strings, so numeric strings are
/// accepted too; anything else passes through unchanged.
fn round_filter(value: minijinja::Value, decimals: Option<u32>) -> String {
    let n = decimals.unwrap_or(0) as usize;
    let parsed = match value.as_str() {
        Some(s) => s.trim().parse::<f64>().ok(),
        None => f64::try_from(value.clone()).ok(),
    };
    match parsed {
        Some(f) => format!("{:.prec$}", f, prec = n),
        None => value.to_string(),
    }
}

/// Custom filter: lowercase a string.
fn lower_filter(value: String) -> String {
    value.to_lowercase()
}

/// Custom filter: uppercase a string.
fn upper_filter(value: String) -> String {
    value.to_uppercase()
}

/// Global function: read an environment variable by name.
///
/// Returns the variable value, or an empty string if not found.
fn env_function(name: String) -> String {
    match std::env::var(&name) {
        Ok(val) => val,
        Err(_) => {
            tracing::warn!(var = %name, "Environment variable not found, returning empty string");
            String::new()
        }
    }
}
