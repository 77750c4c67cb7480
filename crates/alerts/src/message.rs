//! Fixed-format composite message.
//!
//! Unlike the per-indicator fragments, the composite message is not user
//! templated. It expects a fixed set of indicators, informants and the EMA
//! crossover; [`render_composite`] checks all of them up front and reports
//! every missing piece at once instead of failing on the first.

use serde_json::Value;
use sigwatch_core::value::display;
use sigwatch_core::Status;
use thiserror::Error;

use crate::composite::CompositeAlert;

pub const HOT_GLYPH: &str = "♨️ ";
pub const COLD_GLYPH: &str = "⛄ ";
pub const PRIMARY_GLYPH: &str = "👌 ";
pub const HEADER_GLYPH: &str = "💎";

/// Oscillators shown in the composite, by indicator name and label.
/// Each reads the signal of the same name from its values.
const OSCILLATORS: [(&str, &str); 4] = [
    ("mfi", "MFI"),
    ("rsi", "RSI"),
    ("stoch_rsi", "STOCH_RSI"),
    ("macd", "MACD"),
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompositeError {
    #[error("composite is incomplete, missing: {}", missing.join(", "))]
    Incomplete { missing: Vec<String> },
}

/// Line ending for a status line: the primary glyph for a primary hot/cold
/// indicator, otherwise the hot or cold glyph, nothing for neutral.
pub fn status_suffix(primary: bool, state: Status) -> String {
    let glyph = match state {
        Status::Hot | Status::Cold if primary => PRIMARY_GLYPH,
        Status::Hot => HOT_GLYPH,
        Status::Cold => COLD_GLYPH,
        Status::Neutral => "",
    };
    format!(" {glyph}\n")
}

/// Where the close sits inside the Bollinger bands.
///
/// Closer to the upper band than to the middle reads cold; closer to the
/// lower band than to the middle reads hot.
pub fn bollinger_state(upper: f64, middle: f64, lower: f64, close: f64) -> Status {
    if close > middle && (upper - close) < (close - middle) {
        Status::Cold
    } else if close < middle && (close - lower) < (middle - close) {
        Status::Hot
    } else {
        Status::Neutral
    }
}

struct OscillatorLine {
    label: &'static str,
    status: Status,
    value: String,
    primary: bool,
}

struct EmaLine {
    key_period: String,
    crossed_period: String,
    is_hot: bool,
}

struct Price {
    text: String,
    number: f64,
}

/// Validate `alert` and render its message.
pub fn render_composite(alert: &CompositeAlert, period_data: &str) -> Result<String, CompositeError> {
    let mut missing = Vec::new();

    let oscillators: Vec<Option<OscillatorLine>> = OSCILLATORS
        .iter()
        .map(|(name, label)| oscillator(alert, name, label, &mut missing))
        .collect();
    let close = informant_number(alert, "ohlcv", "close", &mut missing);
    let upper = informant_number(alert, "bollinger_bands", "upperband", &mut missing);
    let middle = informant_number(alert, "bollinger_bands", "middleband", &mut missing);
    let lower = informant_number(alert, "bollinger_bands", "lowerband", &mut missing);
    let ema = ema_line(alert, &mut missing);
    let ichimoku = alert.indicators.get("ichimoku");
    if ichimoku.is_none() {
        missing.push("indicators.ichimoku".to_string());
    }

    let oscillators: Option<Vec<OscillatorLine>> = oscillators.into_iter().collect();
    let (Some(oscillators), Some(close), Some(upper), Some(middle), Some(lower), Some(ema), Some(ichimoku)) =
        (oscillators, close, upper, middle, lower, ema, ichimoku)
    else {
        return Err(CompositeError::Incomplete { missing });
    };

    let mut message = format!("{HEADER_GLYPH} #{}\n", alert.name);
    message.push_str(&format!("{period_data} / {}\n", alert.exchange));
    message.push_str(&format!("#Price -- {} {} \n\n", close.text, alert.quote_currency));

    for line in &oscillators {
        message.push_str(&format!("{} - is {} ({})", line.label, line.status, line.value));
        message.push_str(&status_suffix(line.primary, line.status));
    }

    let bands = bollinger_state(upper.number, middle.number, lower.number, close.number);
    message.push_str(&format!("Bollinger Bands - is {bands}"));
    message.push_str(&status_suffix(false, bands));

    let direction = if ema.is_hot { "up" } else { "down" };
    message.push_str(&format!(
        "Moving Average (ema) {} {direction} {}",
        ema.key_period, ema.crossed_period
    ));
    message.push_str(&status_suffix(false, if ema.is_hot { Status::Hot } else { Status::Cold }));

    message.push_str(&format!("Ichimoku Cloud - is {}", ichimoku.status));
    message.push_str(&status_suffix(ichimoku.primary, ichimoku.status));

    Ok(message)
}

fn oscillator(
    alert: &CompositeAlert,
    name: &str,
    label: &'static str,
    missing: &mut Vec<String>,
) -> Option<OscillatorLine> {
    let Some(indicator) = alert.indicators.get(name) else {
        missing.push(format!("indicators.{name}"));
        return None;
    };
    let Some(value) = indicator.values.get(name) else {
        missing.push(format!("indicators.{name}.values.{name}"));
        return None;
    };
    Some(OscillatorLine {
        label,
        status: indicator.status,
        value: display(value),
        primary: indicator.primary,
    })
}

fn informant_number(
    alert: &CompositeAlert,
    informant: &str,
    field: &str,
    missing: &mut Vec<String>,
) -> Option<Price> {
    let path = format!("informants.{informant}.result.{field}");
    let Some(value) = alert
        .informants
        .get(informant)
        .and_then(|snapshot| snapshot.result.get(field))
    else {
        missing.push(path);
        return None;
    };
    let Some(number) = as_number(value) else {
        missing.push(format!("{path} (not numeric)"));
        return None;
    };
    Some(Price {
        text: display(value),
        number,
    })
}

fn ema_line(alert: &CompositeAlert, missing: &mut Vec<String>) -> Option<EmaLine> {
    let Some(pair) = alert.crossed.get("ema") else {
        missing.push("crossed.ema".to_string());
        return None;
    };
    let key_period = pair.key_config.display_field("period_count");
    let crossed_period = pair.crossed_config.display_field("period_count");
    if key_period.is_none() {
        missing.push("crossed.ema.key_config.period_count".to_string());
    }
    if crossed_period.is_none() {
        missing.push("crossed.ema.crossed_config.period_count".to_string());
    }
    Some(EmaLine {
        key_period: key_period?,
        crossed_period: crossed_period?,
        is_hot: pair.is_hot,
    })
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
