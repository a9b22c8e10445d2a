//! Maps raw upstream records of any shape onto [`Reading`] and [`Forecast`].
//!
//! Both backends send loosely typed JSON: numbers may arrive as strings,
//! fields may be missing, and temperature/aerator go by two names. Nothing
//! here fails; bad input coerces to zero (or `OFF`, or the capture time).

use chrono::{DateTime, Local, Utc};
use serde_json::{Map, Value};

use crate::models::{AeratorState, Forecast, Reading};

pub type RawRecord = Map<String, Value>;

const PH_KEYS: &[&str] = &["ph"];
const TEMPERATURE_KEYS: &[&str] = &["temperature", "temp"];
const TDS_KEYS: &[&str] = &["tds"];
const TURBIDITY_KEYS: &[&str] = &["turbidity"];
const AERATOR_KEYS: &[&str] = &["aerator_status", "aerator"];
const TIMESTAMP_KEY: &str = "timestamp";

const FORECAST_PH_KEY: &str = "predicted_ph";
const FORECAST_TEMPERATURE_KEY: &str = "predicted_temperature";
const FORECAST_TDS_KEY: &str = "predicted_tds";
const FORECAST_TURBIDITY_KEY: &str = "predicted_turbidity";

/// Normalize one raw reading. `id` comes from the caller (array index, map
/// key or generation time); `captured_at` stands in for a missing timestamp.
pub fn normalize_reading(raw: &RawRecord, id: impl Into<String>, captured_at: DateTime<Utc>) -> Reading {
    Reading {
        id: id.into(),
        ph: round_to(number_field(raw, PH_KEYS), 2),
        temperature: round_to(number_field(raw, TEMPERATURE_KEYS), 2),
        tds: round_to(number_field(raw, TDS_KEYS), 0),
        turbidity: round_to(number_field(raw, TURBIDITY_KEYS), 2),
        aerator_state: AeratorState::from_status(string_field(raw, AERATOR_KEYS)),
        observed_at_epoch_ms: timestamp_field(raw).unwrap_or_else(|| captured_at.timestamp_millis()),
        captured_at_label: time_label(captured_at),
    }
}

pub fn normalize_forecast(raw: &RawRecord, captured_at: DateTime<Utc>) -> Forecast {
    Forecast {
        ph: round_to(number_field(raw, &[FORECAST_PH_KEY]), 2),
        temperature: round_to(number_field(raw, &[FORECAST_TEMPERATURE_KEY]), 2),
        tds: round_to(number_field(raw, &[FORECAST_TDS_KEY]), 0),
        turbidity: round_to(number_field(raw, &[FORECAST_TURBIDITY_KEY]), 2),
        observed_at_epoch_ms: timestamp_field(raw).unwrap_or_else(|| captured_at.timestamp_millis()),
    }
}

/// Locale time-of-day label shown next to live rows, e.g. `2:05:09 PM`.
pub fn time_label(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%-I:%M:%S %p").to_string()
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(decimals);
    let rounded = (value * factor).round() / factor;
    // -0.0 prints as "-0.00"
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

fn number_field(raw: &RawRecord, keys: &[&str]) -> f64 {
    keys.iter()
        .filter_map(|key| raw.get(*key))
        .map(coerce_number)
        .find(|value| *value != 0.0)
        .unwrap_or(0.0)
}

fn string_field<'a>(raw: &'a RawRecord, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| raw.get(*key).and_then(Value::as_str))
}

fn timestamp_field(raw: &RawRecord) -> Option<i64> {
    let value = raw.get(TIMESTAMP_KEY)?;
    let millis = match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i64>().ok().or_else(|| {
                DateTime::parse_from_rfc3339(text)
                    .ok()
                    .map(|dt| dt.timestamp_millis())
            })
        }
        _ => None,
    }?;

    // zero means "not stamped" upstream
    (millis > 0).then_some(millis)
}

/// Lenient float coercion: numbers pass through, strings parse their longest
/// numeric prefix (`"26.5C"` is 26.5), everything else is zero.
pub fn coerce_number(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_float_prefix(text),
        _ => None,
    };

    parsed.filter(|value| value.is_finite()).unwrap_or(0.0)
}

fn parse_float_prefix(text: &str) -> Option<f64> {
    let text = text.trim_start();
    if let Ok(value) = text.trim_end().parse::<f64>() {
        return Some(value);
    }

    let bytes = text.as_bytes();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }

    if !seen_digit {
        return None;
    }
    text[..end].trim_end_matches('.').parse::<f64>().ok()
}
