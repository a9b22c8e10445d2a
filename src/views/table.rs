use chrono::{Local, TimeZone};
use serde::Serialize;

use crate::models::Reading;

use super::recent;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    pub id: String,
    pub date_time: String,
    pub ph: String,
    pub temperature: String,
    pub tds: String,
    pub turbidity: String,
    pub aerator: String,
}

/// Newest first, labelled in the device's local time.
pub fn table_rows(readings: &[Reading], depth: usize) -> Vec<TableRow> {
    table_rows_in(readings, depth, &Local)
}

pub fn table_rows_in<Tz: TimeZone>(readings: &[Reading], depth: usize, tz: &Tz) -> Vec<TableRow>
where
    Tz::Offset: std::fmt::Display,
{
    recent(readings, depth)
        .iter()
        .rev()
        .map(|r| TableRow {
            id: r.id.clone(),
            date_time: date_time_label(r.observed_at_epoch_ms, tz),
            ph: format!("{:.2}", r.ph),
            temperature: format!("{:.2}", r.temperature),
            tds: format!("{:.0}", r.tds),
            turbidity: format!("{:.2}", r.turbidity),
            aerator: r.aerator_state.as_str().to_string(),
        })
        .collect()
}

fn date_time_label<Tz: TimeZone>(epoch_ms: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    tz.timestamp_millis_opt(epoch_ms)
        .single()
        .map(|dt| dt.format("%b %-d %H:%M").to_string())
        .unwrap_or_default()
}
