use serde::Serialize;

use crate::live::LiveSnapshot;
use crate::models::{AeratorState, Reading};

/// One line of the "Sensors (Live Stream)" list.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LiveRow {
    pub id: String,
    pub captured_at_label: String,
    pub ph: f64,
    pub temperature: f64,
    pub tds: f64,
    pub turbidity: f64,
}

pub fn live_rows(readings: &[Reading]) -> Vec<LiveRow> {
    readings
        .iter()
        .map(|r| LiveRow {
            id: r.id.clone(),
            captured_at_label: r.captured_at_label.clone(),
            ph: r.ph,
            temperature: r.temperature,
            tds: r.tds,
            turbidity: r.turbidity,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub session_id: u64,
    pub entry_count: usize,
    pub latest: Option<Reading>,
    pub aerator_state: AeratorState,
    /// Label of the first reading in the current run of `aerator_state`.
    pub aerator_since: Option<String>,
    pub has_forecast: bool,
}

impl StatusSummary {
    pub fn build(snapshot: &LiveSnapshot) -> Self {
        let readings = &snapshot.readings;
        let latest = readings.last().cloned();
        let aerator_state = latest.as_ref().map(|r| r.aerator_state).unwrap_or_default();

        let aerator_since = latest.as_ref().map(|_| {
            let run_start = readings
                .iter()
                .rposition(|r| r.aerator_state != aerator_state)
                .map_or(0, |i| i + 1);
            readings[run_start].captured_at_label.clone()
        });

        Self {
            session_id: snapshot.session_id,
            entry_count: readings.len(),
            latest,
            aerator_state,
            aerator_since,
            has_forecast: snapshot.forecast.is_some(),
        }
    }
}
