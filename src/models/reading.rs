use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum AeratorState {
    On,
    #[default]
    Off,
}

impl AeratorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AeratorState::On => "ON",
            AeratorState::Off => "OFF",
        }
    }

    /// Only an exact `"ON"` turns the aerator on.
    pub fn from_status(value: Option<&str>) -> Self {
        match value {
            Some("ON") => AeratorState::On,
            _ => AeratorState::Off,
        }
    }
}

/// One normalized sensor sample.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub id: String,
    pub ph: f64,
    pub temperature: f64,
    pub tds: f64,
    pub turbidity: f64,
    pub aerator_state: AeratorState,
    pub observed_at_epoch_ms: i64,
    /// Display only; ordering always uses `observed_at_epoch_ms`.
    pub captured_at_label: String,
}
