use serde::{Deserialize, Serialize};

/// Latest predicted sample from the poll endpoint. Never buffered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    pub ph: f64,
    pub temperature: f64,
    pub tds: f64,
    pub turbidity: f64,
    pub observed_at_epoch_ms: i64,
}
