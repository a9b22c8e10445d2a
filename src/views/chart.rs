use serde::Serialize;

use crate::models::Reading;

use super::recent;

/// Headroom above the tallest point.
const MAX_VALUE_HEADROOM: f64 = 1.05;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub value: f64,
    pub observed_at_epoch_ms: i64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub ph: Vec<ChartPoint>,
    pub temperature: Vec<ChartPoint>,
    pub tds: Vec<ChartPoint>,
    pub turbidity: Vec<ChartPoint>,
    pub max_value: f64,
}

impl ChartSeries {
    pub fn build(readings: &[Reading], depth: usize) -> Self {
        let last = recent(readings, depth);
        let series = |value: fn(&Reading) -> f64| -> Vec<ChartPoint> {
            last.iter()
                .map(|r| ChartPoint {
                    value: value(r),
                    observed_at_epoch_ms: r.observed_at_epoch_ms,
                })
                .collect()
        };

        let tallest = last
            .iter()
            .flat_map(|r| [r.ph, r.temperature, r.tds, r.turbidity])
            .fold(0.0_f64, f64::max);

        Self {
            ph: series(|r| r.ph),
            temperature: series(|r| r.temperature),
            tds: series(|r| r.tds),
            turbidity: series(|r| r.turbidity),
            max_value: (tallest * MAX_VALUE_HEADROOM).ceil(),
        }
    }

    pub fn len(&self) -> usize {
        self.ph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ph.is_empty()
    }
}
