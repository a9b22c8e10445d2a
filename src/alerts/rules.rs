//! Water-quality bands and the breach tracker that turns readings into
//! notifications.

use std::collections::HashMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::db::{NewNotification, NotificationLevel};
use crate::models::{AeratorState, Reading};

/// Share of the limit a value may overshoot before a warning turns critical.
const CRITICAL_MARGIN: f64 = 0.10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlertThresholds {
    pub ph_min: f64,
    pub ph_max: f64,
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub tds_max: f64,
    pub turbidity_max: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            ph_min: 6.5,
            ph_max: 8.5,
            temperature_min: 24.0,
            temperature_max: 32.0,
            tds_max: 1000.0,
            turbidity_max: 25.0,
        }
    }
}

impl AlertThresholds {
    pub fn validate(&self) -> Result<()> {
        let values = [
            self.ph_min,
            self.ph_max,
            self.temperature_min,
            self.temperature_max,
            self.tds_max,
            self.turbidity_max,
        ];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            bail!("thresholds must be finite and non-negative");
        }
        if self.ph_min >= self.ph_max {
            bail!("pH minimum must be below pH maximum");
        }
        if self.temperature_min >= self.temperature_max {
            bail!("temperature minimum must be below temperature maximum");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Direction {
    Low,
    High,
}

struct Band {
    metric: &'static str,
    label: &'static str,
    unit: &'static str,
    decimals: usize,
    value: f64,
    min: Option<f64>,
    max: Option<f64>,
}

struct Breach {
    direction: Direction,
    level: NotificationLevel,
    limit: f64,
}

impl Band {
    fn check(&self) -> Option<Breach> {
        // zero is what a missing field normalizes to; nothing to judge
        if self.value == 0.0 {
            return None;
        }

        if let Some(max) = self.max {
            if self.value > max {
                let level = severity(self.value - max, max);
                return Some(Breach { direction: Direction::High, level, limit: max });
            }
        }
        if let Some(min) = self.min {
            if self.value < min {
                let level = severity(min - self.value, min);
                return Some(Breach { direction: Direction::Low, level, limit: min });
            }
        }
        None
    }
}

fn severity(overshoot: f64, limit: f64) -> NotificationLevel {
    if overshoot > limit.abs() * CRITICAL_MARGIN {
        NotificationLevel::Critical
    } else {
        NotificationLevel::Warning
    }
}

fn bands(reading: &Reading, t: &AlertThresholds) -> [Band; 4] {
    [
        Band {
            metric: "ph",
            label: "pH",
            unit: "",
            decimals: 2,
            value: reading.ph,
            min: Some(t.ph_min),
            max: Some(t.ph_max),
        },
        Band {
            metric: "temperature",
            label: "Temperature",
            unit: " °C",
            decimals: 2,
            value: reading.temperature,
            min: Some(t.temperature_min),
            max: Some(t.temperature_max),
        },
        Band {
            metric: "tds",
            label: "TDS",
            unit: " ppm",
            decimals: 0,
            value: reading.tds,
            min: None,
            max: Some(t.tds_max),
        },
        Band {
            metric: "turbidity",
            label: "Turbidity",
            unit: " NTU",
            decimals: 2,
            value: reading.turbidity,
            min: None,
            max: Some(t.turbidity_max),
        },
    ]
}

/// Remembers which metrics are already out of band so a breach is reported
/// once when it starts (and again if it escalates), not on every reading.
#[derive(Debug, Default)]
pub struct AlertTracker {
    active: HashMap<&'static str, (Direction, NotificationLevel)>,
}

impl AlertTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.active.clear();
    }

    pub fn observe(
        &mut self,
        reading: &Reading,
        previous: Option<&Reading>,
        thresholds: &AlertThresholds,
    ) -> Vec<NewNotification> {
        let mut raised = Vec::new();

        for band in bands(reading, thresholds) {
            let Some(breach) = band.check() else {
                self.active.remove(band.metric);
                continue;
            };

            let is_new = match self.active.get(band.metric) {
                Some((direction, level)) => *direction != breach.direction || breach.level > *level,
                None => true,
            };
            self.active.insert(band.metric, (breach.direction, breach.level));

            if is_new {
                raised.push(breach_notification(&band, &breach, reading));
            }
        }

        if previous.map(|p| p.aerator_state) == Some(AeratorState::On)
            && reading.aerator_state == AeratorState::Off
        {
            raised.push(NewNotification {
                title: "Aerator stopped".into(),
                body: format!("The aerator switched OFF at {}.", reading.captured_at_label),
                level: NotificationLevel::Info,
                metric: Some("aerator".into()),
                value: None,
                reading_id: Some(reading.id.clone()),
            });
        }

        raised
    }
}

fn breach_notification(band: &Band, breach: &Breach, reading: &Reading) -> NewNotification {
    let (title_suffix, verb) = match breach.direction {
        Direction::High => ("too high", "rose to"),
        Direction::Low => ("too low", "dropped to"),
    };

    NewNotification {
        title: format!("{} {}", band.label, title_suffix),
        body: format!(
            "{} {} {:.prec$}{} (limit {:.prec$}{}).",
            band.label,
            verb,
            band.value,
            band.unit,
            breach.limit,
            band.unit,
            prec = band.decimals
        ),
        level: breach.level,
        metric: Some(band.metric.to_string()),
        value: Some(band.value),
        reading_id: Some(reading.id.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(id: &str, ph: f64, temperature: f64, aerator: AeratorState) -> Reading {
        Reading {
            id: id.to_string(),
            ph,
            temperature,
            tds: 450.0,
            turbidity: 3.0,
            aerator_state: aerator,
            observed_at_epoch_ms: 1,
            captured_at_label: "1:00:00 PM".into(),
        }
    }

    #[test]
    fn in_band_reading_raises_nothing() {
        let mut tracker = AlertTracker::new();
        let raised = tracker.observe(&reading("a", 7.2, 27.0, AeratorState::On), None, &AlertThresholds::default());
        assert!(raised.is_empty());
    }

    #[test]
    fn small_overshoot_warns_large_is_critical() {
        let thresholds = AlertThresholds::default();

        let mut tracker = AlertTracker::new();
        let warn = tracker.observe(&reading("a", 8.9, 27.0, AeratorState::On), None, &thresholds);
        assert_eq!(warn.len(), 1);
        assert_eq!(warn[0].level, NotificationLevel::Warning);
        assert_eq!(warn[0].title, "pH too high");
        assert_eq!(warn[0].body, "pH rose to 8.90 (limit 8.50).");

        let mut tracker = AlertTracker::new();
        let critical = tracker.observe(&reading("b", 7.2, 20.0, AeratorState::On), None, &thresholds);
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].level, NotificationLevel::Critical);
        assert_eq!(critical[0].metric.as_deref(), Some("temperature"));
    }

    #[test]
    fn persistent_breach_reported_once_until_escalation() {
        let thresholds = AlertThresholds::default();
        let mut tracker = AlertTracker::new();

        assert_eq!(tracker.observe(&reading("1", 8.6, 27.0, AeratorState::On), None, &thresholds).len(), 1);
        assert!(tracker.observe(&reading("2", 8.7, 27.0, AeratorState::On), None, &thresholds).is_empty());

        let escalated = tracker.observe(&reading("3", 9.9, 27.0, AeratorState::On), None, &thresholds);
        assert_eq!(escalated.len(), 1);
        assert_eq!(escalated[0].level, NotificationLevel::Critical);

        assert!(tracker.observe(&reading("4", 7.0, 27.0, AeratorState::On), None, &thresholds).is_empty());
        assert_eq!(tracker.observe(&reading("5", 8.6, 27.0, AeratorState::On), None, &thresholds).len(), 1);
    }

    #[test]
    fn missing_values_are_not_alerted() {
        let mut tracker = AlertTracker::new();
        let raised = tracker.observe(&reading("a", 0.0, 0.0, AeratorState::Off), None, &AlertThresholds::default());
        assert!(raised.is_empty());
    }

    #[test]
    fn aerator_turning_off_is_info() {
        let mut tracker = AlertTracker::new();
        let previous = reading("a", 7.2, 27.0, AeratorState::On);
        let current = reading("b", 7.2, 27.0, AeratorState::Off);

        let raised = tracker.observe(&current, Some(&previous), &AlertThresholds::default());
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].level, NotificationLevel::Info);
        assert_eq!(raised[0].reading_id.as_deref(), Some("b"));
    }

    #[test]
    fn validation_rejects_inverted_bands() {
        let mut thresholds = AlertThresholds::default();
        assert!(thresholds.validate().is_ok());
        thresholds.ph_min = 9.0;
        assert!(thresholds.validate().is_err());
        thresholds = AlertThresholds { tds_max: f64::NAN, ..AlertThresholds::default() };
        assert!(thresholds.validate().is_err());
    }
}
