//! Synthetic source for development without hardware. Random walk around
//! healthy pond values, delivered with poll (append) semantics.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::live::LiveHub;

use super::normalizer::{normalize_forecast, normalize_reading, RawRecord};

const ENABLE_LOGS: bool = true;

use crate::log_info;

pub struct DemoGenerator {
    rng: StdRng,
    ph: f64,
    temperature: f64,
    tds: f64,
    turbidity: f64,
    aerator_on: bool,
}

impl DemoGenerator {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng,
            ph: 7.2,
            temperature: 27.0,
            tds: 450.0,
            turbidity: 3.0,
            aerator_on: true,
        }
    }

    fn step(&mut self) {
        self.ph = (self.ph + self.rng.gen_range(-0.05..0.05)).clamp(6.0, 9.0);
        self.temperature = (self.temperature + self.rng.gen_range(-0.2..0.2)).clamp(22.0, 34.0);
        self.tds = (self.tds + self.rng.gen_range(-8.0..8.0)).clamp(200.0, 1200.0);
        self.turbidity = (self.turbidity + self.rng.gen_range(-0.3..0.3)).clamp(0.0, 40.0);
        if self.rng.gen_bool(0.1) {
            self.aerator_on = !self.aerator_on;
        }
    }

    /// Next raw record, shaped like the local endpoint's `/latest` body.
    pub fn next_raw(&mut self) -> RawRecord {
        self.step();
        let raw = json!({
            "ph": self.ph,
            "temperature": self.temperature,
            "tds": self.tds,
            "turbidity": self.turbidity,
            "aerator_status": if self.aerator_on { "ON" } else { "OFF" },
            "timestamp": Utc::now().timestamp_millis(),
        });
        into_record(raw)
    }

    /// Naive forecast: the current value nudged along a fresh random drift.
    pub fn forecast_raw(&mut self) -> RawRecord {
        let raw = json!({
            "predicted_ph": self.ph + self.rng.gen_range(-0.1..0.1),
            "predicted_temperature": self.temperature + self.rng.gen_range(-0.5..0.5),
            "predicted_tds": self.tds + self.rng.gen_range(-15.0..15.0),
            "predicted_turbidity": (self.turbidity + self.rng.gen_range(-0.5..0.5)).max(0.0),
        });
        into_record(raw)
    }
}

impl Default for DemoGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn into_record(value: Value) -> RawRecord {
    match value {
        Value::Object(map) => map,
        _ => RawRecord::new(),
    }
}

pub async fn demo_loop(
    mut generator: DemoGenerator,
    hub: LiveHub,
    session_id: u64,
    period: Duration,
    cancel_token: CancellationToken,
) {
    log_info!("demo source started (session {})", session_id);

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut seq: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {
                seq += 1;
                let captured_at = Utc::now();
                let reading = normalize_reading(
                    &generator.next_raw(),
                    format!("demo-{}", seq),
                    captured_at,
                );
                let forecast = normalize_forecast(&generator.forecast_raw(), captured_at);
                hub.append(session_id, seq, reading);
                hub.set_forecast(session_id, seq, forecast);
            }
        }
    }

    log_info!("demo source stopped (session {})", session_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::normalizer::coerce_number;
    use crate::models::AeratorState;

    #[test]
    fn generated_values_stay_in_range() {
        let mut generator = DemoGenerator::with_seed(7);
        for _ in 0..500 {
            let raw = generator.next_raw();
            let ph = coerce_number(&raw["ph"]);
            let tds = coerce_number(&raw["tds"]);
            assert!((6.0..=9.0).contains(&ph));
            assert!((200.0..=1200.0).contains(&tds));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn loop_appends_with_forecast() {
        let hub = LiveHub::new(5);
        let session = hub.open_session();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(demo_loop(
            DemoGenerator::with_seed(1),
            hub.clone(),
            session,
            Duration::from_millis(1000),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(9500)).await;
        cancel.cancel();
        handle.await.unwrap();

        let snapshot = hub.snapshot();
        assert_eq!(snapshot.readings.len(), 5);
        assert!(snapshot.forecast.is_some());
        assert!(snapshot.readings.iter().all(|r| r.id.starts_with("demo-")));
        assert!(snapshot
            .readings
            .iter()
            .all(|r| matches!(r.aerator_state, AeratorState::On | AeratorState::Off)));
    }
}
