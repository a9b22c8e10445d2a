//! Poll adapter: fetch `/latest` and `/forecast` on a fixed interval,
//! append readings, replace the forecast.
//!
//! Each tick spawns its own cycle so a slow endpoint never delays the next
//! tick. Cycles may therefore overlap; the hub drops any result older than
//! the newest one already applied, and anything from a retired session.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::live::LiveHub;

use super::error::FetchError;
use super::normalizer::{normalize_forecast, normalize_reading, RawRecord};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Request/response upstream queried on a timer.
#[async_trait]
pub trait PollEndpoint: Send + Sync {
    async fn latest(&self) -> Result<RawRecord, FetchError>;
    async fn forecast(&self) -> Result<RawRecord, FetchError>;
}

pub async fn poll_loop(
    endpoint: Arc<dyn PollEndpoint>,
    hub: LiveHub,
    session_id: u64,
    period: Duration,
    cancel_token: CancellationToken,
) {
    log_info!("poll adapter started every {}ms (session {})", period.as_millis(), session_id);

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut seq: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {
                seq += 1;
                tokio::spawn(poll_cycle(endpoint.clone(), hub.clone(), session_id, seq));
            }
        }
    }

    log_info!("poll adapter stopped after {} cycles (session {})", seq, session_id);
}

/// One cycle: both requests run concurrently and land independently.
pub async fn poll_cycle(endpoint: Arc<dyn PollEndpoint>, hub: LiveHub, session_id: u64, seq: u64) {
    tokio::join!(
        apply_latest(endpoint.as_ref(), &hub, session_id, seq),
        apply_forecast(endpoint.as_ref(), &hub, session_id, seq),
    );
}

async fn apply_latest(endpoint: &dyn PollEndpoint, hub: &LiveHub, session_id: u64, seq: u64) {
    match endpoint.latest().await {
        Ok(raw) => {
            let captured_at = Utc::now();
            let id = format!("{}-{}", captured_at.timestamp_millis(), seq);
            let reading = normalize_reading(&raw, id, captured_at);
            if !hub.append(session_id, seq, reading) {
                log_debug!("discarded reading from cycle {} (session {})", seq, session_id);
            }
        }
        Err(err) => log_warn!("latest reading unavailable: {err}"),
    }
}

async fn apply_forecast(endpoint: &dyn PollEndpoint, hub: &LiveHub, session_id: u64, seq: u64) {
    match endpoint.forecast().await {
        Ok(raw) => {
            let forecast = normalize_forecast(&raw, Utc::now());
            if !hub.set_forecast(session_id, seq, forecast) {
                log_debug!("discarded forecast from cycle {} (session {})", seq, session_id);
            }
        }
        Err(err) => log_warn!("forecast unavailable: {err}"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// Serves a counter-stamped reading per call, or scripted responses.
    pub(crate) struct ScriptedEndpoint {
        calls: AtomicU64,
        latest_script: Mutex<VecDeque<(Duration, Result<Value, String>)>>,
        forecast_script: Mutex<VecDeque<Result<Value, String>>>,
        delay: Duration,
    }

    impl ScriptedEndpoint {
        pub(crate) fn counting() -> Self {
            Self::with_delay(Duration::ZERO)
        }

        pub(crate) fn with_delay(delay: Duration) -> Self {
            Self {
                calls: AtomicU64::new(0),
                latest_script: Mutex::new(VecDeque::new()),
                forecast_script: Mutex::new(VecDeque::new()),
                delay,
            }
        }

        pub(crate) fn script(self, steps: Vec<(Duration, Result<Value, String>)>) -> Self {
            *self.latest_script.lock().unwrap() = steps.into();
            self
        }

        pub(crate) fn script_forecast(self, steps: Vec<Result<Value, String>>) -> Self {
            *self.forecast_script.lock().unwrap() = steps.into();
            self
        }

        pub(crate) fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn to_record(value: Value) -> Result<RawRecord, FetchError> {
        match value {
            Value::Object(map) if map.contains_key("error") => {
                Err(FetchError::Upstream(map["error"].to_string()))
            }
            Value::Object(map) => Ok(map),
            other => Err(FetchError::Decode(other.to_string())),
        }
    }

    #[async_trait]
    impl PollEndpoint for ScriptedEndpoint {
        async fn latest(&self) -> Result<RawRecord, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let scripted = self.latest_script.lock().unwrap().pop_front();
            match scripted {
                Some((delay, outcome)) => {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    outcome.map_err(FetchError::Transport).and_then(to_record)
                }
                None => {
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    to_record(json!({"ph": 7.0, "temperature": 26.5, "tds": n, "turbidity": 1.0, "timestamp": n}))
                }
            }
        }

        async fn forecast(&self) -> Result<RawRecord, FetchError> {
            let scripted = self.forecast_script.lock().unwrap().pop_front();
            if let Some(outcome) = scripted {
                return outcome.map_err(FetchError::Transport).and_then(to_record);
            }
            to_record(json!({"predicted_ph": 7.3, "predicted_temperature": 27.0, "predicted_tds": 480, "predicted_turbidity": 2.0}))
        }
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_poll_is_immediate_then_on_interval() {
        let endpoint = Arc::new(ScriptedEndpoint::counting());
        let hub = LiveHub::new(20);
        let session = hub.open_session();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(poll_loop(endpoint.clone(), hub.clone(), session, Duration::from_millis(3000), cancel.clone()));
        settle().await;
        assert_eq!(endpoint.calls(), 1);
        assert_eq!(hub.snapshot().readings.len(), 1);
        assert!(hub.snapshot().forecast.is_some());

        tokio::time::sleep(Duration::from_millis(3000)).await;
        settle().await;
        assert_eq!(endpoint.calls(), 2);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn twenty_five_polls_keep_newest_twenty() {
        let endpoint = Arc::new(ScriptedEndpoint::counting());
        let hub = LiveHub::new(20);
        let session = hub.open_session();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(poll_loop(endpoint.clone(), hub.clone(), session, Duration::from_millis(3000), cancel.clone()));

        let mut lengths = Vec::new();
        for i in 0..25 {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(3000)).await;
            }
            settle().await;
            lengths.push(hub.snapshot().readings.len());
        }
        cancel.cancel();
        handle.await.unwrap();

        assert!(lengths.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(lengths[24], 20);
        let tds: Vec<f64> = hub.snapshot().readings.iter().map(|r| r.tds).collect();
        let expected: Vec<f64> = (6..=25).map(|n| n as f64).collect();
        assert_eq!(tds, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn error_body_leaves_window_unchanged() {
        let endpoint = Arc::new(ScriptedEndpoint::counting().script(vec![
            (Duration::ZERO, Ok(json!({"ph": 7.1, "timestamp": 1}))),
            (Duration::ZERO, Ok(json!({"error": "x"}))),
            (Duration::ZERO, Err("connection refused".into())),
        ]));
        let hub = LiveHub::new(20);
        let session = hub.open_session();

        poll_cycle(endpoint.clone(), hub.clone(), session, 1).await;
        let before = hub.snapshot().readings;
        assert_eq!(before.len(), 1);

        poll_cycle(endpoint.clone(), hub.clone(), session, 2).await;
        assert_eq!(hub.snapshot().readings, before);

        poll_cycle(endpoint.clone(), hub.clone(), session, 3).await;
        assert_eq!(hub.snapshot().readings, before);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_forecast_keeps_previous_one() {
        let endpoint = Arc::new(ScriptedEndpoint::counting().script_forecast(vec![
            Ok(json!({"predicted_ph": 7.4, "predicted_tds": 510, "timestamp": 42})),
            Ok(json!({"error": "model offline"})),
            Err("timed out".into()),
        ]));
        let hub = LiveHub::new(20);
        let session = hub.open_session();

        poll_cycle(endpoint.clone(), hub.clone(), session, 1).await;
        let first = hub.snapshot().forecast.unwrap();
        assert_eq!(first.ph, 7.4);
        assert_eq!(first.observed_at_epoch_ms, 42);

        poll_cycle(endpoint.clone(), hub.clone(), session, 2).await;
        poll_cycle(endpoint.clone(), hub.clone(), session, 3).await;

        let snapshot = hub.snapshot();
        assert_eq!(snapshot.forecast, Some(first));
        // readings kept flowing while the forecast was failing
        assert_eq!(snapshot.readings.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_cycles_never_apply_out_of_order() {
        // Cycle 1 is slow, cycle 2 answers first.
        let endpoint = Arc::new(ScriptedEndpoint::counting().script(vec![
            (Duration::from_millis(5000), Ok(json!({"tds": 1, "timestamp": 1}))),
            (Duration::from_millis(100), Ok(json!({"tds": 2, "timestamp": 2}))),
        ]));
        let hub = LiveHub::new(20);
        let session = hub.open_session();

        let slow = tokio::spawn(poll_cycle(endpoint.clone(), hub.clone(), session, 1));
        settle().await;
        let fast = tokio::spawn(poll_cycle(endpoint.clone(), hub.clone(), session, 2));

        fast.await.unwrap();
        slow.await.unwrap();

        let tds: Vec<f64> = hub.snapshot().readings.iter().map(|r| r.tds).collect();
        assert_eq!(tds, vec![2.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_result_is_dropped_after_stop() {
        let endpoint = Arc::new(ScriptedEndpoint::with_delay(Duration::from_millis(2000)));
        let hub = LiveHub::new(20);
        let session = hub.open_session();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(poll_loop(endpoint.clone(), hub.clone(), session, Duration::from_millis(3000), cancel.clone()));
        settle().await;
        assert_eq!(endpoint.calls(), 1);

        cancel.cancel();
        hub.close_session(session);
        handle.await.unwrap();

        tokio::time::sleep(Duration::from_millis(5000)).await;
        settle().await;
        assert!(hub.snapshot().readings.is_empty());
        assert_eq!(endpoint.calls(), 1);
    }
}
