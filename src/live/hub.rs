//! Session-guarded owner of the live window and forecast.
//!
//! Every adapter activation gets a session id from [`LiveHub::open_session`].
//! All writes carry that id and are dropped once a newer session exists, so a
//! request still in flight when its adapter was stopped can never land in the
//! next adapter's window. Poll-style writes additionally carry a cycle
//! sequence number; a result older than the last one applied is dropped.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::watch;

use crate::models::{Forecast, Reading};

use super::window::LiveWindow;

/// What chart/table consumers see after each change.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LiveSnapshot {
    pub session_id: u64,
    pub revision: u64,
    pub capacity: usize,
    pub readings: Vec<Reading>,
    pub forecast: Option<Forecast>,
}

struct LiveState {
    session_id: u64,
    revision: u64,
    window: LiveWindow,
    forecast: Option<Forecast>,
    last_reading_seq: u64,
    last_forecast_seq: u64,
}

impl LiveState {
    fn snapshot(&self) -> LiveSnapshot {
        LiveSnapshot {
            session_id: self.session_id,
            revision: self.revision,
            capacity: self.window.capacity(),
            readings: self.window.to_vec(),
            forecast: self.forecast.clone(),
        }
    }

    fn reset(&mut self, session_id: u64) {
        self.session_id = session_id;
        self.window.clear();
        self.forecast = None;
        self.last_reading_seq = 0;
        self.last_forecast_seq = 0;
    }
}

#[derive(Clone)]
pub struct LiveHub {
    state: Arc<Mutex<LiveState>>,
    tx: Arc<watch::Sender<LiveSnapshot>>,
}

impl LiveHub {
    pub fn new(capacity: usize) -> Self {
        let state = LiveState {
            session_id: 0,
            revision: 0,
            window: LiveWindow::new(capacity),
            forecast: None,
            last_reading_seq: 0,
            last_forecast_seq: 0,
        };
        let (tx, _rx) = watch::channel(state.snapshot());

        Self {
            state: Arc::new(Mutex::new(state)),
            tx: Arc::new(tx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LiveState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn publish(&self, state: &mut LiveState) {
        state.revision += 1;
        self.tx.send_replace(state.snapshot());
    }

    pub fn subscribe(&self) -> watch::Receiver<LiveSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        self.lock().snapshot()
    }

    pub fn current_session(&self) -> u64 {
        self.lock().session_id
    }

    pub fn is_current(&self, session_id: u64) -> bool {
        self.current_session() == session_id
    }

    /// Invalidate whatever session is active, empty the window and forecast,
    /// and hand out a fresh session id.
    pub fn open_session(&self) -> u64 {
        let mut state = self.lock();
        let next = state.session_id + 1;
        state.reset(next);
        self.publish(&mut state);
        next
    }

    /// Retire `session_id` if it is still the active one. Late results for
    /// it are rejected from here on.
    pub fn close_session(&self, session_id: u64) -> bool {
        let mut state = self.lock();
        if state.session_id != session_id {
            return false;
        }
        let next = state.session_id + 1;
        state.reset(next);
        self.publish(&mut state);
        true
    }

    /// Replace semantics. Returns `false` for a stale session. Replaying the
    /// contents already shown is accepted but publishes nothing.
    pub fn replace(&self, session_id: u64, readings: Vec<Reading>) -> bool {
        let mut state = self.lock();
        if state.session_id != session_id {
            return false;
        }

        let mut next = LiveWindow::new(state.window.capacity());
        next.replace(readings);
        if state.window.same_contents(&next.to_vec()) {
            return true;
        }

        state.window = next;
        self.publish(&mut state);
        true
    }

    /// Append semantics, guarded by session and cycle sequence.
    pub fn append(&self, session_id: u64, seq: u64, reading: Reading) -> bool {
        let mut state = self.lock();
        if state.session_id != session_id || seq <= state.last_reading_seq {
            return false;
        }

        state.last_reading_seq = seq;
        state.window.append(reading);
        self.publish(&mut state);
        true
    }

    pub fn set_forecast(&self, session_id: u64, seq: u64, forecast: Forecast) -> bool {
        let mut state = self.lock();
        if state.session_id != session_id || seq <= state.last_forecast_seq {
            return false;
        }

        state.last_forecast_seq = seq;
        state.forecast = Some(forecast);
        self.publish(&mut state);
        true
    }

    pub fn clear(&self, session_id: u64) -> bool {
        let mut state = self.lock();
        if state.session_id != session_id {
            return false;
        }
        if state.window.is_empty() {
            return true;
        }

        state.window.clear();
        self.publish(&mut state);
        true
    }
}
