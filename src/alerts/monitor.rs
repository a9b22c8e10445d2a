//! Background worker that watches the live window and records notifications.

use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::db::{Database, Notification};
use crate::live::LiveSnapshot;
use crate::settings::SettingsStore;

use super::rules::AlertTracker;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

const EVENT_BUFFER: usize = 32;

pub struct AlertMonitor {
    cancel_token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<Notification>,
}

impl AlertMonitor {
    pub fn spawn(live_rx: watch::Receiver<LiveSnapshot>, db: Database, settings: Arc<SettingsStore>) -> Self {
        let cancel_token = CancellationToken::new();
        let (events, _rx) = broadcast::channel(EVENT_BUFFER);

        let handle = tokio::spawn(monitor_loop(
            live_rx,
            db,
            settings,
            events.clone(),
            cancel_token.clone(),
        ));

        Self {
            cancel_token,
            handle: Mutex::new(Some(handle)),
            events,
        }
    }

    /// Notifications as they are stored.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.events.subscribe()
    }

    pub async fn shutdown(&self) {
        self.cancel_token.cancel();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                log_error!("alert monitor failed to join: {err}");
            }
        }
    }
}

async fn monitor_loop(
    mut live_rx: watch::Receiver<LiveSnapshot>,
    db: Database,
    settings: Arc<SettingsStore>,
    events: broadcast::Sender<Notification>,
    cancel_token: CancellationToken,
) {
    let mut tracker = AlertTracker::new();
    let mut session_id = live_rx.borrow().session_id;
    let mut last_newest: Option<String> = None;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            changed = live_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        let (readings, snapshot_session) = {
            let snapshot = live_rx.borrow_and_update();
            let tail: Vec<_> = snapshot.readings.iter().rev().take(2).cloned().collect();
            (tail, snapshot.session_id)
        };

        if snapshot_session != session_id {
            session_id = snapshot_session;
            tracker.reset();
            last_newest = None;
        }

        let Some(newest) = readings.first() else {
            continue;
        };
        if last_newest.as_deref() == Some(newest.id.as_str()) {
            continue;
        }
        last_newest = Some(newest.id.clone());

        let raised = tracker.observe(newest, readings.get(1), &settings.alert_thresholds());
        for new in raised {
            match db.insert_notification(new).await {
                Ok(notification) => {
                    log_info!("alert raised: {} ({})", notification.title, notification.level.as_str());
                    let _ = events.send(notification);
                }
                Err(err) => log_error!("failed to store notification: {err:#}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NotificationLevel;
    use crate::live::LiveHub;
    use crate::models::{AeratorState, Reading};

    fn reading(id: &str, ph: f64, observed_at: i64) -> Reading {
        Reading {
            id: id.to_string(),
            ph,
            temperature: 27.0,
            tds: 450.0,
            turbidity: 3.0,
            aerator_state: AeratorState::On,
            observed_at_epoch_ms: observed_at,
            captured_at_label: String::new(),
        }
    }

    #[tokio::test]
    async fn breach_is_stored_and_broadcast_once() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("alerts.sqlite3")).unwrap();
        let settings = Arc::new(SettingsStore::new(dir.path().join("settings.json")).unwrap());
        let hub = LiveHub::new(20);
        let session = hub.open_session();

        let monitor = AlertMonitor::spawn(hub.subscribe(), db.clone(), settings);
        let mut events = monitor.subscribe();

        hub.append(session, 1, reading("ok", 7.0, 1));
        hub.append(session, 2, reading("high", 9.6, 2));

        let notification = events.recv().await.unwrap();
        assert_eq!(notification.level, NotificationLevel::Critical);
        assert_eq!(notification.reading_id.as_deref(), Some("high"));

        // replaying the same window must not raise again
        hub.replace(session, vec![reading("ok", 7.0, 1), reading("high", 9.6, 2)]);
        hub.append(session, 3, reading("still-high", 9.7, 3));
        hub.append(session, 4, reading("calm", 7.1, 4));
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        monitor.shutdown().await;
        let stored = db.list_notifications(10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, notification.id);
    }
}
