//! Push adapter: one live subscription, whole-snapshot replace semantics.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::live::LiveHub;
use crate::models::Reading;

use super::normalizer::normalize_reading;
use super::payload::SnapshotPayload;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

/// A subscription-style upstream that delivers whole snapshots for a topic.
#[async_trait]
pub trait PushFeed: Send + Sync {
    async fn subscribe(&self, topic: &str) -> anyhow::Result<FeedSubscription>;
}

/// Live delivery handle. Dropping it unsubscribes.
pub struct FeedSubscription {
    rx: mpsc::Receiver<Value>,
    cancel: CancellationToken,
}

impl FeedSubscription {
    /// `cancel` is fired when the subscriber goes away; the producer side
    /// should stop on it.
    pub fn new(rx: mpsc::Receiver<Value>, cancel: CancellationToken) -> Self {
        Self { rx, cancel }
    }

    /// Next snapshot, skipping any that were superseded while the caller was
    /// busy. `None` once the feed has ended.
    pub async fn next_latest(&mut self) -> Option<Value> {
        let mut snapshot = self.rx.recv().await?;
        while let Ok(newer) = self.rx.try_recv() {
            snapshot = newer;
        }
        Some(snapshot)
    }

    pub fn unsubscribe(self) {}
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.rx.close();
    }
}

/// Normalize a raw snapshot. `None` means the snapshot was empty and the
/// window must be cleared rather than merged.
pub fn readings_from_snapshot(value: &Value, captured_at: DateTime<Utc>) -> Option<Vec<Reading>> {
    let payload = SnapshotPayload::decode(Some(value));
    if payload.is_empty() {
        return None;
    }

    let readings = payload
        .into_entries()
        .into_iter()
        .map(|(id, raw)| normalize_reading(&raw, id, captured_at))
        .collect();
    Some(readings)
}

pub fn apply_snapshot(hub: &LiveHub, session_id: u64, value: &Value) -> bool {
    match readings_from_snapshot(value, Utc::now()) {
        Some(readings) => hub.replace(session_id, readings),
        None => hub.clear(session_id),
    }
}

pub async fn push_loop(
    feed: Arc<dyn PushFeed>,
    topic: String,
    hub: LiveHub,
    session_id: u64,
    cancel_token: CancellationToken,
) {
    log_info!("push adapter started on '{}' (session {})", topic, session_id);

    'outer: loop {
        let subscribed = tokio::select! {
            result = feed.subscribe(&topic) => result,
            _ = cancel_token.cancelled() => break 'outer,
        };

        let mut subscription = match subscribed {
            Ok(subscription) => subscription,
            Err(err) => {
                log_warn!("subscribe to '{}' failed: {err:#}; retrying in {}s", topic, RESUBSCRIBE_DELAY.as_secs());
                tokio::select! {
                    _ = tokio::time::sleep(RESUBSCRIBE_DELAY) => continue 'outer,
                    _ = cancel_token.cancelled() => break 'outer,
                }
            }
        };

        loop {
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => {
                    subscription.unsubscribe();
                    break 'outer;
                }
                next = subscription.next_latest() => match next {
                    Some(snapshot) => {
                        if !apply_snapshot(&hub, session_id, &snapshot) {
                            log_debug!("dropped snapshot for retired session {}", session_id);
                        }
                    }
                    None => {
                        log_warn!("feed '{}' ended; resubscribing", topic);
                        break;
                    }
                },
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(RESUBSCRIBE_DELAY) => {}
            _ = cancel_token.cancelled() => break 'outer,
        }
    }

    log_info!("push adapter stopped (session {})", session_id);
}
