use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::ingest::demo::{demo_loop, DemoGenerator};
use crate::ingest::poll::poll_loop;
use crate::ingest::push::push_loop;
use crate::ingest::{PollEndpoint, PushFeed};
use crate::live::LiveHub;

/// Which upstream feeds the live window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SourceMode {
    /// Realtime database subscription (push, replace semantics).
    #[default]
    Cloud,
    /// Local sensor server polled over HTTP (append semantics).
    Local,
    /// Synthetic generator for development.
    Demo,
}

impl SourceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMode::Cloud => "cloud",
            SourceMode::Local => "local",
            SourceMode::Demo => "demo",
        }
    }
}

/// Everything the controller needs to start any of the sources.
pub struct SourceBackends {
    pub feed: Arc<dyn PushFeed>,
    pub endpoint: Arc<dyn PollEndpoint>,
    pub topic: String,
    pub poll_interval: Duration,
    pub demo_enabled: bool,
}

struct ActiveSource {
    mode: SourceMode,
    session_id: u64,
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Runs at most one source at a time against the shared [`LiveHub`].
#[derive(Clone)]
pub struct SourceController {
    hub: LiveHub,
    backends: Arc<SourceBackends>,
    active: Arc<Mutex<Option<ActiveSource>>>,
    mode_tx: Arc<watch::Sender<Option<SourceMode>>>,
}

impl SourceController {
    pub fn new(hub: LiveHub, backends: SourceBackends) -> Self {
        let (mode_tx, _rx) = watch::channel(None);
        Self {
            hub,
            backends: Arc::new(backends),
            active: Arc::new(Mutex::new(None)),
            mode_tx: Arc::new(mode_tx),
        }
    }

    pub fn hub(&self) -> &LiveHub {
        &self.hub
    }

    pub fn demo_enabled(&self) -> bool {
        self.backends.demo_enabled
    }

    pub fn current_mode(&self) -> Option<SourceMode> {
        *self.mode_tx.borrow()
    }

    pub fn subscribe_mode(&self) -> watch::Receiver<Option<SourceMode>> {
        self.mode_tx.subscribe()
    }

    /// Tear down the running source (if any), clear the window and forecast,
    /// then start `mode` from empty. Reselecting the running mode is a no-op.
    /// Returns the session id of the running source.
    pub async fn select(&self, mode: SourceMode) -> Result<u64> {
        if mode == SourceMode::Demo && !self.backends.demo_enabled {
            bail!("demo source is disabled");
        }

        let mut guard = self.active.lock().await;
        if let Some(active) = guard.as_ref() {
            if active.mode == mode {
                return Ok(active.session_id);
            }
        }

        if let Some(previous) = guard.take() {
            if let Err(err) = self.teardown(previous).await {
                // nothing is running any more, whatever the join said
                self.mode_tx.send_replace(None);
                return Err(err);
            }
        }

        let session_id = self.hub.open_session();
        let cancel_token = CancellationToken::new();
        let handle = self.spawn_source(mode, session_id, cancel_token.clone());

        *guard = Some(ActiveSource {
            mode,
            session_id,
            cancel_token,
            handle,
        });
        self.mode_tx.send_replace(Some(mode));

        info!("source switched to {} (session {})", mode.as_str(), session_id);
        Ok(session_id)
    }

    pub async fn stop(&self) -> Result<()> {
        let previous = self.active.lock().await.take();
        if let Some(previous) = previous {
            let result = self.teardown(previous).await;
            self.mode_tx.send_replace(None);
            result?;
        }
        Ok(())
    }

    fn spawn_source(&self, mode: SourceMode, session_id: u64, cancel_token: CancellationToken) -> JoinHandle<()> {
        let hub = self.hub.clone();
        let backends = &self.backends;

        match mode {
            SourceMode::Cloud => tokio::spawn(push_loop(
                backends.feed.clone(),
                backends.topic.clone(),
                hub,
                session_id,
                cancel_token,
            )),
            SourceMode::Local => tokio::spawn(poll_loop(
                backends.endpoint.clone(),
                hub,
                session_id,
                backends.poll_interval,
                cancel_token,
            )),
            SourceMode::Demo => tokio::spawn(demo_loop(
                DemoGenerator::new(),
                hub,
                session_id,
                backends.poll_interval,
                cancel_token,
            )),
        }
    }

    /// Cancellation and session retirement happen before the join, so
    /// nothing from `previous` can land even while its task winds down.
    async fn teardown(&self, previous: ActiveSource) -> Result<()> {
        previous.cancel_token.cancel();
        self.hub.close_session(previous.session_id);

        previous
            .handle
            .await
            .with_context(|| format!("{} source task failed to join", previous.mode.as_str()))
    }
}
