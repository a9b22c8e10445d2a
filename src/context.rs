//! The application context: every long-lived service, created once at
//! startup and shut down on exit.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::{info, warn};

use crate::alerts::AlertMonitor;
use crate::auth::{AuthError, AuthProvider, AuthSession, FirebaseAuth, User};
use crate::config::AppConfig;
use crate::db::Database;
use crate::ingest::{FirebaseFeed, HttpPollEndpoint, PollEndpoint, PushFeed};
use crate::live::LiveHub;
use crate::settings::SettingsStore;
use crate::source::{SourceBackends, SourceController, SourceMode};
use crate::views::LiveViews;

/// The remote services the context talks to.
pub struct Collaborators {
    pub feed: Arc<dyn PushFeed>,
    pub endpoint: Arc<dyn PollEndpoint>,
    pub auth: Arc<dyn AuthProvider>,
}

impl Collaborators {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let feed = FirebaseFeed::new(&config.firebase_db_url, None)
            .context("failed to build realtime database client")?;
        let endpoint = HttpPollEndpoint::new(&config.poll_base_url, config.request_timeout)
            .context("failed to build poll client")?;
        let auth = FirebaseAuth::new(&config.firebase_api_key, config.request_timeout)
            .context("failed to build auth client")?;

        Ok(Self {
            feed: Arc::new(feed),
            endpoint: Arc::new(endpoint),
            auth: Arc::new(auth),
        })
    }
}

pub struct AppContext {
    pub config: AppConfig,
    pub settings: Arc<SettingsStore>,
    pub db: Database,
    pub hub: LiveHub,
    pub sources: SourceController,
    pub auth: AuthSession,
    pub alerts: AlertMonitor,
}

impl AppContext {
    /// Must be called from inside a tokio runtime.
    pub fn start(config: AppConfig, data_dir: &Path) -> Result<Self> {
        let collaborators = Collaborators::from_config(&config)?;
        Self::with_collaborators(config, data_dir, collaborators)
    }

    pub fn with_collaborators(
        config: AppConfig,
        data_dir: &Path,
        collaborators: Collaborators,
    ) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let db = Database::new(data_dir.join("aquawatch.sqlite3"))?;
        let settings = Arc::new(SettingsStore::new(data_dir.join("settings.json"))?);
        let hub = LiveHub::new(config.window_capacity);

        let sources = SourceController::new(
            hub.clone(),
            SourceBackends {
                feed: collaborators.feed,
                endpoint: collaborators.endpoint,
                topic: config.feed_topic.clone(),
                poll_interval: config.poll_interval,
                demo_enabled: config.debug,
            },
        );
        let auth = AuthSession::new(collaborators.auth);
        let alerts = AlertMonitor::spawn(hub.subscribe(), db.clone(), settings.clone());

        info!(
            "context ready (window {}, poll every {:?}, debug {})",
            config.window_capacity, config.poll_interval, config.debug
        );

        Ok(Self {
            config,
            settings,
            db,
            hub,
            sources,
            auth,
            alerts,
        })
    }

    pub fn live_views(&self) -> LiveViews {
        LiveViews::build(self.hub.snapshot(), self.config.chart_depth)
    }

    /// Switch sources. Only a signed-in user (guest included) may do this;
    /// the choice is remembered for the next sign-in.
    pub async fn select_source(&self, mode: SourceMode) -> Result<u64> {
        if !self.auth.is_signed_in() {
            bail!("sign in to choose a data source");
        }
        let session_id = self.sources.select(mode).await?;
        self.settings.set_source_mode(mode)?;
        Ok(session_id)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let user = self.auth.sign_in(email, password).await?;
        self.resume_source().await;
        Ok(user)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<User, AuthError> {
        let user = self.auth.sign_up(email, password, display_name).await?;
        self.resume_source().await;
        Ok(user)
    }

    pub async fn continue_as_guest(&self) -> Result<User, AuthError> {
        let user = self.auth.continue_as_guest().await?;
        self.resume_source().await;
        Ok(user)
    }

    /// Stops the running source before the user is cleared.
    pub async fn sign_out(&self) -> Result<()> {
        self.sources.stop().await?;
        self.auth.sign_out().await?;
        Ok(())
    }

    pub async fn shutdown(&self) {
        if let Err(err) = self.sources.stop().await {
            warn!("failed to stop source on shutdown: {err:#}");
        }
        self.alerts.shutdown().await;
        info!("context shut down");
    }

    /// Start the remembered source. A saved demo choice falls back to cloud
    /// when demo is not enabled in this build.
    async fn resume_source(&self) {
        let mut mode = self.settings.source_mode();
        if mode == SourceMode::Demo && !self.sources.demo_enabled() {
            mode = SourceMode::Cloud;
        }
        if let Err(err) = self.sources.select(mode).await {
            warn!("failed to start {} source: {err:#}", mode.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tests::FakeAuth;
    use crate::ingest::poll::tests::ScriptedEndpoint;
    use crate::ingest::push::tests::ManualFeed;
    use serde_json::json;

    fn context(dir: &Path, feed: Arc<ManualFeed>) -> AppContext {
        let config = AppConfig::from_lookup(|_| None);
        AppContext::with_collaborators(
            config,
            dir,
            Collaborators {
                feed,
                endpoint: Arc::new(ScriptedEndpoint::counting()),
                auth: Arc::new(FakeAuth::default()),
            },
        )
        .unwrap()
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn source_selection_requires_a_user() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), Arc::new(ManualFeed::new()));

        assert!(ctx.select_source(SourceMode::Local).await.is_err());
        assert_eq!(ctx.sources.current_mode(), None);

        ctx.continue_as_guest().await.unwrap();
        assert_eq!(ctx.sources.current_mode(), Some(SourceMode::Cloud));

        ctx.select_source(SourceMode::Local).await.unwrap();
        assert_eq!(ctx.settings.source_mode(), SourceMode::Local);
        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn sign_out_stops_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let feed = Arc::new(ManualFeed::new());
        let ctx = context(dir.path(), feed.clone());

        ctx.sign_in("farmer@pond.io", "secret1").await.unwrap();
        settle().await;
        feed.push(json!([{"ph": 7.2, "timestamp": 10}])).await;
        settle().await;
        assert_eq!(ctx.live_views().status.entry_count, 1);

        ctx.sign_out().await.unwrap();
        settle().await;
        assert_eq!(feed.subscriber_count(), 0);
        assert_eq!(ctx.sources.current_mode(), None);
        assert!(ctx.auth.current_user().is_none());
        assert!(ctx.live_views().snapshot.readings.is_empty());
        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn saved_mode_is_resumed_after_sign_in() {
        let dir = tempfile::tempdir().unwrap();
        {
            let ctx = context(dir.path(), Arc::new(ManualFeed::new()));
            ctx.continue_as_guest().await.unwrap();
            ctx.select_source(SourceMode::Local).await.unwrap();
            ctx.shutdown().await;
        }

        let ctx = context(dir.path(), Arc::new(ManualFeed::new()));
        ctx.continue_as_guest().await.unwrap();
        assert_eq!(ctx.sources.current_mode(), Some(SourceMode::Local));
        ctx.shutdown().await;
    }
}
