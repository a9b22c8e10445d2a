use log::warn;
use tokio::time::Duration;

use crate::live::DEFAULT_CAPACITY;
use crate::views::CHART_DEPTH;

/// Runtime configuration: compiled-in defaults, overridable from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the local sensor server (`/latest`, `/forecast`).
    pub poll_base_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,

    /// Realtime database root, e.g. `https://<project>.firebaseio.com`.
    pub firebase_db_url: String,
    pub firebase_api_key: String,
    pub feed_topic: String,

    pub window_capacity: usize,
    /// How many of the newest readings charts and the history table show.
    pub chart_depth: usize,

    /// Enables the demo source and chattier logs.
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll_base_url: "http://192.168.254.185:5000".into(),
            poll_interval: Duration::from_millis(3000),
            request_timeout: Duration::from_secs(5),
            firebase_db_url: "https://aquaculture-1f760-default-rtdb.firebaseio.com".into(),
            firebase_api_key: String::new(),
            feed_topic: "sensor_data".into(),
            window_capacity: DEFAULT_CAPACITY,
            chart_depth: CHART_DEPTH,
            debug: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unparseable values keep the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("AQUAWATCH_POLL_BASE_URL") {
            config.poll_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = lookup("AQUAWATCH_FIREBASE_DB_URL") {
            config.firebase_db_url = url.trim_end_matches('/').to_string();
        }
        if let Some(key) = lookup("AQUAWATCH_FIREBASE_API_KEY") {
            config.firebase_api_key = key;
        }
        if let Some(topic) = lookup("AQUAWATCH_FEED_TOPIC") {
            config.feed_topic = topic;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "AQUAWATCH_POLL_INTERVAL_MS") {
            if ms > 0 {
                config.poll_interval = Duration::from_millis(ms);
            } else {
                warn!("AQUAWATCH_POLL_INTERVAL_MS must be positive; keeping default");
            }
        }
        if let Some(capacity) = parse_var::<usize>(&lookup, "AQUAWATCH_WINDOW_CAPACITY") {
            if capacity > 0 {
                config.window_capacity = capacity;
            } else {
                warn!("AQUAWATCH_WINDOW_CAPACITY must be positive; keeping default");
            }
        }
        config.debug = lookup("AQUAWATCH_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        config
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring {key}={raw:?}: not a valid number");
            None
        }
    }
}
