//! Firebase Realtime Database [`PushFeed`] over the REST streaming protocol.
//!
//! The server sends Server-Sent Events: `put` replaces the value at a path,
//! `patch` merges children into it. We keep the whole topic tree locally and
//! hand the full tree to the subscriber after every change, so the adapter
//! always sees whole snapshots.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use super::push::{FeedSubscription, PushFeed};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const SNAPSHOT_BUFFER: usize = 8;

pub struct FirebaseFeed {
    db_url: String,
    auth_token: Option<String>,
    client: Client,
}

impl FirebaseFeed {
    pub fn new(db_url: &str, auth_token: Option<String>) -> anyhow::Result<Self> {
        // No overall timeout: the response body is an open-ended stream.
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self {
            db_url: db_url.trim_end_matches('/').to_string(),
            auth_token,
            client,
        })
    }

    fn topic_url(&self, topic: &str) -> String {
        let mut url = format!("{}/{}.json", self.db_url, topic.trim_matches('/'));
        if let Some(token) = &self.auth_token {
            url.push_str("?auth=");
            url.push_str(token);
        }
        url
    }
}

#[async_trait]
impl PushFeed for FirebaseFeed {
    async fn subscribe(&self, topic: &str) -> anyhow::Result<FeedSubscription> {
        let resp = self
            .client
            .get(self.topic_url(topic))
            .header("Accept", "text/event-stream")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("stream for '{topic}' rejected with HTTP {}", status.as_u16());
        }

        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let topic = topic.to_string();

        tokio::spawn(async move {
            let mut stream = resp.bytes_stream();
            let mut decoder = EventDecoder::default();
            let mut tree = Value::Null;

            loop {
                let chunk = tokio::select! {
                    _ = token.cancelled() => break,
                    chunk = stream.next() => chunk,
                };

                let bytes = match chunk {
                    Some(Ok(bytes)) => bytes,
                    Some(Err(err)) => {
                        log_warn!("stream for '{}' failed: {err}", topic);
                        break;
                    }
                    None => break,
                };

                for event in decoder.feed(&bytes) {
                    match apply_event(&mut tree, &event) {
                        EventOutcome::Changed => {
                            if tx.send(tree.clone()).await.is_err() {
                                return;
                            }
                        }
                        EventOutcome::Ignored => {}
                        EventOutcome::Closed(reason) => {
                            log_warn!("stream for '{}' closed by server: {}", topic, reason);
                            return;
                        }
                    }
                }
            }

            log_info!("stream for '{}' ended", topic);
        });

        Ok(FeedSubscription::new(rx, cancel))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub event: String,
    pub data: String,
}

#[derive(Debug, PartialEq)]
pub enum EventOutcome {
    Changed,
    Ignored,
    Closed(String),
}

#[derive(Deserialize)]
struct PathData {
    path: String,
    #[serde(default)]
    data: Value,
}

/// Splits an SSE byte stream into events. Chunks may cut events, and UTF-8
/// sequences, anywhere; bytes are only decoded once a block is complete.
#[derive(Default)]
pub struct EventDecoder {
    buffer: Vec<u8>,
}

impl EventDecoder {
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend(bytes.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(event) = parse_block(&String::from_utf8_lossy(&block)) {
                events.push(event);
            }
        }
        events
    }
}

fn parse_block(block: &str) -> Option<StreamEvent> {
    let mut event = None;
    let mut data = Vec::new();

    for line in block.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            event = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.trim_start().to_string());
        }
    }

    event.map(|event| StreamEvent {
        event,
        data: data.join("\n"),
    })
}

/// Fold one event into the cached tree.
pub fn apply_event(tree: &mut Value, event: &StreamEvent) -> EventOutcome {
    match event.event.as_str() {
        "put" | "patch" => {
            let parsed: PathData = match serde_json::from_str(&event.data) {
                Ok(parsed) => parsed,
                Err(err) => {
                    log_warn!("unreadable {} event: {err}", event.event);
                    return EventOutcome::Ignored;
                }
            };

            if event.event == "put" {
                set_at_path(tree, &parsed.path, parsed.data);
            } else if let Value::Object(children) = parsed.data {
                for (key, value) in children {
                    let child_path = format!("{}/{}", parsed.path.trim_end_matches('/'), key);
                    set_at_path(tree, &child_path, value);
                }
            }
            EventOutcome::Changed
        }
        "keep-alive" => EventOutcome::Ignored,
        "cancel" | "auth_revoked" => EventOutcome::Closed(event.event.clone()),
        other => {
            log_debug!("ignoring stream event '{}'", other);
            EventOutcome::Ignored
        }
    }
}

fn set_at_path(tree: &mut Value, path: &str, data: Value) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        *tree = data;
        return;
    };

    let mut node = tree;
    for segment in parents {
        node = child_mut(node, segment);
    }

    match (node, last.parse::<usize>().ok()) {
        (Value::Array(items), Some(index)) => {
            if index >= items.len() {
                items.resize(index + 1, Value::Null);
            }
            items[index] = data;
        }
        (node, _) => insert_or_remove(ensure_object(node), last, data),
    }
}

fn child_mut<'a>(node: &'a mut Value, segment: &str) -> &'a mut Value {
    match (node, segment.parse::<usize>().ok()) {
        (Value::Array(items), Some(index)) => {
            if index >= items.len() {
                items.resize(index + 1, Value::Null);
            }
            &mut items[index]
        }
        (node, _) => ensure_object(node)
            .entry(segment.to_string())
            .or_insert(Value::Null),
    }
}

/// Arrays addressed by key become maps keyed by index; scalars become `{}`.
fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    let map = match std::mem::take(node) {
        Value::Object(map) => map,
        Value::Array(items) => array_to_map(items),
        _ => Map::new(),
    };
    *node = Value::Object(map);
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just made an object"),
    }
}

fn array_to_map(items: Vec<Value>) -> Map<String, Value> {
    items
        .into_iter()
        .enumerate()
        .filter(|(_, value)| !value.is_null())
        .map(|(index, value)| (index.to_string(), value))
        .collect()
}

fn insert_or_remove(map: &mut Map<String, Value>, key: &str, data: Value) {
    if data.is_null() {
        map.remove(key);
    } else {
        map.insert(key.to_string(), data);
    }
}
