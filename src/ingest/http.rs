//! `reqwest` implementation of [`PollEndpoint`] for the local sensor server.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio::time::Duration;

use super::error::FetchError;
use super::normalizer::RawRecord;
use super::poll::PollEndpoint;

pub struct HttpPollEndpoint {
    base_url: String,
    client: Client,
}

impl HttpPollEndpoint {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_record(&self, path: &str) -> Result<RawRecord, FetchError> {
        let resp = self
            .client
            .get(format!("{}/{}", self.base_url, path))
            .header("Content-Type", "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body: Value = resp.json().await?;
        parse_record(body)
    }
}

/// Accept a JSON object without an `error` field; reject everything else.
pub fn parse_record(body: Value) -> Result<RawRecord, FetchError> {
    match body {
        Value::Object(map) => match map.get("error") {
            Some(err) if !err.is_null() && err != &Value::Bool(false) => {
                let message = err.as_str().map(str::to_string).unwrap_or_else(|| err.to_string());
                Err(FetchError::Upstream(message))
            }
            _ => Ok(map),
        },
        other => Err(FetchError::Decode(format!("expected object, got {other}"))),
    }
}

#[async_trait]
impl PollEndpoint for HttpPollEndpoint {
    async fn latest(&self) -> Result<RawRecord, FetchError> {
        self.get_record("latest").await
    }

    async fn forecast(&self) -> Result<RawRecord, FetchError> {
        self.get_record("forecast").await
    }
}
