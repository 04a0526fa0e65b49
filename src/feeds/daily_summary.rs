use super::{FeedSnapshot, FetchError, SummaryFetcher};
use crate::config::FeedConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub struct DailySummaryFetcher {
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SummaryEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

impl DailySummaryFetcher {
    pub fn new(endpoint: impl Into<String>, timeout: Duration, user_agent: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            endpoint: endpoint.into(),
            timeout,
            client,
        }
    }

    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(
            config.endpoint.clone(),
            Duration::from_secs(config.timeout_secs),
            &config.user_agent,
        )
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Request(err)
        }
    }
}

/// Decode the feed envelope `{ success, data }`.
///
/// Checked in order: well-formed JSON, `success == true`, a non-null `data`,
/// and finally that `data` has the snapshot shape.
pub fn parse_envelope(body: &[u8]) -> Result<FeedSnapshot, FetchError> {
    let envelope: SummaryEnvelope = serde_json::from_slice(body)?;
    if !envelope.success {
        return Err(FetchError::Unsuccessful);
    }
    let data = match envelope.data {
        Some(serde_json::Value::Null) | None => return Err(FetchError::MissingData),
        Some(data) => data,
    };
    Ok(serde_json::from_value(data)?)
}

#[async_trait]
impl SummaryFetcher for DailySummaryFetcher {
    async fn fetch(&self) -> Result<FeedSnapshot, FetchError> {
        let response = self
            .client
            .get(&self.endpoint)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        let snapshot = parse_envelope(&body)?;
        tracing::debug!(generated_at = %snapshot.generated_at, "fetched daily summary");
        Ok(snapshot)
    }
}
