use crate::config::Config;
use crate::types::ChatRequest;
use crate::util::is_local_endpoint_url;
use anyhow::{anyhow, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;
#[cfg(test)]
use std::sync::Arc;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

#[cfg(test)]
pub trait MockStreamProducer: Send + Sync {
    fn open_mock_stream(&self, request: &ChatRequest) -> Result<ByteStream>;
}

/// HTTP front door for one agent's streaming chat endpoint. One POST per
/// exchange; no implicit retries.
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
    #[cfg(test)]
    mock_stream_producer: Option<Arc<dyn MockStreamProducer>>,
}

impl ChatClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: config.chat_endpoint(),
            #[cfg(test)]
            mock_stream_producer: None,
        }
    }

    #[cfg(test)]
    pub fn new_mock(mock_producer: Arc<dyn MockStreamProducer>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: "http://localhost:8080/be/v1/chatagents/agent-test".to_string(),
            mock_stream_producer: Some(mock_producer),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST the request and hand back the raw response byte stream. Errors
    /// surfaced here and by the stream items share one mapping so callers see
    /// a uniform transport failure.
    pub async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream> {
        #[cfg(test)]
        {
            if let Some(producer) = &self.mock_stream_producer {
                return producer.open_mock_stream(request);
            }
        }

        tracing::debug!(endpoint = %self.endpoint, kind = ?request.kind, "opening chat stream");
        let response = self
            .http
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|error| map_request_error(error, &self.endpoint))?
            .error_for_status()
            .map_err(|error| map_request_error(error, &self.endpoint))?;

        let endpoint_for_stream = self.endpoint.clone();
        let stream = response
            .bytes_stream()
            .map(move |item| item.map_err(|error| map_request_error(error, &endpoint_for_stream)));
        Ok(Box::pin(stream))
    }
}

fn map_request_error(error: reqwest::Error, endpoint: &str) -> anyhow::Error {
    if error.is_connect() && is_local_endpoint_url(endpoint) {
        return anyhow!(
            "cannot reach local chat endpoint '{}': {}. Start the platform backend or update CHATLINK_BASE_URL.",
            endpoint,
            error
        );
    }
    if error.is_connect() {
        return anyhow!("cannot reach chat endpoint '{}': {}", endpoint, error);
    }
    if error.is_timeout() {
        return anyhow!("chat request to '{}' timed out: {}", endpoint, error);
    }
    if let Some(status) = error.status() {
        return anyhow!(
            "chat endpoint '{}' returned HTTP {}: {}",
            endpoint,
            status,
            error
        );
    }
    anyhow!("chat request to '{}' failed: {}", endpoint, error)
}
