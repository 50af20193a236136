//! NDJSON-over-HTTP narrative generator client.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, HeaderValue};
use tracing::{debug, instrument};

use forecast_core::error::DomainError;
use forecast_core::generator::{ByteStream, GenerationRequest, NarrativeGenerator};

/// Posts each generation request as JSON to a fixed endpoint and streams the
/// response body back unparsed.
#[derive(Debug, Clone)]
pub struct HttpNarrativeGenerator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpNarrativeGenerator {
    /// Creates a generator for `endpoint` with a default client.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    /// Creates a generator that sends through `client`.
    #[must_use]
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl NarrativeGenerator for HttpNarrativeGenerator {
    #[instrument(skip_all, fields(endpoint = %self.endpoint, kind = ?request.kind))]
    async fn generate(&self, request: GenerationRequest) -> Result<ByteStream, DomainError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, HeaderValue::from_static("application/x-ndjson"))
            .json(&request)
            .send()
            .await
            .map_err(|e| DomainError::Infrastructure(format!("generator request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::Infrastructure(format!(
                "generator responded with {status}"
            )));
        }
        debug!(%status, "generator stream opened");

        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| e.to_string())),
        ))
    }
}
