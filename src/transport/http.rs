use super::{BenchmarkRequest, BenchmarkResponse, PayloadSource, START_PATH};
use crate::error::BenchmarkError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// HTTP payload source backed by reqwest.
///
/// The client carries a request timeout; the backend exposes no retry
/// semantics, so none are added here.
pub struct HttpPayloadSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPayloadSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BenchmarkError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Full URL of the payload endpoint
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, START_PATH)
    }
}

#[async_trait]
impl PayloadSource for HttpPayloadSource {
    async fn fetch(&self, request: &BenchmarkRequest) -> Result<BenchmarkResponse, BenchmarkError> {
        let url = self.endpoint();
        debug!("POST {} ({} records, {})", url, request.payload_size, request.complexity);

        let response = self.client.post(&url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BenchmarkError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.json::<BenchmarkResponse>().await?;
        debug!("Received {} records", body.payload.len());
        Ok(body)
    }

    fn name(&self) -> &'static str {
        "HTTP"
    }
}
