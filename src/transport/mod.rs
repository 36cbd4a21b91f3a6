//! Transport abstraction for the benchmark backend.
//!
//! The render benchmark only needs one operation from the network: fetch a
//! payload of generated records. That operation sits behind the
//! [`PayloadSource`] trait so the runner can be driven by the HTTP client in
//! production and by in-memory sources in tests. The event stream side is a
//! separate adapter ([`SseSubscriber`]) that forwards raw message data to the
//! aggregator.

use crate::cli::Complexity;
use crate::error::BenchmarkError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod http;
pub mod sse;

pub use http::HttpPayloadSource;
pub use sse::SseSubscriber;

/// Path of the payload endpoint, relative to the backend base URL
pub const START_PATH: &str = "/api/benchmark/start";

/// Body of the payload request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkRequest {
    pub framework: String,
    pub payload_size: usize,
    pub complexity: Complexity,
}

/// Response of the payload endpoint.
///
/// Only `payload` is required; the metadata fields are echoed by the
/// reference backend and kept for the results file when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkResponse {
    pub payload: Vec<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

/// One generated record.
///
/// Low-complexity records carry neither tags nor a nested block, so both
/// default when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    pub name: String,
    pub value: i64,
    pub active: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested: Option<Nested>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nested {
    pub level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<NestedMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedMetadata {
    pub created_by: String,
    pub priority: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub event: String,
    pub count: u32,
}

/// Source of benchmark payloads
#[async_trait]
pub trait PayloadSource: Send + Sync {
    /// Issue one payload request.
    ///
    /// Implementations must not retry; a failed request ends the run.
    async fn fetch(&self, request: &BenchmarkRequest) -> Result<BenchmarkResponse, BenchmarkError>;

    /// Source name for identification in logs
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request = BenchmarkRequest {
            framework: "rust".to_string(),
            payload_size: 1500,
            complexity: Complexity::High,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"framework": "rust", "payloadSize": 1500, "complexity": "high"})
        );
    }

    #[test]
    fn test_response_with_high_complexity_items() {
        let body = r#"{
            "framework": "rust",
            "generatedAt": "2024-05-01T10:00:00.123456",
            "config": {"payloadSize": 1},
            "payload": [{
                "id": 0,
                "name": "Item-0",
                "value": 42,
                "active": true,
                "timestamp": "2024-05-01T10:00:00.123456",
                "description": "This is a test description for benchmarking purposes.",
                "tags": ["tag-0", "tag-1", "tag-2"],
                "nested": {"level": 2, "score": 0.5, "metadata": {"createdBy": "user-7", "priority": "high"}},
                "history": [{"event": "event_0", "count": 3}, {"event": "event_1", "count": 9}]
            }]
        }"#;

        let response: BenchmarkResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.payload.len(), 1);
        let item = &response.payload[0];
        assert_eq!(item.tags.len(), 3);
        let nested = item.nested.as_ref().unwrap();
        assert_eq!(nested.level, 2);
        assert_eq!(nested.metadata.as_ref().unwrap().created_by, "user-7");
        assert_eq!(item.history.len(), 2);
    }

    #[test]
    fn test_response_with_low_complexity_items() {
        let body = r#"{"payload": [{"id": 1, "name": "Item-1", "value": 5, "active": false}]}"#;
        let response: BenchmarkResponse = serde_json::from_str(body).unwrap();
        let item = &response.payload[0];
        assert!(item.tags.is_empty());
        assert!(item.nested.is_none());
        assert!(response.framework.is_none());
    }
}
