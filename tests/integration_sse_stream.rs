use anyhow::Result;
use render_benchmark::{
    results::ResultsManager,
    stream::{StreamConfig, StreamSession},
    StreamEvent,
};
use std::time::Duration;

/// Verify a stream session end-to-end: SSE parsing, batching, and the
/// per-event streaming output.
#[tokio::test]
async fn stream_session_writes_events_in_arrival_order() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/stream")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(concat!(
            ": keep-alive\n\n",
            "data: {\"id\":1,\"timestamp\":\"2020-01-01T00:00:00\"}\n\n",
            "data: {\"batch\":true,\"updates\":[{\"id\":2},{\"id\":3}]}\n\n",
            "data: [1,2,3]\n\n",
        ))
        .create_async()
        .await;

    let dir = tempfile::tempdir()?;
    let streaming_path = dir.path().join("events.json");
    let output_path = dir.path().join("results.json");

    let mut results = ResultsManager::new(Some(&output_path));
    results.enable_streaming(&streaming_path)?;

    let config = StreamConfig {
        url: format!("{}/api/stream", server.url()),
        duration: Duration::from_secs(5),
        max_events: None,
        reconnect: false,
        max_retry_secs: 1,
        history_limit: 20,
    };
    let report = StreamSession::new(config).run(&mut results).await?;

    assert_eq!(report.raw_messages, 3);
    assert_eq!(report.dropped_messages, 1);
    assert_eq!(report.metrics.total_received, 3);
    // Event 1 is years old.
    assert!(report.metrics.average_latency.unwrap() > 0);
    assert_eq!(report.latency.as_ref().unwrap().total_samples, 1);

    results.set_stream_report(report);
    results.finalize()?;

    let streamed: Vec<StreamEvent> =
        serde_json::from_str(&std::fs::read_to_string(&streaming_path)?)?;
    let ids: Vec<i64> = streamed
        .iter()
        .map(|e| e.fields["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);

    let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output_path)?)?;
    assert_eq!(written["stream"]["metrics"]["totalReceived"], 3);
    assert_eq!(written["stream"]["history"][0]["id"], 3);
    Ok(())
}

/// A batch larger than the history bound is still streamed in full.
#[tokio::test]
async fn oversized_batch_is_streamed_in_full() -> Result<()> {
    let updates: Vec<serde_json::Value> = (0..25).map(|id| serde_json::json!({ "id": id })).collect();
    let body = format!(
        "data: {}\n\n",
        serde_json::json!({ "batch": true, "updates": updates })
    );

    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/stream")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let dir = tempfile::tempdir()?;
    let streaming_path = dir.path().join("events.json");

    let mut results = ResultsManager::new(None);
    results.enable_streaming(&streaming_path)?;

    let config = StreamConfig {
        url: format!("{}/api/stream", server.url()),
        duration: Duration::from_secs(5),
        max_events: None,
        reconnect: false,
        max_retry_secs: 1,
        history_limit: 20,
    };
    let report = StreamSession::new(config).run(&mut results).await?;

    assert_eq!(report.metrics.total_received, 25);
    assert_eq!(report.history.len(), 20);

    results.finalize()?;

    let streamed: Vec<StreamEvent> =
        serde_json::from_str(&std::fs::read_to_string(&streaming_path)?)?;
    let ids: Vec<i64> = streamed
        .iter()
        .map(|e| e.fields["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, (0..25).collect::<Vec<i64>>());
    Ok(())
}
