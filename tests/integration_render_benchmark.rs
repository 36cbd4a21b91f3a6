use anyhow::Result;
use render_benchmark::{
    benchmark::PreviewRenderer, cli::Args, frame::IntervalFrameScheduler,
    transport::HttpPayloadSource, BenchmarkConfig, BenchmarkRunner, BenchmarkState, FpsReading,
};
use serde_json::json;
use std::time::Duration;

fn payload(records: usize) -> String {
    let items: Vec<_> = (0..records)
        .map(|i| {
            json!({
                "id": i,
                "name": format!("Item-{}", i),
                "value": i * 3,
                "active": i % 2 == 0,
                "tags": ["tag-0", "tag-1"],
                "nested": {"level": 2, "score": 0.25, "metadata": {"createdBy": "user-1", "priority": "low"}}
            })
        })
        .collect();
    json!({"framework": "rust", "payload": items}).to_string()
}

/// Verify a full render run against an HTTP backend.
///
/// Uses the real clock, so only coarse bounds are asserted on timings.
#[tokio::test]
async fn render_run_against_http_backend() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/benchmark/start")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(payload(25))
        .expect(2)
        .create_async()
        .await;

    let args = Args {
        base_url: server.url(),
        payload_size: 25,
        runs: 2,
        settle_time: Duration::from_millis(50),
        ..Default::default()
    };
    let config = BenchmarkConfig::from_args(&args)?;
    let source = HttpPayloadSource::new(&config.base_url, config.request_timeout)?;
    let frames = IntervalFrameScheduler::new(config.frame_rate);
    let mut renderer = PreviewRenderer::new(5);

    let mut runner = BenchmarkRunner::new(config, source, frames);
    let records = runner.run_all(&mut renderer).await;

    assert_eq!(records.len(), 2);
    for record in &records {
        let metrics = match &record.state {
            BenchmarkState::Complete { metrics } => metrics,
            other => panic!("run {} did not complete: {:?}", record.run_index, other),
        };
        assert_eq!(metrics.data_size, 25);
        assert!(metrics.network_time >= 0.0);
        assert!(metrics.render_time >= 0.0);
        assert!(metrics.total_time >= metrics.network_time + metrics.render_time - 1e-6);
        match &metrics.fps {
            FpsReading::Average(fps) => assert!((0.0..=120.0).contains(fps)),
            FpsReading::Fallback(marker) => assert!(marker.starts_with("0 (")),
        }
        assert!(record.samples.len() <= 20);
    }

    assert_eq!(renderer.rendered_records(), 25);
    assert_eq!(renderer.max_nesting(), 2);
    assert!(renderer.preview().contains("Item-4"));
    mock.assert_async().await;
    Ok(())
}

/// Verify that a backend error ends the run with a failed state.
#[tokio::test]
async fn render_run_reports_backend_error() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/benchmark/start")
        .with_status(500)
        .with_body("generator crashed")
        .create_async()
        .await;

    let args = Args {
        base_url: server.url(),
        settle_time: Duration::from_millis(20),
        ..Default::default()
    };
    let config = BenchmarkConfig::from_args(&args)?;
    let source = HttpPayloadSource::new(&config.base_url, config.request_timeout)?;
    let mut runner = BenchmarkRunner::new(config, source, IntervalFrameScheduler::new(60));

    let result = runner.run(&mut PreviewRenderer::new(5)).await;
    assert!(result.is_err());
    match runner.state() {
        BenchmarkState::Failed { error } => assert!(error.contains("500")),
        other => panic!("expected failed state, got {:?}", other),
    }
    assert!(runner.payload().is_none());
    Ok(())
}
