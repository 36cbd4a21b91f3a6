//! Stream mode driver.
//!
//! Wires the SSE subscriber, the aggregator, the FPS monitor and the latency
//! histogram together on one task. Message processing, monitor frames and
//! the listen deadline are multiplexed with `tokio::select!`, so the
//! aggregator is only ever touched from this loop.

use super::{StreamAggregator, StreamConfig, StreamMonitor};
use crate::{
    frame::{FrameScheduler, IntervalFrameScheduler},
    metrics::LatencyCollector,
    results::{ResultsManager, StreamReport},
    transport::SseSubscriber,
    utils::format_duration,
};
use anyhow::Result;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Capacity of the channel between subscriber and aggregator
const CHANNEL_CAPACITY: usize = 256;

/// One stream mode session
pub struct StreamSession {
    config: StreamConfig,
}

impl StreamSession {
    pub fn new(config: StreamConfig) -> Self {
        Self { config }
    }

    /// Listen until the deadline, `max_events`, or the end of the stream.
    ///
    /// Processed events are appended to the streaming output when it is
    /// enabled on `results`. A subscriber failure before any message
    /// arrived is returned as an error; after that it only ends the session.
    pub async fn run(&self, results: &mut ResultsManager) -> Result<StreamReport> {
        info!(
            "Listening to {} for {}{}",
            self.config.url,
            format_duration(self.config.duration),
            self.config
                .max_events
                .map(|n| format!(" (at most {} messages)", n))
                .unwrap_or_default()
        );

        let (tx, mut rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        let subscriber = SseSubscriber::new(&self.config.url)
            .with_reconnect(self.config.reconnect, self.config.max_retry_secs);
        let subscriber_handle = tokio::spawn(async move { subscriber.run(tx).await });

        let mut aggregator = StreamAggregator::new(self.config.history_limit);
        let mut monitor = StreamMonitor::default();
        let mut latencies = LatencyCollector::new()?;
        let mut frames = IntervalFrameScheduler::new(crate::defaults::MONITOR_FRAME_RATE);

        let started = Instant::now();
        let deadline = tokio::time::sleep(self.config.duration);
        tokio::pin!(deadline);

        monitor.start(0.0);
        let mut raw_messages = 0usize;
        let mut stream_ended = false;

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    info!("Listen duration elapsed");
                    break;
                }
                now = frames.next_frame() => {
                    if let Some(fps) = monitor.on_frame(millis_since(started, now)) {
                        debug!("Monitor FPS: {}", fps);
                    }
                }
                message = rx.recv() => {
                    let Some(raw) = message else {
                        stream_ended = true;
                        break;
                    };
                    raw_messages += 1;

                    monitor.begin_processing();
                    let ingest = aggregator.process_new_event(&raw);
                    monitor.end_processing();

                    for &latency in &ingest.latencies {
                        latencies.record(latency)?;
                    }
                    if results.is_streaming() {
                        for event in &ingest.applied {
                            results.stream_event(event)?;
                        }
                    }

                    if self.config.max_events.is_some_and(|max| raw_messages >= max) {
                        info!("Received {} messages, stopping", raw_messages);
                        break;
                    }
                }
            }
        }

        monitor.stop();
        drop(rx);

        if stream_ended {
            match subscriber_handle.await {
                Ok(Ok(forwarded)) => info!("Event stream ended after {} messages", forwarded),
                Ok(Err(e)) if raw_messages == 0 => return Err(e.into()),
                Ok(Err(e)) => error!("Event stream failed: {}", e),
                Err(e) => warn!("Subscriber task failed: {}", e),
            }
        } else {
            subscriber_handle.abort();
        }

        let metrics = aggregator.metrics().clone();
        info!(
            "Stream summary: {} events, {} dropped, avg latency {}",
            metrics.total_received,
            aggregator.dropped(),
            metrics
                .average_latency
                .map(|l| format!("{} ms", l))
                .unwrap_or_else(|| "n/a".to_string())
        );

        Ok(StreamReport {
            url: self.config.url.clone(),
            listen_duration: started.elapsed(),
            raw_messages,
            dropped_messages: aggregator.dropped(),
            metrics,
            latency: latencies.summary(crate::defaults::PERCENTILES),
            current_event: aggregator.current_event().cloned(),
            history: aggregator.history().to_vec(),
            monitor: monitor.status().clone(),
            timestamp: chrono::Utc::now(),
        })
    }
}

fn millis_since(start: Instant, now: Instant) -> f64 {
    now.saturating_duration_since(start).as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(url: String) -> StreamConfig {
        StreamConfig {
            url,
            duration: Duration::from_secs(5),
            max_events: None,
            reconnect: false,
            max_retry_secs: 1,
            history_limit: 20,
        }
    }

    /// Test that a finite stream is aggregated until it closes
    #[tokio::test]
    async fn test_session_aggregates_until_stream_ends() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/stream")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(
                "data: {\"id\":1}\n\n\
                 data: not json\n\n\
                 data: {\"batch\":true,\"updates\":[{\"id\":2},{\"id\":3}]}\n\n",
            )
            .create_async()
            .await;

        let session = StreamSession::new(config(format!("{}/api/stream", server.url())));
        let mut results = ResultsManager::new(None);
        let report = session.run(&mut results).await.unwrap();

        assert_eq!(report.raw_messages, 3);
        assert_eq!(report.dropped_messages, 1);
        assert_eq!(report.metrics.total_received, 3);
        assert_eq!(report.history.len(), 3);
        assert_eq!(report.history[0].fields["id"], 3);
        assert_eq!(report.current_event.unwrap()["id"], 2);
        assert!(report.latency.is_none());
        assert!(!report.monitor.is_running);
    }

    /// Test that max_events stops the session early
    #[tokio::test]
    async fn test_session_honors_max_events() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/stream")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body("data: {\"id\":1}\n\ndata: {\"id\":2}\n\ndata: {\"id\":3}\n\n")
            .create_async()
            .await;

        let mut config = config(format!("{}/api/stream", server.url()));
        config.max_events = Some(2);
        let report = StreamSession::new(config)
            .run(&mut ResultsManager::new(None))
            .await
            .unwrap();

        assert_eq!(report.raw_messages, 2);
        assert_eq!(report.metrics.total_received, 2);
    }

    /// Test that a stream that cannot be opened fails the session
    #[tokio::test]
    async fn test_session_fails_when_stream_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/stream")
            .with_status(503)
            .create_async()
            .await;

        let session = StreamSession::new(config(format!("{}/api/stream", server.url())));
        let err = session.run(&mut ResultsManager::new(None)).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
