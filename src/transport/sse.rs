use crate::error::BenchmarkError;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Server-sent event subscriber.
///
/// Opens the stream, forwards the `data` of every message on an mpsc
/// channel, and optionally reconnects with exponential backoff when the
/// stream closes. Parsing of the message body is left to the aggregator.
pub struct SseSubscriber {
    client: reqwest::Client,
    url: String,
    reconnect: bool,
    max_retry_secs: u64,
}

impl SseSubscriber {
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
            reconnect: false,
            max_retry_secs: crate::defaults::MAX_RETRY_SECS,
        }
    }

    /// Reconnect after the stream ends, waiting at most `max_retry_secs` between attempts
    pub fn with_reconnect(mut self, reconnect: bool, max_retry_secs: u64) -> Self {
        self.reconnect = reconnect;
        self.max_retry_secs = max_retry_secs.max(1);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Run until the stream ends (without reconnect) or the receiver is dropped.
    ///
    /// Returns the number of messages forwarded.
    pub async fn run(&self, tx: mpsc::Sender<String>) -> Result<usize, BenchmarkError> {
        let mut forwarded = 0usize;
        let mut retry_delay = 1u64;

        loop {
            info!("Connecting to event stream: {}", self.url);

            match self.read_stream(&tx, &mut forwarded).await {
                Ok(StreamEnd::ReceiverClosed) => return Ok(forwarded),
                Ok(StreamEnd::Closed) => {
                    info!("Event stream closed after {} messages", forwarded);
                    retry_delay = 1;
                }
                Err(e) if !self.reconnect => return Err(e),
                Err(e) => warn!("Event stream error: {}", e),
            }

            if !self.reconnect || tx.is_closed() {
                return Ok(forwarded);
            }

            warn!("Reconnecting to event stream in {}s", retry_delay);
            tokio::time::sleep(Duration::from_secs(retry_delay)).await;
            retry_delay = (retry_delay * 2).min(self.max_retry_secs);
        }
    }

    async fn read_stream(
        &self,
        tx: &mpsc::Sender<String>,
        forwarded: &mut usize,
    ) -> Result<StreamEnd, BenchmarkError> {
        let response = self
            .client
            .get(&self.url)
            .header("Accept", "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BenchmarkError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let mut events = response.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| BenchmarkError::Stream(e.to_string()))?;
            debug!("SSE message (event={:?}, {} bytes)", event.event, event.data.len());

            if tx.send(event.data).await.is_err() {
                debug!("Event receiver dropped, closing stream");
                return Ok(StreamEnd::ReceiverClosed);
            }
            *forwarded += 1;
        }

        Ok(StreamEnd::Closed)
    }
}

enum StreamEnd {
    Closed,
    ReceiverClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_forwards_message_data() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/stream")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body("data: {\"id\":1}\n\nevent: update\ndata: {\"id\":2}\n\n")
            .create_async()
            .await;

        let subscriber = SseSubscriber::new(&format!("{}/api/stream", server.url()));
        let (tx, mut rx) = mpsc::channel(8);
        let forwarded = subscriber.run(tx).await.unwrap();

        assert_eq!(forwarded, 2);
        assert_eq!(rx.recv().await.unwrap(), "{\"id\":1}");
        assert_eq!(rx.recv().await.unwrap(), "{\"id\":2}");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_http_error_without_reconnect() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/stream")
            .with_status(404)
            .create_async()
            .await;

        let subscriber = SseSubscriber::new(&format!("{}/api/stream", server.url()));
        let (tx, _rx) = mpsc::channel(1);
        let err = subscriber.run(tx).await.unwrap_err();
        assert!(matches!(err, BenchmarkError::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_stops_when_receiver_dropped() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/stream")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body("data: a\n\ndata: b\n\ndata: c\n\n")
            .create_async()
            .await;

        let subscriber =
            SseSubscriber::new(&format!("{}/api/stream", server.url())).with_reconnect(true, 1);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let forwarded = subscriber.run(tx).await.unwrap();
        assert_eq!(forwarded, 0);
    }
}
