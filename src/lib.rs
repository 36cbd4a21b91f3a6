//! # Render Benchmark Library
//!
//! Client-side benchmark tooling for a backend that serves synthetic JSON
//! payloads and a server-sent event stream.
//!
//! ## Modes
//!
//! - **Render**: request a payload of configurable size and complexity, hand
//!   it to a renderer, and measure network time, render time, total time and
//!   frame rate during the render window
//! - **Stream**: subscribe to the event stream, unpack batched messages, and
//!   keep a bounded history plus running latency metrics
//!
//! ## Architecture Overview
//!
//! - `benchmark`: render run lifecycle and state
//! - `frame`: frame scheduling and the per-frame sampling subscription
//! - `metrics`: frame sampler, windowed FPS, snapshots, latency histograms
//! - `stream`: stream aggregator and the live FPS monitor
//! - `transport`: payload source trait, HTTP client, SSE subscriber
//! - `results`: result aggregation and JSON output
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use render_benchmark::{
//!     benchmark::PreviewRenderer, frame::IntervalFrameScheduler,
//!     transport::HttpPayloadSource, BenchmarkConfig, BenchmarkRunner,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BenchmarkConfig::default();
//!     let source = HttpPayloadSource::new(&config.base_url, config.request_timeout)?;
//!     let frames = IntervalFrameScheduler::new(config.frame_rate);
//!
//!     let mut runner = BenchmarkRunner::new(config, source, frames);
//!     let snapshot = runner.run(&mut PreviewRenderer::new(5)).await?;
//!     println!("{}", snapshot);
//!     Ok(())
//! }
//! ```

/// Render benchmark run lifecycle
pub mod benchmark;

/// Command-line interface and configuration
///
/// Argument parsing with clap, including human-readable durations
/// ("100ms", "10s") and mode selection with "all" expansion.
pub mod cli;

pub mod error;

/// Frame scheduling
pub mod frame;

pub mod logging;

/// Frame-rate sampling and latency measurement
///
/// Holds the bounded FPS sample ring, the render-window average with its
/// "no samples" marker, and the HDR histogram used for stream latencies.
pub mod metrics;

/// Result collection and JSON output
pub mod results;

/// Stream aggregation and monitoring
pub mod stream;

/// Payload and event-stream transports
pub mod transport;

pub mod utils;

pub use benchmark::{BenchmarkConfig, BenchmarkRunner, BenchmarkState};
pub use cli::{Args, Complexity, Mode};
pub use error::BenchmarkError;
pub use metrics::{FpsReading, MetricsSnapshot};
pub use results::ResultsManager;
pub use stream::{StreamAggregator, StreamEvent};
pub use transport::{HttpPayloadSource, PayloadSource, SseSubscriber};

/// The current version of the render benchmark
///
/// Populated from Cargo.toml and written into every results file.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    /// Backend the benchmark talks to
    pub const BASE_URL: &str = "http://localhost:8000";

    /// Framework label sent with every payload request
    pub const FRAMEWORK: &str = "rust";

    /// Default number of records per payload
    pub const PAYLOAD_SIZE: usize = 1500;

    pub const RUNS: usize = 1;

    /// Minimum sampling time after render start
    ///
    /// Long enough for at least a few frames at 60 fps.
    pub const SETTLE_TIME: Duration = Duration::from_millis(100);

    /// Frame scheduler rate, matching a typical display refresh
    pub const FRAME_RATE: u32 = 60;

    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Event stream endpoint, relative to the base URL
    pub const STREAM_PATH: &str = "/api/stream";

    /// How long stream mode listens
    pub const STREAM_DURATION: Duration = Duration::from_secs(10);

    /// Upper bound of the reconnect backoff
    pub const MAX_RETRY_SECS: u64 = 30;

    /// Events kept in the stream history
    pub const HISTORY_LIMIT: usize = 20;

    /// FPS samples kept by the frame sampler
    pub const SAMPLE_CAPACITY: usize = 20;

    /// Frame sampler flush interval, in milliseconds
    pub const FLUSH_INTERVAL_MS: f64 = 10.0;

    /// Percentiles reported for stream latencies
    pub const PERCENTILES: &[f64] = &[50.0, 95.0, 99.0, 99.9];

    /// Records shown in the render preview
    pub const PREVIEW_LEN: usize = 5;

    /// Rate of the stream-mode FPS monitor tick
    pub const MONITOR_FRAME_RATE: u32 = 60;
}
