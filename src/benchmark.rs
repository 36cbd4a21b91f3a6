//! # Render Benchmark Module
//!
//! Orchestrates one render benchmark run: request a payload, hand it to a
//! renderer, sample frame rate while the render settles, and produce a
//! [`MetricsSnapshot`].
//!
//! ## Run Lifecycle
//!
//! 1. **Request**: one POST for `payload_size` records; network time is the
//!    round trip of that request
//! 2. **Sampling**: a [`SamplingLoop`] starts as soon as the response
//!    resolves
//! 3. **Render**: the payload goes to the [`RenderSink`]; the runner then
//!    keeps ticking frames until `settle_time` has passed since render start
//! 4. **Snapshot**: sampling is cancelled and the average frame rate over the
//!    render window is computed from the retained samples
//!
//! A failed request replaces the state with [`BenchmarkState::Failed`] and
//! ends the run; nothing is retried.
//!
//! ## Timeline
//!
//! Sampling and the settle wait share one [`FrameScheduler`], so both see
//! every frame in the same order. All timestamps are milliseconds relative
//! to the start of the run.

use crate::{
    cli::{Args, Complexity},
    error::BenchmarkError,
    frame::{FrameScheduler, SamplingLoop},
    metrics::{average_fps_in_window, FrameSampler, MetricsSnapshot, Sample},
    transport::{BenchmarkRequest, Item, PayloadSource},
    utils::{format_duration, validate_base_url, validate_frame_rate, validate_payload_size},
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// A helper struct to provide a consistent display of the run configuration.
struct BenchmarkConfigDisplay<'a> {
    config: &'a BenchmarkConfig,
    source: &'static str,
}

impl<'a> std::fmt::Display for BenchmarkConfigDisplay<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "-----------------------------------------------------------------"
        )?;
        writeln!(f, "Starting Render Benchmark ({} source)", self.source)?;
        writeln!(f, "  Backend:            {}", self.config.base_url)?;
        writeln!(f, "  Framework Label:    {}", self.config.framework)?;
        writeln!(f, "  Payload Size:       {} records", self.config.payload_size)?;
        writeln!(f, "  Complexity:         {}", self.config.complexity)?;
        writeln!(f, "  Settle Time:        {}", format_duration(self.config.settle_time))?;
        writeln!(f, "  Frame Rate:         {} fps", self.config.frame_rate)?;
        writeln!(f, "  Request Timeout:    {}", format_duration(self.config.request_timeout))?;
        write!(
            f,
            "-----------------------------------------------------------------"
        )
    }
}

/// Configuration for render benchmark runs
#[derive(Clone, Debug)]
pub struct BenchmarkConfig {
    /// Backend base URL
    pub base_url: String,

    /// Framework label sent with the request
    pub framework: String,

    /// Number of records requested per run
    pub payload_size: usize,

    /// Complexity of the generated records
    pub complexity: Complexity,

    /// Number of runs executed back to back
    pub runs: usize,

    /// Minimum time the runner keeps ticking frames after render start
    ///
    /// Long enough for the sampler to flush several samples inside the
    /// render window.
    pub settle_time: Duration,

    /// Frame scheduler rate in frames per second
    pub frame_rate: u32,

    /// Timeout for the payload request
    pub request_timeout: Duration,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            base_url: crate::defaults::BASE_URL.to_string(),
            framework: crate::defaults::FRAMEWORK.to_string(),
            payload_size: crate::defaults::PAYLOAD_SIZE,
            complexity: Complexity::High,
            runs: crate::defaults::RUNS,
            settle_time: crate::defaults::SETTLE_TIME,
            frame_rate: crate::defaults::FRAME_RATE,
            request_timeout: crate::defaults::REQUEST_TIMEOUT,
        }
    }
}

impl BenchmarkConfig {
    /// Create and validate the configuration from CLI arguments
    pub fn from_args(args: &Args) -> Result<Self> {
        validate_base_url(&args.base_url)?;
        validate_payload_size(args.payload_size)?;
        validate_frame_rate(args.frame_rate)?;
        if args.runs == 0 {
            anyhow::bail!("At least one run is required");
        }

        Ok(Self {
            base_url: args.base_url.clone(),
            framework: args.framework.clone(),
            payload_size: args.payload_size,
            complexity: args.complexity,
            runs: args.runs,
            settle_time: args.settle_time,
            frame_rate: args.frame_rate,
            request_timeout: args.request_timeout,
        })
    }

    /// Request body for one run
    pub fn request(&self) -> BenchmarkRequest {
        BenchmarkRequest {
            framework: self.framework.clone(),
            payload_size: self.payload_size,
            complexity: self.complexity,
        }
    }
}

/// Observable state of the runner.
///
/// Each transition replaces the whole value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BenchmarkState {
    Idle,
    Loading,
    Complete { metrics: MetricsSnapshot },
    Failed { error: String },
}

impl BenchmarkState {
    pub fn is_loading(&self) -> bool {
        matches!(self, BenchmarkState::Loading)
    }

    /// Metrics of the last completed run
    pub fn metrics(&self) -> Option<&MetricsSnapshot> {
        match self {
            BenchmarkState::Complete { metrics } => Some(metrics),
            _ => None,
        }
    }
}

/// Consumer of the fetched payload
pub trait RenderSink {
    /// Render the payload. Called once per run, before the settle wait.
    fn render(&mut self, payload: &[Item]);
}

/// Renderer that builds a text preview of the payload.
///
/// Pretty-prints the first few records and walks every record's tags and
/// nested block, which is the work a list view does per row.
#[derive(Debug, Default)]
pub struct PreviewRenderer {
    preview_len: usize,
    last_preview: String,
    rendered_records: usize,
    rendered_tags: usize,
    max_nesting: u32,
}

impl PreviewRenderer {
    pub fn new(preview_len: usize) -> Self {
        Self {
            preview_len,
            ..Default::default()
        }
    }

    /// Preview of the last rendered payload
    pub fn preview(&self) -> &str {
        &self.last_preview
    }

    pub fn rendered_records(&self) -> usize {
        self.rendered_records
    }

    pub fn rendered_tags(&self) -> usize {
        self.rendered_tags
    }

    pub fn max_nesting(&self) -> u32 {
        self.max_nesting
    }
}

impl RenderSink for PreviewRenderer {
    fn render(&mut self, payload: &[Item]) {
        let head = &payload[..payload.len().min(self.preview_len)];
        self.last_preview = serde_json::to_string_pretty(head).unwrap_or_default();
        self.rendered_records = payload.len();
        self.rendered_tags = payload.iter().map(|item| item.tags.len()).sum();
        self.max_nesting = payload
            .iter()
            .filter_map(|item| item.nested.as_ref().map(|n| n.level))
            .max()
            .unwrap_or(0);
    }
}

/// Outcome of one run, as kept in the results file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_index: usize,
    pub state: BenchmarkState,
    /// Samples retained when the run finished
    pub samples: Vec<Sample>,
}

/// Render benchmark runner.
///
/// Owns the payload source, the frame scheduler, the sampler, and the
/// current state; every mutation goes through [`run`](Self::run).
pub struct BenchmarkRunner<S, F> {
    config: BenchmarkConfig,
    source: S,
    frames: F,
    sampler: FrameSampler,
    state: BenchmarkState,
    payload: Option<Vec<Item>>,
}

impl<S, F> BenchmarkRunner<S, F>
where
    S: PayloadSource,
    F: FrameScheduler,
{
    pub fn new(config: BenchmarkConfig, source: S, frames: F) -> Self {
        Self {
            config,
            source,
            frames,
            sampler: FrameSampler::default(),
            state: BenchmarkState::Idle,
            payload: None,
        }
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    pub fn state(&self) -> &BenchmarkState {
        &self.state
    }

    /// Samples retained from the last run
    pub fn samples(&self) -> Vec<Sample> {
        self.sampler.samples().iter().copied().collect()
    }

    /// Payload of the last successful run
    pub fn payload(&self) -> Option<&[Item]> {
        self.payload.as_deref()
    }

    /// Execute one benchmark run.
    ///
    /// ## Returns
    /// - `Ok(MetricsSnapshot)`: the run completed; the state holds the same snapshot
    /// - `Err(BenchmarkError)`: the payload request failed; the state is `Failed`
    pub async fn run<R: RenderSink>(&mut self, sink: &mut R) -> Result<MetricsSnapshot, BenchmarkError> {
        info!(
            "{}",
            BenchmarkConfigDisplay {
                config: &self.config,
                source: self.source.name(),
            }
        );

        self.state = BenchmarkState::Loading;
        self.payload = None;
        self.sampler.reset();

        let start_total = Instant::now();
        let request = self.config.request();

        let network_start = Instant::now();
        let response = match self.source.fetch(&request).await {
            Ok(response) => response,
            Err(e) => {
                error!("Benchmark request failed: {}", e);
                self.state = BenchmarkState::Failed {
                    error: e.to_string(),
                };
                return Err(e);
            }
        };
        let network_time = elapsed_ms(network_start);
        debug!("Payload received in {:.2} ms", network_time);

        let mut sampling =
            SamplingLoop::start(std::mem::take(&mut self.sampler), elapsed_ms(start_total));

        let render_start = elapsed_ms(start_total);
        sink.render(&response.payload);

        let settle_ms = self.config.settle_time.as_secs_f64() * 1000.0;
        loop {
            let frame = self.frames.next_frame().await;
            let now_ms = frame.saturating_duration_since(start_total).as_secs_f64() * 1000.0;
            sampling.on_frame(now_ms);
            if now_ms - render_start >= settle_ms {
                break;
            }
        }

        sampling.cancel();
        debug!("Sampling stopped after {} frames", sampling.frames_seen());
        self.sampler = sampling.into_sampler();

        let render_end = elapsed_ms(start_total);
        let total_time = elapsed_ms(start_total);
        let windowed = average_fps_in_window(self.sampler.samples(), render_start, render_end);

        let snapshot = MetricsSnapshot {
            network_time,
            render_time: render_end - render_start,
            total_time,
            data_size: response.payload.len(),
            fps: windowed.reading,
            fps_sample_count: windowed.in_window,
        };

        info!("Render benchmark completed:\n{}", snapshot);
        self.payload = Some(response.payload);
        self.state = BenchmarkState::Complete {
            metrics: snapshot.clone(),
        };
        Ok(snapshot)
    }

    /// Execute `config.runs` runs back to back.
    ///
    /// Every run is recorded, including failed ones; a failure does not stop
    /// the remaining runs.
    pub async fn run_all<R: RenderSink>(&mut self, sink: &mut R) -> Vec<RunRecord> {
        let mut records = Vec::with_capacity(self.config.runs);
        for run_index in 0..self.config.runs {
            info!("Render run {}/{}", run_index + 1, self.config.runs);
            if let Err(e) = self.run(sink).await {
                debug!("Render run {} did not complete: {}", run_index + 1, e);
            }
            records.push(RunRecord {
                run_index,
                state: self.state.clone(),
                samples: self.samples(),
            });
        }
        records
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
