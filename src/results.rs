use crate::{
    benchmark::{BenchmarkConfig, BenchmarkState, RunRecord},
    cli::Complexity,
    metrics::LatencySummary,
    stream::{MonitorStatus, RunningMetrics, StreamEvent},
    utils::calculate_stats,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Render benchmark results across all runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderReport {
    pub test_config: RenderConfiguration,
    pub runs: Vec<RunRecord>,
    pub summary: RenderSummary,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Render configuration used for the runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfiguration {
    pub base_url: String,
    pub framework: String,
    pub payload_size: usize,
    pub complexity: Complexity,
    pub runs: usize,
    pub settle_time: Duration,
    pub frame_rate: u32,
}

impl From<&BenchmarkConfig> for RenderConfiguration {
    fn from(config: &BenchmarkConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            framework: config.framework.clone(),
            payload_size: config.payload_size,
            complexity: config.complexity,
            runs: config.runs,
            settle_time: config.settle_time,
            frame_rate: config.frame_rate,
        }
    }
}

/// Mean, min, max and standard deviation of one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatSummary {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

impl StatSummary {
    fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let (mean, min, max, std_dev) = calculate_stats(values);
        Some(Self {
            mean,
            min,
            max,
            std_dev,
        })
    }
}

/// Summary over completed render runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderSummary {
    pub completed_runs: usize,
    pub failed_runs: usize,
    pub network_time_ms: Option<StatSummary>,
    pub render_time_ms: Option<StatSummary>,
    pub total_time_ms: Option<StatSummary>,
    /// Runs whose FPS came out as the "no samples" marker are left out
    pub fps: Option<StatSummary>,
}

impl RenderSummary {
    pub fn from_runs(runs: &[RunRecord]) -> Self {
        let mut network = Vec::new();
        let mut render = Vec::new();
        let mut total = Vec::new();
        let mut fps = Vec::new();
        let mut failed_runs = 0;

        for run in runs {
            match &run.state {
                BenchmarkState::Complete { metrics } => {
                    network.push(metrics.network_time);
                    render.push(metrics.render_time);
                    total.push(metrics.total_time);
                    if !metrics.fps.is_fallback() {
                        fps.push(metrics.fps.value());
                    }
                }
                BenchmarkState::Failed { .. } => failed_runs += 1,
                BenchmarkState::Idle | BenchmarkState::Loading => {}
            }
        }

        Self {
            completed_runs: network.len(),
            failed_runs,
            network_time_ms: StatSummary::from_values(&network),
            render_time_ms: StatSummary::from_values(&render),
            total_time_ms: StatSummary::from_values(&total),
            fps: StatSummary::from_values(&fps),
        }
    }
}

impl RenderReport {
    pub fn new(config: &BenchmarkConfig, runs: Vec<RunRecord>) -> Self {
        let summary = RenderSummary::from_runs(&runs);
        Self {
            test_config: RenderConfiguration::from(config),
            runs,
            summary,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Stream aggregation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamReport {
    pub url: String,
    pub listen_duration: Duration,
    pub raw_messages: usize,
    pub dropped_messages: u64,
    pub metrics: RunningMetrics,
    pub latency: Option<LatencySummary>,
    pub current_event: Option<Value>,
    /// Newest first
    pub history: Vec<StreamEvent>,
    pub monitor: MonitorStatus,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// System information for reproducibility
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub architecture: String,
    pub cpu_cores: usize,
    pub benchmark_version: String,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            cpu_cores: num_cpus::get(),
            benchmark_version: crate::VERSION.to_string(),
        }
    }
}

/// Results manager for handling output and streaming
pub struct ResultsManager {
    output_file: Option<PathBuf>,
    streaming_file: Option<PathBuf>,
    streamed_events: usize,
    render: Option<RenderReport>,
    stream: Option<StreamReport>,
}

impl ResultsManager {
    /// Create a new results manager; without an output file nothing is written on finalize
    pub fn new(output_file: Option<&Path>) -> Self {
        Self {
            output_file: output_file.map(Path::to_path_buf),
            streaming_file: None,
            streamed_events: 0,
            render: None,
            stream: None,
        }
    }

    /// Enable streaming of processed stream events to a file
    pub fn enable_streaming<P: AsRef<Path>>(&mut self, streaming_file: P) -> Result<()> {
        let path = streaming_file.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        writeln!(file, "[")?;

        debug!("Enabled streaming to: {:?}", path);
        self.streaming_file = Some(path);
        self.streamed_events = 0;
        Ok(())
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming_file.is_some()
    }

    /// Append one event to the streaming file
    pub fn stream_event(&mut self, event: &StreamEvent) -> Result<()> {
        let Some(ref streaming_file) = self.streaming_file else {
            return Ok(());
        };

        let mut file = OpenOptions::new().append(true).open(streaming_file)?;
        if self.streamed_events > 0 {
            writeln!(file, ",")?;
        }
        let json = serde_json::to_string_pretty(event)?;
        write!(file, "{}", json)?;
        file.flush()?;

        self.streamed_events += 1;
        Ok(())
    }

    pub fn set_render_report(&mut self, report: RenderReport) {
        info!(
            "Recording render results ({} completed, {} failed)",
            report.summary.completed_runs, report.summary.failed_runs
        );
        self.render = Some(report);
    }

    pub fn set_stream_report(&mut self, report: StreamReport) {
        info!(
            "Recording stream results ({} events received)",
            report.metrics.total_received
        );
        self.stream = Some(report);
    }

    /// Close the streaming file and write the consolidated results
    pub fn finalize(&mut self) -> Result<FinalBenchmarkResults> {
        info!("Finalizing benchmark results");

        if let Some(ref streaming_file) = self.streaming_file {
            let mut file = OpenOptions::new().append(true).open(streaming_file)?;
            writeln!(file, "\n]")?;
            file.flush()?;
            debug!(
                "Streamed {} events to {:?}",
                self.streamed_events, streaming_file
            );
        }
        // A second finalize must not append another closing bracket.
        self.streaming_file = None;

        let final_results = FinalBenchmarkResults {
            metadata: BenchmarkMetadata {
                version: crate::VERSION.to_string(),
                run_id: crate::utils::generate_run_id(),
                timestamp: chrono::Utc::now(),
                system_info: SystemInfo::default(),
            },
            render: self.render.clone(),
            stream: self.stream.clone(),
        };

        match self.output_file {
            Some(ref output_file) => {
                let json = serde_json::to_string_pretty(&final_results)?;
                std::fs::write(output_file, json)?;
                info!("Results written to: {:?}", output_file);
            }
            None => {
                if self.render.is_none() && self.stream.is_none() {
                    warn!("No results were recorded");
                }
            }
        }

        Ok(final_results)
    }
}

/// Final benchmark results structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalBenchmarkResults {
    pub metadata: BenchmarkMetadata,
    pub render: Option<RenderReport>,
    pub stream: Option<StreamReport>,
}

/// Benchmark metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkMetadata {
    pub version: String,
    pub run_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub system_info: SystemInfo,
}
