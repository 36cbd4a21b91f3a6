use crate::utils::format_millis;
use anyhow::Result;
use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Highest frame rate a sample may report
pub const MAX_FPS: f64 = 120.0;

/// One frame-rate sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Milliseconds since the start of the benchmark session
    pub time: f64,
    /// Frames per second over the flush interval, clamped to [0, MAX_FPS]
    pub fps: f64,
}

/// Clamp a measured frame rate into [0, MAX_FPS].
///
/// Outliers are clamped, not rejected: a burst of frames right after a
/// flush reads as 500 fps, and a skewed clock can produce a negative rate.
/// Non-finite values read as 0.
pub fn clamp_fps(fps: f64) -> f64 {
    if fps.is_nan() {
        return 0.0;
    }
    fps.clamp(0.0, MAX_FPS)
}

/// Frame-rate sampler.
///
/// Counts frames and, once at least `flush_interval_ms` has passed since the
/// last flush, turns the count into a sample. Only the most recent
/// `capacity` samples are retained.
#[derive(Debug, Clone)]
pub struct FrameSampler {
    frame_count: u64,
    last_flush_ms: f64,
    samples: VecDeque<Sample>,
    capacity: usize,
    flush_interval_ms: f64,
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(
            crate::defaults::SAMPLE_CAPACITY,
            crate::defaults::FLUSH_INTERVAL_MS,
        )
    }
}

impl FrameSampler {
    pub fn new(capacity: usize, flush_interval_ms: f64) -> Self {
        let capacity = capacity.max(1);
        Self {
            frame_count: 0,
            last_flush_ms: 0.0,
            samples: VecDeque::with_capacity(capacity),
            capacity,
            flush_interval_ms,
        }
    }

    /// Reset counters and set the first flush point
    pub fn begin(&mut self, now_ms: f64) {
        self.frame_count = 0;
        self.last_flush_ms = now_ms;
    }

    /// Account one frame at `now_ms` (session-relative).
    ///
    /// Returns the sample when this frame closed a flush interval.
    pub fn on_frame(&mut self, now_ms: f64) -> Option<Sample> {
        self.frame_count += 1;

        let elapsed = now_ms - self.last_flush_ms;
        if elapsed < self.flush_interval_ms {
            return None;
        }

        let sample = Sample {
            time: now_ms,
            fps: clamp_fps(self.frame_count as f64 / elapsed * 1000.0),
        };
        self.push(sample);
        self.frame_count = 0;
        self.last_flush_ms = now_ms;
        Some(sample)
    }

    /// Append a sample, evicting the oldest beyond capacity
    pub fn push(&mut self, sample: Sample) {
        self.samples.push_back(Sample {
            time: sample.time,
            fps: clamp_fps(sample.fps),
        });
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Retained samples, oldest first
    pub fn samples(&self) -> &VecDeque<Sample> {
        &self.samples
    }

    /// Frames counted since the last flush
    pub fn pending_frames(&self) -> u64 {
        self.frame_count
    }

    /// Drop all samples and counters
    pub fn reset(&mut self) {
        self.samples.clear();
        self.frame_count = 0;
        self.last_flush_ms = 0.0;
    }
}

/// Average frame rate over a render window.
///
/// Serializes as a bare number when samples fell inside the window and as a
/// descriptive string otherwise, so the results file never contains NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FpsReading {
    Average(f64),
    Fallback(String),
}

impl FpsReading {
    /// Reading used when no sample landed inside the render window
    pub fn no_samples(off_window: usize) -> Self {
        FpsReading::Fallback(format!("0 ({} samples outside render window)", off_window))
    }

    /// Numeric value; the fallback reads as zero
    pub fn value(&self) -> f64 {
        match self {
            FpsReading::Average(fps) => *fps,
            FpsReading::Fallback(_) => 0.0,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, FpsReading::Fallback(_))
    }
}

impl fmt::Display for FpsReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FpsReading::Average(fps) => write!(f, "{:.1}", fps),
            FpsReading::Fallback(text) => write!(f, "{}", text),
        }
    }
}

/// Result of averaging samples over a window
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedFps {
    pub reading: FpsReading,
    pub in_window: usize,
    pub off_window: usize,
}

/// Average the samples whose timestamp falls within `[start_ms, end_ms]`.
pub fn average_fps_in_window<'a, I>(samples: I, start_ms: f64, end_ms: f64) -> WindowedFps
where
    I: IntoIterator<Item = &'a Sample>,
{
    let mut sum = 0.0;
    let mut in_window = 0usize;
    let mut off_window = 0usize;

    for sample in samples {
        if sample.time >= start_ms && sample.time <= end_ms {
            sum += sample.fps;
            in_window += 1;
        } else {
            off_window += 1;
        }
    }

    let reading = if in_window > 0 {
        FpsReading::Average(sum / in_window as f64)
    } else {
        FpsReading::no_samples(off_window)
    };

    WindowedFps {
        reading,
        in_window,
        off_window,
    }
}

/// Metrics of one render benchmark run.
///
/// Built once when the run completes and never mutated; the next run
/// produces a new snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub network_time: f64,
    pub render_time: f64,
    pub total_time: f64,
    pub data_size: usize,
    pub fps: FpsReading,
    pub fps_sample_count: usize,
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Network Time:       {}", format_millis(self.network_time))?;
        writeln!(f, "  Render Time:        {}", format_millis(self.render_time))?;
        writeln!(f, "  Total Time:         {}", format_millis(self.total_time))?;
        writeln!(f, "  Records Rendered:   {}", self.data_size)?;
        write!(
            f,
            "  Average FPS:        {} ({} samples)",
            self.fps, self.fps_sample_count
        )
    }
}

/// Percentile value pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileValue {
    pub percentile: f64,
    pub value_ms: u64,
}

/// Distribution of stream latencies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub min_ms: u64,
    pub max_ms: u64,
    pub mean_ms: f64,
    pub std_dev_ms: f64,
    pub percentiles: Vec<PercentileValue>,
    pub total_samples: usize,
    /// Latencies below zero (server clock ahead of ours), recorded as 0
    pub skewed_samples: usize,
}

/// Latency collector using an HDR histogram.
///
/// Complements the running mean kept by the aggregator with a full
/// distribution for the results file.
pub struct LatencyCollector {
    histogram: Histogram<u64>,
    sample_count: usize,
    skewed_count: usize,
}

impl LatencyCollector {
    pub fn new() -> Result<Self> {
        // 3 significant figures, auto-resizing.
        let histogram = Histogram::<u64>::new(3)?;

        Ok(Self {
            histogram,
            sample_count: 0,
            skewed_count: 0,
        })
    }

    /// Record a latency in milliseconds
    pub fn record(&mut self, latency_ms: i64) -> Result<()> {
        if latency_ms < 0 {
            self.skewed_count += 1;
        }
        self.histogram.record(latency_ms.max(0) as u64)?;
        self.sample_count += 1;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }

    /// Summary, or None before the first sample
    pub fn summary(&self, percentiles: &[f64]) -> Option<LatencySummary> {
        if self.is_empty() {
            return None;
        }

        let percentiles = percentiles
            .iter()
            .map(|&p| PercentileValue {
                percentile: p,
                value_ms: self.histogram.value_at_percentile(p),
            })
            .collect();

        Some(LatencySummary {
            min_ms: self.histogram.min(),
            max_ms: self.histogram.max(),
            mean_ms: self.histogram.mean(),
            std_dev_ms: self.histogram.stdev(),
            percentiles,
            total_samples: self.sample_count,
            skewed_samples: self.skewed_count,
        })
    }

    pub fn reset(&mut self) {
        self.histogram.reset();
        self.sample_count = 0;
        self.skewed_count = 0;
    }
}
