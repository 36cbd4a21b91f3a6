use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Render Benchmark - measure client-side render cost and stream latency
#[derive(Parser, Debug, Clone)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Benchmark modes to run (space-separated: render, stream, or all)
    #[clap(short = 'm', long = "mode", value_enum, default_values_t = vec![Mode::Render], help_heading = "Core Options", num_args = 1..)]
    pub modes: Vec<Mode>,

    /// Base URL of the benchmark backend
    #[clap(long, default_value = crate::defaults::BASE_URL, help_heading = "Core Options")]
    pub base_url: String,

    /// Framework label sent with the payload request
    #[clap(long, default_value = crate::defaults::FRAMEWORK, help_heading = "Render Options")]
    pub framework: String,

    /// Number of synthetic records to request
    #[clap(short = 's', long, default_value_t = crate::defaults::PAYLOAD_SIZE, help_heading = "Render Options")]
    pub payload_size: usize,

    /// Complexity of the generated records
    #[clap(long, value_enum, default_value_t = Complexity::High, help_heading = "Render Options")]
    pub complexity: Complexity,

    /// Number of benchmark runs; each run replaces the previous metrics
    #[clap(short = 'r', long, default_value_t = crate::defaults::RUNS, help_heading = "Render Options")]
    pub runs: usize,

    /// Minimum time to keep sampling frames after the payload is rendered
    #[clap(long, value_parser = parse_duration, default_value = "100ms", help_heading = "Render Options")]
    pub settle_time: Duration,

    /// Target frame rate of the frame scheduler (frames per second)
    #[clap(long, default_value_t = crate::defaults::FRAME_RATE, help_heading = "Render Options")]
    pub frame_rate: u32,

    /// Timeout for the payload request
    #[clap(long, value_parser = parse_duration, default_value = "30s", help_heading = "Render Options")]
    pub request_timeout: Duration,

    /// Path of the server-sent event endpoint, relative to the base URL
    #[clap(long, default_value = crate::defaults::STREAM_PATH, help_heading = "Stream Options")]
    pub stream_path: String,

    /// How long to listen to the event stream
    #[clap(short = 'd', long, value_parser = parse_duration, default_value = "10s", help_heading = "Stream Options")]
    pub duration: Duration,

    /// Stop listening after this many raw messages
    #[clap(long, help_heading = "Stream Options")]
    pub max_events: Option<usize>,

    /// Reconnect to the event stream when it closes
    #[clap(long, default_value_t = false, help_heading = "Stream Options")]
    pub reconnect: bool,

    /// Upper bound for the reconnect backoff, in seconds
    #[clap(long, default_value_t = crate::defaults::MAX_RETRY_SECS, help_heading = "Stream Options")]
    pub max_retry_secs: u64,

    /// Output file for results (JSON format)
    #[clap(short = 'o', long, help_heading = "Output")]
    pub output_file: Option<PathBuf>,

    /// JSON file receiving every processed stream event as it arrives
    #[clap(long, help_heading = "Output")]
    pub streaming_output: Option<PathBuf>,

    /// Continue running other modes even if one fails
    #[clap(long, default_value_t = false, help_heading = "Output")]
    pub continue_on_error: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[clap(short = 'v', long, action = clap::ArgAction::Count, help_heading = "Logging")]
    pub verbose: u8,

    /// Only log errors
    #[clap(short = 'q', long, default_value_t = false, help_heading = "Logging")]
    pub quiet: bool,

    /// Also write logs to this file
    #[clap(long, help_heading = "Logging")]
    pub log_file: Option<PathBuf>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            modes: vec![Mode::Render],
            base_url: crate::defaults::BASE_URL.to_string(),
            framework: crate::defaults::FRAMEWORK.to_string(),
            payload_size: crate::defaults::PAYLOAD_SIZE,
            complexity: Complexity::High,
            runs: crate::defaults::RUNS,
            settle_time: crate::defaults::SETTLE_TIME,
            frame_rate: crate::defaults::FRAME_RATE,
            request_timeout: crate::defaults::REQUEST_TIMEOUT,
            stream_path: crate::defaults::STREAM_PATH.to_string(),
            duration: crate::defaults::STREAM_DURATION,
            max_events: None,
            reconnect: false,
            max_retry_secs: crate::defaults::MAX_RETRY_SECS,
            output_file: None,
            streaming_output: None,
            continue_on_error: false,
            verbose: 0,
            quiet: false,
            log_file: None,
        }
    }
}

/// Benchmark modes
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum Mode {
    /// Fetch a payload, render it, and sample frame rate
    #[clap(name = "render")]
    Render,

    /// Subscribe to the event stream and aggregate latency
    #[clap(name = "stream")]
    Stream,

    /// All modes
    #[clap(name = "all")]
    All,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Render => write!(f, "Render Benchmark"),
            Mode::Stream => write!(f, "Stream Aggregation"),
            Mode::All => write!(f, "All Modes"),
        }
    }
}

impl Mode {
    /// Expand the "All" variant to every concrete mode
    pub fn expand_all(modes: Vec<Mode>) -> Vec<Mode> {
        if modes.contains(&Mode::All) {
            vec![Mode::Render, Mode::Stream]
        } else {
            modes
        }
    }
}

/// Complexity of the generated payload records.
///
/// Serialized lowercase, which is what the backend's request model accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Complexity::Low => write!(f, "low"),
            Complexity::Medium => write!(f, "medium"),
            Complexity::High => write!(f, "high"),
        }
    }
}

/// Parse duration from string (e.g., "100ms", "10s", "5m", "1h")
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let (num_str, unit) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, "ms")
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, "s")
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, "m")
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, "h")
    } else {
        (s, "s") // Default to seconds
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number in duration: {}", num_str))?;

    if !num.is_finite() || num < 0.0 {
        return Err(format!("Duration must be a finite, non-negative number: {}", s));
    }

    let duration = match unit {
        "ms" => Duration::from_secs_f64(num / 1000.0),
        "s" => Duration::from_secs_f64(num),
        "m" => Duration::from_secs_f64(num * 60.0),
        "h" => Duration::from_secs_f64(num * 3600.0),
        _ => return Err(format!("Invalid duration unit: {}", unit)),
    };

    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("100ms").unwrap(), Duration::from_millis(100));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));

        assert!(parse_duration("").is_err());
        assert!(parse_duration("invalid").is_err());
        assert!(parse_duration("-3s").is_err());
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(Mode::Render.to_string(), "Render Benchmark");
        assert_eq!(Mode::Stream.to_string(), "Stream Aggregation");
        assert_eq!(Mode::All.to_string(), "All Modes");
    }

    #[test]
    fn test_mode_expand_all() {
        assert_eq!(Mode::expand_all(vec![Mode::All]), vec![Mode::Render, Mode::Stream]);
        assert_eq!(Mode::expand_all(vec![Mode::Stream]), vec![Mode::Stream]);
        assert_eq!(
            Mode::expand_all(vec![Mode::Stream, Mode::All]),
            vec![Mode::Render, Mode::Stream]
        );
    }

    #[test]
    fn test_complexity_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Complexity::High).unwrap(), "\"high\"");
        assert_eq!(Complexity::Medium.to_string(), "medium");
    }

    #[test]
    fn test_args_parse_defaults() {
        let args = Args::parse_from(["render-benchmark"]);
        assert_eq!(args.modes, vec![Mode::Render]);
        assert_eq!(args.payload_size, crate::defaults::PAYLOAD_SIZE);
        assert_eq!(args.settle_time, Duration::from_millis(100));
        assert_eq!(args.complexity, Complexity::High);
        assert!(args.output_file.is_none());
    }

    #[test]
    fn test_args_parse_flags() {
        let args = Args::parse_from([
            "render-benchmark",
            "-m",
            "all",
            "-s",
            "500",
            "--complexity",
            "low",
            "-vv",
            "--max-events",
            "50",
        ]);
        assert_eq!(args.modes, vec![Mode::All]);
        assert_eq!(args.payload_size, 500);
        assert_eq!(args.complexity, Complexity::Low);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.max_events, Some(50));
    }
}
