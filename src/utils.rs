//! # Utility Functions
//!
//! Formatting, validation and small statistics helpers shared by the
//! benchmark modes and the results writer.
//!
//! ```rust
//! use render_benchmark::utils::*;
//! use std::time::Duration;
//!
//! # fn main() -> anyhow::Result<()> {
//! assert_eq!(format_duration(Duration::from_micros(1500)), "1.50ms");
//! assert_eq!(format_millis(12.5), "12.50 ms");
//!
//! validate_payload_size(1500)?;
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use std::time::Duration;
use uuid::Uuid;

/// Largest payload the backend accepts
pub const MAX_PAYLOAD_SIZE: usize = 5000;

/// Highest frame rate the scheduler is allowed to run at
pub const MAX_FRAME_RATE: u32 = 240;

/// Generate a unique identifier for a benchmark run
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Format a duration in a human-readable way
///
/// ```rust
/// # use render_benchmark::utils::format_duration;
/// # use std::time::Duration;
/// assert_eq!(format_duration(Duration::from_nanos(750)), "750ns");
/// assert_eq!(format_duration(Duration::from_micros(2500)), "2.50ms");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ns = duration.as_nanos();

    if total_ns < 1_000 {
        format!("{}ns", total_ns)
    } else if total_ns < 1_000_000 {
        format!("{:.2}μs", total_ns as f64 / 1_000.0)
    } else if total_ns < 1_000_000_000 {
        format!("{:.2}ms", total_ns as f64 / 1_000_000.0)
    } else if total_ns < 60_000_000_000 {
        format!("{:.2}s", total_ns as f64 / 1_000_000_000.0)
    } else {
        let seconds = duration.as_secs();
        let minutes = seconds / 60;
        let remaining_seconds = seconds % 60;

        if minutes < 60 {
            format!("{}m {}s", minutes, remaining_seconds)
        } else {
            let hours = minutes / 60;
            let remaining_minutes = minutes % 60;
            format!("{}h {}m {}s", hours, remaining_minutes, remaining_seconds)
        }
    }
}

/// Format a millisecond measurement with two decimals, as shown in the UI
pub fn format_millis(ms: f64) -> String {
    format!("{:.2} ms", ms)
}

/// Calculate mean, min, max and population standard deviation.
///
/// Returns all zeros for an empty slice.
///
/// ```rust
/// # use render_benchmark::utils::calculate_stats;
/// let (mean, min, max, _std_dev) = calculate_stats(&[1.0, 2.0, 3.0, 4.0, 5.0]);
/// assert_eq!((mean, min, max), (3.0, 1.0, 5.0));
/// ```
pub fn calculate_stats(values: &[f64]) -> (f64, f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0, 0.0);
    }

    let sum: f64 = values.iter().sum();
    let count = values.len() as f64;
    let mean = sum / count;

    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count;
    let std_dev = variance.sqrt();

    (mean, min, max, std_dev)
}

/// Join a base URL and an absolute path without doubling the slash
pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Validate that the backend URL is an absolute http(s) URL
pub fn validate_base_url(base_url: &str) -> Result<()> {
    let url = reqwest::Url::parse(base_url)
        .map_err(|e| anyhow::anyhow!("Invalid base URL '{}': {}", base_url, e))?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        other => anyhow::bail!(
            "Unsupported URL scheme '{}' in '{}' (expected http or https)",
            other,
            base_url
        ),
    }
}

/// Validate that the requested payload size is one the backend will generate
pub fn validate_payload_size(payload_size: usize) -> Result<()> {
    if payload_size == 0 {
        anyhow::bail!("Payload size cannot be zero");
    }
    if payload_size > MAX_PAYLOAD_SIZE {
        anyhow::bail!(
            "Payload size {} is too large (maximum {})",
            payload_size,
            MAX_PAYLOAD_SIZE
        );
    }
    Ok(())
}

/// Validate the frame scheduler rate
pub fn validate_frame_rate(frame_rate: u32) -> Result<()> {
    if frame_rate == 0 {
        anyhow::bail!("Frame rate cannot be zero");
    }
    if frame_rate > MAX_FRAME_RATE {
        anyhow::bail!(
            "Frame rate {} is too high (maximum {})",
            frame_rate,
            MAX_FRAME_RATE
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test duration formatting with various time scales
    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_nanos(500)), "500ns");
        assert_eq!(format_duration(Duration::from_nanos(1500)), "1.50μs");
        assert_eq!(format_duration(Duration::from_micros(1500)), "1.50ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(0.0), "0.00 ms");
        assert_eq!(format_millis(123.456), "123.46 ms");
    }

    /// Test statistical calculations with known dataset
    #[test]
    fn test_calculate_stats() {
        let (mean, min, max, std_dev) = calculate_stats(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(mean, 3.0);
        assert_eq!(min, 1.0);
        assert_eq!(max, 5.0);
        assert!((std_dev - 1.4142135623730951).abs() < 0.001);

        assert_eq!(calculate_stats(&[]), (0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("http://localhost:8000", "/api/stream"),
            "http://localhost:8000/api/stream"
        );
        assert_eq!(
            join_url("http://localhost:8000/", "api/stream"),
            "http://localhost:8000/api/stream"
        );
    }

    /// Test base URL validation rules
    #[test]
    fn test_validate_base_url() {
        assert!(validate_base_url("http://localhost:8000").is_ok());
        assert!(validate_base_url("https://bench.example.com").is_ok());
        assert!(validate_base_url("localhost:8000").is_err());
        assert!(validate_base_url("ftp://localhost").is_err());
        assert!(validate_base_url("").is_err());
    }

    /// Test payload size validation rules
    #[test]
    fn test_validate_payload_size() {
        assert!(validate_payload_size(1).is_ok());
        assert!(validate_payload_size(1500).is_ok());
        assert!(validate_payload_size(5000).is_ok());
        assert!(validate_payload_size(0).is_err());
        assert!(validate_payload_size(5001).is_err());
    }

    /// Test frame rate validation rules
    #[test]
    fn test_validate_frame_rate() {
        assert!(validate_frame_rate(1).is_ok());
        assert!(validate_frame_rate(60).is_ok());
        assert!(validate_frame_rate(240).is_ok());
        assert!(validate_frame_rate(0).is_err());
        assert!(validate_frame_rate(241).is_err());
    }

    #[test]
    fn test_generate_run_id_is_unique() {
        let a = generate_run_id();
        let b = generate_run_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }
}
