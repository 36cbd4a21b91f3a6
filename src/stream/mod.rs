//! # Stream Aggregation Module
//!
//! Consumes server-sent event payloads and keeps three views of them:
//!
//! - the raw text of the last message and the last parsed event
//! - a bounded, newest-first history of [`StreamEvent`]s
//! - [`RunningMetrics`]: total events, last latency, running mean latency
//!
//! A payload is either one event or a batch (`{"batch": true, "updates": [...]}`).
//! A batch of `k` events leaves the history and the total exactly as `k`
//! single messages would, with two deliberate differences: the current
//! event is the first batch element, and the mean is updated once from the
//! batch sum (see [`RunningMetrics::apply`]).

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use tracing::{debug, warn};

pub mod monitor;
pub mod session;

pub use monitor::{FpsCounter, MonitorStatus, ProcessingTimer, StreamMonitor};
pub use session::StreamSession;

/// Optional prefix of raw SSE lines
const DATA_PREFIX: &str = "data: ";

/// Settings of the stream mode
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    pub url: String,
    pub duration: std::time::Duration,
    pub max_events: Option<usize>,
    pub reconnect: bool,
    pub max_retry_secs: u64,
    pub history_limit: usize,
}

impl StreamConfig {
    pub fn from_args(args: &crate::cli::Args) -> anyhow::Result<Self> {
        crate::utils::validate_base_url(&args.base_url)?;
        if args.duration.is_zero() {
            anyhow::bail!("Stream duration cannot be zero");
        }
        if args.max_events == Some(0) {
            anyhow::bail!("Max events cannot be zero");
        }

        Ok(Self {
            url: crate::utils::join_url(&args.base_url, &args.stream_path),
            duration: args.duration,
            max_events: args.max_events,
            reconnect: args.reconnect,
            max_retry_secs: args.max_retry_secs,
            history_limit: crate::defaults::HISTORY_LIMIT,
        })
    }
}

/// One event as kept in the history.
///
/// Server fields are preserved as received; the two client fields are
/// added next to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    /// Receive time, ISO 8601 with millisecond precision
    #[serde(rename = "_clientTime")]
    pub client_time: String,
    /// Receive time minus server timestamp, when the event carried one
    #[serde(rename = "_latency")]
    pub latency: Option<i64>,
}

/// Bounded newest-first event history
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    entries: VecDeque<StreamEvent>,
    limit: usize,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(crate::defaults::HISTORY_LIMIT)
    }
}

impl HistoryBuffer {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            entries: VecDeque::with_capacity(limit),
            limit,
        }
    }

    /// Prepend events given in arrival order, then evict once.
    ///
    /// The last event ends up at index 0, as if each had been prepended on
    /// its own. When the batch alone exceeds the limit, only its newest
    /// entries remain.
    pub fn prepend_batch(&mut self, events: Vec<StreamEvent>) {
        for event in events {
            self.entries.push_front(event);
        }
        self.entries.truncate(self.limit);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Newest event
    pub fn newest(&self) -> Option<&StreamEvent> {
        self.entries.front()
    }

    /// Events, newest first
    pub fn iter(&self) -> impl Iterator<Item = &StreamEvent> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<StreamEvent> {
        self.entries.iter().cloned().collect()
    }
}

/// Running latency metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningMetrics {
    pub total_received: u64,
    pub last_latency: Option<i64>,
    /// Rounded running mean
    pub average_latency: Option<i64>,
    /// Unrounded running mean; rounding happens only when publishing
    #[serde(skip)]
    mean: Option<f64>,
}

impl RunningMetrics {
    /// Fold one group of events into the metrics.
    ///
    /// `latencies` holds one entry per event in arrival order, `None` for
    /// events without a timestamp. With `k` events of which `c` carry a
    /// latency summing to `S`:
    ///
    /// - `total > 0`: `(mean * total + S) / (total + k)`, a missing prior
    ///   mean counting as 0
    /// - `total == 0`: `S / c`
    /// - `c == 0`: mean unchanged
    ///
    /// `total_received` grows by `k` either way. For a single event this is
    /// the plain incremental mean. For a batch whose events all carry
    /// timestamps it equals `k` sequential updates; when some do not, it
    /// divides the batch sum by the full new total once instead of chaining
    /// per-event updates.
    pub fn apply(&mut self, latencies: &[Option<i64>]) {
        if latencies.is_empty() {
            return;
        }

        let k = latencies.len() as u64;
        let valid: Vec<i64> = latencies.iter().flatten().copied().collect();
        let prior_total = self.total_received;
        self.total_received += k;
        self.last_latency = latencies.last().copied().flatten();

        if valid.is_empty() {
            return;
        }

        let sum: f64 = valid.iter().map(|&l| l as f64).sum();
        let mean = if prior_total > 0 {
            let prior = self.mean.unwrap_or(0.0);
            (prior * prior_total as f64 + sum) / (prior_total + k) as f64
        } else {
            sum / valid.len() as f64
        };

        self.mean = Some(mean);
        self.average_latency = Some(mean.round() as i64);
    }

    /// Unrounded running mean
    pub fn mean(&self) -> Option<f64> {
        self.mean
    }
}

/// Result of ingesting one raw message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ingest {
    /// Logical events applied (0 when the message was dropped)
    pub events: usize,
    /// Latencies of the applied events that carried a timestamp
    pub latencies: Vec<i64>,
    /// Applied events in arrival order
    pub applied: Vec<StreamEvent>,
}

impl Ingest {
    pub fn is_dropped(&self) -> bool {
        self.events == 0
    }
}

/// Streaming-event aggregator.
///
/// Owns every store; [`process_new_event`](Self::process_new_event) is the
/// only mutation path.
#[derive(Debug, Default)]
pub struct StreamAggregator {
    raw_event: String,
    current_event: Option<Value>,
    history: HistoryBuffer,
    metrics: RunningMetrics,
    dropped: u64,
}

impl StreamAggregator {
    pub fn new(history_limit: usize) -> Self {
        Self {
            history: HistoryBuffer::new(history_limit),
            ..Default::default()
        }
    }

    /// Ingest one raw message received now
    pub fn process_new_event(&mut self, raw: &str) -> Ingest {
        self.process_new_event_at(raw, Utc::now())
    }

    /// Ingest one raw message received at `now`.
    ///
    /// Malformed messages are logged and dropped; only the raw store changes.
    pub fn process_new_event_at(&mut self, raw: &str, now: DateTime<Utc>) -> Ingest {
        self.raw_event = raw.to_string();

        let json = raw.strip_prefix(DATA_PREFIX).unwrap_or(raw);
        let payload = match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                warn!("Dropping non-object stream payload: {}", other);
                self.dropped += 1;
                return Ingest::default();
            }
            Err(e) => {
                warn!("Failed to parse stream payload: {} (data: {:?})", e, raw);
                self.dropped += 1;
                return Ingest::default();
            }
        };

        let (current, updates) = split_batch(payload);
        if updates.is_empty() {
            debug!("Empty batch ignored");
            return Ingest::default();
        }

        let client_time = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        let now_ms = now.timestamp_millis();

        let events: Vec<StreamEvent> = updates
            .into_iter()
            .map(|fields| {
                let latency = fields
                    .get("timestamp")
                    .and_then(parse_server_timestamp)
                    .map(|server| now_ms - server.timestamp_millis());
                StreamEvent {
                    fields,
                    client_time: client_time.clone(),
                    latency,
                }
            })
            .collect();

        let latencies: Vec<Option<i64>> = events.iter().map(|e| e.latency).collect();
        let ingest = Ingest {
            events: events.len(),
            latencies: latencies.iter().flatten().copied().collect(),
            applied: events.clone(),
        };

        if current.is_some() {
            self.current_event = current;
        }
        self.history.prepend_batch(events);
        self.metrics.apply(&latencies);

        debug!(
            "Ingested {} events (total {}, avg latency {:?})",
            ingest.events, self.metrics.total_received, self.metrics.average_latency
        );
        ingest
    }

    pub fn raw_event(&self) -> &str {
        &self.raw_event
    }

    /// Event shown as "current": the payload, or the first element of a batch
    pub fn current_event(&self) -> Option<&Value> {
        self.current_event.as_ref()
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn metrics(&self) -> &RunningMetrics {
        &self.metrics
    }

    /// Messages dropped as malformed
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Split a payload into its current event and logical events.
///
/// A truthy `batch` with an array `updates` yields the object elements of
/// `updates`; anything else is one event.
fn split_batch(mut payload: Map<String, Value>) -> (Option<Value>, Vec<Map<String, Value>>) {
    let is_batch = payload.get("batch").map(is_truthy).unwrap_or(false)
        && payload.get("updates").map(Value::is_array).unwrap_or(false);

    if !is_batch {
        let current = Value::Object(payload.clone());
        return (Some(current), vec![payload]);
    }

    let updates = match payload.remove("updates") {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };

    let mut events = Vec::with_capacity(updates.len());
    for item in updates {
        match item {
            Value::Object(map) => events.push(map),
            other => warn!("Skipping non-object batch element: {}", other),
        }
    }

    let current = events.first().map(|first| Value::Object(first.clone()));
    (current, events)
}

/// JavaScript truthiness of a JSON value
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Parse a server timestamp.
///
/// Accepts RFC 3339, ISO 8601 without offset (taken as UTC), a bare date
/// (UTC midnight), and integer milliseconds since the Unix epoch.
pub fn parse_server_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                return Some(naive.and_utc());
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        }
        Value::Number(n) => n
            .as_i64()
            .filter(|&ms| ms != 0)
            .and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}
