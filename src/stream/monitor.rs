//! Live stream monitor: a coarse once-per-second FPS counter and the
//! processing time of the last ingested message.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Recompute window of the FPS counter
const FPS_WINDOW_MS: f64 = 1000.0;

/// FPS reported before the first full window
const INITIAL_FPS: u32 = 60;

/// Monitor state as published to the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    pub fps: u32,
    pub last_frame_time: f64,
    /// Milliseconds spent ingesting the last message, rounded
    pub processing_time: u64,
    pub is_running: bool,
}

impl Default for MonitorStatus {
    fn default() -> Self {
        Self {
            fps: INITIAL_FPS,
            last_frame_time: 0.0,
            processing_time: 0,
            is_running: false,
        }
    }
}

/// Frame counter that republishes FPS once per elapsed second
#[derive(Debug, Default)]
pub struct FpsCounter {
    running: bool,
    frame_count: u64,
    last_time: f64,
}

impl FpsCounter {
    /// Start counting at `now_ms`. No-op while already running.
    pub fn start(&mut self, now_ms: f64, status: &mut MonitorStatus) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        self.frame_count = 0;
        self.last_time = now_ms;
        status.is_running = true;
        true
    }

    /// Count one frame; publishes a new rate once a full window has elapsed
    pub fn on_frame(&mut self, now_ms: f64, status: &mut MonitorStatus) -> Option<u32> {
        if !self.running {
            return None;
        }

        self.frame_count += 1;
        let elapsed = now_ms - self.last_time;
        if elapsed < FPS_WINDOW_MS {
            return None;
        }

        let fps = (self.frame_count as f64 * 1000.0 / elapsed).round() as u32;
        status.fps = fps;
        status.last_frame_time = now_ms;
        self.frame_count = 0;
        self.last_time = now_ms;
        Some(fps)
    }

    /// Stop counting. No-op when not running.
    pub fn stop(&mut self, status: &mut MonitorStatus) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        status.is_running = false;
        true
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

/// Start/end timer for message processing
#[derive(Debug, Default)]
pub struct ProcessingTimer {
    started: Option<Instant>,
}

impl ProcessingTimer {
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Finish the measurement and publish it, rounded to whole milliseconds
    pub fn end(&mut self, status: &mut MonitorStatus) -> Option<u64> {
        let started = self.started.take()?;
        let ms = (started.elapsed().as_secs_f64() * 1000.0).round() as u64;
        status.processing_time = ms;
        Some(ms)
    }
}

/// FPS counter and processing timer sharing one published status
#[derive(Debug, Default)]
pub struct StreamMonitor {
    fps: FpsCounter,
    timer: ProcessingTimer,
    status: MonitorStatus,
}

impl StreamMonitor {
    pub fn start(&mut self, now_ms: f64) -> bool {
        self.fps.start(now_ms, &mut self.status)
    }

    pub fn on_frame(&mut self, now_ms: f64) -> Option<u32> {
        self.fps.on_frame(now_ms, &mut self.status)
    }

    pub fn stop(&mut self) -> bool {
        self.fps.stop(&mut self.status)
    }

    pub fn begin_processing(&mut self) {
        self.timer.start();
    }

    pub fn end_processing(&mut self) -> Option<u64> {
        self.timer.end(&mut self.status)
    }

    pub fn status(&self) -> &MonitorStatus {
        &self.status
    }
}
