//! Frame scheduling.
//!
//! A render loop delivers one callback per display refresh. Here that is a
//! [`FrameScheduler`]: an async source of frame timestamps that the
//! benchmark awaits once per tick. Everything driven from the same scheduler
//! runs on one cooperative timeline, so the sampler and the settle wait
//! observe the same frame in the same order on every run.

use crate::metrics::FrameSampler;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Source of per-frame ticks
#[async_trait]
pub trait FrameScheduler: Send {
    /// Wait for the next frame and return its timestamp
    async fn next_frame(&mut self) -> Instant;

    /// Nominal frame period
    fn frame_period(&self) -> Duration;
}

/// Frame scheduler backed by a tokio interval.
///
/// Missed ticks are skipped rather than bursted, which matches how a
/// display drops frames when the main thread is busy.
pub struct IntervalFrameScheduler {
    interval: Interval,
    period: Duration,
}

impl IntervalFrameScheduler {
    /// Create a scheduler ticking `frame_rate` times per second
    pub fn new(frame_rate: u32) -> Self {
        let period = Duration::from_nanos(1_000_000_000 / u64::from(frame_rate.max(1)));
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval, period }
    }
}

#[async_trait]
impl FrameScheduler for IntervalFrameScheduler {
    async fn next_frame(&mut self) -> Instant {
        self.interval.tick().await;
        // Report when the callback actually ran, not when it was due.
        Instant::now()
    }

    fn frame_period(&self) -> Duration {
        self.period
    }
}

/// Per-frame sampling subscription.
///
/// Owns the sampler while active. Once [`cancel`](Self::cancel) returns, no
/// further frame is accounted, even if the caller keeps ticking the same
/// scheduler for other work.
pub struct SamplingLoop {
    sampler: FrameSampler,
    active: bool,
    frames_seen: u64,
}

impl SamplingLoop {
    /// Start sampling; `now_ms` becomes the first flush point
    pub fn start(mut sampler: FrameSampler, now_ms: f64) -> Self {
        sampler.begin(now_ms);
        Self {
            sampler,
            active: true,
            frames_seen: 0,
        }
    }

    /// Account one frame. Returns false once the loop is cancelled.
    pub fn on_frame(&mut self, now_ms: f64) -> bool {
        if !self.active {
            return false;
        }
        self.frames_seen += 1;
        self.sampler.on_frame(now_ms);
        true
    }

    /// Stop sampling. Frames delivered after this call are ignored.
    pub fn cancel(&mut self) {
        self.active = false;
    }

    /// Hand the sampler back once sampling is over
    pub fn into_sampler(self) -> FrameSampler {
        self.sampler
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn sampler(&self) -> &FrameSampler {
        &self.sampler
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_interval_scheduler_ticks_at_frame_rate() {
        let mut scheduler = IntervalFrameScheduler::new(50);
        assert_eq!(scheduler.frame_period(), Duration::from_millis(20));

        let start = Instant::now();
        let first = scheduler.next_frame().await;
        let second = scheduler.next_frame().await;

        assert_eq!(first - start, Duration::from_millis(20));
        assert_eq!(second - first, Duration::from_millis(20));
    }

    #[test]
    fn test_sampling_loop_ignores_frames_after_cancel() {
        let mut sampling = SamplingLoop::start(FrameSampler::default(), 0.0);
        assert!(sampling.on_frame(16.0));
        assert!(sampling.is_active());
        assert_eq!(sampling.frames_seen(), 1);
        assert_eq!(sampling.sampler().samples().len(), 1);

        sampling.cancel();
        assert!(!sampling.is_active());
        assert!(!sampling.on_frame(40.0));
        assert_eq!(sampling.frames_seen(), 1);

        let sampler = sampling.into_sampler();
        assert_eq!(sampler.samples().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_frame_rate_is_clamped() {
        let scheduler = IntervalFrameScheduler::new(0);
        assert_eq!(scheduler.frame_period(), Duration::from_secs(1));
    }
}
