//! Single-stream render scheduler.
//!
//! Driven by an external ~60Hz vsync tick. When an audio clock is present
//! the scheduler paces video to `playback_pts`; with no audio (or during an
//! audio stall) it free-runs off the wall clock so video never stops
//! advancing while waiting on a clock source that has gone quiet.

use std::time::{Duration, Instant};

use crate::scheduler::SchedulerCounters;
use crate::video::{FrameStore, QueueStats, VideoFrame};

/// Backward jump in the audio clock (vs. the last observed value) that is
/// treated as a new playback epoch rather than clock jitter.
const EPOCH_RESET_THRESHOLD_US: i64 = 30_000_000;
/// Divergence between the render target and the last presented frame's PTS
/// that forces an unconditional frame grab, counted separately from an
/// ordinary catch-up because it implies the backlog is unrecoverable by
/// pacing alone.
const RECOVERY_THRESHOLD_US: i64 = 30_000_000;
/// Divergence that forces an unconditional frame grab without waiting for
/// the currently presented frame to expire.
const CATCHUP_THRESHOLD_US: i64 = 150_000;
/// Frames already queued when free-run starts cold that trigger a skip to
/// the newest buffered frame instead of draining the backlog one tick at a
/// time.
const COLD_START_PREFILL_FRAMES: usize = 9;

/// What a single [`RenderScheduler::tick`] did.
#[derive(Debug)]
pub enum TickOutcome<F> {
    /// A new frame was taken from the store and should be presented.
    Presented(F),
    /// The previously presented frame is still within its duration; nothing
    /// new to present this tick.
    Held,
    /// The store had nothing at or before the render target.
    Empty,
}

/// Per-tick stats snapshot, suitable for a periodic UI poll or log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickStats {
    pub video_pts: i64,
    pub audio_pts: i64,
    pub target_pts: i64,
    pub queue: QueueStats,
    pub discarded_this_tick: u64,
    pub free_running: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub audio_stall_threshold: Duration,
    pub epoch_reset_threshold_us: i64,
}

impl SchedulerConfig {
    #[must_use]
    pub fn from_player_config(config: &crate::config::PlayerConfig) -> Self {
        Self {
            audio_stall_threshold: Duration::from_millis(config.audio_stall_threshold_ms),
            epoch_reset_threshold_us: config.epoch_reset_threshold_us,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            audio_stall_threshold: Duration::from_millis(200),
            epoch_reset_threshold_us: EPOCH_RESET_THRESHOLD_US,
        }
    }
}

#[derive(Clone, Copy)]
enum Clock {
    /// Tracking the audio clock directly.
    AudioLocked { last_pts: i64, last_advance_at: Instant },
    /// Advancing off the wall clock, anchored at `base_pts` as of `start`.
    FreeRun { base_pts: i64, start: Instant },
}

/// The single-stream render scheduler.
pub struct RenderScheduler<F: VideoFrame> {
    store: FrameStore<F>,
    config: SchedulerConfig,
    current_end_pts: Option<i64>,
    clock: Clock,
    ticked: bool,
}

impl<F: VideoFrame> RenderScheduler<F> {
    #[must_use]
    pub fn new(store: FrameStore<F>, config: SchedulerConfig) -> Self {
        Self {
            store,
            config,
            current_end_pts: None,
            clock: Clock::FreeRun {
                base_pts: 0,
                start: Instant::now(),
            },
            ticked: false,
        }
    }

    #[must_use]
    pub fn store_mut(&mut self) -> &mut FrameStore<F> {
        &mut self.store
    }

    /// Advances the scheduler by one vsync tick.
    ///
    /// `playback_pts` is the audio consumer's current playback position in
    /// microseconds, or `None` if no audio track is active or the consumer
    /// has not started.
    pub fn tick(
        &mut self,
        playback_pts: Option<i64>,
        now: Instant,
        counters: &SchedulerCounters,
    ) -> (TickOutcome<F>, TickStats) {
        counters.record_tick();

        let epoch_reset = self.update_clock(playback_pts, now, counters);
        if epoch_reset {
            self.store.clear();
            self.current_end_pts = None;
            counters.record_epoch_reset();
        }

        let target = self.target_pts(now);
        let mut force = epoch_reset;
        let mut recovery = false;

        if let Some(end) = self.current_end_pts {
            let divergence = target - end;
            if divergence > RECOVERY_THRESHOLD_US {
                force = true;
                recovery = true;
            } else if divergence > CATCHUP_THRESHOLD_US {
                force = true;
            }
        } else {
            force = true;
        }

        if recovery {
            counters.record_recovery();
        } else if force && !epoch_reset {
            counters.record_catchup();
        }

        let should_take = force || self.current_end_pts.map_or(true, |end| target >= end);

        let (outcome, discarded) = if should_take {
            let result = self.store.take_by_timestamp(target);
            let discarded = result.discarded;
            counters.record_discarded(discarded);
            match result.frame {
                Some(frame) => {
                    self.current_end_pts = Some(frame.timestamp() + frame.duration());
                    counters.record_presented();
                    (TickOutcome::Presented(frame), discarded)
                }
                None => (TickOutcome::Empty, discarded),
            }
        } else {
            (TickOutcome::Held, 0)
        };

        let stats = TickStats {
            video_pts: self.current_end_pts.unwrap_or(0),
            audio_pts: playback_pts.unwrap_or(-1),
            target_pts: target,
            queue: self.store.stats(),
            discarded_this_tick: discarded,
            free_running: matches!(self.clock, Clock::FreeRun { .. }),
        };

        (outcome, stats)
    }

    /// Updates the internal clock model; returns `true` if this tick should
    /// be treated as a new playback epoch (frame store and anchors reset).
    fn update_clock(
        &mut self,
        playback_pts: Option<i64>,
        now: Instant,
        counters: &SchedulerCounters,
    ) -> bool {
        match playback_pts {
            Some(pts) => {
                let mut epoch_reset = false;
                match &self.clock {
                    Clock::AudioLocked { last_pts, .. } => {
                        if *last_pts - pts > self.config.epoch_reset_threshold_us {
                            epoch_reset = true;
                        }
                    }
                    Clock::FreeRun { base_pts, .. } => {
                        if *base_pts - pts > self.config.epoch_reset_threshold_us && self.ticked {
                            epoch_reset = true;
                        }
                    }
                }

                let advanced = match &self.clock {
                    Clock::AudioLocked { last_pts, .. } => pts != *last_pts,
                    Clock::FreeRun { .. } => true,
                };

                if advanced || !self.ticked {
                    self.clock = Clock::AudioLocked {
                        last_pts: pts,
                        last_advance_at: now,
                    };
                } else if let Clock::AudioLocked {
                    last_advance_at, ..
                } = &self.clock
                {
                    if now.duration_since(*last_advance_at) > self.config.audio_stall_threshold {
                        counters.record_audio_stall();
                        self.clock = Clock::FreeRun {
                            base_pts: pts,
                            start: now,
                        };
                    }
                }

                self.ticked = true;
                epoch_reset
            }
            None => {
                if !self.ticked {
                    let base_pts = self.cold_start_base_pts();
                    self.clock = Clock::FreeRun {
                        base_pts,
                        start: now,
                    };
                }
                self.ticked = true;
                false
            }
        }
    }

    /// On a cold start with no audio clock, skips straight to the newest
    /// buffered frame rather than draining a prefilled backlog one tick at
    /// a time.
    fn cold_start_base_pts(&self) -> i64 {
        if self.store.len() > COLD_START_PREFILL_FRAMES {
            self.store.peek_last().map(VideoFrame::timestamp).unwrap_or(0)
        } else {
            self.store.peek_first().map(VideoFrame::timestamp).unwrap_or(0)
        }
    }

    fn target_pts(&self, now: Instant) -> i64 {
        match self.clock {
            Clock::AudioLocked { last_pts, .. } => last_pts,
            Clock::FreeRun { base_pts, start } => {
                base_pts + now.duration_since(start).as_micros() as i64
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestFrame {
        ts: i64,
        dur: i64,
    }

    impl VideoFrame for TestFrame {
        fn timestamp(&self) -> i64 {
            self.ts
        }
        fn duration(&self) -> i64 {
            self.dur
        }
    }

    fn frame(ts: i64) -> TestFrame {
        TestFrame { ts, dur: 33_333 }
    }

    fn scheduler(frames: &[i64]) -> RenderScheduler<TestFrame> {
        let mut store = FrameStore::new(90);
        for &ts in frames {
            store.insert(frame(ts));
        }
        RenderScheduler::new(store, SchedulerConfig::default())
    }

    #[test]
    fn audio_locked_presents_frame_at_or_before_target() {
        let mut sched = scheduler(&[0, 33_333, 66_666, 100_000]);
        let counters = SchedulerCounters::new();
        let (outcome, stats) = sched.tick(Some(70_000), Instant::now(), &counters);
        match outcome {
            TickOutcome::Presented(f) => assert_eq!(f.ts, 66_666),
            _ => panic!("expected a presented frame"),
        }
        assert_eq!(stats.audio_pts, 70_000);
        assert!(!stats.free_running);
        assert_eq!(counters.snapshot().frames_presented, 1);
    }

    #[test]
    fn holds_current_frame_until_target_passes_its_end() {
        let mut sched = scheduler(&[0, 33_333, 66_666]);
        let counters = SchedulerCounters::new();
        let (_, _) = sched.tick(Some(10_000), Instant::now(), &counters);
        let (outcome, _) = sched.tick(Some(20_000), Instant::now(), &counters);
        assert!(matches!(outcome, TickOutcome::Held));
    }

    #[test]
    fn catch_up_forces_a_grab_past_150ms_divergence() {
        let mut sched = scheduler(&[0, 33_333, 500_000]);
        let counters = SchedulerCounters::new();
        sched.tick(Some(10_000), Instant::now(), &counters);
        let (outcome, _) = sched.tick(Some(400_000), Instant::now(), &counters);
        match outcome {
            TickOutcome::Presented(f) => assert_eq!(f.ts, 33_333),
            _ => panic!("expected catch-up grab"),
        }
        assert_eq!(counters.snapshot().catchup_events, 1);
    }

    #[test]
    fn no_audio_free_runs_off_wall_clock() {
        let mut sched = scheduler(&[0, 33_333]);
        let counters = SchedulerCounters::new();
        let (_, stats) = sched.tick(None, Instant::now(), &counters);
        assert!(stats.free_running);
        assert_eq!(stats.audio_pts, -1);
    }

    #[test]
    fn empty_store_reports_empty_outcome() {
        let mut sched: RenderScheduler<TestFrame> = scheduler(&[]);
        let counters = SchedulerCounters::new();
        let (outcome, _) = sched.tick(Some(0), Instant::now(), &counters);
        assert!(matches!(outcome, TickOutcome::Empty));
    }
}
