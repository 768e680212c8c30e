//! Render scheduling: the single-stream scheduler and the multi-tile
//! scheduler.
//!
//! Both schedulers are driven by an external ~60Hz vsync tick and pull
//! frames out of a [`crate::video::FrameStore`]; neither owns a thread of
//! its own. Hot-path counters are atomics so a stats poller on another
//! thread never blocks the tick.

pub mod multi_tile;
pub mod single;

pub use multi_tile::{MultiTileConfig, MultiTileScheduler, TileHandle, TileId};
pub use single::{RenderScheduler, SchedulerConfig, TickOutcome, TickStats};

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared by both scheduler flavors, polled by a stats
/// thread while the tick itself runs elsewhere.
#[derive(Debug, Default)]
pub struct SchedulerCounters {
    pub ticks: AtomicU64,
    pub frames_presented: AtomicU64,
    pub frames_discarded: AtomicU64,
    pub catchup_events: AtomicU64,
    pub recovery_events: AtomicU64,
    pub epoch_resets: AtomicU64,
    pub audio_stalls: AtomicU64,
}

impl SchedulerCounters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_presented(&self) {
        self.frames_presented.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self, n: u64) {
        if n > 0 {
            self.frames_discarded.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn record_catchup(&self) {
        self.catchup_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recovery(&self) {
        self.recovery_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_epoch_reset(&self) {
        self.epoch_resets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audio_stall(&self) {
        self.audio_stalls.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> SchedulerCountersSnapshot {
        SchedulerCountersSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            frames_presented: self.frames_presented.load(Ordering::Relaxed),
            frames_discarded: self.frames_discarded.load(Ordering::Relaxed),
            catchup_events: self.catchup_events.load(Ordering::Relaxed),
            recovery_events: self.recovery_events.load(Ordering::Relaxed),
            epoch_resets: self.epoch_resets.load(Ordering::Relaxed),
            audio_stalls: self.audio_stalls.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of [`SchedulerCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerCountersSnapshot {
    pub ticks: u64,
    pub frames_presented: u64,
    pub frames_discarded: u64,
    pub catchup_events: u64,
    pub recovery_events: u64,
    pub epoch_resets: u64,
    pub audio_stalls: u64,
}
