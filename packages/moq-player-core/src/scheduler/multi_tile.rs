//! Multi-tile render scheduler: a grid/mosaic view where every tile
//! runs its own audio-clock-less pacing off a proportional rate controller,
//! all driven by a single external tick.

use std::collections::HashMap;
use std::time::Instant;

use crate::scheduler::SchedulerCounters;
use crate::scheduler::single::TickOutcome;
use crate::video::{FrameStore, QueueStats, VideoFrame};

/// A tile's identity within the mosaic.
pub type TileId = u32;

/// Multiple of `initial_fill_frames` that, if exceeded while still filling,
/// triggers a skip straight to the newest buffered frame instead of
/// draining the backlog one tick at a time.
const OVERSHOOT_FACTOR: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct MultiTileConfig {
    /// Target steady-state queue depth; the rate controller's dead zone is
    /// centered on this value.
    pub initial_fill_frames: usize,
    /// Proportional gain applied to the queue-depth error.
    pub rate_gain: f64,
    /// Maximum fractional deviation from a 1.0 clock rate.
    pub rate_clamp: f64,
    /// Backward input-PTS jump that resets a tile's anchor and refill gate.
    pub discontinuity_threshold_us: i64,
    /// Per-tile frame store capacity.
    pub frame_store_capacity: usize,
}

impl Default for MultiTileConfig {
    fn default() -> Self {
        Self {
            initial_fill_frames: 3,
            rate_gain: 0.002,
            rate_clamp: 0.02,
            discontinuity_threshold_us: 1_000_000,
            frame_store_capacity: 90,
        }
    }
}

#[derive(Clone, Copy)]
enum TileClock {
    Filling,
    Running { base_pts: i64, start: Instant },
}

struct Tile<F: VideoFrame> {
    store: FrameStore<F>,
    clock: TileClock,
    current_end_pts: Option<i64>,
    last_input_pts: Option<i64>,
    aspect: Option<(u32, u32)>,
    dest_rect_dirty: bool,
}

impl<F: VideoFrame> Tile<F> {
    fn new(capacity: usize) -> Self {
        Self {
            store: FrameStore::new(capacity),
            clock: TileClock::Filling,
            current_end_pts: None,
            last_input_pts: None,
            aspect: None,
            dest_rect_dirty: false,
        }
    }
}

/// Result of one tile's contribution to a [`MultiTileScheduler::tick`].
pub struct TileHandle<F> {
    pub outcome: TickOutcome<F>,
    pub queue: QueueStats,
    pub filling: bool,
    pub dest_rect_dirty: bool,
}

/// The multi-tile scheduler. Owns one [`FrameStore`] and rate-controller
/// state per tile; a single `tick` call paces every tile at once.
pub struct MultiTileScheduler<F: VideoFrame> {
    tiles: HashMap<TileId, Tile<F>>,
    config: MultiTileConfig,
}

impl<F: VideoFrame> MultiTileScheduler<F> {
    #[must_use]
    pub fn new(config: MultiTileConfig) -> Self {
        Self {
            tiles: HashMap::new(),
            config,
        }
    }

    pub fn add_tile(&mut self, id: TileId) {
        self.tiles
            .entry(id)
            .or_insert_with(|| Tile::new(self.config.frame_store_capacity));
    }

    pub fn remove_tile(&mut self, id: TileId) {
        self.tiles.remove(&id);
    }

    #[must_use]
    pub fn tile_ids(&self) -> Vec<TileId> {
        self.tiles.keys().copied().collect()
    }

    /// Inserts a decoded frame into a tile's store. A backward PTS jump
    /// past the discontinuity threshold resets the tile's anchor and
    /// refill gate, discarding whatever was buffered.
    pub fn insert_frame(&mut self, id: TileId, frame: F, counters: &SchedulerCounters) {
        let config = self.config;
        let Some(tile) = self.tiles.get_mut(&id) else {
            return;
        };

        let ts = frame.timestamp();
        if let Some(last) = tile.last_input_pts {
            if last - ts > config.discontinuity_threshold_us {
                tile.store.clear();
                tile.clock = TileClock::Filling;
                tile.current_end_pts = None;
                counters.record_epoch_reset();
            }
        }
        tile.last_input_pts = Some(ts);
        tile.store.insert(frame);
    }

    /// Updates a tile's source aspect ratio; marks its destination rect
    /// dirty if the aspect actually changed.
    pub fn set_aspect(&mut self, id: TileId, width: u32, height: u32) {
        if let Some(tile) = self.tiles.get_mut(&id) {
            if tile.aspect != Some((width, height)) {
                tile.aspect = Some((width, height));
                tile.dest_rect_dirty = true;
            }
        }
    }

    /// Advances every tile by one tick, summing eviction counters into the
    /// shared [`SchedulerCounters`].
    pub fn tick(&mut self, now: Instant, counters: &SchedulerCounters) -> HashMap<TileId, TileHandle<F>> {
        counters.record_tick();
        let config = self.config;
        let mut out = HashMap::with_capacity(self.tiles.len());

        for (&id, tile) in self.tiles.iter_mut() {
            if matches!(tile.clock, TileClock::Filling) {
                try_start(tile, &config, now, counters);
            }

            let outcome = match tile.clock {
                TileClock::Filling => TickOutcome::Held,
                TileClock::Running { base_pts, start } => {
                    let rate = clock_rate(tile.store.len(), &config);
                    let elapsed_us = now.saturating_duration_since(start).as_micros() as i64;
                    let target = base_pts + (elapsed_us as f64 * rate) as i64;

                    let should_take = tile.current_end_pts.map_or(true, |end| target >= end);
                    if should_take {
                        let result = tile.store.take_by_timestamp(target);
                        counters.record_discarded(result.discarded);
                        match result.frame {
                            Some(f) => {
                                tile.current_end_pts = Some(f.timestamp() + f.duration());
                                counters.record_presented();
                                TickOutcome::Presented(f)
                            }
                            None => TickOutcome::Empty,
                        }
                    } else {
                        TickOutcome::Held
                    }
                }
            };

            let dest_rect_dirty = std::mem::take(&mut tile.dest_rect_dirty);
            out.insert(
                id,
                TileHandle {
                    outcome,
                    queue: tile.store.stats(),
                    filling: matches!(tile.clock, TileClock::Filling),
                    dest_rect_dirty,
                },
            );
        }

        out
    }
}

fn try_start<F: VideoFrame>(
    tile: &mut Tile<F>,
    config: &MultiTileConfig,
    now: Instant,
    counters: &SchedulerCounters,
) {
    if tile.store.len() < config.initial_fill_frames {
        return;
    }

    let overshoot_limit = config.initial_fill_frames * OVERSHOOT_FACTOR;
    if tile.store.len() > overshoot_limit {
        while tile.store.len() > 1 {
            if tile.store.take_next().is_some() {
                counters.record_discarded(1);
            }
        }
    }

    let base_pts = tile.store.peek_first().map(VideoFrame::timestamp).unwrap_or(0);
    tile.clock = TileClock::Running {
        base_pts,
        start: now,
    };
}

/// `error = queue_size - target`; a `+/-1` dead zone avoids hunting, beyond
/// which the rate nudges by up to `rate_clamp` to drain or refill the
/// queue back toward the target depth.
fn clock_rate(queue_len: usize, config: &MultiTileConfig) -> f64 {
    let error = queue_len as f64 - config.initial_fill_frames as f64;
    if error.abs() <= 1.0 {
        1.0
    } else {
        1.0 + (error * config.rate_gain).clamp(-config.rate_clamp, config.rate_clamp)
    }
}
