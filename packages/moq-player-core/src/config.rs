//! Tunable operational parameters for the MoQ player core.
//!
//! Protocol-fixed values (varint widths, priorities, message types) live in
//! [`crate::protocol_constants`] and are never configurable; this module
//! holds the numeric knobs that are tunable: timeouts, queue depths, and
//! the reconnect backoff curve.

use serde::{Deserialize, Serialize};

/// Configuration for the MoQ session and the pipelines it feeds.
///
/// All fields have sensible defaults matching the values named in the
/// specification's concurrency and timeout sections.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlayerConfig {
    /// How long the data reader waits for an unknown `track_alias` to be
    /// registered (by a late-arriving `SUBSCRIBE_OK`) before discarding the
    /// stream, in milliseconds.
    pub track_alias_wait_ms: u64,

    /// Poll interval while waiting on the alias table, in milliseconds.
    pub track_alias_poll_interval_ms: u64,

    /// Wall-clock duration without audio PTS advance that triggers
    /// audio-stall free-run in the render scheduler, in milliseconds.
    pub audio_stall_threshold_ms: u64,

    /// Backward PTS jump magnitude that triggers an epoch reset (frame
    /// store clear, ring clear + `set_pts`), in microseconds.
    pub epoch_reset_threshold_us: i64,

    /// Capacity of the video decode gate's pending-chunk backpressure
    /// threshold; at or above this, incoming frames are dropped and
    /// `wait_for_key` is set.
    pub decode_queue_backpressure_chunks: usize,

    /// Absolute PTS gap (vs. the previous input timestamp) that increments
    /// the diagnostic video PTS-jump counter, in microseconds.
    pub video_pts_jump_threshold_us: i64,

    /// Absolute PTS gap that increments the diagnostic audio
    /// `input_pts_jump` counter, in microseconds.
    pub audio_pts_jump_threshold_us: i64,

    /// Capacity of the video frame store, in frames.
    pub frame_store_capacity: usize,

    /// Audio ring size expressed as seconds of audio at the track's sample
    /// rate (`ring_size = ceil(sample_rate * audio_ring_seconds)`).
    pub audio_ring_seconds: f64,

    /// Reconnect backoff initial delay, in milliseconds.
    pub reconnect_initial_backoff_ms: u64,

    /// Reconnect backoff ceiling, in milliseconds.
    pub reconnect_max_backoff_ms: u64,
}

impl PlayerConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.frame_store_capacity == 0 {
            return Err("frame_store_capacity must be >= 1".to_string());
        }
        if self.decode_queue_backpressure_chunks == 0 {
            return Err("decode_queue_backpressure_chunks must be >= 1".to_string());
        }
        if self.audio_ring_seconds <= 0.0 {
            return Err("audio_ring_seconds must be > 0".to_string());
        }
        if self.reconnect_initial_backoff_ms > self.reconnect_max_backoff_ms {
            return Err(
                "reconnect_initial_backoff_ms must not exceed reconnect_max_backoff_ms"
                    .to_string(),
            );
        }
        Ok(())
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            track_alias_wait_ms: 500,
            track_alias_poll_interval_ms: 5,
            audio_stall_threshold_ms: 200,
            epoch_reset_threshold_us: 30_000_000,
            decode_queue_backpressure_chunks: 16,
            video_pts_jump_threshold_us: 500_000,
            audio_pts_jump_threshold_us: 100_000,
            frame_store_capacity: 90,
            audio_ring_seconds: 4.0,
            reconnect_initial_backoff_ms: 2_000,
            reconnect_max_backoff_ms: 16_000,
        }
    }
}
