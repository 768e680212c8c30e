//! Stats object parsing and the session's user-visible counters.
//!
//! The stats track carries one JSON object per frame describing server-side
//! pipeline health; malformed payloads are dropped silently rather than
//! treated as a session-level protocol error.
//! [`AtomicPlayerStats`] is the separate, locally-maintained counter set the
//! session exposes as its user-visible surface (dropped frames, inserted
//! silence, PTS jumps, decoder errors) — distinct from, and not derived
//! from, the server's stats object.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PlayerError;

/// One decoded stats object from the `stats` track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsObject {
    pub stats: StatsBody,
    #[serde(rename = "viewerStats", default)]
    pub viewer_stats: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsBody {
    #[serde(default)]
    pub video: Value,
    #[serde(default)]
    pub audio: Value,
    #[serde(default)]
    pub captions: Value,
    #[serde(default)]
    pub scte35: Option<Scte35Stats>,
    pub protocol: String,
    #[serde(rename = "uptimeMs")]
    pub uptime_ms: u64,
    #[serde(rename = "viewerCount")]
    pub viewer_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scte35Stats {
    #[serde(default)]
    pub recent: Vec<Value>,
    #[serde(rename = "totalEvents")]
    pub total_events: u64,
}

/// Parses one stats object. Returns [`PlayerError::Malformed`] on any shape
/// mismatch — the caller drops the event and counts it.
pub fn parse_stats(bytes: &[u8]) -> Result<StatsObject, PlayerError> {
    serde_json::from_slice(bytes).map_err(|e| PlayerError::Malformed(e.to_string()))
}

/// The session's locally-maintained, lock-free counter set: connection
/// status plus per-subsystem counters a UI can surface without exposing raw
/// protocol details.
#[derive(Debug, Default)]
pub struct AtomicPlayerStats {
    pub dropped_video_frames: AtomicU64,
    pub dropped_audio_frames: AtomicU64,
    pub inserted_silence_ms: AtomicU64,
    pub video_pts_jumps: AtomicU64,
    pub audio_pts_jumps: AtomicU64,
    pub decoder_errors: AtomicU64,
}

impl AtomicPlayerStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_dropped_video(&self) {
        self.dropped_video_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_audio(&self) {
        self.dropped_audio_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inserted_silence_ms(&self, ms: u64) {
        self.inserted_silence_ms.fetch_add(ms, Ordering::Relaxed);
    }

    pub fn record_video_pts_jump(&self) {
        self.video_pts_jumps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audio_pts_jump(&self) {
        self.audio_pts_jumps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decoder_error(&self) {
        self.decoder_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// A consistent point-in-time snapshot, suitable for a per-tick stats
    /// emission or a UI poll.
    #[must_use]
    pub fn snapshot(&self) -> PlayerStatsSnapshot {
        PlayerStatsSnapshot {
            dropped_video_frames: self.dropped_video_frames.load(Ordering::Relaxed),
            dropped_audio_frames: self.dropped_audio_frames.load(Ordering::Relaxed),
            inserted_silence_ms: self.inserted_silence_ms.load(Ordering::Relaxed),
            video_pts_jumps: self.video_pts_jumps.load(Ordering::Relaxed),
            audio_pts_jumps: self.audio_pts_jumps.load(Ordering::Relaxed),
            decoder_errors: self.decoder_errors.load(Ordering::Relaxed),
        }
    }
}

/// An immutable snapshot of [`AtomicPlayerStats`] at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStatsSnapshot {
    pub dropped_video_frames: u64,
    pub dropped_audio_frames: u64,
    pub inserted_silence_ms: u64,
    pub video_pts_jumps: u64,
    pub audio_pts_jumps: u64,
    pub decoder_errors: u64,
}
