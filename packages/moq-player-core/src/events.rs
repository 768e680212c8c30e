//! The downstream sink callback surface.
//!
//! The session dispatches demuxed objects to these callbacks by
//! `track_alias`; it does not itself drive decoding. A host wires the
//! video/audio callbacks into the decode gate ([`crate::video::DecodeGate`])
//! and audio fanout (`moq-player-audio`'s consumer) — this crate's
//! [`crate::bootstrap`] module shows the reference wiring.

use bytes::Bytes;

use crate::caption::CaptionObject;
use crate::catalog::TrackDescriptor;
use crate::stats::StatsObject;

/// The narrow callback surface the MoQ session emits events through.
///
/// Implementations must not block: these are called from the session's
/// cooperative task context.
pub trait PlayerSink: Send + Sync {
    /// Fired once, after the catalog is decoded.
    fn on_track_info(&self, tracks: &[TrackDescriptor]);

    /// One encoded video object, ready for the decode gate.
    fn on_video_frame(
        &self,
        payload: &Bytes,
        is_keyframe: bool,
        pts: i64,
        group_id: u64,
        codec_config: Option<&Bytes>,
    );

    /// One encoded audio object, ready for the decode fanout.
    fn on_audio_frame(&self, payload: &Bytes, pts: i64, group_id: u64, track_index: u32);

    /// One decoded caption object.
    fn on_caption_frame(&self, parsed: &CaptionObject, pts: i64);

    /// One decoded stats object from the `stats` track.
    fn on_server_stats(&self, stats: &StatsObject);

    /// The session has closed (remote GOAWAY, transport close, or local
    /// `close()`).
    fn on_close(&self);

    /// A non-terminal error occurred; `reason` is a human-readable summary,
    /// never raw protocol bytes.
    fn on_error(&self, reason: &str);
}

/// A sink that drops every event. Useful for tests and for sessions whose
/// caller only wants the stats/track list via another path.
#[derive(Debug, Default)]
pub struct NoopSink;

impl PlayerSink for NoopSink {
    fn on_track_info(&self, _tracks: &[TrackDescriptor]) {}
    fn on_video_frame(
        &self,
        _payload: &Bytes,
        _is_keyframe: bool,
        _pts: i64,
        _group_id: u64,
        _codec_config: Option<&Bytes>,
    ) {
    }
    fn on_audio_frame(&self, _payload: &Bytes, _pts: i64, _group_id: u64, _track_index: u32) {}
    fn on_caption_frame(&self, _parsed: &CaptionObject, _pts: i64) {}
    fn on_server_stats(&self, _stats: &StatsObject) {}
    fn on_close(&self) {}
    fn on_error(&self, _reason: &str) {}
}
