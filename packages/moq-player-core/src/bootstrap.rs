//! Composition root wiring the session to the video pipeline (decode gate,
//! frame store, render scheduler) and out to a host-supplied audio router.
//!
//! This crate does not depend on `moq-player-audio` — the dependency runs
//! the other way, since the real-time audio ring is a platform concern a
//! host owns alongside its decoders. [`PlayerHandle::connect`] therefore
//! takes an [`AudioFrameRouter`] the host implements by forwarding frames
//! into its own `moq-player-audio::AudioFanout`; video, by contrast, is
//! wired end-to-end here because the frame store and render scheduler are
//! themselves part of this crate.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::catalog::{TrackDescriptor, TrackKind};
use crate::config::PlayerConfig;
use crate::decoder::{DecodedVideoFrame, VideoDecoderService};
use crate::error::PlayerError;
use crate::events::PlayerSink;
use crate::protocol_constants::{PRIORITY_VIDEO, TRACK_NAME_AUDIO_PREFIX, TRACK_NAME_VIDEO};
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::scheduler::{RenderScheduler, SchedulerConfig, SchedulerCounters, TickOutcome, TickStats};
use crate::session::state::SessionState;
use crate::session::Session;
use crate::stats::{AtomicPlayerStats, PlayerStatsSnapshot};
use crate::transport::Transport;
use crate::video::{DecodeGate, DecodeGateConfig, FrameStore};
use crate::wire::data::{ObjectExtensions, ObjectHeader};

/// The narrow surface a host implements to route audio objects into its own
/// decoder/ring fanout. Mirrors [`PlayerSink`]'s audio-facing methods so a
/// host can hand this straight to `moq-player-audio::AudioFanout` without an
/// adapter.
pub trait AudioFrameRouter: Send + Sync {
    /// Fired once, after the catalog is decoded, so the router can add one
    /// track/decoder/ring per discovered audio track.
    fn route_track_info(&self, tracks: &[TrackDescriptor]);

    /// One encoded audio object, ready for the host's decode fanout.
    fn route_audio_frame(&self, payload: &Bytes, pts: i64, group_id: u64, track_index: u32);
}

/// A router that drops every audio frame. Useful for a video-only caller or
/// a test that doesn't exercise the audio path.
#[derive(Debug, Default)]
pub struct NoopAudioRouter;

impl AudioFrameRouter for NoopAudioRouter {
    fn route_track_info(&self, _tracks: &[TrackDescriptor]) {}
    fn route_audio_frame(&self, _payload: &Bytes, _pts: i64, _group_id: u64, _track_index: u32) {}
}

/// Owns the decoder, decode gate, and render scheduler for the session's
/// single video track. The gate is created lazily, once the catalog's video
/// [`TrackDescriptor`] is known and the first object arrives.
struct VideoPipeline {
    decoder: Box<dyn VideoDecoderService>,
    gate: Option<DecodeGate>,
    gate_config: DecodeGateConfig,
    scheduler: RenderScheduler<DecodedVideoFrame>,
    counters: SchedulerCounters,
    last_dropped: u64,
    last_pts_jumps: u64,
}

impl VideoPipeline {
    fn new(decoder: Box<dyn VideoDecoderService>, config: &PlayerConfig) -> Self {
        let store = FrameStore::new(config.frame_store_capacity);
        Self {
            decoder,
            gate: None,
            gate_config: DecodeGateConfig {
                backpressure_chunks: config.decode_queue_backpressure_chunks,
                pts_jump_threshold_us: config.video_pts_jump_threshold_us,
            },
            scheduler: RenderScheduler::new(store, SchedulerConfig::from_player_config(config)),
            counters: SchedulerCounters::new(),
            last_dropped: 0,
            last_pts_jumps: 0,
        }
    }

    fn on_object(
        &mut self,
        codec_id: &str,
        init_data: Option<&[u8]>,
        object: &ObjectHeader,
        stats: &AtomicPlayerStats,
    ) -> Result<(), PlayerError> {
        if self.gate.is_none() {
            let gate = DecodeGate::new(
                self.decoder.as_mut(),
                codec_id.to_string(),
                init_data,
                self.gate_config,
            )?;
            self.gate = Some(gate);
        }
        let gate = self.gate.as_mut().expect("just constructed above");
        gate.on_object(self.decoder.as_mut(), object, self.scheduler.store_mut())?;

        let dropped = gate.dropped_count();
        if dropped > self.last_dropped {
            for _ in 0..(dropped - self.last_dropped) {
                stats.record_dropped_video();
            }
            self.last_dropped = dropped;
        }
        let pts_jumps = gate.pts_jump_count();
        if pts_jumps > self.last_pts_jumps {
            for _ in 0..(pts_jumps - self.last_pts_jumps) {
                stats.record_video_pts_jump();
            }
            self.last_pts_jumps = pts_jumps;
        }
        Ok(())
    }

    fn tick(&mut self, playback_pts: Option<i64>, now: Instant) -> (TickOutcome<DecodedVideoFrame>, TickStats) {
        self.scheduler.tick(playback_pts, now, &self.counters)
    }
}

/// The [`PlayerSink`] this module wires into [`Session::connect`]: video
/// frames drive the [`VideoPipeline`] directly, audio frames are forwarded
/// to the host's [`AudioFrameRouter`], and everything else passes through to
/// a downstream sink unchanged.
struct BootstrapSink {
    video: Arc<Mutex<VideoPipeline>>,
    video_track: Mutex<Option<(String, Option<Vec<u8>>)>>,
    audio_router: Arc<dyn AudioFrameRouter>,
    downstream: Arc<dyn PlayerSink>,
    stats: Arc<AtomicPlayerStats>,
    /// Filled in by [`PlayerHandle::connect`] once the session exists. The
    /// catalog can race connect() itself (its `SUBSCRIBE_OK` is awaited, not
    /// the catalog object), so subscribing to the discovered tracks is
    /// driven from whichever of `on_track_info`/`connect` observes both the
    /// session and the track list first.
    session: OnceLock<Session>,
    subscribed: AtomicBool,
    spawner: TokioSpawner,
    /// The catalog's tracks, cached so `connect()` can drive the subscribe
    /// itself if the catalog already arrived by the time the session handle
    /// is set.
    tracks: Mutex<Vec<TrackDescriptor>>,
}

impl BootstrapSink {
    /// Subscribes to the video track (if any) and every discovered audio
    /// track, exactly once. No-ops until the session handle is available.
    fn maybe_subscribe(&self, tracks: &[TrackDescriptor]) {
        if tracks.is_empty() {
            return;
        }
        let Some(session) = self.session.get() else {
            return;
        };
        if self.subscribed.swap(true, Ordering::AcqRel) {
            return;
        }

        let session = session.clone();
        let has_video = tracks.iter().any(|t| t.kind == TrackKind::Video);
        let wanted_audio: HashSet<String> = tracks
            .iter()
            .filter(|t| t.kind == TrackKind::Audio)
            .map(|t| format!("{TRACK_NAME_AUDIO_PREFIX}{}", t.track_index))
            .collect();

        self.spawner.spawn(async move {
            if has_video {
                if let Err(err) = session.subscribe(TRACK_NAME_VIDEO, PRIORITY_VIDEO).await {
                    log::warn!("[bootstrap] video subscribe failed: {err}");
                }
            }
            if let Err(err) = session.subscribe_audio(&wanted_audio).await {
                log::warn!("[bootstrap] audio subscribe failed: {err}");
            }
        });
    }
}

impl PlayerSink for BootstrapSink {
    fn on_track_info(&self, tracks: &[TrackDescriptor]) {
        if let Some(video) = tracks.iter().find(|t| t.kind == TrackKind::Video) {
            *self.video_track.lock() = Some((video.codec_id.clone(), video.init_data.clone()));
        }
        *self.tracks.lock() = tracks.to_vec();
        self.maybe_subscribe(tracks);
        self.audio_router.route_track_info(tracks);
        self.downstream.on_track_info(tracks);
    }

    fn on_video_frame(
        &self,
        payload: &Bytes,
        is_keyframe: bool,
        pts: i64,
        group_id: u64,
        codec_config: Option<&Bytes>,
    ) {
        let Some((codec_id, init_data)) = self.video_track.lock().clone() else {
            // Catalog hasn't resolved a video track yet; nothing to decode
            // against. Dropped, not counted — this races the catalog only
            // at session start and resolves within one object.
            return;
        };
        let object = ObjectHeader {
            object_id: group_id,
            extensions: ObjectExtensions {
                capture_timestamp: pts,
                is_keyframe,
                codec_config: codec_config.cloned(),
            },
            payload: payload.clone(),
        };
        if let Err(err) =
            self.video
                .lock()
                .on_object(&codec_id, init_data.as_deref(), &object, &self.stats)
        {
            self.downstream.on_error(&err.to_string());
        }
    }

    fn on_audio_frame(&self, payload: &Bytes, pts: i64, group_id: u64, track_index: u32) {
        self.audio_router.route_audio_frame(payload, pts, group_id, track_index);
    }

    fn on_caption_frame(&self, parsed: &crate::caption::CaptionObject, pts: i64) {
        self.downstream.on_caption_frame(parsed, pts);
    }

    fn on_server_stats(&self, stats: &crate::stats::StatsObject) {
        self.downstream.on_server_stats(stats);
    }

    fn on_close(&self) {
        self.downstream.on_close();
    }

    fn on_error(&self, reason: &str) {
        self.downstream.on_error(reason);
    }
}

/// A connected player: the session plus the video pipeline it feeds.
///
/// `tick` is driven by the host's ~60Hz vsync callback; `stats` is safe to
/// poll from any thread.
pub struct PlayerHandle {
    session: Session,
    video: Arc<Mutex<VideoPipeline>>,
    stats: Arc<AtomicPlayerStats>,
}

impl PlayerHandle {
    /// Connects to `stream_key`, performs the handshake and catalog
    /// subscribe (see [`Session::connect`]), and wires the decoded video
    /// pipeline and audio routing described above.
    ///
    /// Does not itself retry on failure — a host that wants jittered
    /// exponential backoff across reconnects loops this behind
    /// [`crate::reconnect::with_reconnect`], constructing a fresh
    /// `video_decoder`/`audio_router` per attempt since neither survives a
    /// closed session.
    pub async fn connect(
        transport: &dyn Transport,
        stream_key: String,
        product_namespace: String,
        config: PlayerConfig,
        video_decoder: Box<dyn VideoDecoderService>,
        audio_router: Arc<dyn AudioFrameRouter>,
        downstream: Arc<dyn PlayerSink>,
        spawner: TokioSpawner,
    ) -> Result<Self, PlayerError> {
        config.validate().map_err(PlayerError::ProtocolError)?;

        let stats = Arc::new(AtomicPlayerStats::new());
        let video = Arc::new(Mutex::new(VideoPipeline::new(video_decoder, &config)));
        let sink = Arc::new(BootstrapSink {
            video: Arc::clone(&video),
            video_track: Mutex::new(None),
            audio_router,
            downstream,
            stats: Arc::clone(&stats),
            session: OnceLock::new(),
            subscribed: AtomicBool::new(false),
            spawner: spawner.clone(),
        });

        let session = Session::connect(
            transport,
            stream_key,
            product_namespace,
            config,
            Arc::clone(&sink) as Arc<dyn PlayerSink>,
            spawner,
        )
        .await?;

        // The catalog can arrive before or after connect() returns (it's
        // decoded off a separately-spawned stream task), so this covers both
        // orderings: on_track_info may already have tried and found no
        // session, or may not have fired yet.
        let _ = sink.session.set(session.clone());
        let cached_tracks = sink.tracks.lock().clone();
        sink.maybe_subscribe(&cached_tracks);

        Ok(Self { session, video, stats })
    }

    /// Advances the render scheduler by one vsync tick. See
    /// [`RenderScheduler::tick`].
    pub fn tick(&self, playback_pts: Option<i64>, now: Instant) -> (TickOutcome<DecodedVideoFrame>, TickStats) {
        self.video.lock().tick(playback_pts, now)
    }

    /// A point-in-time snapshot of the locally-maintained player counters.
    #[must_use]
    pub fn stats(&self) -> PlayerStatsSnapshot {
        self.stats.snapshot()
    }

    #[must_use]
    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// Closes the session: fails pending subscribes, closes the transport,
    /// and fires `on_close` on the downstream sink.
    pub async fn close(&self) {
        self.session.close().await;
    }
}
