//! Bridges the core's [`AudioFrameRouter`] seam into this host's
//! `moq-player-audio` fanout: one decoder + ring per discovered audio
//! track, each drained by its own real-time consumer thread.

use std::collections::HashMap;

use bytes::Bytes;
use moq_player_core::bootstrap::AudioFrameRouter;
use moq_player_core::catalog::{TrackDescriptor, TrackKind};
use moq_player_audio::{AudioConsumer, AudioFanout, AudioThreadHandle};
use parking_lot::Mutex;

use crate::decoders::SilenceAudioDecoder;

const SAMPLE_RATE: u32 = 48_000;
const RING_CAPACITY: usize = 48_000 * 4; // matches PlayerConfig's default 4s ring
const QUANTUM_FRAMES: usize = 480; // 10ms @ 48kHz

/// Owns the fanout and one playback thread per track. `route_*` calls come
/// from the session's decode path; the playback threads run independently.
pub struct HostAudioRouter {
    fanout: Mutex<AudioFanout<SilenceAudioDecoder>>,
    threads: Mutex<HashMap<u64, AudioThreadHandle>>,
}

impl HostAudioRouter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            fanout: Mutex::new(AudioFanout::new(SAMPLE_RATE, RING_CAPACITY)),
            threads: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for HostAudioRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioFrameRouter for HostAudioRouter {
    fn route_track_info(&self, tracks: &[TrackDescriptor]) {
        let mut fanout = self.fanout.lock();
        let mut threads = self.threads.lock();
        for track in tracks.iter().filter(|t| t.kind == TrackKind::Audio) {
            let track_index = u64::from(track.track_index);
            if threads.contains_key(&track_index) {
                continue;
            }
            let decoder = SilenceAudioDecoder::new(QUANTUM_FRAMES);
            let channels = track.channels.unwrap_or(2);
            match fanout.add_track(track_index, decoder, &track.codec_id, channels) {
                Ok(consumer) => {
                    let mut audio_consumer = AudioConsumer::new(consumer);
                    let spawned = AudioThreadHandle::spawn(
                        &format!("moq-audio-{track_index}"),
                        std::time::Duration::from_millis(10),
                        move || {
                            let mut out = vec![vec![0.0_f32; QUANTUM_FRAMES]; channels as usize];
                            audio_consumer.process_quantum(&mut out, QUANTUM_FRAMES);
                        },
                    );
                    match spawned {
                        Ok(handle) => {
                            threads.insert(track_index, handle);
                        }
                        Err(err) => log::warn!("[audio] failed to spawn playback thread for track {track_index}: {err}"),
                    }
                }
                Err(err) => log::warn!("[audio] failed to add track {track_index}: {err}"),
            }
        }
    }

    fn route_audio_frame(&self, payload: &Bytes, pts: i64, _group_id: u64, track_index: u32) {
        if let Err(err) = self.fanout.lock().submit(u64::from(track_index), payload, pts) {
            log::warn!("[audio] decode failed for track {track_index}: {err}");
        }
    }
}
