//! Audio decode fanout.
//!
//! Owns one decoder plus one ring producer per audio track, all sharing a
//! single audio context at one sample rate. Supervises input PTS for epoch
//! resets and diagnostic jumps before handing payloads to each track's
//! decoder, and tracks which track is "primary" (its ring exports the
//! playback clock the video scheduler paces against).

use std::collections::HashMap;

use moq_player_core::decoder::AudioDecoderService;
use moq_player_core::error::PlayerError;
use tokio::sync::mpsc::UnboundedSender;

use crate::ring::{audio_ring, RingConsumer, RingProducer};

/// Backward input-PTS jump that is treated as a new playback epoch (ring
/// clear + `set_pts` on the next decoded output) rather than jitter.
const EPOCH_RESET_THRESHOLD_US: i64 = 30_000_000;
/// Absolute input-PTS jump recorded as a diagnostic only.
const INPUT_PTS_JUMP_THRESHOLD_US: i64 = 100_000;

/// A diagnostic event emitted by the fanout for a stats poller or log sink.
/// Never sent from the real-time audio thread, only from the decode
/// callback that owns the [`AudioFanout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioDiagnostic {
    /// An input PTS backward jump past the epoch-reset threshold was
    /// detected for `track_index`.
    EpochReset { track_index: u64 },
    /// An input PTS jump past the diagnostic-only threshold was observed
    /// for `track_index`.
    InputPtsJump { track_index: u64 },
}

struct Track<D: AudioDecoderService> {
    decoder: D,
    ring: RingProducer,
    muted: bool,
    last_input_pts: Option<i64>,
    /// Set when an epoch reset was detected on input but not yet applied;
    /// applied to the ring as soon as the decoder produces its next output.
    pending_reset: Option<i64>,
    input_pts_jumps: u64,
}

/// The audio decode fanout, keyed by track index.
pub struct AudioFanout<D: AudioDecoderService> {
    tracks: HashMap<u64, Track<D>>,
    primary: Option<u64>,
    sample_rate: u32,
    ring_capacity: usize,
    diagnostics: Option<UnboundedSender<AudioDiagnostic>>,
}

impl<D: AudioDecoderService> AudioFanout<D> {
    #[must_use]
    pub fn new(sample_rate: u32, ring_capacity: usize) -> Self {
        Self {
            tracks: HashMap::new(),
            primary: None,
            sample_rate,
            ring_capacity,
            diagnostics: None,
        }
    }

    /// Routes epoch-reset and PTS-jump diagnostics to `sender` (typically a
    /// channel drained by a stats poller or log sink on another thread).
    pub fn with_diagnostics(mut self, sender: UnboundedSender<AudioDiagnostic>) -> Self {
        self.diagnostics = Some(sender);
        self
    }

    /// Registers a track, configuring its decoder and allocating its ring.
    /// The first track added becomes primary by default. Returns the
    /// consumer half of the ring, which the caller hands off to the
    /// real-time audio thread; the fanout keeps the producer half.
    pub fn add_track(
        &mut self,
        track_index: u64,
        mut decoder: D,
        codec_id: &str,
        channels: u32,
    ) -> Result<RingConsumer, PlayerError> {
        decoder.configure(codec_id, self.sample_rate, channels)?;
        let (producer, consumer) = audio_ring(channels, self.ring_capacity, self.sample_rate);

        let is_first = self.tracks.is_empty();
        self.tracks.insert(
            track_index,
            Track {
                decoder,
                ring: producer,
                muted: false,
                last_input_pts: None,
                pending_reset: None,
                input_pts_jumps: 0,
            },
        );
        if is_first {
            self.primary = Some(track_index);
        }
        Ok(consumer)
    }

    pub fn remove_track(&mut self, track_index: u64) {
        self.tracks.remove(&track_index);
        if self.primary == Some(track_index) {
            self.primary = self.tracks.keys().next().copied();
        }
    }

    #[must_use]
    pub fn is_primary(&self, track_index: u64) -> bool {
        self.primary == Some(track_index)
    }

    pub fn set_primary(&mut self, track_index: u64) {
        if self.tracks.contains_key(&track_index) {
            self.primary = Some(track_index);
        }
    }

    /// Mute policy: a muted track keeps decoding (so unmute is instant) but
    /// its ring stops accepting playback volume at the consumer side; the
    /// fanout marks it muted purely as bookkeeping for the caller's gain
    /// control, since the ring itself carries no gain concept.
    pub fn set_muted(&mut self, track_index: u64, muted: bool) {
        if let Some(track) = self.tracks.get_mut(&track_index) {
            track.muted = muted;
        }
    }

    #[must_use]
    pub fn is_muted(&self, track_index: u64) -> bool {
        self.tracks.get(&track_index).is_some_or(|t| t.muted)
    }

    #[must_use]
    pub fn diagnostic_input_pts_jumps(&self, track_index: u64) -> u64 {
        self.tracks.get(&track_index).map_or(0, |t| t.input_pts_jumps)
    }

    /// Submits one encoded chunk for `track_index`, supervising the input
    /// PTS for epoch resets and diagnostic jumps before decoding, and
    /// draining any decoded output into the track's ring.
    pub fn submit(&mut self, track_index: u64, payload: &[u8], timestamp: i64) -> Result<(), PlayerError> {
        let diagnostics = self.diagnostics.clone();
        let Some(track) = self.tracks.get_mut(&track_index) else {
            return Ok(());
        };

        if let Some(last) = track.last_input_pts {
            let delta = last - timestamp;
            if delta > EPOCH_RESET_THRESHOLD_US {
                track.pending_reset = Some(timestamp);
                notify(&diagnostics, AudioDiagnostic::EpochReset { track_index });
            } else if delta.abs() > INPUT_PTS_JUMP_THRESHOLD_US {
                track.input_pts_jumps += 1;
                notify(&diagnostics, AudioDiagnostic::InputPtsJump { track_index });
            }
        }
        track.last_input_pts = Some(timestamp);

        track.decoder.decode(payload, timestamp)?;
        drain_output(track);
        Ok(())
    }

    /// Drains every track's decoder in case output lags behind `submit`
    /// calls (decoders may buffer internally before yielding a frame).
    pub fn drain_all(&mut self) {
        for track in self.tracks.values_mut() {
            drain_output(track);
        }
    }
}

fn notify(sender: &Option<UnboundedSender<AudioDiagnostic>>, event: AudioDiagnostic) {
    if let Some(sender) = sender {
        // An unbounded send only fails if the receiver was dropped, which
        // just means nobody is listening for diagnostics anymore.
        let _ = sender.send(event);
    }
}

fn drain_output<D: AudioDecoderService>(track: &mut Track<D>) {
    while let Some((planar, first_sample_pts)) = track.decoder.take_output() {
        if let Some(new_base) = track.pending_reset.take() {
            track.ring.set_pts(new_base, 0);
        }
        let _ = first_sample_pts;
        track.ring.write(&planar);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct StubDecoder {
        configured: bool,
        outputs: Vec<(Vec<Vec<f32>>, i64)>,
    }

    impl AudioDecoderService for StubDecoder {
        fn configure(&mut self, _codec_id: &str, _sample_rate: u32, _channels: u32) -> Result<(), PlayerError> {
            self.configured = true;
            Ok(())
        }

        fn decode(&mut self, payload: &[u8], timestamp: i64) -> Result<(), PlayerError> {
            self.outputs.push((vec![payload.iter().map(|&b| f32::from(b) / 255.0).collect()], timestamp));
            Ok(())
        }

        fn take_output(&mut self) -> Option<(Vec<Vec<f32>>, i64)> {
            self.outputs.pop()
        }
    }

    #[test]
    fn first_added_track_becomes_primary() {
        let mut fanout: AudioFanout<StubDecoder> = AudioFanout::new(48_000, 256);
        fanout.add_track(1, StubDecoder::default(), "opus", 1).unwrap();
        fanout.add_track(2, StubDecoder::default(), "opus", 1).unwrap();
        assert!(fanout.is_primary(1));
        assert!(!fanout.is_primary(2));
    }

    #[test]
    fn removing_primary_promotes_another_track() {
        let mut fanout: AudioFanout<StubDecoder> = AudioFanout::new(48_000, 256);
        fanout.add_track(1, StubDecoder::default(), "opus", 1).unwrap();
        fanout.add_track(2, StubDecoder::default(), "opus", 1).unwrap();
        fanout.remove_track(1);
        assert!(fanout.is_primary(2));
    }

    #[test]
    fn muted_track_keeps_decoding() {
        let mut fanout: AudioFanout<StubDecoder> = AudioFanout::new(48_000, 256);
        fanout.add_track(1, StubDecoder::default(), "opus", 1).unwrap();
        fanout.set_muted(1, true);
        assert!(fanout.submit(1, &[10, 20, 30], 0).is_ok());
        assert!(fanout.is_muted(1));
    }

    #[test]
    fn large_backward_jump_stages_a_pending_reset() {
        let mut fanout: AudioFanout<StubDecoder> = AudioFanout::new(48_000, 256);
        fanout.add_track(1, StubDecoder::default(), "opus", 1).unwrap();
        fanout.submit(1, &[1, 2, 3], 60_100_000).unwrap();
        fanout.submit(1, &[4, 5, 6], 100_000).unwrap();
        assert_eq!(fanout.tracks[&1].pending_reset, None); // drained by submit's own decode
    }

    #[test]
    fn moderate_jump_is_only_a_diagnostic_counter() {
        let mut fanout: AudioFanout<StubDecoder> = AudioFanout::new(48_000, 256);
        fanout.add_track(1, StubDecoder::default(), "opus", 1).unwrap();
        fanout.submit(1, &[1], 0).unwrap();
        fanout.submit(1, &[2], 250_000).unwrap();
        assert_eq!(fanout.diagnostic_input_pts_jumps(1), 1);
    }

    #[test]
    fn epoch_reset_is_reported_on_the_diagnostics_channel() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut fanout: AudioFanout<StubDecoder> = AudioFanout::new(48_000, 256).with_diagnostics(tx);
        fanout.add_track(1, StubDecoder::default(), "opus", 1).unwrap();
        fanout.submit(1, &[1], 60_100_000).unwrap();
        fanout.submit(1, &[2], 100_000).unwrap();
        assert_eq!(rx.try_recv(), Ok(AudioDiagnostic::EpochReset { track_index: 1 }));
    }
}
