//! Passthrough decode services standing in for the platform video/audio
//! decoders this crate leaves opaque. They don't decode anything — they
//! hand back a frame-shaped value per submitted chunk — so the demo binary
//! can exercise the full pipeline (gating, frame store, scheduler, ring,
//! consumer) without a real codec.

use moq_player_core::decoder::{DecodedVideoFrame, VideoDecoderService, VideoFrameHandle};
use moq_player_core::error::PlayerError;

const DEMO_FRAME_DURATION_US: i64 = 33_333;

struct NoopFrameHandle;
impl VideoFrameHandle for NoopFrameHandle {}

/// Produces one [`DecodedVideoFrame`] per submitted chunk, carrying no real
/// pixel data. Configured dimensions come from the catalog's video track.
pub struct PassthroughVideoDecoder {
    width: u32,
    height: u32,
    pending: usize,
    output: Option<DecodedVideoFrame>,
}

impl PassthroughVideoDecoder {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pending: 0,
            output: None,
        }
    }
}

impl VideoDecoderService for PassthroughVideoDecoder {
    fn configure(&mut self, _codec_id: &str, _config: &[u8]) -> Result<(), PlayerError> {
        Ok(())
    }

    fn decode(&mut self, _payload: &[u8], _is_keyframe: bool, timestamp: i64) -> Result<(), PlayerError> {
        self.pending += 1;
        self.output = Some(DecodedVideoFrame {
            timestamp,
            duration: DEMO_FRAME_DURATION_US,
            display_width: self.width,
            display_height: self.height,
            handle: Box::new(NoopFrameHandle),
        });
        self.pending = self.pending.saturating_sub(1);
        Ok(())
    }

    fn take_output(&mut self) -> Option<DecodedVideoFrame> {
        self.output.take()
    }

    fn pending_queue_len(&self) -> usize {
        self.pending
    }

    fn reset(&mut self) -> Result<(), PlayerError> {
        self.output = None;
        Ok(())
    }

    fn recreate(&mut self) -> Result<(), PlayerError> {
        self.reset()
    }
}

/// Produces silence shaped like the configured channel layout per submitted
/// chunk, standing in for a real Opus/AAC decoder.
pub struct SilenceAudioDecoder {
    channels: usize,
    samples_per_chunk: usize,
    output: Option<(Vec<Vec<f32>>, i64)>,
}

impl SilenceAudioDecoder {
    #[must_use]
    pub fn new(samples_per_chunk: usize) -> Self {
        Self {
            channels: 1,
            samples_per_chunk,
            output: None,
        }
    }
}

impl moq_player_core::decoder::AudioDecoderService for SilenceAudioDecoder {
    fn configure(&mut self, _codec_id: &str, _sample_rate: u32, channels: u32) -> Result<(), PlayerError> {
        self.channels = channels.max(1) as usize;
        Ok(())
    }

    fn decode(&mut self, _payload: &[u8], timestamp: i64) -> Result<(), PlayerError> {
        let planar = vec![vec![0.0_f32; self.samples_per_chunk]; self.channels];
        self.output = Some((planar, timestamp));
        Ok(())
    }

    fn take_output(&mut self) -> Option<(Vec<Vec<f32>>, i64)> {
        self.output.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moq_player_core::decoder::AudioDecoderService;

    #[test]
    fn video_decoder_emits_one_frame_per_decode_call_with_configured_dimensions() {
        let mut decoder = PassthroughVideoDecoder::new(1280, 720);
        assert!(decoder.take_output().is_none());

        decoder.decode(&[], true, 1_000).expect("decode succeeds");
        let frame = decoder.take_output().expect("a frame was produced");
        assert_eq!(frame.timestamp, 1_000);
        assert_eq!(frame.duration, DEMO_FRAME_DURATION_US);
        assert_eq!(frame.display_width, 1280);
        assert_eq!(frame.display_height, 720);

        // take_output drains the single pending frame.
        assert!(decoder.take_output().is_none());
    }

    #[test]
    fn video_decoder_reset_clears_pending_output() {
        let mut decoder = PassthroughVideoDecoder::new(640, 480);
        decoder.decode(&[], false, 5).expect("decode succeeds");
        decoder.reset().expect("reset succeeds");
        assert!(decoder.take_output().is_none());
    }

    #[test]
    fn audio_decoder_emits_silence_shaped_to_configured_channels() {
        let mut decoder = SilenceAudioDecoder::new(480);
        decoder.configure("opus", 48_000, 2).expect("configure succeeds");

        decoder.decode(&[], 2_000).expect("decode succeeds");
        let (planar, pts) = decoder.take_output().expect("output was produced");
        assert_eq!(pts, 2_000);
        assert_eq!(planar.len(), 2, "one channel buffer per configured channel");
        for channel in &planar {
            assert_eq!(channel.len(), 480);
            assert!(channel.iter().all(|&s| s == 0.0));
        }
    }

    #[test]
    fn audio_decoder_defaults_to_mono_before_configure() {
        let mut decoder = SilenceAudioDecoder::new(160);
        decoder.decode(&[], 0).expect("decode succeeds");
        let (planar, _) = decoder.take_output().expect("output was produced");
        assert_eq!(planar.len(), 1);
    }
}
