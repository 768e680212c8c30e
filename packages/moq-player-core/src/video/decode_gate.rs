//! Keyframe-gated decode queue with backpressure-on-full and PTS-jump
//! detection.
//!
//! Sits between the MoQ session's video output and the opaque
//! [`VideoDecoderService`]. Responsible for keyframe gating, deferred
//! configuration, backpressure, and in-place decoder recovery; decoded
//! frames are pushed directly into the frame store.

use crate::decoder::VideoDecoderService;
use crate::error::PlayerError;
use crate::video::frame_store::FrameStore;
use crate::wire::data::ObjectHeader;

/// Tunable thresholds the decode gate enforces.
#[derive(Debug, Clone, Copy)]
pub struct DecodeGateConfig {
    /// Pending decoder queue depth at or above which incoming frames are
    /// dropped (spec default: 16).
    pub backpressure_chunks: usize,
    /// Absolute input PTS gap that increments the diagnostic jump counter
    /// (spec default: 500 ms).
    pub pts_jump_threshold_us: i64,
}

/// Keyframe-gating and backpressure state for one video track.
pub struct DecodeGate {
    codec_id: String,
    config: DecodeGateConfig,
    wait_for_key: bool,
    configured: bool,
    last_timestamp: Option<i64>,
    pts_jump_count: u64,
    dropped_count: u64,
}

impl DecodeGate {
    /// Creates a gate for a track whose codec is `codec_id`. If the catalog
    /// supplied `init_data`, the decoder is configured immediately;
    /// otherwise configuration is deferred to the first keyframe carrying a
    /// `codec_config` extension.
    pub fn new(
        decoder: &mut dyn VideoDecoderService,
        codec_id: String,
        init_data: Option<&[u8]>,
        config: DecodeGateConfig,
    ) -> Result<Self, PlayerError> {
        let mut gate = Self {
            codec_id,
            config,
            wait_for_key: true,
            configured: false,
            last_timestamp: None,
            pts_jump_count: 0,
            dropped_count: 0,
        };
        if let Some(init_data) = init_data {
            decoder.configure(&gate.codec_id, init_data)?;
            gate.configured = true;
        }
        Ok(gate)
    }

    /// Forces the keyframe gate shut, e.g. on an upstream-signalled
    /// discontinuity.
    pub fn signal_discontinuity(&mut self) {
        self.wait_for_key = true;
    }

    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count
    }

    #[must_use]
    pub fn pts_jump_count(&self) -> u64 {
        self.pts_jump_count
    }

    #[must_use]
    pub fn is_waiting_for_key(&self) -> bool {
        self.wait_for_key
    }

    /// Processes one incoming encoded object, updating gate state and
    /// pushing any frames the decoder produces into `frame_store`.
    pub fn on_object(
        &mut self,
        decoder: &mut dyn VideoDecoderService,
        object: &ObjectHeader,
        frame_store: &mut FrameStore<crate::decoder::DecodedVideoFrame>,
    ) -> Result<(), PlayerError> {
        let ts = object.extensions.capture_timestamp;
        if let Some(last) = self.last_timestamp {
            if (ts - last).abs() > self.config.pts_jump_threshold_us {
                self.pts_jump_count += 1;
            }
        }
        self.last_timestamp = Some(ts);

        if !self.configured {
            if object.extensions.is_keyframe {
                if let Some(cfg) = &object.extensions.codec_config {
                    decoder.configure(&self.codec_id, cfg)?;
                    self.configured = true;
                } else {
                    // Keyframe without config: still not configurable yet.
                    return Ok(());
                }
            } else {
                // Delta before configuration: silently dropped, not counted.
                return Ok(());
            }
        }

        if self.wait_for_key {
            if object.extensions.is_keyframe {
                self.wait_for_key = false;
            } else {
                self.dropped_count += 1;
                return Ok(());
            }
        }

        if decoder.pending_queue_len() >= self.config.backpressure_chunks {
            self.dropped_count += 1;
            self.wait_for_key = true;
            return Ok(());
        }

        match decoder.decode(&object.payload, object.extensions.is_keyframe, ts) {
            Ok(()) => {
                while let Some(frame) = decoder.take_output() {
                    frame_store.insert(frame);
                }
                Ok(())
            }
            Err(PlayerError::DecodeError { codec }) => {
                self.wait_for_key = true;
                if decoder.reset().is_err() {
                    decoder.recreate()?;
                }
                // Decode errors are non-terminal for the session; the
                // caller is informed via the counted state, not an Err.
                let _ = codec;
                Ok(())
            }
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{DecodedVideoFrame, VideoFrameHandle};
    use crate::wire::data::ObjectExtensions;
    use bytes::Bytes;

    struct NoopHandle;
    impl VideoFrameHandle for NoopHandle {}

    #[derive(Default)]
    struct FakeDecoder {
        configured: bool,
        pending: usize,
        output: Vec<DecodedVideoFrame>,
        fail_next_decode: bool,
        reset_calls: u32,
        recreate_calls: u32,
    }

    impl VideoDecoderService for FakeDecoder {
        fn configure(&mut self, _codec_id: &str, _config: &[u8]) -> Result<(), PlayerError> {
            self.configured = true;
            Ok(())
        }

        fn decode(
            &mut self,
            _payload: &[u8],
            _is_keyframe: bool,
            timestamp: i64,
        ) -> Result<(), PlayerError> {
            if self.fail_next_decode {
                self.fail_next_decode = false;
                return Err(PlayerError::DecodeError {
                    codec: "test".into(),
                });
            }
            self.output.push(DecodedVideoFrame {
                timestamp,
                duration: 33_333,
                display_width: 1920,
                display_height: 1080,
                handle: Box::new(NoopHandle),
            });
            Ok(())
        }

        fn take_output(&mut self) -> Option<DecodedVideoFrame> {
            if self.output.is_empty() {
                None
            } else {
                Some(self.output.remove(0))
            }
        }

        fn pending_queue_len(&self) -> usize {
            self.pending
        }

        fn reset(&mut self) -> Result<(), PlayerError> {
            self.reset_calls += 1;
            Ok(())
        }

        fn recreate(&mut self) -> Result<(), PlayerError> {
            self.recreate_calls += 1;
            Ok(())
        }
    }

    fn object(ts: i64, is_keyframe: bool, codec_config: Option<Bytes>) -> ObjectHeader {
        ObjectHeader {
            object_id: 0,
            extensions: ObjectExtensions {
                capture_timestamp: ts,
                is_keyframe,
                codec_config,
            },
            payload: Bytes::from_static(b"x"),
        }
    }

    fn default_config() -> DecodeGateConfig {
        DecodeGateConfig {
            backpressure_chunks: 16,
            pts_jump_threshold_us: 500_000,
        }
    }

    #[test]
    fn delta_before_configuration_is_dropped_silently() {
        let mut decoder = FakeDecoder::default();
        let mut gate =
            DecodeGate::new(&mut decoder, "h264".into(), None, default_config()).unwrap();
        let mut store = FrameStore::new(8);

        gate.on_object(&mut decoder, &object(0, false, None), &mut store)
            .unwrap();
        assert_eq!(gate.dropped_count(), 0); // not counted, just not configured
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn deferred_config_then_first_key_decodes() {
        let mut decoder = FakeDecoder::default();
        let mut gate =
            DecodeGate::new(&mut decoder, "h264".into(), None, default_config()).unwrap();
        let mut store = FrameStore::new(8);

        gate.on_object(
            &mut decoder,
            &object(0, true, Some(Bytes::from_static(b"cfg"))),
            &mut store,
        )
        .unwrap();
        assert!(decoder.configured);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn deltas_dropped_until_first_keyframe_after_configured() {
        let mut decoder = FakeDecoder::default();
        let mut gate = DecodeGate::new(
            &mut decoder,
            "h264".into(),
            Some(b"init"),
            default_config(),
        )
        .unwrap();
        let mut store = FrameStore::new(8);

        gate.on_object(&mut decoder, &object(0, false, None), &mut store)
            .unwrap();
        assert_eq!(gate.dropped_count(), 1);
        assert_eq!(store.len(), 0);

        gate.on_object(&mut decoder, &object(1000, true, None), &mut store)
            .unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn backpressure_drops_and_sets_wait_for_key() {
        let mut decoder = FakeDecoder {
            pending: 16,
            ..Default::default()
        };
        let mut gate = DecodeGate::new(
            &mut decoder,
            "h264".into(),
            Some(b"init"),
            default_config(),
        )
        .unwrap();
        let mut store = FrameStore::new(8);
        gate.on_object(&mut decoder, &object(0, true, None), &mut store)
            .unwrap();
        // first keyframe clears wait_for_key but then backpressure trips
        // and re-sets it.
        decoder.pending = 16;
        gate.on_object(&mut decoder, &object(1000, true, None), &mut store)
            .unwrap();
        assert!(gate.is_waiting_for_key());
        assert_eq!(gate.dropped_count(), 1);
    }

    #[test]
    fn decode_error_triggers_inplace_reset_and_wait_for_key() {
        let mut decoder = FakeDecoder {
            fail_next_decode: true,
            ..Default::default()
        };
        let mut gate = DecodeGate::new(
            &mut decoder,
            "h264".into(),
            Some(b"init"),
            default_config(),
        )
        .unwrap();
        let mut store = FrameStore::new(8);
        gate.on_object(&mut decoder, &object(0, true, None), &mut store)
            .unwrap();
        assert_eq!(decoder.reset_calls, 1);
        assert_eq!(decoder.recreate_calls, 0);
        assert!(gate.is_waiting_for_key());
    }

    #[test]
    fn pts_jump_counter_increments_on_large_gap() {
        let mut decoder = FakeDecoder::default();
        let mut gate = DecodeGate::new(
            &mut decoder,
            "h264".into(),
            Some(b"init"),
            default_config(),
        )
        .unwrap();
        let mut store = FrameStore::new(8);
        gate.on_object(&mut decoder, &object(0, true, None), &mut store)
            .unwrap();
        gate.on_object(&mut decoder, &object(1_000_000, true, None), &mut store)
            .unwrap();
        assert_eq!(gate.pts_jump_count(), 1);
    }
}
