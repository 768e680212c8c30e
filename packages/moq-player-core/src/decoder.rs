//! Opaque decode-service contracts.
//!
//! The concrete video and audio decoders are external collaborators: this
//! crate only depends on the narrow `configure/decode/output/reset`
//! contract below. A host embeds this player by
//! providing implementations backed by whatever platform decode API it has
//! (VideoToolbox, MediaCodec, a WASM-bound WebCodecs shim, …).

use crate::error::PlayerError;
use crate::video::frame_store::VideoFrame;

/// A decoded video frame, produced by a [`VideoDecoderService`].
pub struct DecodedVideoFrame {
    pub timestamp: i64,
    pub duration: i64,
    pub display_width: u32,
    pub display_height: u32,
    /// Opaque handle to the underlying GPU resource; dropping it releases
    /// the resource. Never store a raw reference to this elsewhere — the
    /// frame store owns it until it is taken by the scheduler.
    pub handle: Box<dyn VideoFrameHandle>,
}

impl VideoFrame for DecodedVideoFrame {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
    fn duration(&self) -> i64 {
        self.duration
    }
}

/// The GPU-resource-owning handle backing a decoded frame. Implementations
/// release the resource on drop.
pub trait VideoFrameHandle: Send {}

/// The opaque video decode service contract the decode gate drives.
pub trait VideoDecoderService: Send {
    /// Configures the decoder for `codec_id` with the given out-of-band
    /// configuration blob (from the catalog's `initData` or an object's
    /// `codec_config` extension).
    fn configure(&mut self, codec_id: &str, config: &[u8]) -> Result<(), PlayerError>;

    /// Submits one encoded chunk for decoding. On success, a decoded frame
    /// may or may not be immediately available (decoders may reorder);
    /// call [`Self::take_output`] to retrieve it.
    fn decode(&mut self, payload: &[u8], is_keyframe: bool, timestamp: i64) -> Result<(), PlayerError>;

    /// Drains one decoded frame if available.
    fn take_output(&mut self) -> Option<DecodedVideoFrame>;

    /// Number of chunks submitted but not yet decoded.
    fn pending_queue_len(&self) -> usize;

    /// Resets the decoder in place, reusing the last configuration.
    /// Cheaper than [`Self::recreate`] and preferred on a recoverable
    /// decode error.
    fn reset(&mut self) -> Result<(), PlayerError>;

    /// Fully tears down and recreates the decoder context. Used only when
    /// [`Self::reset`] itself fails.
    fn recreate(&mut self) -> Result<(), PlayerError>;
}

/// The opaque audio decode service contract the audio fanout drives.
pub trait AudioDecoderService: Send {
    /// Configures the decoder for a track's codec/sample-rate/channel
    /// layout.
    fn configure(&mut self, codec_id: &str, sample_rate: u32, channels: u32) -> Result<(), PlayerError>;

    /// Submits one encoded chunk. Decoded planar samples are delivered via
    /// [`Self::take_output`].
    fn decode(&mut self, payload: &[u8], timestamp: i64) -> Result<(), PlayerError>;

    /// Drains decoded planar float32 samples (one `Vec<f32>` per channel)
    /// along with the timestamp of the first sample in the batch, if any
    /// output is ready.
    fn take_output(&mut self) -> Option<(Vec<Vec<f32>>, i64)>;
}
