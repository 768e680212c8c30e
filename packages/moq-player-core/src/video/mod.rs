//! Video pipeline: bounded frame store and keyframe-gated decode queue.

pub mod decode_gate;
pub mod frame_store;

pub use decode_gate::{DecodeGate, DecodeGateConfig};
pub use frame_store::{FrameStore, QueueStats, TakeResult, VideoFrame};
