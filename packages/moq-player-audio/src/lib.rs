//! moq-player-audio - lock-free SPSC audio ring and real-time
//! drift-compensated consumer for the MoQ player.
//!
//! This crate is the audio half of the pipeline `moq-player-core` leaves
//! opaque: the lock-free ring shared between a decode callback and a
//! real-time audio thread, the real-time consumer that drains it every
//! quantum with drift compensation, and the fanout that owns one decoder
//! and ring per audio track.
//!
//! # Architecture
//!
//! - [`ring`]: The SPSC audio ring and its atomic state block
//! - [`consumer`]: The real-time quantum consumer
//! - [`fanout`]: Per-track decoder + ring ownership and PTS supervision
//! - [`priority`]: Real-time thread priority elevation
//! - [`runtime`]: The dedicated OS thread driving the consumer loop
//! - [`pcm`]: Raw interleaved PCM adapters for decoders that don't already
//!   hand back planar float samples

#![warn(clippy::all)]

pub mod consumer;
pub mod fanout;
pub mod pcm;
pub mod priority;
pub mod ring;
pub mod runtime;

pub use consumer::AudioConsumer;
pub use fanout::{AudioDiagnostic, AudioFanout};
pub use pcm::{interleaved_i16_to_planar_f32, PcmError};
pub use ring::{audio_ring, AudioRingState, RingConsumer, RingProducer, MAX_CHANNELS};
pub use runtime::AudioThreadHandle;
