//! moq-player-core - shared core library for a low-latency Media-over-QUIC
//! live-streaming browser player.
//!
//! This crate provides the transport-independent core of the player: the
//! wire codec, the MoQ session, the video pipeline, and the catalog/stats/
//! caption object parsers. It is designed to be embedded by a host that
//! supplies the QUIC/WebTransport connection and the platform video/audio
//! decoders.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`varint`]: QUIC-style variable-length integer codec
//! - [`wire`]: Control-message and data-stream framing
//! - [`stream_buffer`]: Chunked byte-stream reader
//! - [`transport`]: The opaque QUIC/WebTransport boundary
//! - [`catalog`]: Catalog object parsing (track discovery)
//! - [`session`]: The MoQ session — handshake, subscriptions, demux
//! - [`video`]: Bounded frame store and decode gate
//! - [`scheduler`]: Single-stream and multi-tile render pacing
//! - [`reconnect`]: Jittered exponential backoff for transport reconnects
//! - [`decoder`]: Opaque video/audio decode-service contracts
//! - [`stats`]: Server stats object parsing and local player counters
//! - [`caption`]: Caption object parsing
//! - [`config`]: Tunable operational parameters
//! - [`events`]: The downstream sink callback surface
//! - [`bootstrap`]: Composition root wiring session, video pipeline, and
//!   host audio routing into a [`bootstrap::PlayerHandle`]
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! The crate defines several traits to decouple core logic from
//! platform-specific implementations:
//!
//! - [`TaskSpawner`](runtime::TaskSpawner): Spawning background tasks
//! - [`PlayerSink`](events::PlayerSink): Receiving demuxed session events
//! - [`transport::Transport`]/[`transport::Connection`]: The QUIC boundary
//! - [`decoder::VideoDecoderService`]/[`decoder::AudioDecoderService`]:
//!   Platform decoders
//!
//! Each trait has a test double suitable for unit tests; a host provides
//! the real implementation.

#![warn(clippy::all)]

pub mod bootstrap;
pub mod caption;
pub mod catalog;
pub mod config;
pub mod decoder;
pub mod error;
pub mod events;
pub mod protocol_constants;
pub mod reconnect;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod stats;
pub mod stream_buffer;
pub mod transport;
pub mod varint;
pub mod video;
pub mod wire;

pub use bootstrap::{AudioFrameRouter, NoopAudioRouter, PlayerHandle};
pub use config::PlayerConfig;
pub use error::{ErrorCode, PlayerError, PlayerResult};
pub use events::{NoopSink, PlayerSink};
pub use reconnect::{with_reconnect, BackoffSchedule};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use session::state::SessionState;
pub use session::Session;
pub use stats::{AtomicPlayerStats, PlayerStatsSnapshot};
