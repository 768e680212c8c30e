//! Centralized error types for the MoQ player core.
//!
//! This module defines the error taxonomy the session, wire codec, and media
//! pipelines report through. Wire-level errors are terminal for a session;
//! media-layer errors are counted and recovered locally.

use thiserror::Error;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths, surfaced to callers as the per-subsystem counters
/// described for the user-visible connection surface.
pub trait ErrorCode {
    /// Returns a machine-readable error code for diagnostics/telemetry.
    fn code(&self) -> &'static str;
}

/// Errors raised by the varint/control-message wire codec and the
/// stream buffer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    /// A varint's length prefix claims more bytes than remain in the buffer.
    #[error("varint overruns buffer")]
    VarintOverrun,

    /// A declared length field exceeds the remaining bytes in the stream.
    #[error("length {declared} exceeds {available} remaining bytes")]
    LengthExceedsStream {
        /// Bytes the frame claimed to contain.
        declared: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// The buffer does not yet contain enough bytes to complete the read;
    /// legal during normal operation, retry once more bytes arrive.
    #[error("incomplete read, need more bytes")]
    Incomplete,

    /// The underlying stream ended before a requested read completed.
    #[error("stream ended unexpectedly")]
    EndOfStream,

    /// A control message carried an unrecognised type or a payload shape
    /// that doesn't match its type.
    #[error("malformed message")]
    Malformed,
}

impl ErrorCode for WireError {
    fn code(&self) -> &'static str {
        match self {
            Self::VarintOverrun => "varint_overrun",
            Self::LengthExceedsStream { .. } => "length_exceeds_stream",
            Self::Incomplete => "incomplete",
            Self::EndOfStream => "end_of_stream",
            Self::Malformed => "malformed",
        }
    }
}

/// Errors raised while decoding a catalog object.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The catalog payload was not valid JSON, or didn't match the expected
    /// shape.
    #[error("malformed catalog object: {0}")]
    Malformed(String),
}

impl ErrorCode for CatalogError {
    fn code(&self) -> &'static str {
        "catalog_malformed"
    }
}

/// Errors raised by the opaque transport boundary (the QUIC/WebTransport
/// connection is injected; this crate only consumes the [`crate::transport`]
/// traits).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection closed, locally or by the remote peer.
    #[error("transport closed: {0}")]
    Closed(String),

    /// An I/O-level failure occurred on a stream.
    #[error("transport I/O error: {0}")]
    Io(String),
}

/// Top-level error type for the MoQ player core.
///
/// Wire-level errors are terminal for the session; media-layer errors are
/// counted and recovered in place.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// Remote or local transport close. Terminal; reconnect is the owning
    /// layer's (not this crate's) responsibility.
    #[error("transport closed")]
    TransportClosed,

    /// Version mismatch, unexpected message, or malformed varint/length.
    /// Terminal for the session.
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// A `SUBSCRIBE` failed; returned to the caller, non-terminal.
    #[error("subscribe failed (code {code}): {reason}")]
    SubscribeFailed {
        /// Server-supplied error code.
        code: u64,
        /// Human-readable reason string from `SUBSCRIBE_ERROR`.
        reason: String,
    },

    /// The client reached the server-advertised request-id ceiling.
    #[error("request id exhausted")]
    RequestIdExhausted,

    /// The decoder reported an error. Non-terminal; triggers an in-place
    /// decoder reset and sets `wait_for_key`.
    #[error("decode error ({codec})")]
    DecodeError {
        /// Codec identifier of the failing decoder.
        codec: String,
    },

    /// A bounded queue was full and a frame was dropped. Non-terminal,
    /// counted, sets `wait_for_key` for video.
    #[error("buffer full")]
    BufferFull,

    /// A stats or caption payload failed to parse. Non-terminal; the event
    /// is dropped and counted.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl ErrorCode for PlayerError {
    fn code(&self) -> &'static str {
        match self {
            Self::TransportClosed => "transport_closed",
            Self::ProtocolError(_) => "protocol_error",
            Self::SubscribeFailed { .. } => "subscribe_failed",
            Self::RequestIdExhausted => "request_id_exhausted",
            Self::DecodeError { .. } => "decode_error",
            Self::BufferFull => "buffer_full",
            Self::Malformed(_) => "malformed",
        }
    }
}

/// True if this error is terminal for the session (wire-level), false if it
/// is a media-layer error that is counted and recovered locally.
impl PlayerError {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::TransportClosed | Self::ProtocolError(_) | Self::RequestIdExhausted
        )
    }
}

impl From<WireError> for PlayerError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::Incomplete => Self::ProtocolError("incomplete read at session boundary".into()),
            other => Self::ProtocolError(other.to_string()),
        }
    }
}

impl From<CatalogError> for PlayerError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Malformed(reason) => Self::Malformed(reason),
        }
    }
}

impl From<TransportError> for PlayerError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Closed(_) => Self::TransportClosed,
            TransportError::Io(reason) => Self::ProtocolError(reason),
        }
    }
}

/// Convenient Result alias for player-core operations.
pub type PlayerResult<T> = Result<T, PlayerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_failed_is_not_terminal() {
        let err = PlayerError::SubscribeFailed {
            code: 1,
            reason: "unknown track".into(),
        };
        assert!(!err.is_terminal());
        assert_eq!(err.code(), "subscribe_failed");
    }

    #[test]
    fn transport_closed_is_terminal() {
        assert!(PlayerError::TransportClosed.is_terminal());
    }

    #[test]
    fn buffer_full_is_not_terminal() {
        assert!(!PlayerError::BufferFull.is_terminal());
        assert_eq!(PlayerError::BufferFull.code(), "buffer_full");
    }

    #[test]
    fn wire_incomplete_converts_to_protocol_error() {
        let err: PlayerError = WireError::Incomplete.into();
        assert!(matches!(err, PlayerError::ProtocolError(_)));
    }

    #[test]
    fn catalog_malformed_converts_to_malformed() {
        let err: PlayerError = CatalogError::Malformed("bad json".into()).into();
        assert!(matches!(err, PlayerError::Malformed(_)));
    }
}
