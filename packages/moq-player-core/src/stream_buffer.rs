//! Byte-oriented pull reader over chunked QUIC streams.
//!
//! Wraps a source of arbitrarily-sized byte chunks and exposes exact-length
//! reads and varint peeks. Used identically for the control stream and each
//! media data stream — the session never touches chunk boundaries
//! directly.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::WireError;
use crate::varint::read_varint;

/// Accumulates chunks pushed from the transport and serves exact-length
/// reads without copying payload bytes beyond what is requested.
#[derive(Debug, Default)]
pub struct StreamBuffer {
    pending: BytesMut,
    ended: bool,
}

impl StreamBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk received from the transport.
    pub fn push_chunk(&mut self, chunk: Bytes) {
        self.pending.extend_from_slice(&chunk);
    }

    /// Marks the stream as ended (no further chunks will arrive). Reads
    /// against fewer bytes than requested will now fail with
    /// [`WireError::EndOfStream`] instead of [`WireError::Incomplete`].
    pub fn mark_ended(&mut self) {
        self.ended = true;
    }

    /// Returns the number of bytes currently buffered and not yet consumed.
    #[must_use]
    pub fn available(&self) -> usize {
        self.pending.len()
    }

    /// Reads exactly `n` bytes, consuming them from the buffer.
    ///
    /// Returns [`WireError::Incomplete`] if fewer than `n` bytes are
    /// currently buffered and the stream has not ended (retry once more
    /// chunks are pushed), or [`WireError::EndOfStream`] if the stream has
    /// ended with fewer than `n` bytes remaining.
    pub fn read_exact(&mut self, n: usize) -> Result<Bytes, WireError> {
        if self.pending.len() < n {
            return Err(if self.ended {
                WireError::EndOfStream
            } else {
                WireError::Incomplete
            });
        }
        Ok(self.pending.split_to(n).freeze())
    }

    /// Returns a snapshot of the currently buffered, unconsumed bytes
    /// without consuming them. Used by multi-step peeks (e.g. reading a
    /// type varint and a length varint before committing to a read).
    #[must_use]
    pub fn peek_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.pending)
    }

    /// Peeks a varint without consuming it from the buffer.
    ///
    /// Returns [`WireError::Incomplete`] if the buffered bytes don't yet
    /// contain a complete varint.
    pub fn peek_varint(&self) -> Result<u64, WireError> {
        let (value, _consumed) = read_varint(&self.pending, 0)?;
        Ok(value)
    }

    /// Reads and consumes a varint.
    pub fn read_varint(&mut self) -> Result<u64, WireError> {
        let (value, consumed) = read_varint(&self.pending, 0)?;
        self.pending.advance(consumed);
        Ok(value)
    }

    /// True once the stream has ended and every buffered byte has been
    /// consumed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.ended && self.pending.is_empty()
    }
}
