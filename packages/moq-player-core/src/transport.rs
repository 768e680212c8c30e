//! The opaque QUIC/WebTransport boundary.
//!
//! The underlying transport stack is explicitly out of scope for this
//! crate: connection establishment, stream multiplexing, and congestion
//! control belong to a host-provided implementation. This module defines
//! only the narrow trait surface the session consumes, mirroring how the
//! core abstracts other external collaborators behind a small trait with a
//! test double.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;

/// A single outgoing direction of a bidirectional or unidirectional stream.
#[async_trait]
pub trait SendStream: Send + Sync {
    /// Writes `bytes` to the stream. May buffer; does not guarantee the
    /// remote has received them.
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Gracefully closes the send side.
    async fn finish(&mut self) -> Result<(), TransportError>;
}

/// A single incoming direction of a bidirectional or unidirectional stream.
#[async_trait]
pub trait RecvStream: Send + Sync {
    /// Reads the next chunk of bytes, of unspecified size. Returns `Ok(None)`
    /// when the stream has ended cleanly.
    async fn read_chunk(&mut self) -> Result<Option<Bytes>, TransportError>;
}

/// An established MoQ transport connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Opens the single bidirectional control stream used for the
    /// `CLIENT_SETUP`/`SERVER_SETUP` handshake and subsequent control
    /// messages.
    async fn open_bi(
        &self,
    ) -> Result<(Box<dyn SendStream>, Box<dyn RecvStream>), TransportError>;

    /// Waits for the next incoming unidirectional stream opened by the
    /// peer (catalog or media data streams).
    async fn accept_uni(&self) -> Result<Box<dyn RecvStream>, TransportError>;

    /// Closes the connection. No destructor on this trait may block on the
    /// remote peer; implementations should treat this as fire-and-forget.
    async fn close(&self, reason: &str);
}

/// Establishes connections to a MoQ relay/origin for a given stream key.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens a transport-layer connection for `stream_key`. Does not itself
    /// perform the MoQ handshake — that is the session's job, layered on
    /// top of the returned [`Connection`].
    async fn connect(&self, stream_key: &str) -> Result<Box<dyn Connection>, TransportError>;
}

#[cfg(test)]
pub(crate) mod test_support {
    //! An in-memory transport double used by the session's unit tests.
    //! Not part of the public API.

    use std::collections::VecDeque;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    use super::*;

    pub struct ChannelSendStream {
        pub tx: mpsc::UnboundedSender<Bytes>,
    }

    #[async_trait]
    impl SendStream for ChannelSendStream {
        async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
            self.tx
                .send(Bytes::copy_from_slice(bytes))
                .map_err(|_| TransportError::Closed("peer dropped".into()))
        }

        async fn finish(&mut self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    pub struct ChannelRecvStream {
        pub rx: mpsc::UnboundedReceiver<Bytes>,
    }

    #[async_trait]
    impl RecvStream for ChannelRecvStream {
        async fn read_chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
            Ok(self.rx.recv().await)
        }
    }

    /// A connection backed by in-memory channels, plus a queue of
    /// unidirectional streams a test can push for the session to accept.
    pub struct MockConnection {
        pub control_server_tx: mpsc::UnboundedSender<Bytes>,
        pub control_client_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<Bytes>>>>,
        pub control_server_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<Bytes>>>>,
        pub control_client_tx: mpsc::UnboundedSender<Bytes>,
        pub pending_uni: Arc<Mutex<VecDeque<mpsc::UnboundedReceiver<Bytes>>>>,
    }

    #[async_trait]
    impl Connection for MockConnection {
        async fn open_bi(
            &self,
        ) -> Result<(Box<dyn SendStream>, Box<dyn RecvStream>), TransportError> {
            let rx = self
                .control_client_rx
                .lock()
                .take()
                .ok_or_else(|| TransportError::Closed("already opened".into()))?;
            Ok((
                Box::new(ChannelSendStream {
                    tx: self.control_client_tx.clone(),
                }),
                Box::new(ChannelRecvStream { rx }),
            ))
        }

        async fn accept_uni(&self) -> Result<Box<dyn RecvStream>, TransportError> {
            loop {
                let next = self.pending_uni.lock().pop_front();
                match next {
                    Some(rx) => return Ok(Box::new(ChannelRecvStream { rx })),
                    None => tokio::time::sleep(std::time::Duration::from_millis(1)).await,
                }
            }
        }

        async fn close(&self, _reason: &str) {}
    }
}
