//! Control-message framing and data-stream framing.
//!
//! Control messages are framed as `type:varint | length:varint | payload`.
//! Data streams carry a subgroup header followed by a sequence of objects
//! (see [`data`]).

pub mod control;
pub mod data;

pub use control::ControlMessage;
pub use data::{ObjectExtensions, ObjectHeader, SubgroupHeader};

use bytes::{Bytes, BytesMut};

use crate::error::WireError;
use crate::stream_buffer::StreamBuffer;
use crate::varint::{put_varint, read_varint};

/// Frames a control message as `type:varint | length:varint | payload`.
#[must_use]
pub fn frame_control_message(msg_type: u64, payload: &[u8]) -> Bytes {
    let mut out = BytesMut::new();
    let mut header = Vec::new();
    put_varint(&mut header, msg_type);
    put_varint(&mut header, payload.len() as u64);
    out.extend_from_slice(&header);
    out.extend_from_slice(payload);
    out.freeze()
}

/// Attempts to read one complete framed control message from `buf`.
///
/// Returns `Ok(None)` if the buffer does not yet contain a complete frame
/// (legal; call again once more bytes arrive). Leaves the buffer untouched
/// on an incomplete read so the caller can retry after pushing more data.
pub fn try_read_framed_message(
    buf: &mut StreamBuffer,
) -> Result<Option<ControlMessage>, WireError> {
    // Peeking the type and length requires knowing how many bytes each
    // varint consumed without mutating the buffer on a partial frame, so we
    // snapshot by reading from a temporary accounting pass first.
    let snapshot = buf.peek_bytes();
    let (msg_type, type_len) = match read_varint(&snapshot, 0) {
        Ok(v) => v,
        Err(WireError::Incomplete) | Err(WireError::VarintOverrun) => return Ok(None),
        Err(e) => return Err(e),
    };
    let (length, len_len) = match read_varint(&snapshot, type_len) {
        Ok(v) => v,
        Err(WireError::Incomplete) | Err(WireError::VarintOverrun) => return Ok(None),
        Err(e) => return Err(e),
    };
    let total = type_len + len_len + length as usize;
    if snapshot.len() < total {
        return Ok(None);
    }

    // Now that we know the full frame is present, consume it for real.
    let _ = buf.read_varint()?; // msg_type
    let _ = buf.read_varint()?; // length
    let payload = buf.read_exact(length as usize)?;
    let msg = control::decode(msg_type, &payload)?;
    Ok(Some(msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::control::ControlMessage;

    #[test]
    fn frames_and_reads_back_a_message() {
        let msg = ControlMessage::Unsubscribe { request_id: 7 };
        let encoded = control::encode(&msg);
        let framed = frame_control_message(control::msg_type(&msg), &encoded);

        let mut buf = StreamBuffer::new();
        buf.push_chunk(framed);
        let decoded = try_read_framed_message(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn returns_none_on_partial_frame() {
        let msg = ControlMessage::Unsubscribe { request_id: 7 };
        let encoded = control::encode(&msg);
        let framed = frame_control_message(control::msg_type(&msg), &encoded);

        let mut buf = StreamBuffer::new();
        buf.push_chunk(framed.slice(0..framed.len() - 1));
        assert_eq!(try_read_framed_message(&mut buf).unwrap(), None);
    }
}
