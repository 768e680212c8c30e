//! Data-stream framing: subgroup headers, object framing, and object
//! extensions.
//!
//! A data stream starts with a [`SubgroupHeader`], followed by a sequence
//! of objects until the stream ends: each object is
//! `object_id:varint | ext_len:varint | ext_bytes | payload_len:varint | payload_bytes`.

use bytes::Bytes;

use crate::error::WireError;
use crate::protocol_constants::STREAM_TYPE_SUBGROUP_SID_EXT;
use crate::stream_buffer::StreamBuffer;
use crate::varint::{put_varint, read_varint};

/// The header prefixing every data stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubgroupHeader {
    pub track_alias: u64,
    pub group_id: u64,
    pub subgroup_id: u64,
    pub priority: u8,
}

impl SubgroupHeader {
    /// Encodes the stream-type prefix plus this header.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_varint(&mut out, STREAM_TYPE_SUBGROUP_SID_EXT);
        put_varint(&mut out, self.track_alias);
        put_varint(&mut out, self.group_id);
        put_varint(&mut out, self.subgroup_id);
        out.push(self.priority);
        out
    }

    /// Reads a subgroup header (including its stream-type prefix) from
    /// `buf`. Returns `Ok(None)` if the header is not yet fully buffered —
    /// the buffer is left untouched so the caller can retry once more
    /// chunks arrive, the same peek-then-consume transaction
    /// [`crate::wire::try_read_framed_message`] uses.
    pub fn try_read(buf: &mut StreamBuffer) -> Result<Option<Self>, WireError> {
        let snapshot = buf.peek_bytes();
        let mut offset = 0;

        let stream_type = match read_varint(&snapshot, offset) {
            Ok((v, n)) => {
                offset += n;
                v
            }
            Err(WireError::Incomplete) | Err(WireError::VarintOverrun) => return Ok(None),
            Err(e) => return Err(e),
        };
        if stream_type != STREAM_TYPE_SUBGROUP_SID_EXT {
            return Err(WireError::Malformed);
        }

        let track_alias = match read_varint(&snapshot, offset) {
            Ok((v, n)) => {
                offset += n;
                v
            }
            Err(WireError::Incomplete) | Err(WireError::VarintOverrun) => return Ok(None),
            Err(e) => return Err(e),
        };
        let group_id = match read_varint(&snapshot, offset) {
            Ok((v, n)) => {
                offset += n;
                v
            }
            Err(WireError::Incomplete) | Err(WireError::VarintOverrun) => return Ok(None),
            Err(e) => return Err(e),
        };
        let subgroup_id = match read_varint(&snapshot, offset) {
            Ok((v, n)) => {
                offset += n;
                v
            }
            Err(WireError::Incomplete) | Err(WireError::VarintOverrun) => return Ok(None),
            Err(e) => return Err(e),
        };
        let priority = match snapshot.get(offset) {
            Some(&b) => b,
            None => return Ok(None),
        };
        offset += 1;

        // The full header is confirmed present; consume it for real.
        let _ = buf.read_exact(offset)?;
        Ok(Some(Self {
            track_alias,
            group_id,
            subgroup_id,
            priority,
        }))
    }
}

/// Parsed object extensions: `{ capture_timestamp, is_keyframe, codec_config? }`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectExtensions {
    pub capture_timestamp: i64,
    pub is_keyframe: bool,
    pub codec_config: Option<Bytes>,
}

// Extension header IDs within the TLV block.
const EXT_CAPTURE_TIMESTAMP: u64 = 0x1;
const EXT_IS_KEYFRAME: u64 = 0x2;
const EXT_CODEC_CONFIG: u64 = 0x3;

impl ObjectExtensions {
    /// Encodes this extension set as a TLV block (without its own length
    /// prefix — the caller prepends `ext_len`).
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_varint(&mut out, EXT_CAPTURE_TIMESTAMP);
        put_varint(&mut out, 8);
        out.extend_from_slice(&self.capture_timestamp.to_be_bytes());

        put_varint(&mut out, EXT_IS_KEYFRAME);
        put_varint(&mut out, 1);
        out.push(u8::from(self.is_keyframe));

        if let Some(config) = &self.codec_config {
            put_varint(&mut out, EXT_CODEC_CONFIG);
            put_varint(&mut out, config.len() as u64);
            out.extend_from_slice(config);
        }
        out
    }

    /// Decodes a TLV extension block.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let mut ext = Self::default();
        let mut offset = 0;
        while offset < bytes.len() {
            let (id, c) = read_varint(bytes, offset)?;
            offset += c;
            let (len, c) = read_varint(bytes, offset)?;
            offset += c;
            let end = offset + len as usize;
            let field = bytes.get(offset..end).ok_or(WireError::Malformed)?;
            match id {
                EXT_CAPTURE_TIMESTAMP => {
                    let arr: [u8; 8] = field.try_into().map_err(|_| WireError::Malformed)?;
                    ext.capture_timestamp = i64::from_be_bytes(arr);
                }
                EXT_IS_KEYFRAME => {
                    ext.is_keyframe = field.first().copied().unwrap_or(0) != 0;
                }
                EXT_CODEC_CONFIG => {
                    ext.codec_config = Some(Bytes::copy_from_slice(field));
                }
                _ => { /* unknown extension: skip, forward compatible */ }
            }
            offset = end;
        }
        Ok(ext)
    }
}

/// One decoded media object within a subgroup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHeader {
    pub object_id: u64,
    pub extensions: ObjectExtensions,
    pub payload: Bytes,
}

impl ObjectHeader {
    /// Encodes `object_id:varint | ext_len:varint | ext_bytes | payload_len:varint | payload_bytes`.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_varint(&mut out, self.object_id);
        let ext_bytes = self.extensions.encode();
        put_varint(&mut out, ext_bytes.len() as u64);
        out.extend_from_slice(&ext_bytes);
        put_varint(&mut out, self.payload.len() as u64);
        out.extend_from_slice(&self.payload);
        out
    }

    /// Reads one object from `buf`. Returns `Ok(None)` if the object is not
    /// yet fully buffered (the caller retries once more chunks arrive, or
    /// treats stream end as the subgroup's natural close) — the buffer is
    /// left untouched until the whole object is confirmed present, the same
    /// peek-then-consume transaction [`crate::wire::try_read_framed_message`]
    /// uses.
    pub fn try_read(buf: &mut StreamBuffer) -> Result<Option<Self>, WireError> {
        let snapshot = buf.peek_bytes();
        let mut offset = 0;

        let object_id = match read_varint(&snapshot, offset) {
            Ok((v, n)) => {
                offset += n;
                v
            }
            Err(WireError::Incomplete) | Err(WireError::VarintOverrun) => return Ok(None),
            Err(e) => return Err(e),
        };
        let ext_len = match read_varint(&snapshot, offset) {
            Ok((v, n)) => {
                offset += n;
                v
            }
            Err(WireError::Incomplete) | Err(WireError::VarintOverrun) => return Ok(None),
            Err(e) => return Err(e),
        };
        let ext_end = offset + ext_len as usize;
        if snapshot.len() < ext_end {
            return Ok(None);
        }

        let (payload_len, payload_len_width) = match read_varint(&snapshot, ext_end) {
            Ok(pair) => pair,
            Err(WireError::Incomplete) | Err(WireError::VarintOverrun) => return Ok(None),
            Err(e) => return Err(e),
        };
        let payload_start = ext_end + payload_len_width;
        let payload_end = payload_start + payload_len as usize;
        if snapshot.len() < payload_end {
            return Ok(None);
        }

        // The full object is confirmed present; consume it for real.
        let _ = buf.read_varint()?;
        let _ = buf.read_varint()?;
        let ext_bytes = buf.read_exact(ext_len as usize)?;
        let extensions = ObjectExtensions::decode(&ext_bytes)?;
        let _ = buf.read_varint()?;
        let payload = buf.read_exact(payload_len as usize)?;
        Ok(Some(Self {
            object_id,
            extensions,
            payload,
        }))
    }
}
