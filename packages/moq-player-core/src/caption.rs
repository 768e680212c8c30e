//! Caption object parsing.
//!
//! A structured payload prefixed by the 2-byte magic [`crate::protocol_constants::CAPTION_MAGIC`];
//! absent magic falls back to the legacy encoding (first byte = channel,
//! remainder = UTF-8 text).

use crate::error::PlayerError;
use crate::protocol_constants::CAPTION_MAGIC;
use crate::varint::read_varint;

/// One region of structured caption text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionRegion {
    pub text: String,
}

/// A decoded caption object, structured or legacy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptionObject {
    Structured {
        version: u8,
        channel: u8,
        regions: Vec<CaptionRegion>,
    },
    Legacy {
        channel: u8,
        text: String,
    },
}

/// Parses one caption object payload.
pub fn parse_caption(bytes: &[u8]) -> Result<CaptionObject, PlayerError> {
    if bytes.len() >= 2 {
        let magic = u16::from_be_bytes([bytes[0], bytes[1]]);
        if magic == CAPTION_MAGIC {
            return parse_structured(&bytes[2..]);
        }
    }
    parse_legacy(bytes)
}

fn parse_structured(bytes: &[u8]) -> Result<CaptionObject, PlayerError> {
    let version = *bytes
        .first()
        .ok_or_else(|| PlayerError::Malformed("caption payload too short".into()))?;
    let channel = *bytes
        .get(1)
        .ok_or_else(|| PlayerError::Malformed("caption payload too short".into()))?;

    let (region_count, mut offset) =
        read_varint(bytes, 2).map_err(|e| PlayerError::Malformed(e.to_string()))?;

    let mut regions = Vec::with_capacity(region_count as usize);
    for _ in 0..region_count {
        let (len, consumed) =
            read_varint(bytes, offset).map_err(|e| PlayerError::Malformed(e.to_string()))?;
        offset += consumed;
        let end = offset + len as usize;
        let field = bytes
            .get(offset..end)
            .ok_or_else(|| PlayerError::Malformed("caption region truncated".into()))?;
        let text = std::str::from_utf8(field)
            .map_err(|_| PlayerError::Malformed("caption region is not valid UTF-8".into()))?
            .to_string();
        regions.push(CaptionRegion { text });
        offset = end;
    }

    Ok(CaptionObject::Structured {
        version,
        channel,
        regions,
    })
}

fn parse_legacy(bytes: &[u8]) -> Result<CaptionObject, PlayerError> {
    let channel = *bytes
        .first()
        .ok_or_else(|| PlayerError::Malformed("caption payload is empty".into()))?;
    let text = std::str::from_utf8(&bytes[1..])
        .map_err(|_| PlayerError::Malformed("legacy caption text is not valid UTF-8".into()))?
        .to_string();
    Ok(CaptionObject::Legacy { channel, text })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::varint::put_varint;

    fn structured_payload(version: u8, channel: u8, regions: &[&str]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&CAPTION_MAGIC.to_be_bytes());
        out.push(version);
        out.push(channel);
        put_varint(&mut out, regions.len() as u64);
        for region in regions {
            put_varint(&mut out, region.len() as u64);
            out.extend_from_slice(region.as_bytes());
        }
        out
    }

    #[test]
    fn parses_structured_payload_with_regions() {
        let payload = structured_payload(1, 3, &["hello", "world"]);
        let parsed = parse_caption(&payload).unwrap();
        match parsed {
            CaptionObject::Structured {
                version,
                channel,
                regions,
            } => {
                assert_eq!(version, 1);
                assert_eq!(channel, 3);
                assert_eq!(regions.len(), 2);
                assert_eq!(regions[0].text, "hello");
                assert_eq!(regions[1].text, "world");
            }
            CaptionObject::Legacy { .. } => panic!("expected structured"),
        }
    }

    #[test]
    fn falls_back_to_legacy_without_magic() {
        let mut payload = vec![5u8];
        payload.extend_from_slice(b"caption text");
        let parsed = parse_caption(&payload).unwrap();
        assert_eq!(
            parsed,
            CaptionObject::Legacy {
                channel: 5,
                text: "caption text".into(),
            }
        );
    }

    #[test]
    fn rejects_empty_payload() {
        assert!(parse_caption(&[]).is_err());
    }

    #[test]
    fn rejects_truncated_structured_region() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&CAPTION_MAGIC.to_be_bytes());
        payload.push(1);
        payload.push(0);
        put_varint(&mut payload, 1); // region_count
        put_varint(&mut payload, 100); // claims 100 bytes, has none
        assert!(parse_caption(&payload).is_err());
    }
}
