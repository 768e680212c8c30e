//! Control-channel message payloads: `CLIENT_SETUP`, `SERVER_SETUP`,
//! `SUBSCRIBE`, `SUBSCRIBE_OK`, `SUBSCRIBE_ERROR`, `UNSUBSCRIBE`,
//! `MAX_REQUEST_ID`, `GOAWAY`.

use crate::error::WireError;
use crate::protocol_constants::{
    MSG_CLIENT_SETUP, MSG_GOAWAY, MSG_MAX_REQUEST_ID, MSG_SERVER_SETUP, MSG_SUBSCRIBE,
    MSG_SUBSCRIBE_ERROR, MSG_SUBSCRIBE_OK, MSG_UNSUBSCRIBE,
};
use crate::varint::{put_varint, read_varint};

/// A decoded control-channel message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    ClientSetup {
        versions: Vec<u64>,
        stream_key: String,
        max_request_id: u64,
    },
    ServerSetup {
        selected_version: u64,
        max_request_id: u64,
    },
    Subscribe {
        request_id: u64,
        track_namespace: Vec<String>,
        track_name: String,
        priority: u8,
        filter: u64,
    },
    SubscribeOk {
        request_id: u64,
        track_alias: u64,
    },
    SubscribeError {
        request_id: u64,
        code: u64,
        reason: String,
    },
    Unsubscribe {
        request_id: u64,
    },
    MaxRequestId {
        max_request_id: u64,
    },
    GoAway {
        new_session_uri: String,
    },
}

/// Returns the wire message type for a given decoded message.
#[must_use]
pub fn msg_type(msg: &ControlMessage) -> u64 {
    match msg {
        ControlMessage::ClientSetup { .. } => MSG_CLIENT_SETUP,
        ControlMessage::ServerSetup { .. } => MSG_SERVER_SETUP,
        ControlMessage::Subscribe { .. } => MSG_SUBSCRIBE,
        ControlMessage::SubscribeOk { .. } => MSG_SUBSCRIBE_OK,
        ControlMessage::SubscribeError { .. } => MSG_SUBSCRIBE_ERROR,
        ControlMessage::Unsubscribe { .. } => MSG_UNSUBSCRIBE,
        ControlMessage::MaxRequestId { .. } => MSG_MAX_REQUEST_ID,
        ControlMessage::GoAway { .. } => MSG_GOAWAY,
    }
}

fn put_string(out: &mut Vec<u8>, s: &str) {
    put_varint(out, s.len() as u64);
    out.extend_from_slice(s.as_bytes());
}

fn read_string(buf: &[u8], offset: usize) -> Result<(String, usize), WireError> {
    let (len, len_consumed) = read_varint(buf, offset)?;
    let start = offset + len_consumed;
    let end = start + len as usize;
    let bytes = buf.get(start..end).ok_or(WireError::Incomplete)?;
    let s = std::str::from_utf8(bytes)
        .map_err(|_| WireError::Malformed)?
        .to_string();
    Ok((s, len_consumed + len as usize))
}

/// Serialises a control message's payload (without the type/length frame
/// header — see [`super::frame_control_message`]).
#[must_use]
pub fn encode(msg: &ControlMessage) -> Vec<u8> {
    let mut out = Vec::new();
    match msg {
        ControlMessage::ClientSetup {
            versions,
            stream_key,
            max_request_id,
        } => {
            put_varint(&mut out, versions.len() as u64);
            for &v in versions {
                put_varint(&mut out, v);
            }
            put_string(&mut out, stream_key);
            put_varint(&mut out, *max_request_id);
        }
        ControlMessage::ServerSetup {
            selected_version,
            max_request_id,
        } => {
            put_varint(&mut out, *selected_version);
            put_varint(&mut out, *max_request_id);
        }
        ControlMessage::Subscribe {
            request_id,
            track_namespace,
            track_name,
            priority,
            filter,
        } => {
            put_varint(&mut out, *request_id);
            put_varint(&mut out, track_namespace.len() as u64);
            for part in track_namespace {
                put_string(&mut out, part);
            }
            put_string(&mut out, track_name);
            out.push(*priority);
            put_varint(&mut out, *filter);
        }
        ControlMessage::SubscribeOk {
            request_id,
            track_alias,
        } => {
            put_varint(&mut out, *request_id);
            put_varint(&mut out, *track_alias);
        }
        ControlMessage::SubscribeError {
            request_id,
            code,
            reason,
        } => {
            put_varint(&mut out, *request_id);
            put_varint(&mut out, *code);
            put_string(&mut out, reason);
        }
        ControlMessage::Unsubscribe { request_id } => {
            put_varint(&mut out, *request_id);
        }
        ControlMessage::MaxRequestId { max_request_id } => {
            put_varint(&mut out, *max_request_id);
        }
        ControlMessage::GoAway { new_session_uri } => {
            put_string(&mut out, new_session_uri);
        }
    }
    out
}

/// Decodes a control message's payload given its wire type.
pub fn decode(msg_type: u64, payload: &[u8]) -> Result<ControlMessage, WireError> {
    let mut offset = 0;
    match msg_type {
        MSG_CLIENT_SETUP => {
            let (count, c) = read_varint(payload, offset)?;
            offset += c;
            let mut versions = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (v, c) = read_varint(payload, offset)?;
                offset += c;
                versions.push(v);
            }
            let (stream_key, c) = read_string(payload, offset)?;
            offset += c;
            let (max_request_id, _) = read_varint(payload, offset)?;
            Ok(ControlMessage::ClientSetup {
                versions,
                stream_key,
                max_request_id,
            })
        }
        MSG_SERVER_SETUP => {
            let (selected_version, c) = read_varint(payload, offset)?;
            offset += c;
            let (max_request_id, _) = read_varint(payload, offset)?;
            Ok(ControlMessage::ServerSetup {
                selected_version,
                max_request_id,
            })
        }
        MSG_SUBSCRIBE => {
            let (request_id, c) = read_varint(payload, offset)?;
            offset += c;
            let (ns_count, c) = read_varint(payload, offset)?;
            offset += c;
            let mut track_namespace = Vec::with_capacity(ns_count as usize);
            for _ in 0..ns_count {
                let (part, c) = read_string(payload, offset)?;
                offset += c;
                track_namespace.push(part);
            }
            let (track_name, c) = read_string(payload, offset)?;
            offset += c;
            let priority = *payload.get(offset).ok_or(WireError::Incomplete)?;
            offset += 1;
            let (filter, _) = read_varint(payload, offset)?;
            Ok(ControlMessage::Subscribe {
                request_id,
                track_namespace,
                track_name,
                priority,
                filter,
            })
        }
        MSG_SUBSCRIBE_OK => {
            let (request_id, c) = read_varint(payload, offset)?;
            offset += c;
            let (track_alias, _) = read_varint(payload, offset)?;
            Ok(ControlMessage::SubscribeOk {
                request_id,
                track_alias,
            })
        }
        MSG_SUBSCRIBE_ERROR => {
            let (request_id, c) = read_varint(payload, offset)?;
            offset += c;
            let (code, c) = read_varint(payload, offset)?;
            offset += c;
            let (reason, _) = read_string(payload, offset)?;
            Ok(ControlMessage::SubscribeError {
                request_id,
                code,
                reason,
            })
        }
        MSG_UNSUBSCRIBE => {
            let (request_id, _) = read_varint(payload, offset)?;
            Ok(ControlMessage::Unsubscribe { request_id })
        }
        MSG_MAX_REQUEST_ID => {
            let (max_request_id, _) = read_varint(payload, offset)?;
            Ok(ControlMessage::MaxRequestId { max_request_id })
        }
        MSG_GOAWAY => {
            let (new_session_uri, _) = read_string(payload, offset)?;
            Ok(ControlMessage::GoAway { new_session_uri })
        }
        _ => Err(WireError::Malformed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(msg: ControlMessage) {
        let encoded = encode(&msg);
        let decoded = decode(msg_type(&msg), &encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn round_trips_every_message_type() {
        round_trip(ControlMessage::ClientSetup {
            versions: vec![0xff00_000f],
            stream_key: "abc123".into(),
            max_request_id: 100,
        });
        round_trip(ControlMessage::ServerSetup {
            selected_version: 0xff00_000f,
            max_request_id: 100,
        });
        round_trip(ControlMessage::Subscribe {
            request_id: 5,
            track_namespace: vec!["product".into(), "abc123".into()],
            track_name: "video".into(),
            priority: 0,
            filter: 1,
        });
        round_trip(ControlMessage::SubscribeOk {
            request_id: 5,
            track_alias: 9,
        });
        round_trip(ControlMessage::SubscribeError {
            request_id: 5,
            code: 1,
            reason: "no such track".into(),
        });
        round_trip(ControlMessage::Unsubscribe { request_id: 5 });
        round_trip(ControlMessage::MaxRequestId {
            max_request_id: 200,
        });
        round_trip(ControlMessage::GoAway {
            new_session_uri: String::new(),
        });
    }

    #[test]
    fn decode_rejects_unknown_type() {
        assert_eq!(decode(0xdead, &[]), Err(WireError::Malformed));
    }

    #[test]
    fn decode_rejects_invalid_utf8_in_string_field() {
        let mut payload = Vec::new();
        put_varint(&mut payload, 5); // request_id
        put_varint(&mut payload, 1); // code
        put_varint(&mut payload, 2); // reason length
        payload.extend_from_slice(&[0xff, 0xfe]); // invalid utf-8
        assert_eq!(
            decode(MSG_SUBSCRIBE_ERROR, &payload),
            Err(WireError::Malformed)
        );
    }
}
