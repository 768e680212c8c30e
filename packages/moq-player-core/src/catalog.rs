//! Catalog object parsing: the manifest describing a session's tracks.
//!
//! The catalog is a single JSON object delivered on a reserved subscription.
//! Tracks follow the naming convention `catalog`, `video`, `audio<N>`,
//! `captions`, `stats`; this module turns that JSON shape into the
//! immutable [`TrackDescriptor`] list the session hands to `on_track_info`.

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::protocol_constants::{
    TRACK_NAME_AUDIO_PREFIX, TRACK_NAME_CAPTIONS, TRACK_NAME_STATS, TRACK_NAME_VIDEO,
};

/// The kind of a track, discovered from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    Caption,
}

/// A track descriptor as delivered to `on_track_info`.
///
/// Tracks are discovered from the catalog and are immutable for the
/// lifetime of the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub kind: TrackKind,
    pub codec_id: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    pub track_index: u32,
    pub init_data: Option<Vec<u8>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Raw catalog JSON shape
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[allow(dead_code)]
    version: u64,
    #[allow(dead_code)]
    #[serde(rename = "streamingFormat")]
    streaming_format: String,
    #[allow(dead_code)]
    #[serde(rename = "streamingFormatVersion")]
    streaming_format_version: String,
    #[allow(dead_code)]
    #[serde(rename = "commonTrackFields", default)]
    common_track_fields: Option<CommonTrackFields>,
    tracks: Vec<RawTrack>,
}

#[derive(Debug, Deserialize)]
struct CommonTrackFields {
    #[allow(dead_code)]
    #[serde(default)]
    namespace: Vec<String>,
    #[allow(dead_code)]
    #[serde(default)]
    packaging: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTrack {
    name: String,
    #[serde(rename = "selectionParams")]
    selection_params: SelectionParams,
}

#[derive(Debug, Deserialize)]
struct SelectionParams {
    codec: String,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(rename = "initData", default)]
    init_data: Option<String>,
    #[serde(default)]
    samplerate: Option<u32>,
    #[serde(rename = "channelConfig", default)]
    channel_config: Option<u32>,
}

/// Parses a catalog JSON payload into the immutable track list.
///
/// `catalog`, `captions`, and `stats` entries are not media tracks and are
/// excluded from the returned list; only `video` and `audio<N>` entries
/// become [`TrackDescriptor`]s.
pub fn parse_catalog(bytes: &[u8]) -> Result<Vec<TrackDescriptor>, CatalogError> {
    let raw: RawCatalog =
        serde_json::from_slice(bytes).map_err(|e| CatalogError::Malformed(e.to_string()))?;

    let mut tracks = Vec::new();
    for track in &raw.tracks {
        let (kind, track_index) = match classify_track_name(&track.name) {
            Some(v) => v,
            None => continue,
        };

        let init_data = match &track.selection_params.init_data {
            Some(encoded) => Some(decode_init_data(encoded)?),
            None => None,
        };

        tracks.push(TrackDescriptor {
            kind,
            codec_id: track.selection_params.codec.clone(),
            width: track.selection_params.width,
            height: track.selection_params.height,
            sample_rate: track.selection_params.samplerate,
            channels: track.selection_params.channel_config,
            track_index,
            init_data,
        });
    }

    Ok(tracks)
}

pub(crate) fn classify_track_name(name: &str) -> Option<(TrackKind, u32)> {
    if name == TRACK_NAME_VIDEO {
        Some((TrackKind::Video, 0))
    } else if let Some(suffix) = name.strip_prefix(TRACK_NAME_AUDIO_PREFIX) {
        suffix.parse::<u32>().ok().map(|idx| (TrackKind::Audio, idx))
    } else if name == TRACK_NAME_CAPTIONS {
        Some((TrackKind::Caption, 0))
    } else if name == TRACK_NAME_STATS {
        None
    } else {
        None
    }
}

/// `initData` is carried as base64 in the JSON catalog (binary codec
/// configuration embedded in a text format).
fn decode_init_data(encoded: &str) -> Result<Vec<u8>, CatalogError> {
    base64_decode(encoded).map_err(|_| CatalogError::Malformed("invalid initData base64".into()))
}

/// Minimal standard-alphabet base64 decoder: the catalog's `initData` is
/// the only binary-in-JSON field this crate needs to decode, so a small
/// local implementation avoids pulling in a dependency for one field.
fn base64_decode(input: &str) -> Result<Vec<u8>, ()> {
    fn value(c: u8) -> Option<u8> {
        match c {
            b'A'..=b'Z' => Some(c - b'A'),
            b'a'..=b'z' => Some(c - b'a' + 26),
            b'0'..=b'9' => Some(c - b'0' + 52),
            b'+' => Some(62),
            b'/' => Some(63),
            _ => None,
        }
    }

    let input = input.trim_end_matches('=');
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() * 3 / 4 + 3);
    for chunk in bytes.chunks(4) {
        let mut buf = [0u8; 4];
        let mut n = 0;
        for (i, &b) in chunk.iter().enumerate() {
            buf[i] = value(b).ok_or(())?;
            n += 1;
        }
        out.push((buf[0] << 2) | (buf[1] >> 4));
        if n > 2 {
            out.push((buf[1] << 4) | (buf[2] >> 2));
        }
        if n > 3 {
            out.push((buf[2] << 6) | buf[3]);
        }
    }
    Ok(out)
}
