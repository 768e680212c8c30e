//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by the MoQ draft-15 wire format and changing
//! them would break protocol compliance. Tunable operational parameters
//! (timeouts, queue depths) live in [`crate::config`].

// ─────────────────────────────────────────────────────────────────────────────
// MoQ draft-15 version
// ─────────────────────────────────────────────────────────────────────────────

/// MoQ version negotiated in `CLIENT_SETUP`/`SERVER_SETUP`.
///
/// draft-15, encoded per the moq-transport version numbering scheme
/// (0xff00000f = draft version 15).
pub const MOQ_VERSION: u64 = 0xff00_000f;

// ─────────────────────────────────────────────────────────────────────────────
// Control message types
// ─────────────────────────────────────────────────────────────────────────────

pub const MSG_CLIENT_SETUP: u64 = 0x20;
pub const MSG_SERVER_SETUP: u64 = 0x21;
pub const MSG_SUBSCRIBE: u64 = 0x03;
pub const MSG_SUBSCRIBE_OK: u64 = 0x04;
pub const MSG_SUBSCRIBE_ERROR: u64 = 0x05;
pub const MSG_UNSUBSCRIBE: u64 = 0x0a;
pub const MSG_MAX_REQUEST_ID: u64 = 0x15;
pub const MSG_GOAWAY: u64 = 0x10;

// ─────────────────────────────────────────────────────────────────────────────
// Data stream framing
// ─────────────────────────────────────────────────────────────────────────────

/// Stream type for the subgroup-with-extensions data stream variant.
pub const STREAM_TYPE_SUBGROUP_SID_EXT: u64 = 0x0d;

/// Subscribe filter requesting objects starting from the next group
/// boundary (the only filter this player uses — no seek/DVR).
pub const FILTER_NEXT_GROUP_START: u64 = 0x1;

// ─────────────────────────────────────────────────────────────────────────────
// Priorities (lower value == higher scheduling priority on the wire)
// ─────────────────────────────────────────────────────────────────────────────

pub const PRIORITY_VIDEO: u8 = 0;
pub const PRIORITY_AUDIO: u8 = 64;
pub const PRIORITY_OTHER: u8 = 128;
pub const PRIORITY_CATALOG: u8 = 192;

// ─────────────────────────────────────────────────────────────────────────────
// Track naming convention (catalog object)
// ─────────────────────────────────────────────────────────────────────────────

pub const TRACK_NAME_CATALOG: &str = "catalog";
pub const TRACK_NAME_VIDEO: &str = "video";
pub const TRACK_NAME_AUDIO_PREFIX: &str = "audio";
pub const TRACK_NAME_CAPTIONS: &str = "captions";
pub const TRACK_NAME_STATS: &str = "stats";

// ─────────────────────────────────────────────────────────────────────────────
// Caption object framing
// ─────────────────────────────────────────────────────────────────────────────

/// Magic prefix marking a structured caption payload. Absent magic means
/// the legacy fallback encoding applies (first byte = channel, remainder =
/// UTF-8 text).
pub const CAPTION_MAGIC: u16 = 0xcc02;
