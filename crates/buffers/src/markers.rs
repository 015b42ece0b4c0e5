//! Wire-level constants.

/// Sentinel that switches the current target to the refId that follows.
pub const SWITCH_TO_STRUCTURE: u8 = 255;

/// Marker preceding an explicit concrete type id for a polymorphic child.
pub const TYPE_ID: u8 = 213;

// ── Value prefixes (MessagePack-compatible) ───────────────────────────────

pub const POSITIVE_FIXINT_MAX: u8 = 0x7f;
pub const NEGATIVE_FIXINT_MIN: u8 = 0xe0;

pub const FIXSTR_MIN: u8 = 0xa0;
pub const FIXSTR_MAX: u8 = 0xbf;
pub const FIXSTR_MAX_LEN: usize = 31;

pub const STR8: u8 = 0xd9;
pub const STR16: u8 = 0xda;
pub const STR32: u8 = 0xdb;

pub const FLOAT32: u8 = 0xca;
pub const FLOAT64: u8 = 0xcb;

pub const UINT8: u8 = 0xcc;
pub const UINT16: u8 = 0xcd;
pub const UINT32: u8 = 0xce;
pub const UINT64: u8 = 0xcf;

pub const INT8: u8 = 0xd0;
pub const INT16: u8 = 0xd1;
pub const INT32: u8 = 0xd2;
pub const INT64: u8 = 0xd3;
