//! Decoder configuration.

use serde::Deserialize;

/// What to do when a patch addresses a field index the registry does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownFieldPolicy {
    /// Skip forward to the next known structure and keep decoding.
    #[default]
    Skip,
    /// Abort the patch with [`crate::DecodeError::UnknownField`].
    Reject,
}

/// Tunables for one [`crate::StateDecoder`].
///
/// Deserializable so a session wrapper can load it from its own config file;
/// missing keys fall back to [`DecoderConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub unknown_fields: UnknownFieldPolicy,
    /// Ceiling on live tracked objects, root included.
    pub max_tracked_refs: usize,
    /// Ceiling on the byte length of one decoded string.
    pub max_string_bytes: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            unknown_fields: UnknownFieldPolicy::Skip,
            max_tracked_refs: 1_000_000,
            max_string_bytes: 16 * 1024 * 1024,
        }
    }
}
