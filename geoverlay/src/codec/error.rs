//! Codec failures for the layer wire format.
//!
//! Every variant is descriptive enough to name what was being read when
//! the input ran out or went inconsistent. Corrupt input must surface
//! here; it must never become an out-of-bounds access or a guessed
//! value.

use thiserror::Error;

/// A collection that does not fit the wire format's maxima.
///
/// Rejected before any bytes are written; the caps match what `decode`
/// enforces, so every blob `encode` produces is decodable.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("{context} of {found} exceeds wire maximum {max}")]
    LimitExceeded {
        context: &'static str,
        found: u64,
        max: u64,
    },
}

/// A malformed, truncated, or version-mismatched layer blob.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Input ended before a required item.
    #[error("truncated input reading {context}: need {needed} bytes, {remaining} remain at offset {offset}")]
    Truncated {
        context: &'static str,
        needed: usize,
        remaining: usize,
        offset: usize,
    },

    /// Leading magic token did not match.
    #[error("bad magic token: expected {expected:?}")]
    BadMagic { expected: &'static [u8] },

    /// Blob was written by an unknown format version.
    #[error("unsupported format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// A count or length exceeded its configured maximum.
    #[error("{context} of {found} exceeds maximum {max}")]
    LimitExceeded {
        context: &'static str,
        found: u64,
        max: u64,
    },

    /// Structurally valid bytes carrying an impossible value.
    #[error("invalid {context}: {detail}")]
    InvalidValue {
        context: &'static str,
        detail: String,
    },
}
