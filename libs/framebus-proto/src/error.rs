use crate::message::Tag;

/// A received frame that violates the wire format.
///
/// Per-frame and non-fatal: readers are expected to log the frame and
/// keep pulling.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("empty frame")]
    Empty,

    #[error("tag slot must be exactly one byte, got {0}")]
    TagSlot(usize),

    #[error("unknown message tag {0:#04x}")]
    UnknownTag(u8),

    #[error("{tag:?} frame expects {expected} parts, got {actual}")]
    PartCount {
        tag: Tag,
        expected: usize,
        actual: usize,
    },

    #[error("{0:?} slots are partially encoded")]
    PartialMeta(Tag),

    #[error("inner tag mismatch: expected {expected:?}, got {actual:#04x}")]
    InnerTag { expected: Tag, actual: u8 },

    #[error("meta slot is not valid utf-8")]
    Utf8,

    #[error("meta json: {0}")]
    Json(String),
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        CodecError::Json(e.to_string())
    }
}
