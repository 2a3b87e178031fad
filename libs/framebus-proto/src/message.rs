use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Wire tag of a message variant: one big-endian byte, always the first
/// part of the multipart frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    Caps = 0x01,
    Buffer = 0x02,
    BufferMeta = 0x03,
    CustomMeta = 0x04,
    EndOfStream = 0x05,
}

impl Tag {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Tag::Caps),
            0x02 => Some(Tag::Buffer),
            0x03 => Some(Tag::BufferMeta),
            0x04 => Some(Tag::CustomMeta),
            0x05 => Some(Tag::EndOfStream),
            _ => None,
        }
    }

    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// Declared part count of the variant's frame. A decoded frame whose
    /// length differs is malformed.
    pub const fn part_count(self) -> usize {
        match self {
            Tag::Caps | Tag::BufferMeta | Tag::CustomMeta => 2,
            // tag + 2 buffer-meta slots + 2 custom-meta slots + payload
            Tag::Buffer => 6,
            Tag::EndOfStream => 1,
        }
    }
}

/// Stream capabilities: an opaque caps string plus the fields stages most
/// often need without parsing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caps {
    pub caps_str: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub fps_n: Option<f64>,
    #[serde(default)]
    pub fps_d: Option<f64>,
    #[serde(default)]
    pub framerate: Option<String>,
}

/// Per-buffer header: timing, geometry and flags of one media buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferMeta {
    /// Presentation timestamp.
    pub pts: u64,
    pub width: u32,
    pub height: u32,
    pub flags: u32,
    /// Decode timestamp, if it differs from `pts`.
    #[serde(default)]
    pub dts: Option<u64>,
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub caps_str: Option<String>,
}

/// Opaque per-buffer application metadata, any JSON object. The
/// extension point for analytics results riding along with a buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomMeta(pub serde_json::Map<String, serde_json::Value>);

impl CustomMeta {
    pub fn new() -> Self {
        Self::default()
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for CustomMeta {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(map)
    }
}

/// One frame of media payload with its optional metas embedded.
///
/// The payload is the single large allocation in the system; it travels
/// as refcounted [`Bytes`] so encode and decode never copy it.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer {
    pub meta: Option<BufferMeta>,
    pub custom: Option<CustomMeta>,
    pub payload: Bytes,
}

/// The closed message family carried on the wire.
///
/// The tag registry is a compile-time artifact: decoding dispatches via an
/// exhaustive match on [`Tag`], so a duplicate or missing variant cannot
/// exist at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Caps(Caps),
    Buffer(Buffer),
    BufferMeta(BufferMeta),
    CustomMeta(CustomMeta),
    /// In-band terminal marker; normal completion of a stream.
    EndOfStream,
}

impl Message {
    pub const fn tag(&self) -> Tag {
        match self {
            Message::Caps(_) => Tag::Caps,
            Message::Buffer(_) => Tag::Buffer,
            Message::BufferMeta(_) => Tag::BufferMeta,
            Message::CustomMeta(_) => Tag::CustomMeta,
            Message::EndOfStream => Tag::EndOfStream,
        }
    }
}
