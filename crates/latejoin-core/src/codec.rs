//! Payload classification.
//!
//! Payloads travel without a type tag. The receiver decides once, on the
//! whole payload, whether it is UTF-8 text or opaque binary, and nothing
//! downstream classifies it again.

use std::fmt;

use bytes::Bytes;

use crate::channel::{Channel, ChannelId};

/// Number of leading bytes shown when a binary body is formatted.
const PREVIEW_LEN: usize = 16;

/// A packet body, classified at decode time.
#[derive(Clone, PartialEq, Eq)]
pub enum PacketBody {
    /// The full payload is valid UTF-8.
    Text(String),
    /// The payload is not valid UTF-8; bytes are kept exactly as received.
    Binary(Bytes),
}

impl PacketBody {
    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        match self {
            PacketBody::Text(text) => text.len(),
            PacketBody::Binary(bytes) => bytes.len(),
        }
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The text, if this body was classified as text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PacketBody::Text(text) => Some(text),
            PacketBody::Binary(_) => None,
        }
    }

    /// Whether this body was classified as binary.
    pub fn is_binary(&self) -> bool {
        matches!(self, PacketBody::Binary(_))
    }

    /// Hex of the first few payload bytes, for logs.
    pub fn preview(&self) -> String {
        let bytes = match self {
            PacketBody::Text(text) => text.as_bytes(),
            PacketBody::Binary(bytes) => bytes.as_ref(),
        };
        hex::encode(&bytes[..bytes.len().min(PREVIEW_LEN)])
    }

    /// Wire bytes for this body. No tag is added.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            PacketBody::Text(text) => Bytes::copy_from_slice(text.as_bytes()),
            PacketBody::Binary(bytes) => bytes.clone(),
        }
    }
}

impl fmt::Debug for PacketBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketBody::Text(text) => f.debug_tuple("Text").field(text).finish(),
            PacketBody::Binary(bytes) => {
                write!(f, "Binary({} bytes, {})", bytes.len(), self.preview())
            }
        }
    }
}

impl From<&str> for PacketBody {
    fn from(text: &str) -> Self {
        PacketBody::Text(text.to_string())
    }
}

impl From<String> for PacketBody {
    fn from(text: String) -> Self {
        PacketBody::Text(text)
    }
}

impl From<Vec<u8>> for PacketBody {
    fn from(bytes: Vec<u8>) -> Self {
        PacketBody::Binary(Bytes::from(bytes))
    }
}

impl From<&[u8]> for PacketBody {
    fn from(bytes: &[u8]) -> Self {
        PacketBody::Binary(Bytes::copy_from_slice(bytes))
    }
}

impl From<Bytes> for PacketBody {
    fn from(bytes: Bytes) -> Self {
        PacketBody::Binary(bytes)
    }
}

/// Classify raw wire bytes.
///
/// Valid UTF-8 becomes [`PacketBody::Text`]; anything else becomes
/// [`PacketBody::Binary`] holding the untouched input.
pub fn decode(raw: Bytes) -> PacketBody {
    match std::str::from_utf8(&raw) {
        Ok(text) => PacketBody::Text(text.to_string()),
        Err(_) => PacketBody::Binary(raw),
    }
}

/// Encode a string or byte sequence for the wire.
///
/// Strings become their UTF-8 bytes and byte sequences pass through
/// unchanged. A byte sequence that happens to be valid UTF-8 will be decoded
/// as text on the other side.
pub fn encode(value: impl Into<PacketBody>) -> Bytes {
    value.into().to_bytes()
}

/// A decoded packet. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    channel: ChannelId,
    body: PacketBody,
}

impl Packet {
    /// Create a packet from an already classified body.
    pub fn new(channel: ChannelId, body: PacketBody) -> Self {
        Self { channel, body }
    }

    /// Classify `raw` and wrap it with its channel.
    pub fn decode(channel: ChannelId, raw: Bytes) -> Self {
        Self::new(channel, decode(raw))
    }

    /// The channel the packet arrived on.
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// The protocol meaning of the packet's channel.
    pub fn kind(&self) -> Channel {
        Channel::from(self.channel)
    }

    /// The classified body.
    pub fn body(&self) -> &PacketBody {
        &self.body
    }

    /// Consume the packet, returning its body.
    pub fn into_body(self) -> PacketBody {
        self.body
    }
}
