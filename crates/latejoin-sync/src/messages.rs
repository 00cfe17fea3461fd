//! Sync protocol message types.
//!
//! The protocol has two messages, each bound to a reserved channel:
//!
//! | Channel | Message   | Payload                                     |
//! |---------|-----------|---------------------------------------------|
//! | 254     | `Request` | opaque text sentinel, only arrival matters |
//! | 255     | `Data`    | JSON object as text, or raw bytes           |

use bytes::Bytes;

use latejoin_core::{
    Channel, ChannelId, CodecError, Packet, PacketBody, SyncSnapshot, SYNC_DATA_CHANNEL,
    SYNC_REQUEST_CHANNEL,
};

/// Text a participant publishes on channel 254 to ask for the current state.
pub const SYNC_REQUEST_SENTINEL: &str = "SYNC_REQUEST";

/// A packet received or sent on one of the reserved sync channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMessage {
    /// Someone asked for the current state. The body is kept for logging only.
    Request(PacketBody),
    /// Someone published the current state.
    Data(PacketBody),
}

impl SyncMessage {
    /// The sentinel request.
    pub fn request() -> Self {
        SyncMessage::Request(PacketBody::from(SYNC_REQUEST_SENTINEL))
    }

    /// A data message carrying `snapshot` as compact JSON text.
    pub fn data(snapshot: &SyncSnapshot) -> Result<Self, CodecError> {
        Ok(SyncMessage::Data(PacketBody::Text(snapshot.to_json_string()?)))
    }

    /// Interpret a packet, or hand it back if it is on an application channel.
    pub fn from_packet(packet: Packet) -> Result<Self, Packet> {
        match packet.kind() {
            Channel::SyncRequest => Ok(SyncMessage::Request(packet.into_body())),
            Channel::SyncData => Ok(SyncMessage::Data(packet.into_body())),
            Channel::Application(_) => Err(packet),
        }
    }

    /// The reserved channel this message travels on.
    pub fn channel(&self) -> ChannelId {
        match self {
            SyncMessage::Request(_) => SYNC_REQUEST_CHANNEL,
            SyncMessage::Data(_) => SYNC_DATA_CHANNEL,
        }
    }

    /// The message body.
    pub fn body(&self) -> &PacketBody {
        match self {
            SyncMessage::Request(body) | SyncMessage::Data(body) => body,
        }
    }

    /// Wire bytes for this message.
    pub fn encode(&self) -> Bytes {
        self.body().to_bytes()
    }
}
