//! # Latejoin Core
//!
//! Pure primitives for the late-joiner synchronization protocol: channel
//! addressing, payload classification, participant roles and snapshots.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over topic strings and byte payloads.
//!
//! ## Key Types
//!
//! - [`ChannelId`] - An application sub-address in `0..=255`
//! - [`Channel`] - Tagged view of a channel: sync request, sync data or application
//! - [`TopicScheme`] - Maps channels to `{session}/channel{ddd}` topics and back
//! - [`PacketBody`] - A payload classified exactly once as text or binary
//! - [`ParticipantRole`] - Authority or Peer, derived from the participant id
//! - [`SyncSnapshot`] - The JSON object shared by the authority
//!
//! ## Wire Format
//!
//! ```text
//! topic:   pong_test/channel254
//! payload: raw bytes, no type tag
//!          valid UTF-8  => PacketBody::Text
//!          otherwise    => PacketBody::Binary
//! ```

pub mod channel;
pub mod codec;
pub mod error;
pub mod role;
pub mod snapshot;

pub use channel::{
    channel_for, topic_for, Channel, ChannelId, TopicScheme, SYNC_DATA_CHANNEL,
    SYNC_REQUEST_CHANNEL,
};
pub use codec::{decode, encode, Packet, PacketBody};
pub use error::{AddressError, CodecError};
pub use role::{ParticipantId, ParticipantRole, AUTHORITY_PARTICIPANT};
pub use snapshot::{SyncSnapshot, BINARY_SIZE_KEY};
