//! Channel addressing over the pub/sub topic space.
//!
//! Every session multiplexes 256 channels onto topics of the form
//! `{session_id}/channel{ddd}`, where `ddd` is the channel id zero-padded to
//! exactly three digits. Channels 254 and 255 are reserved for the sync
//! protocol; every other channel belongs to the application.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AddressError;

/// Literal that precedes the three channel digits in the last topic segment.
const CHANNEL_SEGMENT_PREFIX: &str = "channel";

/// Characters a session id may not contain (wildcards and selectors of
/// common key-expression grammars).
const FORBIDDEN_SESSION_CHARS: [char; 4] = ['*', '$', '?', '#'];

/// A channel identifier in `0..=255`.
///
/// The range is enforced by the representation, so a topic can never be
/// built for an out-of-range channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub u8);

/// Channel on which late joiners ask for the current state.
pub const SYNC_REQUEST_CHANNEL: ChannelId = ChannelId(254);

/// Channel on which the authority publishes the current state.
pub const SYNC_DATA_CHANNEL: ChannelId = ChannelId(255);

impl ChannelId {
    /// Create from a raw channel number.
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Get the raw channel number.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Iterate over every channel, `0` through `255`.
    pub fn all() -> impl Iterator<Item = ChannelId> {
        (0..=u8::MAX).map(ChannelId)
    }

    /// Whether this channel is one of the two reserved sync channels.
    pub const fn is_reserved(self) -> bool {
        self.0 == SYNC_REQUEST_CHANNEL.0 || self.0 == SYNC_DATA_CHANNEL.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

impl From<u8> for ChannelId {
    fn from(id: u8) -> Self {
        Self(id)
    }
}

/// Protocol meaning of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Channel 254: "send me the current state".
    SyncRequest,
    /// Channel 255: "here is the current state".
    SyncData,
    /// Any other channel, opaque to the sync protocol.
    Application(ChannelId),
}

impl Channel {
    /// The channel id this variant is addressed on.
    pub const fn id(self) -> ChannelId {
        match self {
            Channel::SyncRequest => SYNC_REQUEST_CHANNEL,
            Channel::SyncData => SYNC_DATA_CHANNEL,
            Channel::Application(id) => id,
        }
    }
}

impl From<ChannelId> for Channel {
    fn from(id: ChannelId) -> Self {
        match id {
            SYNC_REQUEST_CHANNEL => Channel::SyncRequest,
            SYNC_DATA_CHANNEL => Channel::SyncData,
            other => Channel::Application(other),
        }
    }
}

/// Build the canonical topic for `channel` within `session_id`.
pub fn topic_for(session_id: &str, channel: ChannelId) -> String {
    format!("{session_id}/{CHANNEL_SEGMENT_PREFIX}{channel}")
}

/// Parse the channel id out of a topic built by [`topic_for`].
///
/// Only the last path segment is inspected. It must be `channel` followed by
/// exactly three ASCII digits whose value fits in `0..=255`, and it must be
/// preceded by a non-empty session prefix. Anything else is
/// [`AddressError::Unrecognized`].
pub fn channel_for(topic: &str) -> Result<ChannelId, AddressError> {
    let unrecognized = || AddressError::Unrecognized(topic.to_string());

    let (prefix, segment) = topic.rsplit_once('/').ok_or_else(unrecognized)?;
    if prefix.is_empty() {
        return Err(unrecognized());
    }

    let digits = segment
        .strip_prefix(CHANNEL_SEGMENT_PREFIX)
        .ok_or_else(unrecognized)?;
    if digits.len() != 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(unrecognized());
    }

    let value: u16 = digits.parse().map_err(|_| unrecognized())?;
    u8::try_from(value).map(ChannelId).map_err(|_| unrecognized())
}

/// Topic addressing bound to one validated session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicScheme {
    session_id: String,
}

impl TopicScheme {
    /// Validate `session_id` and bind a scheme to it.
    ///
    /// The id becomes a topic prefix, so it must be non-empty, contain no
    /// wildcard characters and no empty path segments.
    pub fn new(session_id: impl Into<String>) -> Result<Self, AddressError> {
        let session_id = session_id.into();

        let has_empty_segment = session_id.split('/').any(str::is_empty);
        let has_forbidden_char = session_id.contains(&FORBIDDEN_SESSION_CHARS[..]);
        if has_empty_segment || has_forbidden_char {
            return Err(AddressError::InvalidSessionId(session_id));
        }

        Ok(Self { session_id })
    }

    /// The session id every topic is scoped by.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Topic for `channel` in this session.
    pub fn topic_for(&self, channel: ChannelId) -> String {
        topic_for(&self.session_id, channel)
    }

    /// Channel addressed by `topic`, which must belong to this session.
    pub fn channel_for(&self, topic: &str) -> Result<ChannelId, AddressError> {
        let channel = channel_for(topic)?;

        // channel_for guarantees a '/' is present
        let prefix = topic.rsplit_once('/').map(|(prefix, _)| prefix);
        if prefix != Some(self.session_id.as_str()) {
            return Err(AddressError::ForeignSession {
                topic: topic.to_string(),
                session_id: self.session_id.clone(),
            });
        }

        Ok(channel)
    }

    /// All 256 `(channel, topic)` pairs of this session, in channel order.
    pub fn topics(&self) -> impl Iterator<Item = (ChannelId, String)> + '_ {
        ChannelId::all().map(move |channel| (channel, self.topic_for(channel)))
    }
}
