//! Participant roles.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a session participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub u64);

/// The participant id that holds authority over the shared state.
pub const AUTHORITY_PARTICIPANT: ParticipantId = ParticipantId(1);

impl ParticipantId {
    /// The role this participant plays for the whole process lifetime.
    pub fn role(self) -> ParticipantRole {
        ParticipantRole::for_participant(self)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ParticipantId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Whether a participant originates the shared state or follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipantRole {
    /// The single participant allowed to originate snapshots.
    Authority,
    /// Every other participant; caches what the authority broadcasts.
    Peer,
}

impl ParticipantRole {
    /// Derive the role from a participant id. Id `1` is the authority.
    pub fn for_participant(id: ParticipantId) -> Self {
        if id == AUTHORITY_PARTICIPANT {
            ParticipantRole::Authority
        } else {
            ParticipantRole::Peer
        }
    }

    /// Whether this is the authority role.
    pub fn is_authority(self) -> bool {
        self == ParticipantRole::Authority
    }
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticipantRole::Authority => f.write_str("authority"),
            ParticipantRole::Peer => f.write_str("peer"),
        }
    }
}
