//! Session and drill configuration.

use std::time::Duration;

use latejoin_core::{ParticipantId, ParticipantRole};
use latejoin_sync::{SyncConfig, TransportConfig};

/// Default transport endpoint.
pub const DEFAULT_ENDPOINT: &str = "tcp/127.0.0.1:7447";

/// Default session id.
pub const DEFAULT_SESSION_ID: &str = "pong_test";

/// Configuration for one participant's session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Transport endpoint, e.g. `tcp/127.0.0.1:7447` or `memory/local`.
    pub endpoint: String,
    /// Session id scoping every channel topic.
    pub session_id: String,
    /// This participant's id. Id `1` is the authority.
    pub participant: ParticipantId,
    /// Sync protocol configuration.
    pub sync: SyncConfig,
    /// Drill timings.
    pub drill: DrillConfig,
}

impl SessionConfig {
    /// The role derived from [`participant`](Self::participant).
    pub fn role(&self) -> ParticipantRole {
        self.participant.role()
    }

    /// Transport configuration connecting to [`endpoint`](Self::endpoint).
    pub fn transport(&self) -> TransportConfig {
        TransportConfig::connect(self.endpoint.clone())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            session_id: DEFAULT_SESSION_ID.to_string(),
            participant: ParticipantId(2),
            sync: SyncConfig::default(),
            drill: DrillConfig::default(),
        }
    }
}

/// Timings of the scripted drill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrillConfig {
    /// How long a peer waits after joining before it requests a sync.
    pub request_delay: Duration,
    /// How long a peer waits for the sync response.
    pub sync_wait: Duration,
    /// How long the authority stays up serving requests after broadcasting.
    pub hold: Duration,
    /// If set, the authority re-broadcasts a refreshed snapshot this often
    /// while holding.
    pub rebroadcast_interval: Option<Duration>,
}

impl Default for DrillConfig {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_secs(1),
            sync_wait: Duration::from_secs(5),
            hold: Duration::from_secs(10),
            rebroadcast_interval: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.role(), ParticipantRole::Peer);
        assert_eq!(config.transport().connect, vec![DEFAULT_ENDPOINT.to_string()]);
        assert_eq!(config.drill.rebroadcast_interval, None);
    }

    #[test]
    fn test_authority_role() {
        let config = SessionConfig {
            participant: ParticipantId(1),
            ..SessionConfig::default()
        };
        assert_eq!(config.role(), ParticipantRole::Authority);
    }
}
