//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;
use std::time::Duration;

use latejoin::{DrillConfig, SessionController};
use latejoin_core::{ChannelId, ParticipantId, SyncSnapshot, AUTHORITY_PARTICIPANT};
use latejoin_sync::MemoryBroker;

/// Session id used by fixtures.
pub const SESSION_ID: &str = "pong_test";

/// Endpoint fixtures connect to.
pub const MEMORY_ENDPOINT: &str = "memory/testkit";

/// The snapshot the scenarios revolve around: `{"score":100,"players":2}`.
pub fn score_snapshot() -> SyncSnapshot {
    SyncSnapshot::new().with("score", 100).with("players", 2)
}

/// `len` bytes that are not valid UTF-8.
pub fn non_utf8_payload(len: usize) -> Vec<u8> {
    vec![0xff; len]
}

/// Drill timings short enough for tests.
pub fn fast_drill() -> DrillConfig {
    DrillConfig {
        request_delay: Duration::from_millis(20),
        sync_wait: Duration::from_secs(2),
        hold: Duration::from_millis(500),
        rebroadcast_interval: None,
    }
}

/// An authority and a peer, connected to one broker with channels set up.
pub struct SessionFixture {
    pub broker: Arc<MemoryBroker>,
    pub authority: SessionController,
    pub peer: SessionController,
}

impl SessionFixture {
    /// Connect participant 1 and participant 2 to a fresh broker.
    pub async fn new() -> Self {
        let broker = MemoryBroker::new();
        let authority = Self::join(&broker, AUTHORITY_PARTICIPANT).await;
        let peer = Self::join(&broker, ParticipantId(2)).await;

        Self {
            broker,
            authority,
            peer,
        }
    }

    /// Connect another participant to the same broker and session.
    pub async fn late_joiner(&self, participant: u64) -> SessionController {
        Self::join(&self.broker, ParticipantId(participant)).await
    }

    /// Topic of `channel` in the fixture session.
    pub fn topic(channel: u8) -> String {
        latejoin_core::topic_for(SESSION_ID, ChannelId(channel))
    }

    /// Number of publishes on `channel` so far.
    pub fn publishes(&self, channel: u8) -> usize {
        self.broker.publish_count(&Self::topic(channel))
    }

    async fn join(broker: &Arc<MemoryBroker>, participant: ParticipantId) -> SessionController {
        let mut session = SessionController::new(Arc::new(broker.connector()), participant);
        session
            .connect(MEMORY_ENDPOINT)
            .await
            .expect("memory endpoint connects");
        let report = session
            .setup_channels(SESSION_ID)
            .await
            .expect("channels set up");
        assert!(report.is_complete(), "fixture broker denies no topics");
        session
    }
}
