//! # Latejoin Sync
//!
//! Late-joiner state synchronization on top of a publish/subscribe transport.
//!
//! ## Overview
//!
//! A participant that joins a session mid-way has missed every state update
//! broadcast before it arrived. The sync protocol lets it ask for the current
//! state explicitly, using two channels reserved out of the session's 256:
//!
//! - **254 (sync request)**: "send me the current state". Payload is ignored.
//! - **255 (sync data)**: "here is the current state". A JSON object.
//!
//! Exactly one participant, the authority, holds and answers with the
//! snapshot. Everyone else is a peer and caches the latest snapshot it saw.
//!
//! ## Key Properties
//!
//! - **Broadcast-only**: requests and responses are both plain publishes
//! - **Role-gated**: only the authority originates snapshots
//! - **Echo-safe**: the authority hears its own broadcasts and never re-broadcasts them
//! - **Caller-owned timeouts**: an unanswered request is a valid state
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use latejoin_core::{ParticipantRole, TopicScheme};
//! use latejoin_store::{GatedStore, MemorySnapshotStore};
//! use latejoin_sync::{MemoryBroker, SyncConfig, SyncEngine};
//!
//! async fn example() {
//!     let broker = MemoryBroker::new();
//!     let peer = SyncEngine::new(
//!         TopicScheme::new("pong_test").unwrap(),
//!         Arc::new(broker.create_transport()),
//!         GatedStore::new(ParticipantRole::Peer, Arc::new(MemorySnapshotStore::new())),
//!         SyncConfig::default(),
//!     );
//!
//!     peer.request_sync().await.unwrap();
//!     let _snapshot = peer.wait_for_sync(Duration::from_secs(5)).await;
//! }
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Peer                                 Authority
//!   |-- 254: SYNC_REQUEST ------------->|
//!   |<------------- 255: {"score":100} -|
//!   |               (authority also receives its own 255 echo)
//! ```

pub mod error;
pub mod messages;
pub mod protocol;
pub mod transport;

pub use error::{Result, SyncError};
pub use messages::{SyncMessage, SYNC_REQUEST_SENTINEL};
pub use protocol::{
    data_topic, request_topic, DataOutcome, RequestOutcome, SyncConfig, SyncEngine, SyncReport,
    SyncState,
};
pub use transport::{
    memory::MemoryBroker, memory::MemoryConnector, memory::MemoryTransport, Connector,
    MessageHandler, Subscription, Transport, TransportConfig,
};
