//! # Latejoin
//!
//! Late-joiner state synchronization for game sessions on a pub/sub
//! transport.
//!
//! ## Overview
//!
//! A session is addressed as 256 channels, each a topic of the form
//! `{sessionId}/channel{ddd}`. Channels 254 and 255 carry the sync protocol;
//! the rest belong to the application. One participant, the authority
//! (participant id 1), holds the session snapshot. Everyone else is a peer
//! that can ask for it at any time.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use latejoin::{ParticipantId, SessionController};
//! use latejoin::sync::MemoryBroker;
//!
//! async fn example() -> latejoin::Result<()> {
//!     let broker = MemoryBroker::new();
//!     let mut peer = SessionController::new(Arc::new(broker.connector()), ParticipantId(2));
//!
//!     peer.connect("memory/local").await?;
//!     let report = peer.setup_channels("pong_test").await?;
//!     assert!(report.is_complete());
//!
//!     peer.request_sync().await?;
//!     let _snapshot = peer.wait_for_sync(Duration::from_secs(5)).await?;
//!
//!     peer.shutdown().await
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `latejoin::core` - Channel addressing, payload codec, roles, snapshots
//! - `latejoin::store` - Snapshot storage
//! - `latejoin::sync` - Transport boundary and sync protocol engine
//!
//! ## Features
//!
//! - `zenoh` - a [`Transport`](sync::Transport) backed by zenoh, used for
//!   every endpoint that is not `memory/...`

pub mod config;
pub mod drill;
pub mod error;
pub mod session;
pub mod transport;
#[cfg(feature = "zenoh")]
pub mod zenoh_transport;

// Re-export component crates
pub use latejoin_core as core;
pub use latejoin_store as store;
pub use latejoin_sync as sync;

pub use config::{DrillConfig, SessionConfig, DEFAULT_ENDPOINT, DEFAULT_SESSION_ID};
pub use drill::{drill_snapshot, DrillOutcome, DrillReport};
pub use error::{Result, SessionError};
pub use session::{Dispatcher, SessionController, SessionEngine, SetupReport};
pub use transport::connector_for;
#[cfg(feature = "zenoh")]
pub use zenoh_transport::{ZenohConnector, ZenohTransport};

// Re-export commonly used core types
pub use latejoin_core::{
    ChannelId, Packet, PacketBody, ParticipantId, ParticipantRole, SyncSnapshot, TopicScheme,
};
