//! Error types for the sync module.

use latejoin_core::{AddressError, CodecError, ParticipantRole};
use latejoin_store::StoreError;
use thiserror::Error;

/// Errors that can occur during sync and transport operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The transport could not be opened.
    #[error("connect failure: {0}")]
    ConnectFailure(String),

    /// A single topic could not be subscribed.
    #[error("subscribe failure on {topic}: {reason}")]
    SubscribeFailure { topic: String, reason: String },

    /// A publish was rejected by the transport.
    #[error("publish failure on {topic}: {reason}")]
    PublishFailure { topic: String, reason: String },

    /// The transport session has been closed.
    #[error("transport closed")]
    Closed,

    /// Other transport-level error.
    #[error("transport error: {0}")]
    TransportError(String),

    /// A sync payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] CodecError),

    /// Topic addressing failed.
    #[error("address error: {0}")]
    Address(#[from] AddressError),

    /// Store operation failed.
    #[error("store error: {0}")]
    StoreError(#[from] StoreError),

    /// The operation is reserved for the other role.
    #[error("{role} cannot {operation}")]
    WrongRole {
        role: ParticipantRole,
        operation: &'static str,
    },
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
