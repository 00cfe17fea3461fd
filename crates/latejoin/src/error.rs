//! Error types for the session layer.

use latejoin_core::AddressError;
use latejoin_store::StoreError;
use latejoin_sync::SyncError;
use thiserror::Error;

/// Errors that can occur while driving a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Sync or transport error, including connect and subscribe failures.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Topic addressing error.
    #[error("address error: {0}")]
    Address(#[from] AddressError),

    /// Snapshot store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// No transport session is open.
    #[error("not connected")]
    NotConnected,

    /// A transport session is already open.
    #[error("already connected")]
    AlreadyConnected,

    /// Channels have not been set up for the open session.
    #[error("channels not set up")]
    ChannelsNotReady,

    /// Channels were already set up for the open session.
    #[error("channels already set up for session {0}")]
    ChannelsAlreadySetUp(String),

    /// The endpoint needs a transport this build does not include.
    #[error("no transport available for endpoint {0}")]
    UnsupportedEndpoint(String),
}

impl SessionError {
    /// Whether this error means the transport could not be reached.
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            SessionError::Sync(SyncError::ConnectFailure(_)) | SessionError::UnsupportedEndpoint(_)
        )
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
