//! Error types for the store module.

use latejoin_core::ParticipantRole;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Only the authority may originate a snapshot.
    #[error("{role} may not originate a snapshot")]
    NotAuthority { role: ParticipantRole },
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
