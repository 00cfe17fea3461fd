//! Error types for Latejoin Core.

use thiserror::Error;

/// Errors raised while mapping between channels and topic strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The topic does not follow the `{session}/channel{ddd}` shape.
    #[error("unrecognized topic: {0}")]
    Unrecognized(String),

    /// The topic is well formed but scoped to a different session.
    #[error("topic {topic} does not belong to session {session_id}")]
    ForeignSession { topic: String, session_id: String },

    /// The session id cannot be used as a topic prefix.
    #[error("invalid session id {0:?}")]
    InvalidSessionId(String),
}

/// Errors raised while interpreting a sync payload.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A structured decode was attempted on a binary body.
    #[error("payload is binary ({0} bytes), expected UTF-8 text")]
    NotText(usize),

    /// The text body is not a JSON object.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
