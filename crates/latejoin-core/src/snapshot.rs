//! The shared session snapshot.
//!
//! A snapshot is an opaque JSON object. The sync protocol never merges
//! snapshots: a newer one replaces the older one wholesale.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::PacketBody;
use crate::error::CodecError;

/// Key of the degraded snapshot built from a binary sync payload.
pub const BINARY_SIZE_KEY: &str = "binary_size";

/// Key/value state shared by the authority.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncSnapshot(Map<String, Value>);

impl SyncSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert or overwrite a key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the snapshot has no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Stand-in for a sync payload that arrived as binary: only its size is
    /// recorded, the bytes themselves are not interpreted.
    pub fn binary_fallback(size: usize) -> Self {
        Self::new().with(BINARY_SIZE_KEY, size)
    }

    /// Whether this snapshot is a [`binary_fallback`](Self::binary_fallback).
    pub fn is_binary_fallback(&self) -> bool {
        self.len() == 1 && self.get(BINARY_SIZE_KEY).is_some_and(Value::is_u64)
    }

    /// Serialize as a compact JSON object.
    pub fn to_json_string(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(&self.0)?)
    }

    /// Serialize as compact JSON bytes.
    pub fn to_json_bytes(&self) -> Result<Bytes, CodecError> {
        Ok(Bytes::from(serde_json::to_vec(&self.0)?))
    }

    /// Parse a JSON object. Any other JSON value is an error.
    pub fn from_json_str(text: &str) -> Result<Self, CodecError> {
        Ok(Self(serde_json::from_str(text)?))
    }

    /// Parse a text body. Binary bodies are rejected with
    /// [`CodecError::NotText`]; callers that accept binary sync payloads use
    /// [`binary_fallback`](Self::binary_fallback) instead.
    pub fn from_body(body: &PacketBody) -> Result<Self, CodecError> {
        match body {
            PacketBody::Text(text) => Self::from_json_str(text),
            PacketBody::Binary(bytes) => Err(CodecError::NotText(bytes.len())),
        }
    }
}

impl From<Map<String, Value>> for SyncSnapshot {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
