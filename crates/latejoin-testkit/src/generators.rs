//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{Map, Value};

use latejoin_core::{ChannelId, SyncSnapshot};

/// Any channel, reserved ones included.
pub fn channel_id() -> impl Strategy<Value = ChannelId> {
    any::<u8>().prop_map(ChannelId)
}

/// A channel outside the reserved sync pair.
pub fn application_channel() -> impl Strategy<Value = ChannelId> {
    (0u8..=253).prop_map(ChannelId)
}

/// A valid session id, possibly with nested path segments.
pub fn session_id() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,15}(/[a-z0-9_-]{1,8}){0,2}".prop_map(String::from)
}

/// Bytes that are not valid UTF-8 as a whole: an arbitrary text prefix and
/// suffix around a byte that can never start or continue a UTF-8 sequence.
pub fn non_utf8_bytes() -> impl Strategy<Value = Vec<u8>> {
    (any::<String>(), 0xf8u8..=0xff, any::<String>()).prop_map(|(head, bad, tail)| {
        let mut bytes = head.into_bytes();
        bytes.push(bad);
        bytes.extend_from_slice(tail.as_bytes());
        bytes
    })
}

/// A JSON leaf value that survives a text round trip exactly.
pub fn json_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        any::<u64>().prop_map(Value::from),
        (-1.0e12f64..1.0e12).prop_map(Value::from),
        ".{0,24}".prop_map(Value::from),
    ]
}

/// A JSON value nested at most a few levels deep.
pub fn json_value() -> impl Strategy<Value = Value> {
    json_scalar().prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// A snapshot with up to eight keys.
pub fn snapshot() -> impl Strategy<Value = SyncSnapshot> {
    prop::collection::btree_map("[a-z_]{1,12}", json_value(), 0..8)
        .prop_map(|m| SyncSnapshot::from(m.into_iter().collect::<Map<String, Value>>()))
}
