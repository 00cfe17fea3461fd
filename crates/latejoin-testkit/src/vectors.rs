//! Golden test vectors.
//!
//! Topic strings and payload classification are wire formats shared with
//! other participants, so they are pinned here rather than derived.

use bytes::Bytes;

use latejoin_core::{channel_for, decode, topic_for, ChannelId, PacketBody};

/// A channel and the exact topic it must map to.
#[derive(Debug, Clone)]
pub struct AddressVector {
    pub session_id: &'static str,
    pub channel: u8,
    pub topic: &'static str,
}

/// How a wire payload must be classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedBody {
    /// Decodes to this text.
    Text(&'static str),
    /// Stays binary, bytes unchanged.
    Binary,
}

/// A wire payload and its classification.
#[derive(Debug, Clone)]
pub struct CodecVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Wire bytes, hex encoded.
    pub wire_hex: &'static str,
    /// Expected classification.
    pub expected: ExpectedBody,
}

impl CodecVector {
    /// The wire bytes.
    pub fn wire(&self) -> Bytes {
        Bytes::from(hex::decode(self.wire_hex).expect("vector hex is valid"))
    }
}

/// Get all addressing vectors.
pub fn address_vectors() -> Vec<AddressVector> {
    [
        (0, "pong_test/channel000"),
        (7, "pong_test/channel007"),
        (42, "pong_test/channel042"),
        (254, "pong_test/channel254"),
        (255, "pong_test/channel255"),
    ]
    .into_iter()
    .map(|(channel, topic)| AddressVector {
        session_id: "pong_test",
        channel,
        topic,
    })
    .collect()
}

/// Get all codec vectors.
pub fn codec_vectors() -> Vec<CodecVector> {
    vec![
        CodecVector {
            name: "sync request sentinel",
            wire_hex: "53594e435f52455155455354",
            expected: ExpectedBody::Text("SYNC_REQUEST"),
        },
        CodecVector {
            name: "snapshot json",
            wire_hex: "7b2273636f7265223a3130302c22706c6179657273223a327d",
            expected: ExpectedBody::Text(r#"{"score":100,"players":2}"#),
        },
        CodecVector {
            name: "empty payload",
            wire_hex: "",
            expected: ExpectedBody::Text(""),
        },
        CodecVector {
            name: "multibyte text",
            wire_hex: "c3a9e282ac",
            expected: ExpectedBody::Text("\u{e9}\u{20ac}"),
        },
        CodecVector {
            name: "invalid utf-8",
            wire_hex: "fffe00",
            expected: ExpectedBody::Binary,
        },
        CodecVector {
            name: "utf-8 prefix then invalid byte",
            wire_hex: "68656c6c6fff",
            expected: ExpectedBody::Binary,
        },
        CodecVector {
            name: "truncated multibyte sequence",
            wire_hex: "e282",
            expected: ExpectedBody::Binary,
        },
    ]
}

/// Check every vector against this implementation.
///
/// Returns `(name, matches)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool)> {
    let addresses = address_vectors().into_iter().map(|v| {
        let channel = ChannelId(v.channel);
        let matches = topic_for(v.session_id, channel) == v.topic
            && channel_for(v.topic).ok() == Some(channel);
        (format!("{} channel {}", v.session_id, v.channel), matches)
    });

    let codecs = codec_vectors().into_iter().map(|v| {
        let wire = v.wire();
        let matches = match (&v.expected, decode(wire.clone())) {
            (ExpectedBody::Text(expected), PacketBody::Text(text)) => text == *expected,
            (ExpectedBody::Binary, PacketBody::Binary(bytes)) => bytes == wire,
            _ => false,
        };
        (v.name.to_string(), matches)
    });

    addresses.chain(codecs).collect()
}
