//! Replies and unsolicited messages sent by endpoints.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One message from an endpoint back to the controller.
///
/// The first three variants acknowledge a broadcast command and echo its
/// generation. `BufferFull` and `TraceData` are unsolicited: they can arrive
/// at any point while a worker is recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceReply {
    /// Acknowledges `GetKnownCategories`.
    KnownCategories {
        generation: u64,
        categories: BTreeSet<String>,
    },
    /// Acknowledges `EndTracing`; carries the categories actually exercised
    /// while the session ran.
    EndTracingAck {
        generation: u64,
        categories: BTreeSet<String>,
    },
    /// Acknowledges `GetBufferPercentFull`.
    BufferPercentFull { generation: u64, percent: f32 },
    /// The worker's trace buffer filled up mid-session.
    BufferFull,
    /// A chunk of serialized trace events, opaque to the controller.
    TraceData {
        #[serde(with = "base64_bytes")]
        chunk: Vec<u8>,
    },
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
