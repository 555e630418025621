use serde::{Deserialize, Serialize};
use serde_json::Value;

use feedbridge_core::EventRecord;

/// Server → viewer push event.
/// Wire: `{ "type": "event", "event": "chat.record", "payload": {...}, "seq": 42 }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, payload: impl Serialize) -> Self {
        Self {
            frame_type: "event".to_string(),
            event: event.into(),
            payload: Some(serde_json::to_value(payload).unwrap_or(Value::Null)),
            seq: None,
        }
    }

    /// A cached chat record pushed to viewers as it is dispatched.
    pub fn record(record: &EventRecord) -> Self {
        Self::new("chat.record", record)
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }
}
