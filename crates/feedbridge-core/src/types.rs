use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Ordering key assigned by the event log on append.
///
/// Wire form is `"<millis>-<seq>"`. Two ids compare numerically on
/// `(millis, seq)` when both parse; anything else falls back to plain
/// string comparison so foreign ids still have a total order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(millis: i64, seq: u64) -> Self {
        Self(format!("{millis}-{seq}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Millisecond timestamp encoded in the id prefix, if it parses.
    pub fn timestamp_millis(&self) -> Option<i64> {
        self.0.split('-').next()?.parse().ok()
    }

    fn parts(&self) -> Option<(i64, u64)> {
        let (millis, seq) = self.0.split_once('-')?;
        Some((millis.parse().ok()?, seq.parse().ok()?))
    }
}

impl Ord for EventId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.parts(), other.parts()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            _ => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for EventId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Named fields pulled out of one feed frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFields {
    pub message: String,
    pub date: String,
    pub time: String,
    pub origin_host: String,
    /// Set when the frame carries the self-authorship marker: our own replies
    /// echoed back by the feed.
    #[serde(default)]
    pub is_self: bool,
}

/// What the event log stores per entry: the exact frame text plus its fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub raw_text: String,
    pub fields: EventFields,
}

/// One chat event with its assigned ordering id. Immutable once cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EventId,
    pub raw_text: String,
    pub fields: EventFields,
}

impl EventRecord {
    pub fn from_entry(id: EventId, entry: LogEntry) -> Self {
        Self {
            id,
            raw_text: entry.raw_text,
            fields: entry.fields,
        }
    }

    pub fn message(&self) -> &str {
        &self.fields.message
    }

    pub fn is_self(&self) -> bool {
        self.fields.is_self
    }
}
