//! Stream framer: turns raw feed chunks into discrete chat frames.
//!
//! The feed is line-oriented but chunk boundaries are arbitrary, and one
//! chunk routinely carries several frames. Each frame looks like:
//!
//! ```text
//! >> 「 message body 」(2024/05/01 12:34:56 君 host.example.jp *) <<
//! ```
//!
//! The trailing `*` inside the parentheses is present only on frames the
//! bridge itself authored. Chunks shorter than the configured threshold are
//! keep-alive noise and produce nothing.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use feedbridge_core::EventFields;

static FRAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        >>\s*「\s*(?P<message>.*?)\s*」
        \(\s*
            (?P<date>\d{4}[/-]\d{2}[/-]\d{2})\s+
            (?P<time>\d{1,2}:\d{2}:\d{2})\s*
            君\s*
            (?P<host>[^\s)]*)\s*
            (?P<self>\*)?\s*
        \)\s*<<",
    )
    .expect("frame pattern must compile")
});

/// One extracted frame: the exact matched text plus its named fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub raw: String,
    pub fields: EventFields,
}

/// Stateless extractor configured with the noise threshold.
#[derive(Debug, Clone)]
pub struct StreamFramer {
    min_chunk_bytes: usize,
}

impl StreamFramer {
    pub fn new(min_chunk_bytes: usize) -> Self {
        Self { min_chunk_bytes }
    }

    pub fn min_chunk_bytes(&self) -> usize {
        self.min_chunk_bytes
    }

    /// Extract every frame in `chunk`, in document order.
    pub fn extract(&self, chunk: &[u8]) -> Vec<Frame> {
        if chunk.len() < self.min_chunk_bytes {
            trace!(len = chunk.len(), "dropping sub-threshold chunk");
            return Vec::new();
        }

        let text: String = String::from_utf8_lossy(chunk)
            .chars()
            .filter(|c| *c != '\r' && *c != '\n')
            .collect();

        FRAME_PATTERN
            .captures_iter(&text)
            .map(|caps| {
                let field = |name: &str| {
                    caps.name(name)
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default()
                };
                Frame {
                    raw: caps[0].to_string(),
                    fields: EventFields {
                        message: field("message"),
                        date: field("date"),
                        time: field("time"),
                        origin_host: field("host"),
                        is_self: caps.name("self").is_some(),
                    },
                }
            })
            .collect()
    }
}
