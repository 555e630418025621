use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::broadcast;

use feedbridge_agent::Broadcast;
use feedbridge_core::EventRecord;
use feedbridge_protocol::EventFrame;

const BROADCAST_CAPACITY: usize = 256;

/// Fan-out of serialized event frames to every connected viewer.
pub struct EventBroadcaster {
    tx: broadcast::Sender<String>,
    seq: AtomicU64,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            seq: AtomicU64::new(0),
        }
    }

    /// New viewer subscribes to the stream.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn viewer_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Monotonically increasing sequence shared by all outgoing frames.
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broadcast for EventBroadcaster {
    async fn broadcast(&self, record: &EventRecord) -> feedbridge_core::Result<()> {
        let frame = EventFrame::record(record).with_seq(self.next_seq());
        let payload = serde_json::to_string(&frame)?;
        // no viewers is not an error
        let _ = self.tx.send(payload);
        Ok(())
    }
}
