//! Collaborator seams the dispatcher talks through.
//!
//! The gateway implements both traits: replies go to the feed writer task,
//! broadcasts fan out to connected viewers. Tests plug in recording mocks.

use async_trait::async_trait;

use feedbridge_core::EventRecord;

/// Outbound text for the chat feed.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, text: &str) -> feedbridge_core::Result<()>;
}

/// Push channel to external viewers.
#[async_trait]
pub trait Broadcast: Send + Sync {
    async fn broadcast(&self, record: &EventRecord) -> feedbridge_core::Result<()>;
}
