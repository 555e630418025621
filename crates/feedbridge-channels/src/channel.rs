use async_trait::async_trait;

use crate::{error::ChannelError, types::ChannelStatus};

/// Interface to the upstream chat feed.
///
/// All methods take `&self` so one adapter can be shared (`Arc`) between a
/// reader task and a writer task; implementations guard each half separately.
#[async_trait]
pub trait FeedChannel: Send + Sync {
    /// Stable lowercase identifier used in logs (e.g. `"tcp"`).
    fn name(&self) -> &str;

    /// Establish the connection. Transitions to [`ChannelStatus::Connected`].
    async fn connect(&self) -> Result<(), ChannelError>;

    /// Close the connection. Transitions to [`ChannelStatus::Disconnected`].
    async fn disconnect(&self) -> Result<(), ChannelError>;

    /// Next raw chunk as delivered by the transport, `None` at end of stream.
    ///
    /// Chunk boundaries are whatever the transport produced; callers must not
    /// assume one chunk is one line.
    async fn recv(&self) -> Result<Option<Vec<u8>>, ChannelError>;

    /// Write one line of text to the feed. The line terminator is added here.
    async fn send_line(&self, line: &str) -> Result<(), ChannelError>;

    /// Current runtime status without blocking.
    fn status(&self) -> ChannelStatus;
}
