use thiserror::Error;

/// Errors raised by the feed transport.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The underlying transport could not be established.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A line could not be written to the feed.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Reading from the feed failed mid-stream.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// An operation was attempted before `connect` succeeded.
    #[error("Not connected")]
    NotConnected,
}

