use serde::{Deserialize, Serialize};

/// Runtime connection state of the feed transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    /// Fully connected and ready to send/receive.
    Connected,

    /// Attempting to establish or re-establish the connection.
    Connecting,

    /// Cleanly disconnected (not an error condition).
    Disconnected,

    /// An unrecoverable (or pre-retry) error occurred.
    Error(String),
}
