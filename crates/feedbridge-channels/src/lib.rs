pub mod backoff;
pub mod channel;
pub mod error;
pub mod tcp;
pub mod types;

pub use backoff::connect_with_backoff;
pub use channel::FeedChannel;
pub use error::ChannelError;
pub use tcp::TcpFeed;
pub use types::ChannelStatus;
