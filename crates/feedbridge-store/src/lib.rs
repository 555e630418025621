//! `feedbridge-store`: SQLite-backed persistence collaborators.
//!
//! * [`log::EventLog`]: append-only chat log with auto-assigned,
//!   monotonically increasing [`EventId`](feedbridge_core::EventId)s.
//! * [`keywords::SqliteKeywordStore`]: keyword → reply value map behind the
//!   [`keywords::KeywordStore`] trait.

pub mod db;
pub mod error;
pub mod keywords;
pub mod log;

pub use error::{Result, StoreError};
pub use keywords::{KeywordStore, SqliteKeywordStore};
pub use log::EventLog;
