//! Per-record processing: persist, cache, broadcast, then route commands or
//! fall back to keyword alerts.

pub mod commands;
pub mod context;
pub mod dispatch;
pub mod router;

pub use context::{Broadcast, ReplySink};
pub use dispatch::Dispatcher;
pub use router::{normalize, CommandContext, CommandEntry, CommandKind, CommandRouter};
