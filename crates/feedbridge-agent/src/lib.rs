pub mod backends;
pub mod error;
pub mod eval;
pub mod ignore;
pub mod keywords;
pub mod pipeline;
pub mod tally;

pub use error::CommandError;
pub use ignore::IgnoreFilter;
pub use keywords::KeywordEngine;
pub use pipeline::{Broadcast, CommandRouter, Dispatcher, ReplySink};
