//! In-memory view of recent chat events, reconciled with the persisted log.

pub mod backfill;
pub mod cache;

pub use backfill::load_history;
pub use cache::RecencyCache;
