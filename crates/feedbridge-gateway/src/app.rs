use axum::{routing::get, Router};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use feedbridge_channels::FeedChannel;
use feedbridge_core::BridgeConfig;

use crate::ws::broadcast::EventBroadcaster;

/// Central shared state, passed as `Arc<AppState>` to all Axum handlers.
pub struct AppState {
    pub config: BridgeConfig,
    pub broadcaster: Arc<EventBroadcaster>,
    pub feed: Arc<dyn FeedChannel>,
    /// Records the dispatcher has handled since startup.
    pub records_handled: AtomicU64,
    /// Connected viewers: conn_id -> connected at.
    pub viewers: DashMap<String, DateTime<Utc>>,
}

impl AppState {
    pub fn new(
        config: BridgeConfig,
        broadcaster: Arc<EventBroadcaster>,
        feed: Arc<dyn FeedChannel>,
    ) -> Self {
        Self {
            config,
            broadcaster,
            feed,
            records_handled: AtomicU64::new(0),
            viewers: DashMap::new(),
        }
    }

    pub fn record_handled(&self, count: usize) {
        self.records_handled
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Assemble the Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/ws", get(crate::ws::connection::ws_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
