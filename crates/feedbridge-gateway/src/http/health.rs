use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::{atomic::Ordering, Arc};

use crate::app::AppState;

/// GET /health: liveness check with feed and viewer counters.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "commit": env!("FEEDBRIDGE_GIT_SHA"),
        "feed": {
            "name": state.feed.name(),
            "addr": format!("{}:{}", state.config.feed.host, state.config.feed.port),
            "status": state.feed.status(),
        },
        "records_handled": state.records_handled.load(Ordering::Relaxed),
        "viewers": state.viewers.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::build_router;
    use crate::ws::broadcast::EventBroadcaster;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use feedbridge_channels::TcpFeed;
    use feedbridge_core::BridgeConfig;
    use tower::ServiceExt;

    #[tokio::test]
    async fn reports_feed_status_and_counters() {
        let state = Arc::new(AppState::new(
            BridgeConfig::default(),
            Arc::new(EventBroadcaster::new()),
            Arc::new(TcpFeed::new("127.0.0.1", 1)),
        ));
        state.record_handled(3);

        let resp = build_router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["feed"]["name"], "tcp");
        assert_eq!(body["feed"]["addr"], "127.0.0.1:8888");
        assert_eq!(body["feed"]["status"], "disconnected");
        assert_eq!(body["records_handled"], 3);
        assert_eq!(body["viewers"], 0);
    }
}
