// Gossip Server - axum routes for the exchange endpoint
//
// POST /gossip is a push-pull: the caller's payload is merged into this
// node's storage before the reply is built, so answering a peer mutates
// local state.

use crate::sync::GossipPayload;
use crate::transport::{ExchangeHandler, TransportConfig, GOSSIP_PATH, HEALTH_PATH};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::warn;

type HandlerState = Arc<dyn ExchangeHandler>;

/// Build the router serving `/gossip` and `/health`
pub fn gossip_router(handler: Arc<dyn ExchangeHandler>, config: &TransportConfig) -> Router {
    Router::new()
        .route(GOSSIP_PATH, post(handle_gossip))
        .route(HEALTH_PATH, get(handle_health))
        .with_state(handler)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_payload_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.server_timeout(),
        ))
}

/// Serve `router` on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

/// POST /gossip: merge the peer's state, reply with ours
async fn handle_gossip(State(handler): State<HandlerState>, body: Bytes) -> Response {
    let remote = match GossipPayload::from_json(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(node = %handler.node_name(), error = %e, "Rejecting undecodable gossip payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    match handler.handle_exchange(remote).await {
        Ok(local) => (StatusCode::OK, Json(local)).into_response(),
        Err(e) => {
            warn!(node = %handler.node_name(), error = %e, "Failed to serve gossip exchange");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// GET /health
async fn handle_health(State(handler): State<HandlerState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "node": handler.node_name(),
        "version_vector": handler.version_vector(),
    }))
}
