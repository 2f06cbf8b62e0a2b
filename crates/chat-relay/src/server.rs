use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;

use crate::handlers;
use crate::llm::ChatCompleter;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<dyn ChatCompleter>,
    /// Fired on shutdown; aborts in-flight relays.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(relay: Arc<dyn ChatCompleter>) -> Self {
        Self {
            relay,
            shutdown: CancellationToken::new(),
        }
    }
}

pub fn build_app(state: AppState, request_timeout_secs: u64) -> Router {
    let chat = Router::new()
        .route("/chat", get(handlers::chat::index))
        .route("/chat/send-message", post(handlers::chat::send_message))
        // Route shape used by the storefront's existing client script.
        .route("/Chat", get(handlers::chat::index))
        .route("/Chat/SendMessage", post(handlers::chat::send_message))
        .with_state(state);

    Router::new()
        .route("/livez", get(handlers::livez))
        .route("/readyz", get(handlers::readyz))
        .route("/version", get(handlers::version))
        .merge(chat)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(request_timeout_secs),
        ))
}
