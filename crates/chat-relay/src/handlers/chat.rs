//! Storefront chat handlers.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::llm::{ChatCompleter, RelayError};
use crate::response;
use crate::server::AppState;

/// Body returned for missing or blank messages.
pub const EMPTY_MESSAGE: &str = "Message cannot be empty.";

/// Message shown to the caller for every relay failure.
pub const GENERIC_FAILURE: &str = "The assistant is unavailable right now. Please try again later.";

const CHAT_PAGE: &str = include_str!("../../assets/chat.html");

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
pub struct SendMessageResponse {
    reply: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /chat
pub async fn index() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

/// POST /chat/send-message
///
/// A body that is not a JSON object with a `message` is treated like a
/// missing message. A body that cannot be read at all (e.g. over the size
/// limit) keeps axum's own rejection status.
pub async fn send_message(
    State(state): State<AppState>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Response {
    let message = match payload {
        Ok(Json(req)) => req.message,
        Err(JsonRejection::BytesRejection(rejection)) => {
            debug!(error = %rejection, "chat message body unreadable");
            return rejection.into_response();
        }
        Err(_) => None,
    };

    match relay_message(state.relay.as_ref(), &state.shutdown, message).await {
        Ok(reply) => (StatusCode::OK, Json(SendMessageResponse { reply })).into_response(),
        Err(RelayError::InvalidInput) => (StatusCode::BAD_REQUEST, EMPTY_MESSAGE).into_response(),
        Err(RelayError::Cancelled) => {
            warn!("chat relay cancelled by shutdown");
            response::service_unavailable(GENERIC_FAILURE).into_response()
        }
        Err(e) => {
            error!(kind = e.kind(), error = %e, "chat relay failed");
            response::internal_error(GENERIC_FAILURE).into_response()
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Validate `message` and relay it once.
///
/// The message is forwarded exactly as received. The call is abandoned when
/// `shutdown` fires.
pub async fn relay_message(
    relay: &dyn ChatCompleter,
    shutdown: &CancellationToken,
    message: Option<String>,
) -> Result<String, RelayError> {
    let Some(message) = message.filter(|m| !m.trim().is_empty()) else {
        debug!("rejected empty chat message");
        return Err(RelayError::InvalidInput);
    };

    tokio::select! {
        biased;
        _ = shutdown.cancelled() => Err(RelayError::Cancelled),
        result = relay.complete(&message) => result,
    }
}
