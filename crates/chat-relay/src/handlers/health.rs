use axum::http::StatusCode;

/// Process is up.
pub async fn livez() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// The relay client is built before the listener binds, so a served request
/// means the relay is ready.
pub async fn readyz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
