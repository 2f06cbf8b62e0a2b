//! Relay error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while relaying a chat message.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Empty or whitespace-only message
    #[error("message cannot be empty")]
    InvalidInput,

    /// Required configuration absent at startup
    #[error("configuration missing: {}", .0.join("; "))]
    ConfigurationMissing(Vec<String>),

    /// Remote rejected the credentials, or none could be obtained
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Transport failure or non-success status from the remote service
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// Remote call exceeded its time bound
    #[error("remote call timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Remote replied with an unexpected shape
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Call abandoned because the server is shutting down
    #[error("relay cancelled")]
    Cancelled,
}

impl RelayError {
    /// Stable name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::InvalidInput => "invalid_input",
            RelayError::ConfigurationMissing(_) => "configuration_missing",
            RelayError::Unauthorized(_) => "unauthorized",
            RelayError::RemoteUnavailable(_) => "remote_unavailable",
            RelayError::Timeout(_) => "timeout",
            RelayError::MalformedResponse(_) => "malformed_response",
            RelayError::Cancelled => "cancelled",
        }
    }

    /// Map a non-success HTTP status from the inference service.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => RelayError::Unauthorized(format!("status {status}: {body}")),
            _ => RelayError::RemoteUnavailable(format!("status {status}: {body}")),
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RelayError::MalformedResponse(err.to_string())
        } else {
            RelayError::RemoteUnavailable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_statuses_map_to_unauthorized() {
        assert!(matches!(
            RelayError::from_status(401, "denied".into()),
            RelayError::Unauthorized(_)
        ));
        assert!(matches!(
            RelayError::from_status(403, String::new()),
            RelayError::Unauthorized(_)
        ));
    }

    #[test]
    fn other_statuses_map_to_remote_unavailable() {
        for status in [400, 404, 429, 500, 503] {
            let err = RelayError::from_status(status, "x".into());
            assert_eq!(err.kind(), "remote_unavailable", "status {status}");
        }
    }

    #[test]
    fn timeout_display() {
        let err = RelayError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "remote call timed out after 30s");
        assert_eq!(err.kind(), "timeout");
    }
}
