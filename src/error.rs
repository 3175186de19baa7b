//! Error types shared by the core and the engine adapters.

use axum::http::StatusCode;
use thiserror::Error;

use crate::config::validation::ValidationError;

/// Errors raised by route registration, container lifecycle and request dispatch.
#[derive(Debug, Error)]
pub enum WebError {
    /// A method name that is not one of the canonical HTTP methods.
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// Listener configuration rejected before binding.
    #[error("invalid listener configuration: {0}")]
    Config(#[from] ValidationError),

    /// A capability the container does not provide.
    #[error("unimplemented capability: {0}")]
    Unimplemented(&'static str),

    /// A named filter missing from the registry.
    #[error("unknown filter: {0}")]
    UnknownFilter(String),

    /// A path pattern the engine refused to register.
    #[error("invalid route {path}: {reason}")]
    InvalidRoute { path: String, reason: String },

    /// A listen address that is not an IP address.
    #[error("invalid listen address: {0}")]
    InvalidAddress(String),

    /// Binding a listen socket failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// TLS material could not be loaded.
    #[error("TLS error: {0}")]
    Tls(String),

    /// `start` called on a container that is already serving.
    #[error("container {0} is already running")]
    AlreadyRunning(String),

    /// No route registered for the request path.
    #[error("not found: {0}")]
    NotFound(String),

    /// The route exists but does not accept the request method.
    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed { method: String, path: String },

    /// The request body could not be read or was too large.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Request content type does not fit the requested operation.
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// A handler or filter panicked while serving the request.
    #[error("handler panicked: {0}")]
    HandlerPanic(String),

    /// Error reported by application code.
    #[error("internal error: {0}")]
    Internal(String),

    /// JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WebError {
    /// Status code the default error handler answers with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebError::NotFound(_) => StatusCode::NOT_FOUND,
            WebError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            WebError::BadRequest(_) | WebError::Json(_) => StatusCode::BAD_REQUEST,
            WebError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Result type for core and engine operations.
pub type WebResult<T> = Result<T, WebError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(WebError::NotFound("/x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            WebError::MethodNotAllowed { method: "POST".into(), path: "/x".into() }.status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            WebError::HandlerPanic("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(WebError::Unimplemented("filters").to_string(), "unimplemented capability: filters");
    }
}
