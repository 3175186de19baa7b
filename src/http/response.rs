//! Response state accumulated by handlers and filters.
//!
//! # Responsibilities
//! - Hold status, headers and body written through a `WebContext`
//! - Convert into an `http::Response` the engine can send
//! - Provide the default error-response policy
//!
//! # Design Decisions
//! - Writers replace the body; the last write wins
//! - Streaming bodies are passed through without buffering

use std::fmt;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Response, StatusCode};
use futures_util::stream::BoxStream;

use crate::error::WebError;
use crate::http::context::WebContext;

/// Streaming response body.
pub type BodyStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// Response body variants.
#[derive(Default)]
pub enum ResponseBody {
    #[default]
    Empty,
    Full(Bytes),
    Stream(BodyStream),
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Empty => f.write_str("Empty"),
            ResponseBody::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            ResponseBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// Response being built for the current request.
#[derive(Debug)]
pub struct ResponseState {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
    written: bool,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: ResponseBody::Empty,
            written: false,
        }
    }
}

impl ResponseState {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
        self.written = true;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Set a header; an empty value removes it. Invalid names or values are ignored.
    pub fn set_header(&mut self, key: &str, value: &str) {
        let Ok(name) = HeaderName::from_bytes(key.as_bytes()) else {
            tracing::warn!(header = key, "Ignoring invalid response header name");
            return;
        };
        if value.is_empty() {
            self.headers.remove(name);
            return;
        }
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(_) => tracing::warn!(header = key, "Ignoring invalid response header value"),
        }
    }

    /// Append a header without replacing existing values.
    pub fn append_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.append(name, value);
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// Body bytes if the body is buffered.
    pub fn body_bytes(&self) -> Option<&Bytes> {
        match &self.body {
            ResponseBody::Full(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Write status, content type and body in one step.
    pub fn write(&mut self, status: StatusCode, content_type: Option<&str>, body: ResponseBody) {
        self.status = status;
        if let Some(content_type) = content_type {
            self.set_header(header::CONTENT_TYPE.as_str(), content_type);
        }
        self.body = body;
        self.written = true;
    }

    /// True once anything set the status or body.
    pub fn is_written(&self) -> bool {
        self.written
    }

    /// Drop status, headers and body, e.g. before reporting an error.
    pub fn reset(&mut self) {
        *self = ResponseState::default();
    }

    pub fn into_http(self) -> Response<Body> {
        let body = match self.body {
            ResponseBody::Empty => Body::empty(),
            ResponseBody::Full(bytes) => Body::from(bytes),
            ResponseBody::Stream(stream) => Body::from_stream(stream),
        };
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Policy turning an error into a response, shared by all engines.
pub type ErrorHandler = Arc<dyn Fn(&mut dyn WebContext, &WebError) + Send + Sync>;

/// Plain-text response carrying the error's status code.
///
/// Client errors include the error message. Server errors answer with the
/// canonical reason only; the detail goes to the log.
pub fn default_error_handler() -> ErrorHandler {
    Arc::new(|ctx: &mut dyn WebContext, err: &WebError| {
        let status = err.status_code();
        let reason = status.canonical_reason().unwrap_or("Error");
        if status.is_server_error() {
            tracing::error!(error = %err, "Request failed");
            ctx.string(status, reason);
        } else {
            tracing::debug!(error = %err, "Request rejected");
            ctx.string(status, &format!("{reason}: {err}"));
        }
    })
}
