//! The `WebContext` implementation shared by every engine.
//!
//! Engines buffer the request body, match the route, then hand the pieces to
//! `EngineContext`. Filters and handlers only ever see `dyn WebContext`.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;

use axum::body::{Body, Bytes};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, Request, Response, Uri};

use crate::error::WebError;
use crate::http::context::WebContext;
use crate::http::response::{default_error_handler, ErrorHandler, ResponseState};

/// Engine name reported by contexts built outside any engine.
pub const DETACHED_ENGINE: &str = "detached";

pub struct EngineContext {
    engine: &'static str,
    parts: Parts,
    body: Bytes,
    route_path: String,
    path_params: Vec<(String, String)>,
    remote_addr: Option<SocketAddr>,
    tls: bool,
    attributes: HashMap<String, Box<dyn Any + Send + Sync>>,
    response: ResponseState,
    error_handler: ErrorHandler,
    span: tracing::Span,
}

impl EngineContext {
    pub fn new(engine: &'static str, request: Request<Bytes>, error_handler: ErrorHandler, span: tracing::Span) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            engine,
            parts,
            body,
            route_path: String::new(),
            path_params: Vec::new(),
            remote_addr: None,
            tls: false,
            attributes: HashMap::new(),
            response: ResponseState::default(),
            error_handler,
            span,
        }
    }

    /// Context outside any engine, with the default error handler.
    pub fn detached(request: Request<Bytes>) -> Self {
        Self::new(DETACHED_ENGINE, request, default_error_handler(), tracing::Span::none())
    }

    /// Record the matched pattern and its captured parameters.
    pub fn with_route(mut self, pattern: &str, params: Vec<(String, String)>) -> Self {
        self.route_path = pattern.to_string();
        self.path_params = params;
        self
    }

    pub fn with_remote(mut self, remote_addr: Option<SocketAddr>, tls: bool) -> Self {
        self.remote_addr = remote_addr;
        self.tls = tls;
        self
    }

    pub fn into_response(self) -> Response<Body> {
        self.response.into_http()
    }
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext")
            .field("engine", &self.engine)
            .field("method", &self.parts.method)
            .field("uri", &self.parts.uri)
            .field("route_path", &self.route_path)
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

impl WebContext for EngineContext {
    fn engine(&self) -> &'static str {
        self.engine
    }

    /// The request head as `http::request::Parts`.
    fn native(&mut self) -> &mut (dyn Any + Send) {
        &mut self.parts
    }

    fn span(&self) -> &tracing::Span {
        &self.span
    }

    fn get(&self, key: &str) -> Option<&(dyn Any + Send + Sync)> {
        self.attributes.get(key).map(|value| value.as_ref())
    }

    fn set(&mut self, key: &str, value: Box<dyn Any + Send + Sync>) {
        self.attributes.insert(key.to_string(), value);
    }

    fn method(&self) -> &Method {
        &self.parts.method
    }

    fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    fn body(&self) -> &Bytes {
        &self.body
    }

    fn path(&self) -> &str {
        &self.route_path
    }

    fn path_params(&self) -> &[(String, String)] {
        &self.path_params
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    fn is_tls(&self) -> bool {
        self.tls
    }

    fn response(&self) -> &ResponseState {
        &self.response
    }

    fn response_mut(&mut self) -> &mut ResponseState {
        &mut self.response
    }

    fn error(&mut self, err: WebError) {
        let handler = ErrorHandler::clone(&self.error_handler);
        handler(self as &mut dyn WebContext, &err);
    }
}
