//! Engine adapters.
//!
//! # Data Flow
//! ```text
//! Inbound request (axum Router / hyper connection)
//!     → route match (engine specific)
//!     → serve_request (shared)
//!         → buffer body (max_body_bytes)
//!         → EngineContext
//!         → 404 / 405 + Allow, or invoke_handler
//!         → panic → 500 through the error handler
//!     → http::Response
//! ```
//!
//! # Design Decisions
//! - Both engines share one dispatch path so errors, limits and the request
//!   span look the same whichever engine serves
//! - Fault containment lives here, not in the filter chain

pub mod axum_container;
pub mod context;
pub mod hyper_container;

use std::any::Any;
use std::fmt;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, Request, Response};
use futures_util::FutureExt;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::config::{ContainerConfig, EngineKind, DEFAULT_MAX_BODY_BYTES};
use crate::container::WebContainer;
use crate::error::WebError;
use crate::http::context::WebContext;
use crate::http::filter::{invoke_handler, FilterRegistry};
use crate::http::response::{default_error_handler, ErrorHandler};
use crate::routing::mapper::Mapper;
use crate::routing::matcher::MatchedParams;

pub use axum_container::AxumContainer;
pub use context::EngineContext;
pub use hyper_container::HyperContainer;

/// Per-container request handling settings.
#[derive(Clone)]
pub struct EngineSettings {
    pub max_body_bytes: usize,
    pub error_handler: ErrorHandler,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            error_handler: default_error_handler(),
        }
    }
}

impl fmt::Debug for EngineSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineSettings")
            .field("max_body_bytes", &self.max_body_bytes)
            .finish_non_exhaustive()
    }
}

/// Factory building containers from configuration, injecting `registry`
/// into each one when given.
pub fn factory(
    registry: Option<Arc<FilterRegistry>>,
) -> impl Fn(&ContainerConfig) -> Result<Box<dyn WebContainer>, WebError> {
    move |config: &ContainerConfig| {
        let mut container: Box<dyn WebContainer> = match config.engine {
            EngineKind::Axum => Box::new(AxumContainer::from_config(config)),
            EngineKind::Hyper => Box::new(HyperContainer::from_config(config)),
        };
        if let Some(registry) = &registry {
            container.core_mut().set_registry(Arc::clone(registry));
        }
        Ok(container)
    }
}

/// Serve one request against an already matched route.
///
/// `matched` is `None` when no pattern matched the path. Parameters that
/// failed to decode answer 400 once the method is known to be allowed.
pub(crate) async fn serve_request(
    engine: &'static str,
    matched: Option<(&Mapper, MatchedParams)>,
    request: Request<Body>,
    remote_addr: Option<SocketAddr>,
    tls: bool,
    settings: &EngineSettings,
) -> Response<Body> {
    let span = tracing::info_span!(
        "request",
        engine,
        method = %request.method(),
        path = %request.uri().path(),
        request_id = tracing::field::Empty,
    );

    dispatch(engine, matched, request, remote_addr, tls, settings, span.clone())
        .instrument(span)
        .await
}

async fn dispatch(
    engine: &'static str,
    matched: Option<(&Mapper, MatchedParams)>,
    request: Request<Body>,
    remote_addr: Option<SocketAddr>,
    tls: bool,
    settings: &EngineSettings,
    span: tracing::Span,
) -> Response<Body> {
    let (parts, body) = request.into_parts();
    let (body, read_error) = match axum::body::to_bytes(body, settings.max_body_bytes).await {
        Ok(bytes) => (bytes, None),
        Err(e) => (
            Bytes::new(),
            Some(WebError::BadRequest(format!("failed to read request body: {e}"))),
        ),
    };

    let mut ctx = EngineContext::new(
        engine,
        Request::from_parts(parts, body),
        Arc::clone(&settings.error_handler),
        span,
    )
    .with_remote(remote_addr, tls);

    if let Some(err) = read_error {
        ctx.error(err);
        return ctx.into_response();
    }

    let Some((mapper, params)) = matched else {
        let path = ctx.request_path().to_string();
        ctx.error(WebError::NotFound(path));
        return ctx.into_response();
    };

    if !mapper.methods.contains(ctx.method()) {
        ctx.set_header(header::ALLOW.as_str(), &mapper.methods.to_string());
        let err = WebError::MethodNotAllowed {
            method: ctx.method().to_string(),
            path: ctx.request_path().to_string(),
        };
        ctx.error(err);
        return ctx.into_response();
    }

    let mut ctx = match params {
        Ok(params) => ctx.with_route(&mapper.path, params),
        Err(err) => {
            ctx.error(err);
            return ctx.into_response();
        }
    };

    let outcome = AssertUnwindSafe(invoke_handler(&mut ctx, &mapper.handler, &mapper.filters))
        .catch_unwind()
        .await;

    if let Err(panic) = outcome {
        let message = panic_message(panic.as_ref());
        ctx.error(WebError::HandlerPanic(message));
    }

    ctx.into_response()
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Wait for every task, logging the ones that panicked.
pub(crate) async fn drain_tasks(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            if e.is_panic() {
                tracing::error!(error = %e, "Serving task panicked");
            }
        }
    }
}
