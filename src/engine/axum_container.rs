//! Container served by axum.
//!
//! # Responsibilities
//! - Realize the route table as an `axum::Router` at start
//! - Serve every port through `axum-server`, plain or rustls
//! - Graceful shutdown per port through `axum_server::Handle`
//!
//! # Design Decisions
//! - Every pattern is routed with `any`; method filtering happens in the
//!   shared dispatch so 405 responses carry the same `Allow` header as the
//!   hyper engine
//! - The table is validated through `PathMatcher::compile` before the router
//!   is built, so malformed and conflicting patterns fail with the same
//!   `WebError::InvalidRoute` as on the hyper engine, without reaching axum's
//!   panicking `Router::route`
//! - Path parameters are decoded by axum and undecodable ones answer 400, as
//!   on the hyper engine

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRequestParts, RawPathParams, Request};
use axum::routing::any;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use futures_util::future::BoxFuture;
use tokio::task::JoinSet;
use tower_http::trace::TraceLayer;

use crate::config::ContainerConfig;
use crate::container::{ContainerCore, WebContainer};
use crate::engine::{drain_tasks, panic_message, serve_request, EngineSettings};
use crate::error::WebError;
use crate::lifecycle::Deadline;
use crate::net::{listener, tls};
use crate::routing::mapper::{Mapper, RouteTable, WebMapper};
use crate::routing::matcher::{invalid_param_error, MatchedParams, PathMatcher};

const ENGINE: &str = "axum";

struct Running {
    handles: Vec<Handle>,
    tasks: JoinSet<()>,
    local_addrs: Vec<SocketAddr>,
}

pub struct AxumContainer {
    core: ContainerCore,
    running: Option<Running>,
}

impl AxumContainer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: ContainerCore::new(name),
            running: None,
        }
    }

    pub fn from_config(config: &ContainerConfig) -> Self {
        Self {
            core: ContainerCore::from_config(config),
            running: None,
        }
    }

    /// Build the router from a snapshot of the route table.
    pub fn build_router(&self) -> Result<Router, WebError> {
        let snapshot = self.core.routes().snapshot();
        PathMatcher::compile(snapshot.clone())?;

        let settings = Arc::new(self.core.settings().clone());
        let mut router = Router::new();

        for (path, mapper) in snapshot {
            let handler = route_handler(Arc::new(mapper), Arc::clone(&settings));
            router = std::panic::catch_unwind(AssertUnwindSafe(|| router.route(&path, any(handler)))).map_err(
                |panic| WebError::InvalidRoute {
                    path: path.clone(),
                    reason: panic_message(panic.as_ref()),
                },
            )?;
        }

        let fallback_settings = Arc::clone(&settings);
        Ok(router
            .fallback(move |request: Request| {
                let settings = Arc::clone(&fallback_settings);
                async move {
                    let (remote, tls) = connection_info(&request);
                    serve_request(ENGINE, None, request, remote, tls, &settings).await
                }
            })
            .layer(TraceLayer::new_for_http()))
    }
}

/// Peer address and TLS flag recorded on the request by the server.
fn connection_info(request: &Request) -> (Option<SocketAddr>, bool) {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    (remote, request.extensions().get::<Tls>().is_some())
}

fn route_handler(
    mapper: Arc<Mapper>,
    settings: Arc<EngineSettings>,
) -> impl Fn(Request) -> BoxFuture<'static, axum::response::Response> + Clone + Send + Sync + 'static {
    move |request: Request| {
        let mapper = Arc::clone(&mapper);
        let settings = Arc::clone(&settings);
        Box::pin(async move {
            let (remote, tls) = connection_info(&request);
            let (mut parts, body) = request.into_parts();
            let params: MatchedParams = RawPathParams::from_request_parts(&mut parts, &())
                .await
                .map(|raw| {
                    raw.iter()
                        .map(|(key, value)| (key.to_string(), value.to_string()))
                        .collect()
                })
                .map_err(|_| invalid_param_error());
            let request = Request::from_parts(parts, body);
            serve_request(ENGINE, Some((&mapper, params)), request, remote, tls, &settings).await
        })
    }
}

/// Marker extension set on requests arriving over TLS.
#[derive(Debug, Clone, Copy)]
struct Tls;

impl WebMapper for AxumContainer {
    fn route_table(&self) -> &RouteTable {
        self.core.routes()
    }

    fn route_table_mut(&mut self) -> &mut RouteTable {
        self.core.routes_mut()
    }
}

impl WebContainer for AxumContainer {
    fn core(&self) -> &ContainerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ContainerCore {
        &mut self.core
    }

    fn engine(&self) -> &'static str {
        ENGINE
    }

    fn start(&mut self) -> Result<(), WebError> {
        if self.running.is_some() {
            return Err(WebError::AlreadyRunning(self.core.name().to_string()));
        }
        self.core.validate()?;

        let listener_config = self.core.listener();
        let tls_config = if listener_config.enable_tls {
            Some(RustlsConfig::from_config(tls::load_server_config(
                Path::new(&listener_config.cert_file),
                Path::new(&listener_config.key_file),
            )?))
        } else {
            None
        };

        let router = self.build_router()?;
        let listeners = listener::bind_all(listener_config)?;

        let mut running = Running {
            handles: Vec::with_capacity(listeners.len()),
            tasks: JoinSet::new(),
            local_addrs: Vec::with_capacity(listeners.len()),
        };

        for listener in listeners {
            let addr = listener.local_addr()?;
            let std_listener = listener.into_std()?;
            let handle = Handle::new();
            let name = self.core.name().to_string();

            match &tls_config {
                Some(config) => {
                    let app = router
                        .clone()
                        .layer(axum::Extension(Tls))
                        .into_make_service_with_connect_info::<SocketAddr>();
                    let server = axum_server::from_tcp_rustls(std_listener, config.clone()).handle(handle.clone());
                    running.tasks.spawn(async move {
                        if let Err(e) = server.serve(app).await {
                            tracing::error!(container = %name, address = %addr, error = %e, "Server error");
                        }
                    });
                }
                None => {
                    let app = router.clone().into_make_service_with_connect_info::<SocketAddr>();
                    let server = axum_server::from_tcp(std_listener).handle(handle.clone());
                    running.tasks.spawn(async move {
                        if let Err(e) = server.serve(app).await {
                            tracing::error!(container = %name, address = %addr, error = %e, "Server error");
                        }
                    });
                }
            }

            tracing::info!(
                container = self.core.name(),
                engine = ENGINE,
                address = %addr,
                tls = tls_config.is_some(),
                "Listening"
            );
            running.handles.push(handle);
            running.local_addrs.push(addr);
        }

        self.running = Some(running);
        Ok(())
    }

    fn stop(&mut self, deadline: Deadline) -> BoxFuture<'_, Result<(), WebError>> {
        Box::pin(async move {
            let Some(mut running) = self.running.take() else {
                return Ok(());
            };

            for handle in &running.handles {
                handle.graceful_shutdown(Some(deadline.remaining()));
            }

            if tokio::time::timeout_at(deadline.instant(), drain_tasks(&mut running.tasks))
                .await
                .is_err()
            {
                tracing::warn!(
                    container = self.core.name(),
                    "Shutdown deadline reached, closing remaining connections"
                );
                for handle in &running.handles {
                    handle.shutdown();
                }
                running.tasks.abort_all();
                drain_tasks(&mut running.tasks).await;
            }

            Ok(())
        })
    }

    fn is_running(&self) -> bool {
        self.running.is_some()
    }

    fn local_addrs(&self) -> Vec<SocketAddr> {
        self.running
            .as_ref()
            .map(|running| running.local_addrs.clone())
            .unwrap_or_default()
    }
}
