//! Container served directly by hyper.
//!
//! # Responsibilities
//! - Compile the route table into a `PathMatcher` at start and match
//!   requests against it
//! - Run one accept loop per port, one task per connection
//! - Serve HTTP/1.1 and HTTP/2 through `hyper_util`'s auto builder
//! - Drain connections on stop, force-close them at the deadline
//!
//! # Design Decisions
//! - Accept loops drop their listener as soon as shutdown triggers, so
//!   ports are released before in-flight requests finish
//! - Each accept loop owns the `JoinSet` of its connections; aborting the
//!   loop aborts every connection it accepted
//! - TLS handshakes run inside the connection task, never in the accept loop

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::config::ContainerConfig;
use crate::container::{ContainerCore, WebContainer};
use crate::engine::{drain_tasks, serve_request, EngineSettings};
use crate::error::WebError;
use crate::lifecycle::{Deadline, Shutdown, ShutdownSignal};
use crate::net::connection::ConnectionId;
use crate::net::{listener, tls};
use crate::routing::mapper::{RouteTable, WebMapper};
use crate::routing::matcher::PathMatcher;

const ENGINE: &str = "hyper";

/// Immutable per-start serving state shared by every connection.
struct HyperState {
    matcher: PathMatcher,
    settings: EngineSettings,
}

impl HyperState {
    async fn dispatch(&self, request: Request<Body>, remote: SocketAddr, tls: bool) -> Response<Body> {
        let matched = self.matcher.find(request.uri().path());
        serve_request(ENGINE, matched, request, Some(remote), tls, &self.settings).await
    }
}

struct Running {
    shutdown: Shutdown,
    tasks: JoinSet<()>,
    local_addrs: Vec<SocketAddr>,
}

pub struct HyperContainer {
    core: ContainerCore,
    running: Option<Running>,
}

impl HyperContainer {
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
}

async fn accept_loop(listener: TcpListener, state: Arc<HyperState>, tls: Option<TlsAcceptor>, shutdown: Shutdown) {
    let mut signal = shutdown.subscribe();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            _ = signal.recv() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(error = %e, remote = %remote, "Failed to set TCP_NODELAY");
                    }
                    connections.spawn(handle_connection(
                        stream,
                        remote,
                        Arc::clone(&state),
                        tls.clone(),
                        shutdown.subscribe(),
                    ));
                }
                Err(e) => {
                    tracing::error!(error = %e, "TCP accept error");
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);
    drain_tasks(&mut connections).await;
}

async fn handle_connection(
    stream: TcpStream,
    remote: SocketAddr,
    state: Arc<HyperState>,
    tls: Option<TlsAcceptor>,
    mut signal: ShutdownSignal,
) {
    let id = ConnectionId::next();
    let span = tracing::debug_span!("connection", id = %id, remote = %remote);

    async move {
        match tls {
            Some(acceptor) => {
                let handshake = tokio::select! {
                    result = acceptor.accept(stream) => result,
                    _ = signal.recv() => return,
                };
                match handshake {
                    Ok(stream) => serve_connection(stream, remote, true, state, signal).await,
                    Err(e) => tracing::debug!(error = %e, "TLS handshake failed"),
                }
            }
            None => serve_connection(stream, remote, false, state, signal).await,
        }
    }
    .instrument(span)
    .await
}

async fn serve_connection<I>(io: I, remote: SocketAddr, tls: bool, state: Arc<HyperState>, mut signal: ShutdownSignal)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .service(tower::service_fn(move |request: Request<Incoming>| {
            let state = Arc::clone(&state);
            async move { Ok::<_, Infallible>(state.dispatch(request.map(Body::new), remote, tls).await) }
        }));

    let builder = auto::Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection(TokioIo::new(io), TowerToHyperService::new(service));
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = signal.recv() => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Connection closed with error");
    }
}

impl WebMapper for HyperContainer {
    fn route_table(&self) -> &RouteTable {
        self.core.routes()
    }

    fn route_table_mut(&mut self) -> &mut RouteTable {
        self.core.routes_mut()
    }
}

impl WebContainer for HyperContainer {
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
        let acceptor = if listener_config.enable_tls {
            Some(TlsAcceptor::from(tls::load_server_config(
                Path::new(&listener_config.cert_file),
                Path::new(&listener_config.key_file),
            )?))
        } else {
            None
        };

        let state = Arc::new(HyperState {
            matcher: PathMatcher::compile(self.core.routes().snapshot())?,
            settings: self.core.settings().clone(),
        });
        let listeners = listener::bind_all(listener_config)?;

        let mut running = Running {
            shutdown: Shutdown::new(),
            tasks: JoinSet::new(),
            local_addrs: Vec::with_capacity(listeners.len()),
        };

        for listener in listeners {
            let addr = listener.local_addr()?;
            running.tasks.spawn(accept_loop(
                listener,
                Arc::clone(&state),
                acceptor.clone(),
                running.shutdown.clone(),
            ));

            tracing::info!(
                container = self.core.name(),
                engine = ENGINE,
                address = %addr,
                tls = acceptor.is_some(),
                "Listening"
            );
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

            running.shutdown.trigger();

            if tokio::time::timeout_at(deadline.instant(), drain_tasks(&mut running.tasks))
                .await
                .is_err()
            {
                tracing::warn!(
                    container = self.core.name(),
                    "Shutdown deadline reached, closing remaining connections"
                );
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
