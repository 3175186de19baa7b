//! Containers: one engine, one route table, one or more listeners.
//!
//! # Responsibilities
//! - Define the capability set every engine adapter satisfies
//! - Hold the state shared by all engines (`ContainerCore`)
//! - Resolve named filters when a registry is injected
//!
//! # Design Decisions
//! - `WebContainer` is object safe so the orchestrator can own
//!   `Box<dyn WebContainer>` of any engine
//! - Route registration comes from the `WebMapper` supertrait; the generic
//!   helpers live in `WebMapperExt` and work on `dyn WebContainer`
//! - `start` binds and spawns, then returns; it never waits for serving
//! - Listener settings are re-validated at every `start`

pub mod server;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::config::validation::validate_listener;
use crate::config::{ContainerConfig, ListenerConfig};
use crate::engine::EngineSettings;
use crate::error::WebError;
use crate::http::filter::{FilterRef, FilterRegistry};
use crate::http::response::ErrorHandler;
use crate::lifecycle::Deadline;
use crate::routing::mapper::{RouteTable, WebMapper};

pub use server::WebServer;

/// State every container carries regardless of engine.
#[derive(Clone)]
pub struct ContainerCore {
    name: String,
    listener: ListenerConfig,
    routes: RouteTable,
    settings: EngineSettings,
    registry: Option<Arc<FilterRegistry>>,
}

impl ContainerCore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            listener: ListenerConfig::default(),
            routes: RouteTable::new(),
            settings: EngineSettings::default(),
            registry: None,
        }
    }

    pub fn from_config(config: &ContainerConfig) -> Self {
        let mut core = Self::new(&config.name);
        core.listener = config.listener.clone();
        core.settings.max_body_bytes = config.max_body_bytes;
        core
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn listener(&self) -> &ListenerConfig {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut ListenerConfig {
        &mut self.listener
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn routes_mut(&mut self) -> &mut RouteTable {
        &mut self.routes
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn set_error_handler(&mut self, handler: ErrorHandler) {
        self.settings.error_handler = handler;
    }

    pub fn set_max_body_bytes(&mut self, limit: usize) {
        self.settings.max_body_bytes = limit;
    }

    pub fn registry(&self) -> Option<&Arc<FilterRegistry>> {
        self.registry.as_ref()
    }

    pub fn set_registry(&mut self, registry: Arc<FilterRegistry>) {
        self.registry = Some(registry);
    }

    /// Validate the listener, reporting the first problem.
    pub fn validate(&self) -> Result<(), WebError> {
        match validate_listener(&self.name, &self.listener).into_iter().next() {
            Some(err) => Err(WebError::Config(err)),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ContainerCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerCore")
            .field("name", &self.name)
            .field("listener", &self.listener)
            .field("routes", &self.routes.len())
            .field("settings", &self.settings)
            .field("registry", &self.registry)
            .finish()
    }
}

/// Capability set of an engine adapter.
pub trait WebContainer: WebMapper + Send {
    fn core(&self) -> &ContainerCore;

    fn core_mut(&mut self) -> &mut ContainerCore;

    /// Engine name, e.g. "axum".
    fn engine(&self) -> &'static str;

    /// Bind every port and spawn the serving loops. Must run inside a Tokio
    /// runtime. Returns once listeners are bound.
    fn start(&mut self) -> Result<(), WebError>;

    /// Stop accepting, let in-flight requests finish until `deadline`, then
    /// close what is left. Listeners are released when this returns.
    fn stop(&mut self, deadline: Deadline) -> BoxFuture<'_, Result<(), WebError>>;

    fn is_running(&self) -> bool;

    /// Addresses actually bound, empty when not running.
    fn local_addrs(&self) -> Vec<SocketAddr>;

    fn name(&self) -> &str {
        self.core().name()
    }

    fn address(&self) -> &str {
        &self.core().listener().address
    }

    fn set_address(&mut self, address: &str) {
        self.core_mut().listener_mut().address = address.to_string();
    }

    fn ports(&self) -> &[u16] {
        &self.core().listener().ports
    }

    fn set_ports(&mut self, ports: &[u16]) {
        self.core_mut().listener_mut().ports = ports.to_vec();
    }

    fn enable_tls(&self) -> bool {
        self.core().listener().enable_tls
    }

    fn set_enable_tls(&mut self, enable: bool) {
        self.core_mut().listener_mut().enable_tls = enable;
    }

    fn key_file(&self) -> &str {
        &self.core().listener().key_file
    }

    fn set_key_file(&mut self, path: &str) {
        self.core_mut().listener_mut().key_file = path.to_string();
    }

    fn cert_file(&self) -> &str {
        &self.core().listener().cert_file
    }

    fn set_cert_file(&mut self, path: &str) {
        self.core_mut().listener_mut().cert_file = path.to_string();
    }

    /// Resolve named filters in order.
    ///
    /// Without an injected registry this capability is absent and the call
    /// fails with [`WebError::Unimplemented`].
    fn filters(&self, names: &[&str]) -> Result<Vec<FilterRef>, WebError> {
        match self.core().registry() {
            Some(registry) => registry.resolve(names),
            None => Err(WebError::Unimplemented("filters")),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::http::filter::filter_fn;
    use crate::routing::mapper::WebMapperExt;
    use crate::routing::method::MethodSet;
    use std::sync::Mutex;

    /// Container that records lifecycle calls instead of serving.
    pub(crate) struct StubContainer {
        core: ContainerCore,
        running: bool,
        fail_start: bool,
        pub(crate) log: Arc<Mutex<Vec<String>>>,
    }

    impl StubContainer {
        pub(crate) fn new(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            let mut core = ContainerCore::new(name);
            core.listener_mut().ports = vec![0];
            Self {
                core,
                running: false,
                fail_start: false,
                log: Arc::clone(log),
            }
        }

        pub(crate) fn failing(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                fail_start: true,
                ..Self::new(name, log)
            }
        }
    }

    impl WebMapper for StubContainer {
        fn route_table(&self) -> &RouteTable {
            self.core.routes()
        }

        fn route_table_mut(&mut self) -> &mut RouteTable {
            self.core.routes_mut()
        }
    }

    impl WebContainer for StubContainer {
        fn core(&self) -> &ContainerCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut ContainerCore {
            &mut self.core
        }

        fn engine(&self) -> &'static str {
            "stub"
        }

        fn start(&mut self) -> Result<(), WebError> {
            self.core.validate()?;
            if self.fail_start {
                return Err(WebError::Internal(format!("{} refused to start", self.core.name())));
            }
            self.running = true;
            self.log.lock().unwrap().push(format!("start:{}", self.core.name()));
            Ok(())
        }

        fn stop(&mut self, _deadline: Deadline) -> BoxFuture<'_, Result<(), WebError>> {
            Box::pin(async move {
                if self.running {
                    self.running = false;
                    self.log.lock().unwrap().push(format!("stop:{}", self.core.name()));
                }
                Ok(())
            })
        }

        fn is_running(&self) -> bool {
            self.running
        }

        fn local_addrs(&self) -> Vec<SocketAddr> {
            Vec::new()
        }
    }

    #[test]
    fn test_listener_accessors() {
        let log = Arc::default();
        let mut container = StubContainer::new("c", &log);
        let container: &mut dyn WebContainer = &mut container;

        container.set_address("127.0.0.1");
        container.set_ports(&[8080, 8443]);
        container.set_enable_tls(true);
        container.set_cert_file("cert.pem");
        container.set_key_file("key.pem");

        assert_eq!(container.name(), "c");
        assert_eq!(container.address(), "127.0.0.1");
        assert_eq!(container.ports(), &[8080, 8443]);
        assert!(container.enable_tls());
        assert_eq!(container.cert_file(), "cert.pem");
        assert_eq!(container.key_file(), "key.pem");
    }

    #[test]
    fn test_start_validates_listener() {
        let log = Arc::default();
        let mut container = StubContainer::new("tls", &log);
        container.set_enable_tls(true);
        container.set_cert_file("cert.pem");

        let err = container.start().unwrap_err();
        assert!(matches!(err, WebError::Config(_)));
        assert!(err.to_string().contains("key_file"));

        container.set_ports(&[]);
        container.set_enable_tls(false);
        assert!(matches!(container.start(), Err(WebError::Config(_))));
        assert!(!container.is_running());
    }

    #[test]
    fn test_filters_without_registry_is_unimplemented() {
        let log = Arc::default();
        let container = StubContainer::new("plain", &log);
        assert!(matches!(container.filters(&["request_id"]), Err(WebError::Unimplemented("filters"))));
    }

    #[test]
    fn test_filters_with_registry() {
        let log = Arc::default();
        let mut container = StubContainer::new("named", &log);
        let mut registry = FilterRegistry::new();
        registry.register("auth", filter_fn(|ctx, chain| Box::pin(async move { chain.next(ctx).await })));
        container.core_mut().set_registry(Arc::new(registry));

        assert_eq!(container.filters(&["auth", "auth"]).unwrap().len(), 2);
        assert!(matches!(container.filters(&["nope"]), Err(WebError::UnknownFilter(_))));
    }

    #[test]
    fn test_registration_through_trait_object() {
        let log = Arc::default();
        let mut boxed: Box<dyn WebContainer> = Box::new(StubContainer::new("boxed", &log));

        boxed.get("/a", |_ctx| Box::pin(async {}), vec![]);
        boxed.group(
            "/api",
            |route| {
                route.post("/b", |_ctx| Box::pin(async {}));
            },
            vec![],
        );

        let mappers = boxed.mappers();
        assert_eq!(mappers.len(), 2);
        assert_eq!(mappers["/api/b"].methods, MethodSet::POST);
    }
}
