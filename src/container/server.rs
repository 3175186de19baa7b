//! Multi-container orchestration.
//!
//! # Responsibilities
//! - Own every container of the process
//! - Start them as a unit, stop them as a unit under one deadline
//!
//! # Design Decisions
//! - Containers are added explicitly or built by an injected factory; there
//!   is no process-wide engine registry
//! - Start is sequential and fails fast; containers already started are
//!   stopped again before the error is returned
//! - Stop runs concurrently and always waits for every container

use std::fmt;
use std::time::Duration;

use futures_util::future::join_all;

use crate::config::{ContainerConfig, ServerConfig};
use crate::container::WebContainer;
use crate::error::WebError;
use crate::lifecycle::Deadline;

/// Owns a set of containers.
#[derive(Default)]
pub struct WebServer {
    containers: Vec<Box<dyn WebContainer>>,
}

impl WebServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one container per config entry through `factory`.
    pub fn from_config<F>(config: &ServerConfig, factory: F) -> Result<Self, WebError>
    where
        F: Fn(&ContainerConfig) -> Result<Box<dyn WebContainer>, WebError>,
    {
        let mut server = Self::new();
        for container in &config.containers {
            server.add_container(factory(container)?);
        }
        Ok(server)
    }

    pub fn add_container(&mut self, container: Box<dyn WebContainer>) -> &mut Self {
        tracing::debug!(container = container.name(), engine = container.engine(), "Container added");
        self.containers.push(container);
        self
    }

    pub fn containers(&self) -> &[Box<dyn WebContainer>] {
        &self.containers
    }

    pub fn containers_mut(&mut self) -> &mut [Box<dyn WebContainer>] {
        &mut self.containers
    }

    pub fn container(&self, name: &str) -> Option<&dyn WebContainer> {
        self.containers.iter().find(|c| c.name() == name).map(|c| c.as_ref())
    }

    pub fn container_mut(&mut self, name: &str) -> Option<&mut (dyn WebContainer + 'static)> {
        self.containers.iter_mut().find(|c| c.name() == name).map(|c| c.as_mut())
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Start every container in insertion order.
    ///
    /// Each `start` only binds and spawns, so this returns as soon as every
    /// container is listening. On the first failure the containers started
    /// so far are stopped immediately and the error is returned.
    pub async fn start(&mut self) -> Result<(), WebError> {
        for index in 0..self.containers.len() {
            let container = &mut self.containers[index];
            match container.start() {
                Ok(()) => {
                    tracing::info!(
                        container = container.name(),
                        engine = container.engine(),
                        addresses = ?container.local_addrs(),
                        "Container started"
                    );
                }
                Err(e) => {
                    tracing::error!(container = container.name(), error = %e, "Container failed to start");
                    let deadline = Deadline::after(Duration::ZERO);
                    let started = self.containers[..index].iter_mut().map(|c| c.stop(deadline));
                    for result in join_all(started).await {
                        if let Err(stop_err) = result {
                            tracing::warn!(error = %stop_err, "Rollback stop failed");
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Stop every container concurrently with the same deadline.
    ///
    /// Waits for all of them and returns the first error, if any.
    pub async fn stop(&mut self, deadline: Deadline) -> Result<(), WebError> {
        tracing::info!(
            containers = self.containers.len(),
            timeout_ms = deadline.remaining().as_millis() as u64,
            "Stopping containers"
        );

        let names: Vec<String> = self.containers.iter().map(|c| c.name().to_string()).collect();
        let results = join_all(self.containers.iter_mut().map(|c| c.stop(deadline))).await;

        let mut first_error = None;
        for (name, result) in names.iter().zip(results) {
            match result {
                Ok(()) => tracing::info!(container = %name, "Container stopped"),
                Err(e) => {
                    tracing::error!(container = %name, error = %e, "Container failed to stop");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for WebServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.containers.iter().map(|c| c.name()).collect();
        f.debug_struct("WebServer").field("containers", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineKind;
    use crate::container::tests::StubContainer;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    #[tokio::test]
    async fn test_start_and_stop_all() {
        let log: Log = Arc::default();
        let mut server = WebServer::new();
        server
            .add_container(Box::new(StubContainer::new("a", &log)))
            .add_container(Box::new(StubContainer::new("b", &log)));

        server.start().await.unwrap();
        assert!(server.containers().iter().all(|c| c.is_running()));

        server.stop(Deadline::after(Duration::from_millis(100))).await.unwrap();
        assert!(server.containers().iter().all(|c| !c.is_running()));

        let log = log.lock().unwrap();
        assert_eq!(log[..2], ["start:a", "start:b"]);
        assert!(log.contains(&"stop:a".to_string()));
        assert!(log.contains(&"stop:b".to_string()));
    }

    #[tokio::test]
    async fn test_failed_start_rolls_back() {
        let log: Log = Arc::default();
        let mut server = WebServer::new();
        server
            .add_container(Box::new(StubContainer::new("a", &log)))
            .add_container(Box::new(StubContainer::failing("b", &log)))
            .add_container(Box::new(StubContainer::new("c", &log)));

        let err = server.start().await.unwrap_err();
        assert!(err.to_string().contains("b refused to start"));
        assert_eq!(*log.lock().unwrap(), vec!["start:a", "stop:a"]);
        assert!(!server.container("c").unwrap().is_running());
    }

    #[tokio::test]
    async fn test_from_config_uses_factory() {
        let log: Log = Arc::default();
        let mut config = ServerConfig::default();
        config.containers.push(ContainerConfig::new("one", EngineKind::Axum));
        config.containers.push(ContainerConfig::new("two", EngineKind::Hyper));

        let factory_log = Arc::clone(&log);
        let server = WebServer::from_config(&config, move |entry: &ContainerConfig| {
            Ok(Box::new(StubContainer::new(&entry.name, &factory_log)) as Box<dyn WebContainer>)
        })
        .unwrap();

        assert_eq!(server.len(), 2);
        assert!(server.container("two").is_some());
        assert!(server.container("three").is_none());
    }

    #[tokio::test]
    async fn test_factory_error_propagates() {
        let mut config = ServerConfig::default();
        config.containers.push(ContainerConfig::new("one", EngineKind::Axum));

        let result = WebServer::from_config(&config, |_entry: &ContainerConfig| {
            Err(WebError::Unimplemented("engine"))
        });

        assert!(matches!(result, Err(WebError::Unimplemented("engine"))));
    }

    #[tokio::test]
    async fn test_stop_on_empty_server() {
        let mut server = WebServer::new();
        assert!(server.is_empty());
        server.stop(Deadline::after(Duration::from_millis(10))).await.unwrap();
    }
}
