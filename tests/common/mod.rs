//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use portico::config::{ContainerConfig, EngineKind};
use portico::{engine, Deadline, FilterRegistry, WebContainer};

/// Every engine the integration tests run against.
pub const ENGINES: [EngineKind; 2] = [EngineKind::Axum, EngineKind::Hyper];

/// Container on 127.0.0.1 with one ephemeral port and the default filter registry.
pub fn container(name: &str, engine: EngineKind) -> Box<dyn WebContainer> {
    let mut config = ContainerConfig::new(name, engine);
    config.listener.address = "127.0.0.1".to_string();
    config.listener.ports = vec![0];

    let build = engine::factory(Some(Arc::new(FilterRegistry::with_defaults())));
    build(&config).unwrap()
}

/// Base URL of the first bound port.
pub fn base_url(container: &dyn WebContainer) -> String {
    format!("http://{}", container.local_addrs()[0])
}

/// Client without connection pooling, so a stopped container never sees a
/// reused keep-alive connection.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

pub async fn stop(container: &mut dyn WebContainer) {
    container.stop(Deadline::after(Duration::from_millis(500))).await.unwrap();
}
