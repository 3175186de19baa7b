//! Portico server binary.
//!
//! Loads a TOML config (or a single default axum container on port 8080),
//! mounts a health check and an echo endpoint on every container, and runs
//! until Ctrl+C or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::StatusCode;
use clap::Parser;
use futures_util::future::BoxFuture;
use serde_json::json;

use portico::config::{load_config, ContainerConfig, EngineKind, ServerConfig};
use portico::http::middleware::{RequestId, REQUEST_ID_ATTRIBUTE};
use portico::lifecycle::shutdown_signal;
use portico::observability::init_logging;
use portico::{engine, Deadline, FilterRegistry, MethodSet, WebContainer, WebContext, WebContextExt, WebMapperExt, WebServer};

#[derive(Parser)]
#[command(name = "portico")]
#[command(about = "Serve the built-in endpoints on one or more HTTP engines", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn default_config() -> ServerConfig {
    let mut container = ContainerConfig::new("default", EngineKind::Axum);
    container.listener.ports = vec![8080];
    container.filters = vec!["request_id".to_string(), "access_log".to_string()];

    ServerConfig {
        containers: vec![container],
        ..ServerConfig::default()
    }
}

fn health(ctx: &mut dyn WebContext) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        let engine = ctx.engine();
        if let Err(e) = ctx.json(StatusCode::OK, &json!({ "status": "ok", "engine": engine })) {
            ctx.error(e);
        }
    })
}

fn echo(ctx: &mut dyn WebContext) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        let body = json!({
            "engine": ctx.engine(),
            "method": ctx.method().as_str(),
            "name": ctx.path_param("name"),
            "query": ctx.query_params(),
            "request_id": ctx.attribute::<RequestId>(REQUEST_ID_ATTRIBUTE).map(RequestId::as_str),
        });
        if let Err(e) = ctx.json(StatusCode::OK, &body) {
            ctx.error(e);
        }
    })
}

/// Mount the built-in endpoints with the container's configured filters.
fn mount(container: &mut dyn WebContainer, entry: &ContainerConfig) -> Result<(), portico::WebError> {
    let names: Vec<&str> = entry.filters.iter().map(String::as_str).collect();
    let filters = container.filters(&names)?;

    container.get("/health", health, filters.clone());
    container.group(
        "/echo",
        |route| {
            route.request(MethodSet::GET_POST, "/{name}", echo);
        },
        filters,
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => default_config(),
    };

    init_logging(&config.logging)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "portico starting");

    let registry = Arc::new(FilterRegistry::with_defaults());
    let mut server = WebServer::from_config(&config, engine::factory(Some(registry)))?;

    for (container, entry) in server.containers_mut().iter_mut().zip(&config.containers) {
        mount(container.as_mut(), entry)?;
    }

    server.start().await?;
    tracing::info!(containers = server.len(), "All containers started");

    shutdown_signal().await;

    server.stop(Deadline::after(config.shutdown.timeout())).await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(engine: EngineKind) -> Box<dyn WebContainer> {
        let mut entry = ContainerConfig::new("mounted", engine);
        entry.listener.address = "127.0.0.1".to_string();
        entry.listener.ports = vec![0];
        entry.filters = vec!["request_id".to_string()];

        let build = engine::factory(Some(Arc::new(FilterRegistry::with_defaults())));
        let mut container = build(&entry).unwrap();
        mount(&mut *container, &entry).unwrap();
        container
    }

    #[test]
    fn test_echo_accepts_get_and_post() {
        let container = container(EngineKind::Axum);
        let mappers = container.mappers();

        let echo = &mappers["/echo/{name}"];
        assert_eq!(echo.methods, MethodSet::GET_POST);
        assert_eq!(echo.filters.len(), 1);
        assert_eq!(mappers["/health"].methods, MethodSet::GET);
    }

    #[tokio::test]
    async fn test_mounted_endpoints_serve_on_every_engine() {
        for kind in [EngineKind::Axum, EngineKind::Hyper] {
            let mut container = container(kind);
            container.start().unwrap();
            let url = format!("http://{}", container.local_addrs()[0]);
            let client = reqwest::Client::new();

            for request in [client.get(format!("{url}/echo/ada?x=1")), client.post(format!("{url}/echo/ada"))] {
                let response = request.send().await.unwrap();
                assert_eq!(response.status().as_u16(), 200, "engine {kind}");
                assert!(response.headers().contains_key("x-request-id"), "engine {kind}");
                let body: serde_json::Value = serde_json::from_str(&response.text().await.unwrap()).unwrap();
                assert_eq!(body["name"], "ada", "engine {kind}");
                assert_eq!(body["engine"], kind.as_str(), "engine {kind}");
            }

            let response = client.get(format!("{url}/health")).send().await.unwrap();
            assert_eq!(response.status().as_u16(), 200, "engine {kind}");

            container.stop(Deadline::after(std::time::Duration::from_millis(200))).await.unwrap();
        }
    }
}
