//! Access logging filter.

use std::time::Instant;

use futures_util::future::BoxFuture;

use crate::http::context::{WebContext, WebContextExt};
use crate::http::filter::{Filter, FilterChain};
use crate::http::middleware::request_id::{RequestId, REQUEST_ID_ATTRIBUTE};

/// Logs one line per request once the rest of the chain has run.
#[derive(Debug, Default, Clone, Copy)]
pub struct AccessLogFilter;

impl Filter for AccessLogFilter {
    fn invoke<'a>(&'a self, ctx: &'a mut dyn WebContext, chain: &'a mut FilterChain) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let start = Instant::now();
            chain.next(ctx).await;

            let request_id = ctx
                .attribute::<RequestId>(REQUEST_ID_ATTRIBUTE)
                .map(|id| id.as_str().to_string())
                .unwrap_or_default();

            tracing::info!(
                engine = ctx.engine(),
                method = %ctx.method(),
                path = %ctx.request_path(),
                status = ctx.response().status().as_u16(),
                latency_ms = start.elapsed().as_millis() as u64,
                client_ip = %ctx.client_ip().unwrap_or_default(),
                request_id = %request_id,
                "Request completed"
            );
        })
    }
}
