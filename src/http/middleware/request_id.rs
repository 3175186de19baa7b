//! Request correlation IDs.
//!
//! # Responsibilities
//! - Reuse an inbound `x-request-id` or generate a UUID v4
//! - Store it as the `request_id` attribute and on the request span
//! - Echo it back in the response
//!
//! # Design Decisions
//! - Runs as early as possible so downstream logs carry the ID
//! - Inbound IDs longer than 128 bytes are replaced, not truncated

use futures_util::future::BoxFuture;
use uuid::Uuid;

use crate::http::context::WebContext;
use crate::http::filter::{Filter, FilterChain};

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Attribute key the ID is stored under.
pub const REQUEST_ID_ATTRIBUTE: &str = "request_id";

const MAX_INBOUND_LEN: usize = 128;

/// Request ID stored in the context attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RequestIdFilter;

impl Filter for RequestIdFilter {
    fn invoke<'a>(&'a self, ctx: &'a mut dyn WebContext, chain: &'a mut FilterChain) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let id = ctx
                .header(X_REQUEST_ID)
                .filter(|id| !id.is_empty() && id.len() <= MAX_INBOUND_LEN)
                .map(|id| RequestId(id.to_string()))
                .unwrap_or_else(RequestId::generate);

            ctx.span().record("request_id", id.as_str());
            ctx.set_header(X_REQUEST_ID, id.as_str());
            ctx.set(REQUEST_ID_ATTRIBUTE, Box::new(id));

            chain.next(ctx).await;
        })
    }
}
