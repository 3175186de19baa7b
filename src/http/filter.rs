//! Filter chain execution.
//!
//! # Responsibilities
//! - Define the handler and filter capabilities
//! - Drive an ordered, forward-only chain of filters ending in the handler
//! - Resolve named filters for configuration-driven attachment
//!
//! # Design Decisions
//! - The chain is the filter list plus a cursor; the cursor moves before a
//!   filter runs, so a filter re-entering `next` reaches the following filter
//! - `next` past the end is a no-op
//! - No fault containment here; panics travel to the engine adapter

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture};

use crate::error::WebError;
use crate::http::context::WebContext;

/// A request handler: the terminal step of every route.
pub type Handler = Arc<dyn for<'a> Fn(&'a mut dyn WebContext) -> BoxFuture<'a, ()> + Send + Sync>;

/// Shared reference to a filter.
pub type FilterRef = Arc<dyn Filter>;

/// Middleware participating in the per-request chain.
///
/// A filter runs its pre-processing, calls [`FilterChain::next`] at most once
/// to run everything downstream, then runs its post-processing. Not calling
/// `next` short-circuits the remaining filters and the handler.
///
/// Filters are shared between concurrent requests; any state they keep must be
/// safe for concurrent use.
pub trait Filter: Send + Sync {
    fn invoke<'a>(&'a self, ctx: &'a mut dyn WebContext, chain: &'a mut FilterChain) -> BoxFuture<'a, ()>;
}

/// Wrap a closure as a shared handler.
pub fn handler_fn<F>(f: F) -> Handler
where
    F: for<'a> Fn(&'a mut dyn WebContext) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Filter built from a closure.
pub struct FnFilter<F>(F);

impl<F> Filter for FnFilter<F>
where
    F: for<'a> Fn(&'a mut dyn WebContext, &'a mut FilterChain) -> BoxFuture<'a, ()> + Send + Sync,
{
    fn invoke<'a>(&'a self, ctx: &'a mut dyn WebContext, chain: &'a mut FilterChain) -> BoxFuture<'a, ()> {
        (self.0)(ctx, chain)
    }
}

/// Wrap a closure as a shared filter.
pub fn filter_fn<F>(f: F) -> FilterRef
where
    F: for<'a> Fn(&'a mut dyn WebContext, &'a mut FilterChain) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    Arc::new(FnFilter(f))
}

/// The handler seen as the last filter of a chain. Never advances the chain.
struct HandlerFilter {
    handler: Handler,
}

impl Filter for HandlerFilter {
    fn invoke<'a>(&'a self, ctx: &'a mut dyn WebContext, _chain: &'a mut FilterChain) -> BoxFuture<'a, ()> {
        (self.handler)(ctx)
    }
}

/// Per-request filter chain.
pub struct FilterChain {
    filters: Vec<FilterRef>,
    cursor: usize,
}

impl FilterChain {
    pub fn new(filters: Vec<FilterRef>) -> Self {
        Self { filters, cursor: 0 }
    }

    /// Run the rest of the chain.
    pub fn next<'a>(&'a mut self, ctx: &'a mut dyn WebContext) -> BoxFuture<'a, ()> {
        let Some(filter) = self.filters.get(self.cursor).cloned() else {
            return Box::pin(future::ready(()));
        };
        self.cursor += 1;
        Box::pin(async move { filter.invoke(ctx, self).await })
    }

    /// Number of filters already entered.
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// True once every filter has been entered.
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.filters.len()
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("len", &self.filters.len())
            .field("cursor", &self.cursor)
            .finish()
    }
}

/// Run `handler` behind `filters`.
///
/// Without filters the handler is called directly. Otherwise the handler is
/// appended as a terminal filter and a fresh chain is driven from the start.
pub async fn invoke_handler(ctx: &mut dyn WebContext, handler: &Handler, filters: &[FilterRef]) {
    if filters.is_empty() {
        handler(ctx).await;
        return;
    }

    let mut chain_filters = Vec::with_capacity(filters.len() + 1);
    chain_filters.extend(filters.iter().cloned());
    chain_filters.push(Arc::new(HandlerFilter { handler: Arc::clone(handler) }) as FilterRef);

    let mut chain = FilterChain::new(chain_filters);
    chain.next(ctx).await;
}

/// Named filters for configuration-driven attachment.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: HashMap<String, FilterRef>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `filter` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, filter: FilterRef) -> &mut Self {
        self.filters.insert(name.into(), filter);
        self
    }

    pub fn get(&self, name: &str) -> Option<FilterRef> {
        self.filters.get(name).cloned()
    }

    /// Resolve names in order. Fails on the first unknown name.
    pub fn resolve(&self, names: &[&str]) -> Result<Vec<FilterRef>, WebError> {
        names
            .iter()
            .map(|name| self.get(name).ok_or_else(|| WebError::UnknownFilter(name.to_string())))
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry").field("filters", &self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::EngineContext;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        log: Log,
        pass: bool,
    }

    impl Filter for Recorder {
        fn invoke<'a>(&'a self, ctx: &'a mut dyn WebContext, chain: &'a mut FilterChain) -> BoxFuture<'a, ()> {
            Box::pin(async move {
                self.log.lock().unwrap().push(format!("{}-before", self.name));
                if self.pass {
                    chain.next(ctx).await;
                }
                self.log.lock().unwrap().push(format!("{}-after", self.name));
            })
        }
    }

    fn recorder(name: &'static str, log: &Log, pass: bool) -> FilterRef {
        Arc::new(Recorder { name, log: Arc::clone(log), pass })
    }

    fn recording_handler(log: &Log) -> Handler {
        let log = Arc::clone(log);
        handler_fn(move |_ctx| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().unwrap().push("H".to_string());
            })
        })
    }

    fn context() -> EngineContext {
        EngineContext::detached(
            axum::http::Request::builder().uri("/test").body(Default::default()).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_wrap_around_order() {
        let log: Log = Default::default();
        let filters = vec![
            recorder("A", &log, true),
            recorder("B", &log, true),
            recorder("C", &log, true),
        ];
        let mut ctx = context();

        invoke_handler(&mut ctx, &recording_handler(&log), &filters).await;

        assert_eq!(
            *log.lock().unwrap(),
            vec!["A-before", "B-before", "C-before", "H", "C-after", "B-after", "A-after"]
        );
    }

    #[tokio::test]
    async fn test_short_circuit_skips_downstream() {
        let log: Log = Default::default();
        let filters = vec![
            recorder("A", &log, true),
            recorder("B", &log, false),
            recorder("C", &log, true),
        ];
        let mut ctx = context();

        invoke_handler(&mut ctx, &recording_handler(&log), &filters).await;

        assert_eq!(*log.lock().unwrap(), vec!["A-before", "B-before", "B-after", "A-after"]);
    }

    #[tokio::test]
    async fn test_next_after_exhaustion_is_noop() {
        let log: Log = Default::default();
        let mut chain = FilterChain::new(vec![recorder("A", &log, true)]);
        let mut ctx = context();

        chain.next(&mut ctx).await;
        assert!(chain.is_exhausted());
        chain.next(&mut ctx).await;
        chain.next(&mut ctx).await;

        assert_eq!(*log.lock().unwrap(), vec!["A-before", "A-after"]);
        assert_eq!(chain.position(), 1);

        let mut empty = FilterChain::new(Vec::new());
        assert!(empty.is_exhausted());
        empty.next(&mut ctx).await;
        assert_eq!(empty.position(), 0);
    }

    #[tokio::test]
    async fn test_reentrant_next_does_not_repeat_filter() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&hits);
        let twice = filter_fn(move |ctx, chain| {
            let counted = Arc::clone(&counted);
            Box::pin(async move {
                counted.fetch_add(1, Ordering::SeqCst);
                chain.next(ctx).await;
                chain.next(ctx).await;
            })
        });
        let log: Log = Default::default();
        let mut ctx = context();

        invoke_handler(&mut ctx, &recording_handler(&log), &[twice]).await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(*log.lock().unwrap(), vec!["H"]);
    }

    #[tokio::test]
    async fn test_empty_filters_call_handler_directly() {
        let log: Log = Default::default();
        let mut ctx = context();

        invoke_handler(&mut ctx, &recording_handler(&log), &[]).await;

        assert_eq!(*log.lock().unwrap(), vec!["H"]);
    }

    #[tokio::test]
    async fn test_filter_writes_response() {
        let deny = filter_fn(|ctx, _chain| {
            Box::pin(async move {
                ctx.string(axum::http::StatusCode::UNAUTHORIZED, "denied");
            })
        });
        let log: Log = Default::default();
        let mut ctx = context();

        invoke_handler(&mut ctx, &recording_handler(&log), &[deny]).await;

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(ctx.response().status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_registry_resolves_in_order() {
        let log: Log = Default::default();
        let mut registry = FilterRegistry::new();
        registry
            .register("a", recorder("A", &log, true))
            .register("b", recorder("B", &log, true));

        assert_eq!(registry.resolve(&["b", "a"]).unwrap().len(), 2);
        assert_eq!(registry.names(), vec!["a", "b"]);
        assert!(matches!(
            registry.resolve(&["a", "missing"]),
            Err(WebError::UnknownFilter(name)) if name == "missing"
        ));
    }
}
