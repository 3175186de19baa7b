//! Route table and registration.
//!
//! # Responsibilities
//! - Store one `Mapper` per path pattern
//! - Offer per-method registration on anything that owns a route table
//! - Hand engines a snapshot of the table at start time
//!
//! # Design Decisions
//! - Path patterns are opaque here; syntax belongs to the engine
//! - Registering a path again replaces the previous mapper (last write wins,
//!   filter lists are never merged)
//! - Registration is generic over closures so `|ctx| Box::pin(async move { .. })`
//!   infers without annotations; the object-safe core is `handle`

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::http::context::WebContext;
use crate::http::filter::{FilterRef, Handler};
use crate::routing::group::Route;
use crate::routing::method::MethodSet;

/// A registered route: methods, pattern, handler and filters.
#[derive(Clone)]
pub struct Mapper {
    pub methods: MethodSet,
    pub path: String,
    pub handler: Handler,
    pub filters: Vec<FilterRef>,
}

impl Mapper {
    pub fn new(methods: MethodSet, path: impl Into<String>, handler: Handler, filters: Vec<FilterRef>) -> Self {
        Self {
            methods,
            path: path.into(),
            handler,
            filters,
        }
    }
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("methods", &self.methods.to_string())
            .field("path", &self.path)
            .field("filters", &self.filters.len())
            .finish()
    }
}

/// Path-keyed route registrations.
#[derive(Clone, Default)]
pub struct RouteTable {
    mappers: HashMap<String, Mapper>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `mapper`, returning the one it replaced.
    pub fn insert(&mut self, mapper: Mapper) -> Option<Mapper> {
        let replaced = self.mappers.insert(mapper.path.clone(), mapper);
        if let Some(previous) = &replaced {
            tracing::debug!(path = %previous.path, "Replacing existing route");
        }
        replaced
    }

    pub fn lookup(&self, path: &str) -> Option<&Mapper> {
        self.mappers.get(path)
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Mapper)> {
        self.mappers.iter()
    }

    /// Copy of the full path → mapper mapping.
    pub fn snapshot(&self) -> HashMap<String, Mapper> {
        self.mappers.clone()
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.mappers.iter()).finish()
    }
}

/// Anything owning a route table.
pub trait WebMapper {
    fn route_table(&self) -> &RouteTable;

    fn route_table_mut(&mut self) -> &mut RouteTable;
}

impl WebMapper for RouteTable {
    fn route_table(&self) -> &RouteTable {
        self
    }

    fn route_table_mut(&mut self) -> &mut RouteTable {
        self
    }
}

macro_rules! method_registrations {
    ($($(#[$doc:meta])* $name:ident => $methods:expr;)*) => {
        $(
            $(#[$doc])*
            fn $name<F>(&mut self, path: &str, handler: F, filters: Vec<FilterRef>)
            where
                F: for<'a> Fn(&'a mut dyn WebContext) -> BoxFuture<'a, ()> + Send + Sync + 'static,
            {
                self.handle($methods, path, Arc::new(handler), filters);
            }
        )*
    };
}

/// Registration operations for every [`WebMapper`].
pub trait WebMapperExt: WebMapper {
    /// Register a type-erased handler for `methods` at `path`.
    fn handle(&mut self, methods: MethodSet, path: &str, handler: Handler, filters: Vec<FilterRef>) {
        self.route_table_mut()
            .insert(Mapper::new(methods, path, handler, filters));
    }

    /// Register `handler` for an arbitrary method set.
    fn request<F>(&mut self, methods: MethodSet, path: &str, handler: F, filters: Vec<FilterRef>)
    where
        F: for<'a> Fn(&'a mut dyn WebContext) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.handle(methods, path, Arc::new(handler), filters);
    }

    method_registrations! {
        get => MethodSet::GET;
        head => MethodSet::HEAD;
        post => MethodSet::POST;
        put => MethodSet::PUT;
        patch => MethodSet::PATCH;
        delete => MethodSet::DELETE;
        options => MethodSet::OPTIONS;
    }

    /// Group handle registering under `prefix` with `filters`.
    fn route(&mut self, prefix: &str, filters: Vec<FilterRef>) -> Route<'_, Self> {
        Route::new(self, prefix, filters)
    }

    /// Run `builder` against a fresh group handle.
    fn group<G>(&mut self, prefix: &str, builder: G, filters: Vec<FilterRef>)
    where
        G: FnOnce(&mut Route<'_, Self>),
    {
        let mut route = Route::new(self, prefix, filters);
        builder(&mut route);
    }

    /// Snapshot of every registered route.
    fn mappers(&self) -> HashMap<String, Mapper> {
        self.route_table().snapshot()
    }
}

impl<M: WebMapper + ?Sized> WebMapperExt for M {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::filter::filter_fn;

    fn pass_through() -> FilterRef {
        filter_fn(|ctx, chain| Box::pin(async move { chain.next(ctx).await }))
    }

    #[test]
    fn test_last_registration_wins() {
        let mut table = RouteTable::new();
        let first = pass_through();
        let second = pass_through();

        table.get("/items", |_ctx| Box::pin(async {}), vec![first.clone(), first]);
        table.post("/items", |_ctx| Box::pin(async {}), vec![second.clone()]);

        assert_eq!(table.len(), 1);
        let mapper = table.lookup("/items").unwrap();
        assert_eq!(mapper.methods, MethodSet::POST);
        assert_eq!(mapper.filters.len(), 1);
        assert!(Arc::ptr_eq(&mapper.filters[0], &second));
    }

    #[test]
    fn test_filters_keep_call_order() {
        let mut table = RouteTable::new();
        let a = pass_through();
        let b = pass_through();
        let c = pass_through();

        table.request(
            MethodSet::GET | MethodSet::HEAD,
            "/ordered",
            |_ctx| Box::pin(async {}),
            vec![c.clone(), a.clone(), b.clone()],
        );

        let mappers = table.mappers();
        let mapper = &mappers["/ordered"];
        assert_eq!(mapper.methods.decode(), vec!["GET", "HEAD"]);
        assert!(Arc::ptr_eq(&mapper.filters[0], &c));
        assert!(Arc::ptr_eq(&mapper.filters[1], &a));
        assert!(Arc::ptr_eq(&mapper.filters[2], &b));
    }

    #[test]
    fn test_every_method_registration() {
        let mut table = RouteTable::new();
        table.get("/get", |_ctx| Box::pin(async {}), vec![]);
        table.head("/head", |_ctx| Box::pin(async {}), vec![]);
        table.post("/post", |_ctx| Box::pin(async {}), vec![]);
        table.put("/put", |_ctx| Box::pin(async {}), vec![]);
        table.patch("/patch", |_ctx| Box::pin(async {}), vec![]);
        table.delete("/delete", |_ctx| Box::pin(async {}), vec![]);
        table.options("/options", |_ctx| Box::pin(async {}), vec![]);

        let mappers = table.mappers();
        assert_eq!(mappers.len(), 7);
        for (path, mapper) in mappers {
            assert_eq!(format!("/{}", mapper.methods.to_string().to_lowercase()), path);
        }
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut table = RouteTable::new();
        table.get("/a", |_ctx| Box::pin(async {}), vec![]);
        let snapshot = table.mappers();

        table.get("/b", |_ctx| Box::pin(async {}), vec![]);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(table.len(), 2);
    }
}
