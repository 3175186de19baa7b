//! Route groups: a shared path prefix and filter list.
//!
//! Every route registered through one `Route` gets exactly the filters the
//! group was created with; there is no per-route filter argument.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::http::context::WebContext;
use crate::http::filter::FilterRef;
use crate::routing::mapper::{WebMapper, WebMapperExt};
use crate::routing::method::MethodSet;

/// Group handle borrowing the route table it registers into.
pub struct Route<'m, M: WebMapper + ?Sized> {
    mapper: &'m mut M,
    base_path: String,
    filters: Vec<FilterRef>,
}

macro_rules! group_registrations {
    ($($name:ident => $methods:expr;)*) => {
        $(
            pub fn $name<F>(&mut self, path: &str, handler: F) -> &mut Self
            where
                F: for<'a> Fn(&'a mut dyn WebContext) -> BoxFuture<'a, ()> + Send + Sync + 'static,
            {
                self.request($methods, path, handler)
            }
        )*
    };
}

impl<'m, M: WebMapper + ?Sized> Route<'m, M> {
    pub fn new(mapper: &'m mut M, base_path: &str, filters: Vec<FilterRef>) -> Self {
        Self {
            mapper,
            base_path: base_path.to_string(),
            filters,
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn filters(&self) -> &[FilterRef] {
        &self.filters
    }

    /// Register `base_path + path` for `methods` with the group's filters.
    pub fn request<F>(&mut self, methods: MethodSet, path: &str, handler: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut dyn WebContext) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        let full_path = format!("{}{}", self.base_path, path);
        self.mapper
            .handle(methods, &full_path, Arc::new(handler), self.filters.clone());
        self
    }

    group_registrations! {
        get => MethodSet::GET;
        head => MethodSet::HEAD;
        post => MethodSet::POST;
        put => MethodSet::PUT;
        patch => MethodSet::PATCH;
        delete => MethodSet::DELETE;
        options => MethodSet::OPTIONS;
    }
}
