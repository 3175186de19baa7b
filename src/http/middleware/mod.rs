//! Built-in filters.

pub mod access_log;
pub mod request_id;

use std::sync::Arc;

pub use access_log::AccessLogFilter;
pub use request_id::{RequestId, RequestIdFilter, REQUEST_ID_ATTRIBUTE, X_REQUEST_ID};

use crate::http::filter::FilterRegistry;

impl FilterRegistry {
    /// Registry pre-populated with `request_id` and `access_log`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register("request_id", Arc::new(RequestIdFilter))
            .register("access_log", Arc::new(AccessLogFilter));
        registry
    }
}
