//! Engine-neutral HTTP contract.
//!
//! # Data Flow
//! ```text
//! Engine adapter (axum / hyper)
//!     → context.rs (WebContext over the buffered request)
//!     → filter.rs (invoke_handler: filters, then the handler)
//!     → response.rs (ResponseState → http::Response)
//!     → Send to client
//! ```

pub mod context;
pub mod filter;
pub mod middleware;
pub mod response;

pub use context::{WebContext, WebContextExt};
pub use filter::{filter_fn, handler_fn, invoke_handler, Filter, FilterChain, FilterRef, FilterRegistry, Handler};
pub use response::{default_error_handler, ErrorHandler, ResponseBody, ResponseState};
