//! Portico: one handler API over several HTTP server engines.
//!
//! Applications register routes, filters and handlers against the
//! engine-neutral types in [`routing`] and [`http`]; [`engine`] provides the
//! axum and hyper containers that actually serve them, and [`WebServer`]
//! runs any number of containers side by side.
//!
//! ```text
//!   WebServer ──owns──▶ Box<dyn WebContainer> (axum | hyper)
//!                           │
//!                           ├── RouteTable: path → Mapper{methods, handler, filters}
//!                           └── listeners (address × ports, optional TLS)
//!
//!   request ─▶ engine route match ─▶ FilterChain ─▶ handler ─▶ WebContext response
//! ```

// Core abstractions
pub mod container;
pub mod http;
pub mod routing;

// Engines
pub mod engine;
pub mod net;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use container::{ContainerCore, WebContainer, WebServer};
pub use engine::{AxumContainer, EngineContext, HyperContainer};
pub use error::{WebError, WebResult};
pub use http::{filter_fn, handler_fn, Filter, FilterChain, FilterRef, FilterRegistry, Handler, WebContext, WebContextExt};
pub use lifecycle::Deadline;
pub use routing::{Mapper, MethodSet, Route, RouteTable, WebMapper, WebMapperExt};
