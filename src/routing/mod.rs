//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (before start):
//!     get/post/.../route/group
//!     → mapper.rs (RouteTable: one Mapper per path, last write wins)
//!
//! Realization (at start):
//!     RouteTable::snapshot()
//!     → matcher.rs PathMatcher  (validation and conflicts, every engine)
//!     → axum::Router            (axum engine)
//!     → PathMatcher lookup      (hyper engine)
//! ```
//!
//! # Design Decisions
//! - Methods are a bitmask (`MethodSet`) decoded in canonical order
//! - The table is snapshotted at start; later mutation has no effect until
//!   the next start

pub mod group;
pub mod mapper;
pub mod matcher;
pub mod method;

pub use group::Route;
pub use mapper::{Mapper, RouteTable, WebMapper, WebMapperExt};
pub use matcher::{PathMatcher, PathPattern};
pub use method::MethodSet;
