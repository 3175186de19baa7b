//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! containers, engines, filters
//!     → tracing events and spans (request span carries request_id)
//!     → logging.rs subscriber (fmt or JSON to stdout)
//! ```

pub mod logging;

pub use logging::init_logging;
