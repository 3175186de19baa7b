//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ListenerConfig (address, ports, TLS files)
//!     → listener.rs (bind every port, SO_REUSEADDR)
//!     → tls.rs (optional rustls ServerConfig)
//!     → connection.rs (per-connection IDs for spans)
//!     → Hand off to an engine
//! ```
//!
//! # Design Decisions
//! - All ports bind before any serving starts
//! - TLS material loads at start, never per connection

pub mod connection;
pub mod listener;
pub mod tls;
