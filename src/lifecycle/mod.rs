//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Start (container/server.rs):
//!     Validate listener → Bind every port → Spawn accept loops → Return
//!
//! Stop (shutdown.rs):
//!     Deadline → Stop accepting → Drain in-flight requests → Force close
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Stop all containers with the configured deadline
//! ```
//!
//! # Design Decisions
//! - Start never blocks on serving
//! - Shutdown has a deadline: forced close after it passes

pub mod shutdown;
pub mod signals;

pub use shutdown::{Deadline, Shutdown, ShutdownSignal};
pub use signals::shutdown_signal;
