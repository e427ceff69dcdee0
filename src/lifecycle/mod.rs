//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     explicit plugins → discover plugins → load plugins (claims, extensions)
//!     → scan components → wire container → register routes → start plugins
//!     → Runtime::run (plugin takeover or default transport)
//!
//! Shutdown (shutdown.rs):
//!     trigger → transport drains → gateways stop → plugins stop
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//! ```
//!
//! # Design Decisions
//! - Ordered startup: plugins before components, listeners last
//! - Ordered shutdown: stop accepting, drain, stop gateways, stop plugins

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{Application, Runtime};
