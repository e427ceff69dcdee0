//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems emit tracing events with structured fields
//!     (plugin, component, route, request_id)
//!     → logging.rs (EnvFilter + fmt layer, pretty or JSON)
//!     → stdout
//! ```
//!
//! # Design Decisions
//! - Request ID flows from the transport into every dispatch log line
//! - The library never installs a subscriber; the binary does

pub mod logging;
