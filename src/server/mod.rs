//! Server customisation contributed by plugins.
//!
//! # Data Flow
//! ```text
//! Plugin::server_configuration()
//!     → ServerCustomizer::apply (first claim per axis wins)
//!     → effective host/port, request parser, response decorator
//!
//! LoadContext::register_gateway
//!     → ServerCustomizer::register_gateway
//!     → gateway::mount (staged endpoints on the default transport)
//! ```

pub mod configuration;
pub mod customizer;
pub mod gateway;

pub use configuration::{RawRequest, RequestCustomizer, ResponseCustomizer, ServerConfiguration};
pub use customizer::{ClaimAxis, ClaimConflict, ServerCustomizer};
pub use gateway::{Gateway, GatewayEndpoints, MountedGateways};
