//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     controller ComponentType + instance
//!     → base path (built-in marker or extension handler)
//!     → matcher.rs (compile `{name}` templates)
//!     → route.rs (Route with resolved middlewares)
//!     → Freeze as immutable Router
//!
//! Incoming Request:
//!     → router.rs (first matching route)
//!     → middleware chain
//!     → params.rs (bind path / query / body / extension parameters)
//!     → handler → Reply → HttpResponse
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (segment matching only)
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod matcher;
pub mod params;
pub mod route;
pub mod router;

pub use matcher::PathPattern;
pub use params::{Args, BindError, Param, ParamSource, ParamType};
pub use route::{Handler, Operation, OperationSpec, Route};
pub use router::Router;
