//! Extension points for plugins.
//!
//! # Data Flow
//! ```text
//! Plugin::on_load
//!     → LoadContext::register_component_handler / register_parameter_handler
//!     → ExtensionRegistry (append-only)
//!     → frozen behind Arc once loading finishes
//!
//! Consumers:
//!     scanner / container → ComponentHandler (what is a component, controller base path)
//!     router (binding)    → ParameterHandler (how to resolve a custom parameter)
//! ```
//!
//! # Design Decisions
//! - Registry is an explicit value passed down, never a global, so every
//!   application (and every test) gets its own
//! - Handlers are consulted in registration order; first match wins

pub mod context;
pub mod handlers;
pub mod registry;

pub use context::ParameterContext;
pub use handlers::{
    AnnotationsPlugin, ApiControllerHandler, CookieParameterHandler, HeaderParameterHandler,
};
pub use registry::ExtensionRegistry;

use serde_json::Value;

use crate::component::ComponentType;
use crate::error::BoxError;
use crate::routing::params::Param;

/// Teaches the runtime a new component marker.
pub trait ComponentHandler: Send + Sync {
    /// Name of the marker this handler recognises.
    fn marker(&self) -> &str;

    /// Whether the type should be instantiated as a component.
    fn is_component(&self, ty: &ComponentType) -> bool {
        ty.has_marker(self.marker())
    }

    /// Whether the component's operations should be routed.
    fn is_controller(&self, _ty: &ComponentType) -> bool {
        false
    }

    /// Base path for routed components. `None` means no prefix.
    fn base_path(&self, _ty: &ComponentType) -> Option<String> {
        None
    }
}

/// Teaches the router a new parameter marker.
pub trait ParameterHandler: Send + Sync {
    fn marker(&self) -> &str;

    fn can_handle(&self, param: &Param) -> bool {
        param.marker() == Some(self.marker())
    }

    /// Produce the argument value. An error aborts the request with `400`.
    fn resolve(&self, param: &Param, context: &ParameterContext<'_>) -> Result<Value, BoxError>;
}
