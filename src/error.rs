//! Error types shared across the runtime.
//!
//! # Design Decisions
//! - Bootstrap errors are typed and fatal; request-time errors are boxed
//!   (`BoxError`) and always converted into a response by the router
//! - Every construction failure names the type that failed and keeps the
//!   underlying cause as its `source`

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use thiserror::Error;

pub use tower::BoxError;

pub use crate::config::loader::ConfigError;

/// Failure while building the singleton component graph.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("construction failed for type {type_name}: {source}")]
    ConstructionFailed {
        type_name: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("no component is declared for type {type_name}")]
    UnknownComponent { type_name: &'static str },

    #[error("circular dependency: {}", chain.join(" -> "))]
    CircularDependency { chain: Vec<&'static str> },

    #[error("type {type_name} declares no usable constructor")]
    NoConstructor { type_name: &'static str },

    #[error("cached instance is not a {type_name}")]
    TypeMismatch { type_name: &'static str },
}

/// Failure while compiling or registering routes.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid path template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("route {method} {path} references unknown middleware '{name}'")]
    UnknownMiddleware {
        method: String,
        path: String,
        name: String,
    },

    #[error("component {type_name} is not a controller")]
    NotAController { type_name: &'static str },
}

/// Failure in the plugin lifecycle.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error(
        "plugin id conflict: '{id}' is already registered by {existing}; \
         attempted to register {offending}. Each plugin must have a unique id"
    )]
    DuplicateId {
        id: String,
        existing: String,
        offending: String,
    },

    #[error("failed to instantiate plugin {type_name}: {source}")]
    Instantiation {
        type_name: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("plugin '{id}' failed during {phase}: {source}")]
    Hook {
        id: String,
        phase: &'static str,
        #[source]
        source: BoxError,
    },
}

/// Anything that aborts application startup.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("server takeover by plugin '{id}' failed: {source}")]
    Takeover {
        id: String,
        #[source]
        source: BoxError,
    },
}

/// Extract a human-readable message from a panic payload.
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}

/// Run user code (hooks, middlewares, handlers), turning a panic into an error.
pub fn guard<T>(op: &str, f: impl FnOnce() -> Result<T, BoxError>) -> Result<T, BoxError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let msg = panic_message(payload);
            tracing::error!(op = %op, panic = %msg, "Panic in user code");
            Err(format!("panic in {op}: {msg}").into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_error_names_type_and_cause() {
        let err = ContainerError::ConstructionFailed {
            type_name: "app::EmployeeService",
            source: "repository offline".into(),
        };
        assert_eq!(
            err.to_string(),
            "construction failed for type app::EmployeeService: repository offline"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_guard_converts_panics() {
        let ok = guard("ok", || Ok::<_, BoxError>(7));
        assert_eq!(ok.unwrap(), 7);

        let err = guard::<()>("handler", || panic!("boom")).unwrap_err();
        assert_eq!(err.to_string(), "panic in handler: boom");

        let err = guard::<()>("hook", || std::panic::panic_any(42_u32)).unwrap_err();
        assert!(err.to_string().contains("non-string panic payload"));
    }

    #[test]
    fn test_circular_dependency_renders_chain() {
        let err = ContainerError::CircularDependency {
            chain: vec!["A", "B", "A"],
        };
        assert_eq!(err.to_string(), "circular dependency: A -> B -> A");
    }

    #[test]
    fn test_duplicate_plugin_names_both_contenders() {
        let err = PluginError::DuplicateId {
            id: "com.example.hello".into(),
            existing: "Hello v1.0.0".into(),
            offending: "Greeter v2.1.0".into(),
        };
        let message = err.to_string();
        assert!(message.contains("Hello v1.0.0"));
        assert!(message.contains("Greeter v2.1.0"));
        assert!(message.contains("com.example.hello"));
    }
}
