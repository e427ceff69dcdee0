//! Request middlewares.
//!
//! # Data Flow
//! ```text
//! Route matched
//!     → class-level middlewares (declaration order)
//!     → method-level middlewares (declaration order)
//!     → first Flow::Respond short-circuits; errors become 500
//!     → handler
//! ```
//!
//! # Design Decisions
//! - Middlewares are referenced by name on controllers and operations and
//!   resolved to shared instances when routes are registered
//! - Instances are shared across concurrent requests; any state they keep
//!   must be synchronized by the middleware itself

pub mod cors;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub use cors::CorsMiddleware;

use crate::error::BoxError;
use crate::http::request::HttpRequest;
use crate::http::response::HttpResponse;

/// Outcome of one middleware.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Continue,
    /// Stop the chain and answer with this response.
    Respond(HttpResponse),
}

pub trait Middleware: Send + Sync {
    fn handle(&self, request: &HttpRequest) -> Result<Flow, BoxError>;
}

impl<F> Middleware for F
where
    F: Fn(&HttpRequest) -> Result<Flow, BoxError> + Send + Sync,
{
    fn handle(&self, request: &HttpRequest) -> Result<Flow, BoxError> {
        self(request)
    }
}

/// Named middlewares available to routes.
#[derive(Default, Clone)]
pub struct MiddlewareRegistry {
    entries: HashMap<String, Arc<dyn Middleware>>,
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("MiddlewareRegistry").field("names", &names).finish()
    }
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under `name`. A later registration replaces an earlier one.
    pub fn register(&mut self, name: impl Into<String>, middleware: Arc<dyn Middleware>) {
        let name = name.into();
        if self.entries.insert(name.clone(), middleware).is_some() {
            tracing::warn!(middleware = %name, "Middleware re-registered, replacing previous");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Middleware>> {
        self.entries.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
