//! Routes and controller operations.
//!
//! An `Operation<T>` is declared on a controller type and erased into an
//! `OperationSpec` when the descriptor is built. The router turns each
//! (method, template) binding of an `OperationSpec` into one immutable `Route`.

use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use axum::http::{Method, StatusCode};

use crate::component::Instance;
use crate::error::{BoxError, RouteError};
use crate::http::response::Reply;
use crate::middleware::Middleware;
use crate::routing::matcher::PathPattern;
use crate::routing::params::{Args, Param};

/// Type-erased handler: the owning instance plus bound arguments.
pub type Handler = Arc<dyn Fn(&Instance, &Args) -> Result<Reply, BoxError> + Send + Sync>;

fn handler_fn<F>(handler: F) -> Handler
where
    F: Fn(&Instance, &Args) -> Result<Reply, BoxError> + Send + Sync + 'static,
{
    Arc::new(handler)
}

/// A routed operation on controller type `T`.
pub struct Operation<T> {
    spec: OperationSpec,
    _owner: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> Operation<T> {
    pub fn new<F, R>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&T, &Args) -> Result<R, BoxError> + Send + Sync + 'static,
        R: Into<Reply>,
    {
        let name = name.into();
        let owner = name.clone();
        let handler = handler_fn(move |instance, args| {
            let this = (**instance).downcast_ref::<T>().ok_or_else(|| {
                format!("operation '{owner}' is not bound to a {}", type_name::<T>())
            })?;
            handler(this, args).map(Into::into)
        });

        Self {
            spec: OperationSpec {
                name,
                bindings: Vec::new(),
                params: Vec::new(),
                middlewares: Vec::new(),
                status: None,
                handler,
            },
            _owner: PhantomData,
        }
    }

    /// Bind the operation to `method` at `path` (relative to the controller
    /// base path). May be called several times.
    pub fn route(mut self, method: Method, path: impl Into<String>) -> Self {
        self.spec.bindings.push((method, path.into()));
        self
    }

    pub fn get(self, path: impl Into<String>) -> Self {
        self.route(Method::GET, path)
    }

    pub fn post(self, path: impl Into<String>) -> Self {
        self.route(Method::POST, path)
    }

    pub fn put(self, path: impl Into<String>) -> Self {
        self.route(Method::PUT, path)
    }

    pub fn delete(self, path: impl Into<String>) -> Self {
        self.route(Method::DELETE, path)
    }

    pub fn patch(self, path: impl Into<String>) -> Self {
        self.route(Method::PATCH, path)
    }

    pub fn options(self, path: impl Into<String>) -> Self {
        self.route(Method::OPTIONS, path)
    }

    pub fn param(mut self, param: Param) -> Self {
        self.spec.params.push(param);
        self
    }

    /// Method-level middleware, run after the controller's class-level ones.
    pub fn middleware(mut self, name: impl Into<String>) -> Self {
        self.spec.middlewares.push(name.into());
        self
    }

    /// Success status applied when the handler leaves the default.
    pub fn status(mut self, status: StatusCode) -> Self {
        self.spec.status = Some(status);
        self
    }

    pub(crate) fn into_spec(self) -> OperationSpec {
        self.spec
    }
}

/// A type-erased operation declaration.
#[derive(Clone)]
pub struct OperationSpec {
    name: String,
    bindings: Vec<(Method, String)>,
    params: Vec<Param>,
    middlewares: Vec<String>,
    status: Option<StatusCode>,
    handler: Handler,
}

impl fmt::Debug for OperationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationSpec")
            .field("name", &self.name)
            .field("bindings", &self.bindings)
            .field("params", &self.params)
            .field("middlewares", &self.middlewares)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl OperationSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bindings(&self) -> &[(Method, String)] {
        &self.bindings
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn middlewares(&self) -> &[String] {
        &self.middlewares
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }
}

/// A middleware resolved from its registered name.
#[derive(Clone)]
pub struct BoundMiddleware {
    pub name: String,
    pub middleware: Arc<dyn Middleware>,
}

impl fmt::Debug for BoundMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One entry of the route table. Immutable once built.
#[derive(Clone)]
pub struct Route {
    method: Method,
    pattern: PathPattern,
    owner: &'static str,
    instance: Instance,
    operation: OperationSpec,
    class_middlewares: Vec<BoundMiddleware>,
    method_middlewares: Vec<BoundMiddleware>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.pattern.template())
            .field("owner", &self.owner)
            .field("operation", &self.operation.name)
            .field("class_middlewares", &self.class_middlewares)
            .field("method_middlewares", &self.method_middlewares)
            .field("status", &self.operation.status)
            .finish()
    }
}

impl Route {
    pub fn new(
        method: Method,
        path: &str,
        owner: &'static str,
        instance: Instance,
        operation: OperationSpec,
        class_middlewares: Vec<BoundMiddleware>,
        method_middlewares: Vec<BoundMiddleware>,
    ) -> Result<Self, RouteError> {
        Ok(Self {
            method,
            pattern: PathPattern::compile(path)?,
            owner,
            instance,
            operation,
            class_middlewares,
            method_middlewares,
        })
    }

    /// Method matches case-insensitively and the whole path matches.
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.as_str().eq_ignore_ascii_case(method.as_str()) && self.matches_path(path)
    }

    pub fn matches_path(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }

    /// Path variables in declaration order. Only meaningful after `matches`.
    pub fn extract_path_params(&self, path: &str) -> Vec<(String, String)> {
        self.pattern.captures(path).unwrap_or_default()
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        self.pattern.template()
    }

    pub fn variable_names(&self) -> &[String] {
        self.pattern.variable_names()
    }

    pub fn owner(&self) -> &'static str {
        self.owner
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn operation(&self) -> &OperationSpec {
        &self.operation
    }

    pub fn class_middlewares(&self) -> &[BoundMiddleware] {
        &self.class_middlewares
    }

    pub fn method_middlewares(&self) -> &[BoundMiddleware] {
        &self.method_middlewares
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.operation.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Greeter {
        greeting: &'static str,
    }

    fn route(method: Method, path: &str) -> Route {
        let operation = Operation::new("greet", |this: &Greeter, args: &Args| {
            let name: String = args.get("name")?;
            Ok(format!("{} {name}", this.greeting))
        })
        .get(path)
        .param(Param::path("name"))
        .into_spec();

        let instance: Instance = Arc::new(Greeter { greeting: "hello" });
        Route::new(method, path, "Greeter", instance, operation, vec![], vec![]).unwrap()
    }

    #[test]
    fn test_matches_method_case_insensitively() {
        let route = route(Method::GET, "/employees/{name}");
        let lower = Method::from_bytes(b"get").unwrap();

        assert!(route.matches(&Method::GET, "/employees/42"));
        assert!(route.matches(&lower, "/employees/42"));
        assert!(!route.matches(&Method::POST, "/employees/42"));
        assert!(!route.matches(&Method::GET, "/employees/42/x"));
    }

    #[test]
    fn test_extract_path_params() {
        let route = route(Method::GET, "/employees/{name}");
        assert_eq!(
            route.extract_path_params("/employees/42"),
            vec![("name".to_string(), "42".to_string())]
        );
    }

    #[test]
    fn test_erased_handler_downcasts_owner() {
        let route = route(Method::GET, "/hello/{name}");
        let args = Args::new().with("name", "ada".into());

        let reply = (route.operation().handler())(route.instance(), &args).unwrap();
        assert_eq!(reply, Reply::Text("hello ada".into()));

        let stranger: Instance = Arc::new(42_u8);
        assert!((route.operation().handler())(&stranger, &args).is_err());
    }
}
