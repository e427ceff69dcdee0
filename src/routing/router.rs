//! Route table and request dispatch.
//!
//! # Responsibilities
//! - Turn controller operations into routes (base path + template, middlewares resolved)
//! - Select the first matching route for a request
//! - Run the middleware chain, bind parameters, invoke the handler
//! - Map handler results and failures to responses
//!
//! # Design Decisions
//! - Immutable after bootstrap (thread-safe without locks)
//! - O(n) scan in registration order; first match wins
//! - `handle_request` never fails: every error and panic becomes a response
//! - Pre-flight fallback runs only class-level middlewares of path-matching
//!   routes, ignoring their errors

use std::fmt;
use std::sync::Arc;

use axum::http::{Method, StatusCode};

use crate::component::{ComponentType, Instance};
use crate::error::{guard, RouteError};
use crate::extensibility::ExtensionRegistry;
use crate::http::codec::Codec;
use crate::http::request::HttpRequest;
use crate::http::response::{HttpResponse, Reply, TEXT_PLAIN};
use crate::middleware::{Flow, MiddlewareRegistry};
use crate::routing::matcher::normalize;
use crate::routing::params::bind;
use crate::routing::route::{BoundMiddleware, Route};

pub struct Router {
    routes: Vec<Route>,
    extensions: Arc<ExtensionRegistry>,
    middlewares: Arc<MiddlewareRegistry>,
    codec: Arc<dyn Codec>,
    default_base_path: String,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes)
            .field("default_base_path", &self.default_base_path)
            .finish_non_exhaustive()
    }
}

enum Chain {
    Continue,
    Stop(HttpResponse),
}

impl Router {
    pub fn new(
        extensions: Arc<ExtensionRegistry>,
        middlewares: Arc<MiddlewareRegistry>,
        codec: Arc<dyn Codec>,
        default_base_path: impl Into<String>,
    ) -> Self {
        Self {
            routes: Vec::new(),
            extensions,
            middlewares,
            codec,
            default_base_path: default_base_path.into(),
        }
    }

    /// Base path of a routed type: built-in controller marker first, then
    /// the first extension handler that treats the type as a controller.
    pub fn base_path_for(&self, ty: &ComponentType) -> Result<String, RouteError> {
        if let Some(declared) = ty.controller_base_path() {
            return Ok(declared.unwrap_or(self.default_base_path.as_str()).to_string());
        }
        match self.extensions.controller_handler_for(ty) {
            Some(handler) => Ok(handler.base_path(ty).unwrap_or_default()),
            None => Err(RouteError::NotAController {
                type_name: ty.type_name(),
            }),
        }
    }

    pub fn is_controller(&self, ty: &ComponentType) -> bool {
        ty.controller_base_path().is_some() || self.extensions.controller_handler_for(ty).is_some()
    }

    /// Append one route per (method, template) binding of every operation.
    /// Returns the number of routes added.
    pub fn register_controller(
        &mut self,
        ty: &ComponentType,
        instance: Instance,
    ) -> Result<usize, RouteError> {
        let base_path = self.base_path_for(ty)?;
        let mut added = 0;

        for operation in ty.operations() {
            for (method, path) in operation.bindings() {
                let full_path = normalize(&format!("{base_path}{path}"));
                let class_middlewares = self.bind_middlewares(ty.middlewares(), method, &full_path)?;
                let method_middlewares =
                    self.bind_middlewares(operation.middlewares(), method, &full_path)?;

                let route = Route::new(
                    method.clone(),
                    &full_path,
                    ty.type_name(),
                    instance.clone(),
                    operation.clone(),
                    class_middlewares,
                    method_middlewares,
                )?;

                tracing::info!(
                    method = %method,
                    route = %full_path,
                    handler = %format!("{}::{}", ty.short_name(), operation.name()),
                    "Registered route"
                );
                self.routes.push(route);
                added += 1;
            }
        }

        Ok(added)
    }

    fn bind_middlewares(
        &self,
        names: &[String],
        method: &Method,
        path: &str,
    ) -> Result<Vec<BoundMiddleware>, RouteError> {
        names
            .iter()
            .map(|name| {
                self.middlewares
                    .get(name)
                    .map(|middleware| BoundMiddleware {
                        name: name.clone(),
                        middleware,
                    })
                    .ok_or_else(|| RouteError::UnknownMiddleware {
                        method: method.to_string(),
                        path: path.to_string(),
                        name: name.clone(),
                    })
            })
            .collect()
    }

    /// Routes in registration order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    /// Dispatch one request. Never fails.
    pub fn handle_request(&self, request: HttpRequest) -> HttpResponse {
        let matched = self
            .routes
            .iter()
            .find(|route| route.matches(request.method(), request.path()));

        if let Some(route) = matched {
            return self.dispatch(route, request);
        }

        if request.method() == Method::OPTIONS {
            if let Some(response) = self.preflight(&request) {
                return response;
            }
        }

        tracing::debug!(method = %request.method(), path = %request.path(), "No route matched");
        HttpResponse::not_found()
    }

    fn dispatch(&self, route: &Route, request: HttpRequest) -> HttpResponse {
        let params = route.extract_path_params(request.path());
        let request = request.with_path_params(params);

        for chain in [route.class_middlewares(), route.method_middlewares()] {
            match self.run_chain(chain, &request) {
                Chain::Continue => {}
                Chain::Stop(response) => return response,
            }
        }

        let args = match bind(route.operation().params(), &request, &self.extensions, self.codec.as_ref()) {
            Ok(args) => args,
            Err(err) => {
                tracing::debug!(route = %route.path(), error = %err, "Parameter binding failed");
                return HttpResponse::error(StatusCode::BAD_REQUEST, err.to_string());
            }
        };

        let op = route.operation().name();
        let handler = route.operation().handler();
        match guard(op, || handler(route.instance(), &args)) {
            Ok(reply) => self.wrap(reply, route.status()),
            Err(err) => {
                tracing::error!(
                    route = %route.path(),
                    operation = %op,
                    error = %err,
                    "Handler failed"
                );
                HttpResponse::error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        }
    }

    fn run_chain(&self, chain: &[BoundMiddleware], request: &HttpRequest) -> Chain {
        for bound in chain {
            match guard(&bound.name, || bound.middleware.handle(request)) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Respond(response)) => {
                    tracing::debug!(middleware = %bound.name, status = %response.status_code(), "Middleware short-circuited");
                    return Chain::Stop(response);
                }
                Err(err) => {
                    tracing::error!(middleware = %bound.name, error = %err, "Middleware failed");
                    return Chain::Stop(HttpResponse::error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("Middleware error: {err}"),
                    ));
                }
            }
        }
        Chain::Continue
    }

    /// Let a class-level middleware (typically CORS) answer an `OPTIONS`
    /// request for a path that only has routes for other methods.
    fn preflight(&self, request: &HttpRequest) -> Option<HttpResponse> {
        for route in self.routes.iter().filter(|route| route.matches_path(request.path())) {
            for bound in route.class_middlewares() {
                match guard(&bound.name, || bound.middleware.handle(request)) {
                    Ok(Flow::Respond(response)) => return Some(response),
                    Ok(Flow::Continue) => {}
                    Err(err) => {
                        tracing::debug!(middleware = %bound.name, error = %err, "Pre-flight middleware failed, trying next route");
                        break;
                    }
                }
            }
        }
        None
    }

    /// Turn a handler result into a response. A declared status always
    /// applies to wrapped results, and to explicit responses only while they
    /// still carry the default `200`.
    fn wrap(&self, reply: Reply, status: Option<StatusCode>) -> HttpResponse {
        let response = match reply {
            Reply::Response(mut response) => {
                if let Some(status) = status.filter(|_| response.status_code() == StatusCode::OK) {
                    response.set_status(status);
                }
                return response;
            }
            Reply::Empty => HttpResponse::no_content(),
            Reply::Text(text) => HttpResponse::ok().content_type(TEXT_PLAIN).body(text),
            Reply::Json(value) => match self.codec.encode(&value) {
                Ok(body) => HttpResponse::ok()
                    .content_type(self.codec.content_type())
                    .body(body),
                Err(err) => {
                    tracing::error!(error = %err, "Failed to encode handler result");
                    return HttpResponse::error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
                }
            },
        };

        match status {
            Some(status) => response.status(status),
            None => response,
        }
    }
}
