//! CORS pre-flight middleware.
//!
//! Answers `OPTIONS` requests directly with the configured `Access-Control-*`
//! headers; every other method passes through.

use axum::http::{Method, StatusCode};

use crate::error::BoxError;
use crate::http::request::HttpRequest;
use crate::http::response::HttpResponse;
use crate::middleware::{Flow, Middleware};

#[derive(Debug, Clone)]
pub struct CorsMiddleware {
    allow_origin: String,
    allow_methods: String,
    allow_headers: String,
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_methods: "GET, POST, PUT, DELETE, PATCH, OPTIONS".to_string(),
            allow_headers: "Content-Type, Authorization".to_string(),
        }
    }
}

impl CorsMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allow_origin = origin.into();
        self
    }

    pub fn allow_methods(mut self, methods: impl Into<String>) -> Self {
        self.allow_methods = methods.into();
        self
    }

    pub fn allow_headers(mut self, headers: impl Into<String>) -> Self {
        self.allow_headers = headers.into();
        self
    }
}

impl Middleware for CorsMiddleware {
    fn handle(&self, request: &HttpRequest) -> Result<Flow, BoxError> {
        if request.method() != Method::OPTIONS {
            return Ok(Flow::Continue);
        }

        Ok(Flow::Respond(
            HttpResponse::ok()
                .status(StatusCode::OK)
                .header("Access-Control-Allow-Origin", &self.allow_origin)
                .header("Access-Control-Allow-Methods", &self.allow_methods)
                .header("Access-Control-Allow-Headers", &self.allow_headers)
                .body(""),
        ))
    }
}
