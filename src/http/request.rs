//! Request model and request-id generation.
//!
//! # Responsibilities
//! - Transport-independent view of a request (method, path, params, headers, body)
//! - Default parse from raw transport parts
//! - Generate unique request IDs (UUID v4) for the `x-request-id` header
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Path parameters keep template declaration order
//! - Header lookups are case-insensitive (backed by `HeaderMap`)
//! - The path is percent-decoded per segment; a decoded `/` stays `%2F` so
//!   it never splits a segment

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::Query;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request};
use percent_encoding::percent_decode_str;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the per-request correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// An incoming request as seen by middlewares, parameter binding and handlers.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    path: String,
    path_params: Vec<(String, String)>,
    query_params: HashMap<String, String>,
    headers: HeaderMap,
    body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            path_params: Vec::new(),
            query_params: HashMap::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Build the default request view from transport parts and a buffered body.
    pub fn from_parts(parts: &Parts, body: &Bytes) -> Self {
        let query_params = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(params)| params)
            .unwrap_or_default();

        let body = if body.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(body).into_owned())
        };

        Self {
            method: parts.method.clone(),
            path: decode_path(parts.uri.path()),
            path_params: Vec::new(),
            query_params,
            headers: parts.headers.clone(),
            body,
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(name.into(), value.into());
        self
    }

    /// Add a header. Names or values that are not valid HTTP are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::debug!(header = %name, "Ignoring invalid request header"),
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Rebuild the request with extracted path parameters merged in.
    pub fn with_path_params(mut self, params: Vec<(String, String)>) -> Self {
        for (name, value) in params {
            match self.path_params.iter_mut().find(|(existing, _)| *existing == name) {
                Some(slot) => slot.1 = value,
                None => self.path_params.push((name, value)),
            }
        }
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Path parameters in template declaration order.
    pub fn path_params(&self) -> &[(String, String)] {
        &self.path_params
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Correlation id assigned by the transport, if any.
    pub fn request_id(&self) -> Option<&str> {
        self.header(X_REQUEST_ID)
    }
}

/// Generates a UUID v4 for every request that does not already carry one.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

fn decode_path(raw: &str) -> String {
    raw.split('/')
        .map(|segment| percent_decode_str(segment).decode_utf8_lossy().replace('/', "%2F"))
        .collect::<Vec<_>>()
        .join("/")
}
