//! Per-plugin server configuration.
//!
//! A plugin returns at most one `ServerConfiguration` after loading. Every
//! axis it sets becomes a claim on the shared `ServerCustomizer`.

use std::fmt;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, Uri};

use crate::error::BoxError;
use crate::http::request::HttpRequest;
use crate::http::response::HttpResponse;

/// Builds the framework request from the raw transport request.
/// `Ok(None)` falls back to default parsing.
pub type RequestCustomizer =
    Arc<dyn Fn(&RawRequest) -> Result<Option<HttpRequest>, BoxError> + Send + Sync>;

/// Mutates the outgoing response before it is written.
pub type ResponseCustomizer = Arc<dyn Fn(&mut HttpResponse, &HttpRequest) + Send + Sync>;

/// A buffered request as received by the transport.
#[derive(Debug)]
pub struct RawRequest {
    parts: Parts,
    body: Bytes,
}

impl RawRequest {
    pub fn new(parts: Parts, body: Bytes) -> Self {
        Self { parts, body }
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The request the default transport would have built.
    pub fn parse(&self) -> HttpRequest {
        HttpRequest::from_parts(&self.parts, &self.body)
    }
}

#[derive(Clone, Default)]
pub struct ServerConfiguration {
    port: Option<u16>,
    host: Option<String>,
    request: Option<RequestCustomizer>,
    response: Option<ResponseCustomizer>,
}

impl fmt::Debug for ServerConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfiguration")
            .field("port", &self.port)
            .field("host", &self.host)
            .field("request", &self.request.is_some())
            .field("response", &self.response.is_some())
            .finish()
    }
}

impl ServerConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn customize_request<F>(mut self, customizer: F) -> Self
    where
        F: Fn(&RawRequest) -> Result<Option<HttpRequest>, BoxError> + Send + Sync + 'static,
    {
        self.request = Some(Arc::new(customizer));
        self
    }

    pub fn customize_response<F>(mut self, customizer: F) -> Self
    where
        F: Fn(&mut HttpResponse, &HttpRequest) + Send + Sync + 'static,
    {
        self.response = Some(Arc::new(customizer));
        self
    }

    pub fn port_claim(&self) -> Option<u16> {
        self.port
    }

    pub fn host_claim(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn request_customizer(&self) -> Option<&RequestCustomizer> {
        self.request.as_ref()
    }

    pub fn response_customizer(&self) -> Option<&ResponseCustomizer> {
        self.response.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_raw_request_default_parse() {
        let (parts, ()) = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/items?limit=5")
            .header("x-tenant", "acme")
            .body(())
            .unwrap()
            .into_parts();
        let raw = RawRequest::new(parts, Bytes::from_static(b"{\"a\":1}"));

        let request = raw.parse();
        assert_eq!(request.path(), "/api/v1/items");
        assert_eq!(request.query_param("limit"), Some("5"));
        assert_eq!(request.header("x-tenant"), Some("acme"));
        assert_eq!(request.body(), Some("{\"a\":1}"));
    }

    #[test]
    fn test_only_set_axes_are_present() {
        let config = ServerConfiguration::new().port(9090);
        assert_eq!(config.port_claim(), Some(9090));
        assert!(config.host_claim().is_none());
        assert!(config.request_customizer().is_none());
        assert!(config.response_customizer().is_none());
    }
}
