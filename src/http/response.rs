//! Response model and handler results.
//!
//! # Responsibilities
//! - Builder-style response (status, content type, headers, body)
//! - Handler result type (`Reply`) wrapped into responses by the router
//! - Conversion into the transport's response type
//!
//! # Design Decisions
//! - Default response is `200 OK` with `application/json`
//! - Error bodies are JSON objects `{"error": "<message>"}`, encoded with
//!   serde_json so messages are always escaped

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

use crate::error::BoxError;

pub const APPLICATION_JSON: &str = "application/json";
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// An outgoing response produced by middlewares, handlers or the router.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    status: StatusCode,
    content_type: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            content_type: APPLICATION_JSON.to_string(),
            headers: Vec::new(),
            body: None,
        }
    }
}

impl HttpResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok() -> Self {
        Self::default()
    }

    pub fn no_content() -> Self {
        Self::default().status(StatusCode::NO_CONTENT)
    }

    pub fn not_found() -> Self {
        Self::error(StatusCode::NOT_FOUND, "Not Found")
    }

    /// JSON error body `{"error": message}` with the given status.
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        let body = serde_json::json!({ "error": message.into() });
        Self::default().status(status).body(body.to_string())
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Set a header, replacing any existing value with the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = Some(body.into());
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.headers.push((name, value)),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn body_text(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn content_type_value(&self) -> &str {
        &self.content_type
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body.unwrap_or_default()));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        match HeaderValue::from_str(&self.content_type) {
            Ok(value) => {
                headers.insert(CONTENT_TYPE, value);
            }
            Err(_) => {
                tracing::warn!(content_type = %self.content_type, "Dropping invalid content type")
            }
        }
        for (name, value) in self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "Dropping invalid response header"),
            }
        }
        response
    }
}

/// What a handler operation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A fully formed response, passed through (status overlay aside).
    Response(HttpResponse),
    /// No value; becomes `204 No Content`.
    Empty,
    /// Plain text, used verbatim as the body.
    Text(String),
    /// A value encoded by the codec.
    Json(Value),
}

impl Reply {
    /// Serialize any value into a `Reply::Json`.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, BoxError> {
        Ok(Reply::Json(serde_json::to_value(value)?))
    }
}

impl From<HttpResponse> for Reply {
    fn from(response: HttpResponse) -> Self {
        Reply::Response(response)
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Reply::Text(text)
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Reply::Text(text.to_string())
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Empty
    }
}

impl<T: Into<Reply>> From<Option<T>> for Reply {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Reply::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_response() {
        let response = HttpResponse::new();
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.content_type_value(), APPLICATION_JSON);
        assert_eq!(response.body_text(), None);
    }

    #[test]
    fn test_error_body_is_escaped_json() {
        let response = HttpResponse::error(StatusCode::INTERNAL_SERVER_ERROR, "bad \"quote\"");
        let body: Value = serde_json::from_str(response.body_text().unwrap()).unwrap();
        assert_eq!(body["error"], "bad \"quote\"");
        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_header_replaces_case_insensitively() {
        let response = HttpResponse::ok()
            .header("X-Trace", "1")
            .header("x-trace", "2");
        assert_eq!(response.headers().len(), 1);
        assert_eq!(response.header_value("X-TRACE"), Some("2"));
    }

    #[test]
    fn test_into_axum_response() {
        let response = HttpResponse::ok()
            .status(StatusCode::CREATED)
            .content_type(TEXT_PLAIN)
            .header("X-Custom", "yes")
            .body("done")
            .into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["content-type"], TEXT_PLAIN);
        assert_eq!(response.headers()["x-custom"], "yes");
    }

    #[test]
    fn test_reply_conversions() {
        assert_eq!(Reply::from(()), Reply::Empty);
        assert_eq!(Reply::from("hi"), Reply::Text("hi".into()));
        assert_eq!(Reply::from(None::<String>), Reply::Empty);
        assert_eq!(
            Reply::json(&serde_json::json!({"id": 1})).unwrap(),
            Reply::Json(serde_json::json!({"id": 1}))
        );
    }
}
