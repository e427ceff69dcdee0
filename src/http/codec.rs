//! Body codec used for `@Body`-style parameters and non-text handler results.

use std::fmt;

use serde_json::Value;

use crate::error::BoxError;
use crate::http::response::APPLICATION_JSON;

/// Encodes handler results and decodes request bodies.
pub trait Codec: Send + Sync + fmt::Debug {
    fn encode(&self, value: &Value) -> Result<String, BoxError>;

    fn decode(&self, text: &str) -> Result<Value, BoxError>;

    /// Content type attached to encoded responses.
    fn content_type(&self) -> &'static str {
        APPLICATION_JSON
    }
}

/// serde_json-backed codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<String, BoxError> {
        Ok(serde_json::to_string(value)?)
    }

    fn decode(&self, text: &str) -> Result<Value, BoxError> {
        Ok(serde_json::from_str(text)?)
    }
}
