//! Handler parameter declaration and binding.
//!
//! # Responsibilities
//! - Declare where each handler argument comes from (path, query, body, extension)
//! - Convert raw path/query strings into typed values consistently
//! - Hand bound arguments to handlers as an ordered `Args` map
//!
//! # Data Flow
//! ```text
//! HttpRequest + [Param]
//!     → path / query lookup → convert(raw, ParamType)
//!     → body → Codec::decode → declared-type check
//!     → custom marker → first ParameterHandler that can handle it
//!     → Args (declaration order)
//! ```
//!
//! # Design Decisions
//! - A missing path/query value binds `null`, never an error
//! - Conversion and decode failures are client errors (400)

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::{Number, Value};
use thiserror::Error;

use crate::error::BoxError;
use crate::extensibility::{ExtensionRegistry, ParameterContext};
use crate::http::codec::Codec;
use crate::http::request::HttpRequest;

/// Target type for primitive conversion of path/query values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Text,
    Integer,
    Float,
    Boolean,
    Json,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::Text => "text",
            ParamType::Integer => "integer",
            ParamType::Float => "float",
            ParamType::Boolean => "boolean",
            ParamType::Json => "json",
        };
        f.write_str(name)
    }
}

/// Where a parameter value is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamSource {
    Path(String),
    Query(String),
    Body,
    /// Bound by an extension `ParameterHandler` recognising this marker.
    Custom { marker: String, key: String },
}

type BodyCheck = fn(&Value) -> Result<(), serde_json::Error>;

fn check_body<T: DeserializeOwned>(value: &Value) -> Result<(), serde_json::Error> {
    T::deserialize(value).map(drop)
}

/// One declared handler parameter.
#[derive(Clone)]
pub struct Param {
    name: String,
    source: ParamSource,
    ty: ParamType,
    attributes: BTreeMap<String, String>,
    body_check: Option<BodyCheck>,
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Param")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("ty", &self.ty)
            .field("attributes", &self.attributes)
            .finish()
    }
}

impl Param {
    fn new(name: impl Into<String>, source: ParamSource) -> Self {
        Self {
            name: name.into(),
            source,
            ty: ParamType::Text,
            attributes: BTreeMap::new(),
            body_check: None,
        }
    }

    /// Bound from the path variable with the same name.
    pub fn path(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(name.clone(), ParamSource::Path(name))
    }

    /// Bound from the query parameter with the same name.
    pub fn query(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(name.clone(), ParamSource::Query(name))
    }

    /// The whole body, decoded by the codec and checked against `T`.
    pub fn body<T: DeserializeOwned>() -> Self {
        let mut param = Self::new("body", ParamSource::Body);
        param.ty = ParamType::Json;
        param.body_check = Some(check_body::<T>);
        param
    }

    /// Bound by the extension handler registered for `marker`; `key` is the
    /// marker's value (a header name, a cookie name, ...).
    pub fn custom(marker: impl Into<String>, key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(
            key.clone(),
            ParamSource::Custom {
                marker: marker.into(),
                key,
            },
        )
    }

    /// Rename the argument as seen by `Args::get`.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn of(mut self, ty: ParamType) -> Self {
        self.ty = ty;
        self
    }

    pub fn integer(self) -> Self {
        self.of(ParamType::Integer)
    }

    pub fn float(self) -> Self {
        self.of(ParamType::Float)
    }

    pub fn boolean(self) -> Self {
        self.of(ParamType::Boolean)
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &ParamSource {
        &self.source
    }

    pub fn param_type(&self) -> ParamType {
        self.ty
    }

    /// Marker name for extension-bound parameters.
    pub fn marker(&self) -> Option<&str> {
        match &self.source {
            ParamSource::Custom { marker, .. } => Some(marker),
            _ => None,
        }
    }

    /// Lookup key: path variable, query name or marker value.
    pub fn key(&self) -> &str {
        match &self.source {
            ParamSource::Path(key) | ParamSource::Query(key) => key,
            ParamSource::Custom { key, .. } => key,
            ParamSource::Body => &self.name,
        }
    }

    pub fn get_attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Binding failure; always reported to the client as `400 Bad Request`.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("parameter '{name}': cannot convert '{value}' to {expected}")]
    Conversion {
        name: String,
        value: String,
        expected: ParamType,
    },

    #[error("request body is not valid for parameter '{name}': {source}")]
    Body {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("{source}")]
    Resolver {
        marker: String,
        name: String,
        #[source]
        source: BoxError,
    },
}

/// Convert a raw path/query string into a typed value.
pub fn convert(name: &str, raw: &str, ty: ParamType) -> Result<Value, BindError> {
    let failed = || BindError::Conversion {
        name: name.to_string(),
        value: raw.to_string(),
        expected: ty,
    };

    match ty {
        ParamType::Text => Ok(Value::String(raw.to_string())),
        ParamType::Integer => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| failed()),
        ParamType::Float => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(failed),
        ParamType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(failed()),
        },
        ParamType::Json => serde_json::from_str(raw).map_err(|_| failed()),
    }
}

/// Bound handler arguments, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: Vec<(String, Value)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.push((name.into(), value));
        self
    }

    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Deserialize a bound argument. A missing argument reads as `null`, so
    /// `Option<T>` targets yield `None`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, BoxError> {
        let value = self.raw(name).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|err| format!("argument '{name}': {err}").into())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Bind every declared parameter against the request.
pub fn bind(
    params: &[Param],
    request: &HttpRequest,
    extensions: &ExtensionRegistry,
    codec: &dyn Codec,
) -> Result<Args, BindError> {
    let mut args = Args::new();

    for param in params {
        let value = match param.source() {
            ParamSource::Path(key) => match request.path_param(key) {
                Some(raw) => convert(param.name(), raw, param.param_type())?,
                None => Value::Null,
            },
            ParamSource::Query(key) => match request.query_param(key) {
                Some(raw) => convert(param.name(), raw, param.param_type())?,
                None => Value::Null,
            },
            ParamSource::Body => bind_body(param, request, codec)?,
            ParamSource::Custom { marker, .. } => {
                match extensions.find_parameter_handler(param) {
                    Some(handler) => {
                        let context = ParameterContext::new(request);
                        handler
                            .resolve(param, &context)
                            .map_err(|source| BindError::Resolver {
                                marker: marker.clone(),
                                name: param.name().to_string(),
                                source,
                            })?
                    }
                    None => {
                        tracing::debug!(
                            marker = %marker,
                            param = %param.name(),
                            "No parameter handler for marker, binding null"
                        );
                        Value::Null
                    }
                }
            }
        };
        args.values.push((param.name().to_string(), value));
    }

    Ok(args)
}

fn bind_body(param: &Param, request: &HttpRequest, codec: &dyn Codec) -> Result<Value, BindError> {
    let Some(text) = request.body().filter(|body| !body.trim().is_empty()) else {
        return Ok(Value::Null);
    };

    let body_error = |source: BoxError| BindError::Body {
        name: param.name().to_string(),
        source,
    };

    let value = codec.decode(text).map_err(body_error)?;
    if let Some(check) = param.body_check {
        check(&value).map_err(|err| body_error(err.into()))?;
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensibility::ParameterHandler;
    use crate::http::codec::JsonCodec;
    use axum::http::Method;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct NewEmployee {
        name: String,
        salary: u32,
    }

    struct TenantHandler;

    impl ParameterHandler for TenantHandler {
        fn marker(&self) -> &str {
            "Tenant"
        }

        fn resolve(&self, param: &Param, context: &ParameterContext<'_>) -> Result<Value, BoxError> {
            context
                .header(param.key())
                .map(|value| Value::String(value.to_uppercase()))
                .ok_or_else(|| format!("Required header '{}' is missing", param.key()).into())
        }
    }

    #[test]
    fn test_convert_primitives() {
        assert_eq!(convert("id", "42", ParamType::Integer).unwrap(), json!(42));
        assert_eq!(convert("r", "2.5", ParamType::Float).unwrap(), json!(2.5));
        assert_eq!(convert("f", "TRUE", ParamType::Boolean).unwrap(), json!(true));
        assert_eq!(convert("f", "0", ParamType::Boolean).unwrap(), json!(false));
        assert_eq!(convert("s", "ada", ParamType::Text).unwrap(), json!("ada"));
        assert!(matches!(
            convert("id", "forty", ParamType::Integer),
            Err(BindError::Conversion { .. })
        ));
        assert!(convert("f", "yes", ParamType::Boolean).is_err());
    }

    #[test]
    fn test_bind_path_query_and_missing_values() {
        let request = HttpRequest::new(Method::GET, "/employees/7")
            .with_path_params(vec![("id".into(), "7".into())])
            .with_query("active", "true");
        let params = [
            Param::path("id").integer(),
            Param::query("active").boolean(),
            Param::query("page").integer(),
        ];

        let args = bind(&params, &request, &ExtensionRegistry::new(), &JsonCodec).unwrap();

        assert_eq!(args.get::<i64>("id").unwrap(), 7);
        assert!(args.get::<bool>("active").unwrap());
        assert_eq!(args.get::<Option<i64>>("page").unwrap(), None);
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn test_bind_body_checks_declared_type() {
        let params = [Param::body::<NewEmployee>().named("employee")];
        let registry = ExtensionRegistry::new();

        let ok = HttpRequest::new(Method::POST, "/")
            .with_body(r#"{"name":"Ada","salary":100}"#);
        let args = bind(&params, &ok, &registry, &JsonCodec).unwrap();
        assert_eq!(args.raw("employee").unwrap()["name"], "Ada");

        let wrong_shape = HttpRequest::new(Method::POST, "/").with_body(r#"{"name":"Ada"}"#);
        assert!(matches!(
            bind(&params, &wrong_shape, &registry, &JsonCodec),
            Err(BindError::Body { .. })
        ));

        let empty = HttpRequest::new(Method::POST, "/");
        let args = bind(&params, &empty, &registry, &JsonCodec).unwrap();
        assert_eq!(args.raw("employee"), Some(&Value::Null));
    }

    #[test]
    fn test_bind_custom_marker_uses_extension() {
        let mut registry = ExtensionRegistry::new();
        registry.register_parameter_handler(Arc::new(TenantHandler));
        let params = [Param::custom("Tenant", "x-tenant").named("tenant")];

        let request = HttpRequest::new(Method::GET, "/").with_header("X-Tenant", "acme");
        let args = bind(&params, &request, &registry, &JsonCodec).unwrap();
        assert_eq!(args.get::<String>("tenant").unwrap(), "ACME");

        let missing = HttpRequest::new(Method::GET, "/");
        let err = bind(&params, &missing, &registry, &JsonCodec).unwrap_err();
        assert_eq!(err.to_string(), "Required header 'x-tenant' is missing");
    }

    #[test]
    fn test_custom_marker_without_handler_binds_null() {
        let params = [Param::custom("Unknown", "k")];
        let request = HttpRequest::new(Method::GET, "/");
        let args = bind(&params, &request, &ExtensionRegistry::new(), &JsonCodec).unwrap();
        assert_eq!(args.raw("k"), Some(&Value::Null));
    }
}
