//! Ready-made extension handlers.
//!
//! - `ApiController` marker: a routed component whose base path is built from
//!   its `path` (default `/api`) and `version` (default `v1`) attributes
//! - `Header` parameter: binds a request header, failing when a required
//!   header is absent
//! - `Cookie` parameter: binds one cookie from the `Cookie` header
//!
//! `AnnotationsPlugin` installs all three.

use std::sync::Arc;

use serde_json::Value;

use crate::component::ComponentType;
use crate::error::BoxError;
use crate::extensibility::{ComponentHandler, ParameterContext, ParameterHandler};
use crate::plugin::{LoadContext, Plugin};
use crate::routing::params::{convert, Param};

pub const API_CONTROLLER: &str = "ApiController";
pub const HEADER: &str = "Header";
pub const COOKIE: &str = "Cookie";

#[derive(Debug, Default, Clone, Copy)]
pub struct ApiControllerHandler;

impl ComponentHandler for ApiControllerHandler {
    fn marker(&self) -> &str {
        API_CONTROLLER
    }

    fn is_controller(&self, _ty: &ComponentType) -> bool {
        true
    }

    fn base_path(&self, ty: &ComponentType) -> Option<String> {
        let marker = ty.marker(API_CONTROLLER)?;
        let path = marker.attribute("path").unwrap_or("/api");
        match marker.attribute("version").unwrap_or("v1") {
            "" => None,
            version => Some(format!("{path}/{version}")),
        }
    }
}

/// Binds `Param::custom("Header", "<header name>")`. The `required`
/// attribute defaults to `true`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderParameterHandler;

impl ParameterHandler for HeaderParameterHandler {
    fn marker(&self) -> &str {
        HEADER
    }

    fn resolve(&self, param: &Param, context: &ParameterContext<'_>) -> Result<Value, BoxError> {
        let required = param
            .get_attribute("required")
            .map(|flag| !flag.eq_ignore_ascii_case("false"))
            .unwrap_or(true);

        match context.header(param.key()) {
            Some(raw) => Ok(convert(param.name(), raw, param.param_type())?),
            None if required => {
                Err(format!("Required header '{}' is missing", param.key()).into())
            }
            None => Ok(Value::Null),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CookieParameterHandler;

impl ParameterHandler for CookieParameterHandler {
    fn marker(&self) -> &str {
        COOKIE
    }

    fn resolve(&self, param: &Param, context: &ParameterContext<'_>) -> Result<Value, BoxError> {
        Ok(context
            .cookie(param.key())
            .map(|value| Value::String(value.to_string()))
            .unwrap_or(Value::Null))
    }
}

/// Registers the handlers above as a plugin.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnnotationsPlugin;

impl Plugin for AnnotationsPlugin {
    fn id(&self) -> String {
        "webcore.annotations".to_string()
    }

    fn name(&self) -> String {
        "Custom Annotations".to_string()
    }

    fn on_load(&self, ctx: &mut LoadContext<'_>) -> Result<(), BoxError> {
        ctx.register_component_handler(Arc::new(ApiControllerHandler));
        ctx.register_parameter_handler(Arc::new(HeaderParameterHandler));
        ctx.register_parameter_handler(Arc::new(CookieParameterHandler));
        Ok(())
    }
}
