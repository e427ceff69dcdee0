//! A discovered plugin: contributes the `hello` middleware and a controller
//! guarded by it.

use std::sync::Arc;

use axum::http::StatusCode;
use webcore::component::{ComponentType, DirectorySource};
use webcore::error::BoxError;
use webcore::http::{HttpRequest, HttpResponse, Reply};
use webcore::middleware::{Flow, Middleware};
use webcore::plugin::{LoadContext, Plugin, StartContext};
use webcore::routing::{Args, Operation};

pub const PLUGIN_ID: &str = "com.example.plugins.hello";

#[derive(Debug, Default)]
pub struct HelloPlugin;

impl Plugin for HelloPlugin {
    fn id(&self) -> String {
        PLUGIN_ID.to_string()
    }

    fn name(&self) -> String {
        "Hello Plugin".to_string()
    }

    fn namespace(&self) -> String {
        "app::plugins::hello".to_string()
    }

    fn on_load(&self, ctx: &mut LoadContext<'_>) -> Result<(), BoxError> {
        ctx.register_middleware("hello", Arc::new(HelloMiddleware));
        Ok(())
    }

    fn on_start(&self, ctx: &StartContext<'_>) -> Result<(), BoxError> {
        let greeted = ctx.component::<HelloController>().is_some();
        tracing::info!(plugin = PLUGIN_ID, controller = greeted, "Hello plugin started");
        Ok(())
    }
}

/// Rejects requests without a non-empty `hello` header.
#[derive(Debug, Default)]
pub struct HelloMiddleware;

impl Middleware for HelloMiddleware {
    fn handle(&self, request: &HttpRequest) -> Result<Flow, BoxError> {
        match request.header("hello") {
            Some(value) if !value.is_empty() => Ok(Flow::Continue),
            _ => Ok(Flow::Respond(HttpResponse::error(
                StatusCode::UNAUTHORIZED,
                "Invalid",
            ))),
        }
    }
}

#[derive(Debug, Default)]
pub struct HelloController;

impl HelloController {
    fn greet(&self, _: &Args) -> Result<Reply, BoxError> {
        Reply::json(&serde_json::json!({
            "plugin": "Hello Plugin",
            "message": "Hello from plugin",
        }))
    }
}

pub fn source() -> DirectorySource {
    DirectorySource::new()
        .with(
            ComponentType::of::<HelloPlugin>()
                .namespace("app::plugins::hello")
                .plugin()
                .build(),
        )
        .with(
            ComponentType::of::<HelloController>()
                .namespace("app::plugins::hello::controller")
                .controller("/api/plugin")
                .default_constructor()
                .operation(
                    Operation::new("greet", HelloController::greet)
                        .get("")
                        .middleware("hello"),
                )
                .build(),
        )
}
