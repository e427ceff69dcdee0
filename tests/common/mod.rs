//! Shared fixtures for the integration tests: a small application and a
//! server harness bound to an ephemeral port.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use webcore::component::{ComponentType, DirectorySource, Marker};
use webcore::error::{BoxError, BootstrapError};
use webcore::extensibility::handlers::{API_CONTROLLER, HEADER};
use webcore::extensibility::AnnotationsPlugin;
use webcore::http::{HttpRequest, HttpResponse, Reply};
use webcore::middleware::{CorsMiddleware, Flow, Middleware};
use webcore::plugin::{LoadContext, Plugin};
use webcore::routing::{Args, Operation, Param};
use webcore::{Application, RuntimeConfig, Shutdown};

#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[derive(Debug, Deserialize)]
pub struct NewGreeting {
    pub name: String,
}

pub struct GreetingController {
    counter: Arc<Counter>,
}

#[derive(Debug, Default)]
pub struct TenantController;

#[derive(Debug, Default)]
pub struct SecretController;

/// Requires `authorization: Bearer secret`.
#[derive(Debug, Default)]
pub struct GuardPlugin;

impl Plugin for GuardPlugin {
    fn id(&self) -> String {
        "tests.guard".to_string()
    }

    fn namespace(&self) -> String {
        "app::plugins::guard".to_string()
    }

    fn on_load(&self, ctx: &mut LoadContext<'_>) -> Result<(), BoxError> {
        let token: Arc<dyn Middleware> = Arc::new(|request: &HttpRequest| -> Result<Flow, BoxError> {
            match request.header("authorization") {
                Some("Bearer secret") => Ok(Flow::Continue),
                _ => Ok(Flow::Respond(HttpResponse::error(
                    StatusCode::UNAUTHORIZED,
                    "Invalid",
                ))),
            }
        });
        ctx.register_middleware("token", token);
        Ok(())
    }
}

pub fn app_source() -> DirectorySource {
    DirectorySource::new()
        .with(
            ComponentType::of::<Counter>()
                .namespace("app::service")
                .service()
                .default_constructor()
                .build(),
        )
        .with(
            ComponentType::of::<GreetingController>()
                .namespace("app::controller")
                .controller("/api/greetings")
                .constructor(|resolver| {
                    Ok(GreetingController {
                        counter: resolver.resolve::<Counter>()?,
                    })
                })
                .operation(
                    Operation::new("hello", |_: &GreetingController, args: &Args| {
                        let name: String = args.get("name")?;
                        let punctuation: Option<String> = args.get("punctuation")?;
                        Ok(format!("Hello, {name}{}", punctuation.unwrap_or_default()))
                    })
                    .get("/{name}")
                    .param(Param::path("name"))
                    .param(Param::query("punctuation")),
                )
                .operation(
                    Operation::new("create", |this: &GreetingController, args: &Args| {
                        let greeting: NewGreeting = args.get("body")?;
                        Reply::json(&serde_json::json!({
                            "id": this.counter.next(),
                            "name": greeting.name,
                        }))
                    })
                    .post("")
                    .param(Param::body::<NewGreeting>())
                    .status(StatusCode::CREATED),
                )
                .operation(
                    Operation::new("remove", |_: &GreetingController, args: &Args| {
                        let _id: i64 = args.get("id")?;
                        Ok(())
                    })
                    .delete("/{id}")
                    .param(Param::path("id").integer()),
                )
                .operation(
                    Operation::new("boom", |_: &GreetingController, _: &Args| -> Result<Reply, BoxError> {
                        panic!("handler exploded")
                    })
                    .get("/boom/now"),
                )
                .build(),
        )
        .with(
            ComponentType::of::<TenantController>()
                .namespace("app::controller")
                .marker(Marker::custom(API_CONTROLLER))
                .middleware("cors")
                .default_constructor()
                .operation(
                    Operation::new("tenant", |_: &TenantController, args: &Args| {
                        let tenant: String = args.get("tenant")?;
                        Ok(tenant)
                    })
                    .get("/tenant")
                    .param(Param::custom(HEADER, "x-tenant").named("tenant")),
                )
                .build(),
        )
}

pub fn plugin_source() -> DirectorySource {
    DirectorySource::new()
        .with(
            ComponentType::of::<GuardPlugin>()
                .namespace("app::plugins::guard")
                .plugin()
                .build(),
        )
        .with(
            ComponentType::of::<SecretController>()
                .namespace("app::plugins::guard")
                .controller("/api/secret")
                .middleware("token")
                .default_constructor()
                .operation(Operation::new("reveal", |_: &SecretController, _: &Args| Ok("42")).get(""))
                .build(),
        )
}

/// The fixture application without any transport-level plugins.
pub fn application() -> Application {
    Application::new(RuntimeConfig::default())
        .source(app_source())
        .source(plugin_source())
        .plugin(AnnotationsPlugin)
        .middleware("cors", Arc::new(CorsMiddleware::new()))
}

/// A runtime serving the default transport on `127.0.0.1:0`.
pub struct TestServer {
    pub base: String,
    shutdown: Shutdown,
    handle: JoinHandle<Result<(), BootstrapError>>,
}

impl TestServer {
    pub async fn start(app: Application) -> Self {
        let runtime = app.bootstrap().expect("bootstrap should succeed");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = runtime.shutdown_handle();
        let handle = tokio::spawn(runtime.serve(listener));

        Self {
            base: format!("http://{addr}"),
            shutdown,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn stop(self) -> Result<(), BootstrapError> {
        self.shutdown.trigger();
        self.handle.await.expect("server task should not panic")
    }
}
