//! The sample application served by the `webcore` binary.

pub mod employees;
pub mod hello;
pub mod metrics;

use std::sync::Arc;

use webcore::extensibility::AnnotationsPlugin;
use webcore::middleware::cors::CorsMiddleware;
use webcore::{Application, RuntimeConfig};

pub fn application(config: RuntimeConfig) -> Application {
    Application::new(config)
        .source(employees::source())
        .source(hello::source())
        .plugin(AnnotationsPlugin)
        .plugin(metrics::MetricsPlugin::default())
        .middleware("cors", Arc::new(CorsMiddleware::new()))
}
