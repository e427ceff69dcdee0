//! Request counting: a response customizer feeds a counter that a gateway
//! exposes at `/metrics`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::routing::get;
use axum::Json;
use serde::Serialize;
use webcore::error::BoxError;
use webcore::plugin::{LoadContext, Plugin};
use webcore::server::{Gateway, GatewayEndpoints, ServerConfiguration};

#[derive(Debug)]
pub struct RequestStats {
    started: Instant,
    requests: AtomicU64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub uptime: u64,
    pub requests: u64,
    pub requests_per_second: f64,
}

impl RequestStats {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            requests: AtomicU64::new(0),
        }
    }

    fn record(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let elapsed = self.started.elapsed();
        let requests = self.requests.load(Ordering::Relaxed);
        let secs = elapsed.as_secs_f64();
        StatsSnapshot {
            uptime: elapsed.as_secs(),
            requests,
            requests_per_second: if secs > 0.0 { requests as f64 / secs } else { 0.0 },
        }
    }
}

pub struct MetricsPlugin {
    stats: Arc<RequestStats>,
}

impl Default for MetricsPlugin {
    fn default() -> Self {
        Self {
            stats: Arc::new(RequestStats::new()),
        }
    }
}

impl Plugin for MetricsPlugin {
    fn id(&self) -> String {
        "com.example.plugins.metrics".to_string()
    }

    fn name(&self) -> String {
        "Metrics Plugin".to_string()
    }

    fn on_load(&self, ctx: &mut LoadContext<'_>) -> Result<(), BoxError> {
        ctx.register_gateway(Arc::new(MetricsGateway {
            stats: self.stats.clone(),
        }));
        Ok(())
    }

    fn server_configuration(&self) -> Option<ServerConfiguration> {
        let stats = self.stats.clone();
        Some(
            ServerConfiguration::new().customize_response(move |response, _request| {
                stats.record();
                response.set_header("X-Powered-By", "webcore");
            }),
        )
    }
}

struct MetricsGateway {
    stats: Arc<RequestStats>,
}

impl Gateway for MetricsGateway {
    fn name(&self) -> &str {
        "metrics"
    }

    fn initialize(&self, endpoints: &mut GatewayEndpoints) -> Result<(), BoxError> {
        let stats = self.stats.clone();
        endpoints.route(
            "/metrics",
            get(move || {
                let stats = stats.clone();
                async move { Json(stats.snapshot()) }
            }),
        );
        Ok(())
    }

    fn on_start(&self) {
        tracing::info!(path = "/metrics", "Metrics gateway online");
    }
}
