//! Gateways: auxiliary endpoints mounted next to the dispatcher.
//!
//! # Responsibilities
//! - Let plugins contribute side endpoints (sessions, metrics, health)
//! - Stage each gateway's endpoints so a failed `initialize` leaves no trace
//! - Mount the staged endpoints on the default transport
//!
//! # Design Decisions
//! - Gateway paths are literal; they take precedence over routed paths
//! - An invalid or already-mounted path is skipped with a warning

use std::collections::HashSet;
use std::sync::Arc;

use axum::routing::MethodRouter;

use crate::error::{guard, BoxError};

/// Auxiliary endpoint provider registered by a plugin.
pub trait Gateway: Send + Sync {
    fn name(&self) -> &str;

    /// Stage endpoints. Called once, before the transport starts.
    fn initialize(&self, endpoints: &mut GatewayEndpoints) -> Result<(), BoxError>;

    fn on_start(&self) {}

    fn on_stop(&self) {}
}

/// Endpoints staged by one gateway during `initialize`.
#[derive(Default)]
pub struct GatewayEndpoints {
    staged: Vec<(String, MethodRouter)>,
}

impl GatewayEndpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&mut self, path: impl Into<String>, handler: MethodRouter) -> &mut Self {
        self.staged.push((path.into(), handler));
        self
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.staged.iter().map(|(path, _)| path.as_str())
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }
}

fn is_literal_path(path: &str) -> bool {
    path.starts_with('/') && !path.contains(['{', '}', '*'])
}

/// Gateways that initialized, plus the router holding their endpoints.
pub struct MountedGateways {
    pub router: axum::Router,
    pub active: Vec<Arc<dyn Gateway>>,
}

/// Initialize every gateway in order and mount what it staged.
pub fn mount(gateways: &[Arc<dyn Gateway>]) -> MountedGateways {
    let mut router = axum::Router::new();
    let mut mounted: HashSet<String> = HashSet::new();
    let mut active = Vec::new();

    for gateway in gateways {
        let mut endpoints = GatewayEndpoints::new();
        let outcome = guard("gateway initialize", || gateway.initialize(&mut endpoints));
        if let Err(e) = outcome {
            tracing::error!(gateway = %gateway.name(), error = %e, "Gateway failed to initialize");
            continue;
        }

        for (path, handler) in endpoints.staged {
            if !is_literal_path(&path) {
                tracing::warn!(gateway = %gateway.name(), path = %path, "Skipping invalid gateway path");
                continue;
            }
            if !mounted.insert(path.clone()) {
                tracing::warn!(gateway = %gateway.name(), path = %path, "Gateway path already mounted");
                continue;
            }
            tracing::info!(gateway = %gateway.name(), path = %path, "Gateway endpoint mounted");
            router = router.route(&path, handler);
        }
        active.push(gateway.clone());
    }

    MountedGateways { router, active }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    struct Metrics;

    impl Gateway for Metrics {
        fn name(&self) -> &str {
            "Metrics Gateway"
        }

        fn initialize(&self, endpoints: &mut GatewayEndpoints) -> Result<(), BoxError> {
            endpoints
                .route("/metrics", get(|| async { "{}" }))
                .route("metrics-without-slash", get(|| async { "" }));
            Ok(())
        }
    }

    struct Broken;

    impl Gateway for Broken {
        fn name(&self) -> &str {
            "Broken Gateway"
        }

        fn initialize(&self, endpoints: &mut GatewayEndpoints) -> Result<(), BoxError> {
            endpoints.route("/broken", get(|| async { "" }));
            Err("session store unavailable".into())
        }
    }

    struct Shadow;

    impl Gateway for Shadow {
        fn name(&self) -> &str {
            "Shadow Gateway"
        }

        fn initialize(&self, endpoints: &mut GatewayEndpoints) -> Result<(), BoxError> {
            endpoints.route("/metrics", get(|| async { "shadow" }));
            Ok(())
        }
    }

    #[test]
    fn test_literal_paths_only() {
        assert!(is_literal_path("/metrics"));
        assert!(is_literal_path("/session/info"));
        assert!(!is_literal_path("metrics"));
        assert!(!is_literal_path("/users/{id}"));
        assert!(!is_literal_path("/files/*rest"));
    }

    #[test]
    fn test_failed_initialize_is_dropped() {
        let gateways: Vec<Arc<dyn Gateway>> =
            vec![Arc::new(Broken), Arc::new(Metrics), Arc::new(Shadow)];
        let mounted = mount(&gateways);

        let names: Vec<&str> = mounted.active.iter().map(|g| g.name()).collect();
        assert_eq!(names, vec!["Metrics Gateway", "Shadow Gateway"]);
    }

    #[test]
    fn test_staging_records_paths() {
        let mut endpoints = GatewayEndpoints::new();
        Metrics.initialize(&mut endpoints).unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints.paths().next(), Some("/metrics"));
    }
}
