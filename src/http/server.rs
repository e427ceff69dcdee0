//! Default HTTP transport.
//!
//! # Responsibilities
//! - Create the Axum app: gateway endpoints first, router dispatch as fallback
//! - Wire up middleware (tracing, request ID, body limit, timeout)
//! - Buffer the body and build the request (plugin parser or default parse)
//! - Run the synchronous router on the blocking pool
//! - Apply the response customizer and write the response
//!
//! # Design Decisions
//! - Handlers and middlewares are synchronous user code; they never run on
//!   the async worker threads
//! - A failure anywhere in the pipeline becomes a JSON 500, never a dropped
//!   connection

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::LimitsConfig;
use crate::error::guard;
use crate::http::request::UuidRequestId;
use crate::http::response::HttpResponse;
use crate::routing::Router;
use crate::server::gateway::{self, Gateway, MountedGateways};
use crate::server::{RawRequest, ServerCustomizer};

/// Application state injected into the dispatch handler.
#[derive(Clone)]
struct AppState {
    router: Arc<Router>,
    customizer: Arc<ServerCustomizer>,
    max_body_bytes: usize,
}

/// The default transport around a finished router.
pub struct HttpServer {
    app: axum::Router,
    gateways: Vec<Arc<dyn Gateway>>,
}

impl HttpServer {
    /// Build the app. Gateways registered on `customizer` are initialized here.
    pub fn new(router: Arc<Router>, customizer: Arc<ServerCustomizer>, limits: &LimitsConfig) -> Self {
        let MountedGateways {
            router: gateway_routes,
            active,
        } = gateway::mount(customizer.gateways());

        let state = AppState {
            router,
            customizer,
            max_body_bytes: limits.max_body_bytes,
        };

        Self {
            app: Self::build_app(limits, state, gateway_routes),
            gateways: active,
        }
    }

    #[allow(deprecated)]
    fn build_app(limits: &LimitsConfig, state: AppState, gateway_routes: axum::Router) -> axum::Router {
        axum::Router::new()
            .fallback(dispatch)
            .with_state(state.clone())
            .merge(gateway_routes)
            .layer(RequestBodyLimitLayer::new(state.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(limits.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// Gateways whose `initialize` succeeded, in registration order.
    pub fn gateways(&self) -> &[Arc<dyn Gateway>] {
        &self.gateways
    }

    /// The layered Axum app, for transports that serve it themselves.
    pub fn into_app(self) -> axum::Router {
        self.app
    }

    /// Serve until a shutdown signal is received.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Route every request that no gateway claimed through the router.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %parts.uri.path(), error = %e, "Failed to read request body");
            return HttpResponse::error(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
                .into_response();
        }
    };

    let raw = RawRequest::new(parts, body);
    let request = match guard("request customizer", || state.customizer.customize_request(&raw)) {
        Ok(Some(request)) => request,
        Ok(None) => raw.parse(),
        Err(e) => {
            tracing::error!(path = %raw.uri().path(), error = %e, "Request customization failed");
            return HttpResponse::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Request customization failed: {e}"),
            )
            .into_response();
        }
    };

    tracing::debug!(
        request_id = request.request_id().unwrap_or("unknown"),
        method = %request.method(),
        path = %request.path(),
        "Dispatching request"
    );

    let router = state.router.clone();
    let dispatched = request.clone();
    let mut response = match tokio::task::spawn_blocking(move || router.handle_request(dispatched)).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(path = %request.path(), error = %e, "Dispatch task failed");
            HttpResponse::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    };

    let customized = guard("response customizer", || {
        state.customizer.customize_response(&mut response, &request);
        Ok(())
    });
    if let Err(e) = customized {
        tracing::error!(path = %request.path(), error = %e, "Response customization failed");
        return HttpResponse::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            .into_response();
    }

    response.into_response()
}
