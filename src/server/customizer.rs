//! Exclusive server customisation claims and the gateway list.
//!
//! # Design Decisions
//! - Each axis (port, host, request, response) has at most one owner
//! - First claim wins; a later claim on the same axis is recorded as a
//!   conflict, logged and discarded without failing startup
//! - Any number of gateways may be registered; the same instance is kept once

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::error::BoxError;
use crate::http::request::HttpRequest;
use crate::http::response::HttpResponse;
use crate::server::configuration::{
    RawRequest, RequestCustomizer, ResponseCustomizer, ServerConfiguration,
};
use crate::server::gateway::Gateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClaimAxis {
    Port,
    Host,
    Request,
    Response,
}

impl fmt::Display for ClaimAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimAxis::Port => f.write_str("port"),
            ClaimAxis::Host => f.write_str("host"),
            ClaimAxis::Request => f.write_str("request parsing"),
            ClaimAxis::Response => f.write_str("response handling"),
        }
    }
}

/// A rejected second claim on an axis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "{axis} is already customized by plugin '{owner}'; claim from '{claimant}' discarded. \
     Only one plugin can customize the {axis}"
)]
pub struct ClaimConflict {
    pub axis: ClaimAxis,
    pub owner: String,
    pub claimant: String,
}

struct Claim<T> {
    owner: String,
    value: T,
}

#[derive(Default)]
pub struct ServerCustomizer {
    port: Option<Claim<u16>>,
    host: Option<Claim<String>>,
    request: Option<Claim<RequestCustomizer>>,
    response: Option<Claim<ResponseCustomizer>>,
    conflicts: Vec<ClaimConflict>,
    gateways: Vec<Arc<dyn Gateway>>,
}

impl fmt::Debug for ServerCustomizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gateways: Vec<&str> = self.gateways.iter().map(|g| g.name()).collect();
        f.debug_struct("ServerCustomizer")
            .field("port", &self.port())
            .field("host", &self.host())
            .field("request", &self.owner(ClaimAxis::Request))
            .field("response", &self.owner(ClaimAxis::Response))
            .field("conflicts", &self.conflicts)
            .field("gateways", &gateways)
            .finish()
    }
}

fn claim<T>(
    slot: &mut Option<Claim<T>>,
    axis: ClaimAxis,
    value: T,
    plugin: &str,
) -> Result<(), ClaimConflict> {
    if let Some(existing) = slot {
        return Err(ClaimConflict {
            axis,
            owner: existing.owner.clone(),
            claimant: plugin.to_string(),
        });
    }
    *slot = Some(Claim {
        owner: plugin.to_string(),
        value,
    });
    tracing::info!(axis = %axis, plugin = %plugin, "Server customization registered");
    Ok(())
}

impl ServerCustomizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim every axis `config` sets on behalf of `plugin`. Conflicts are
    /// recorded and logged; the returned list holds the ones from this call.
    pub fn apply(&mut self, config: &ServerConfiguration, plugin: &str) -> Vec<ClaimConflict> {
        let mut results = Vec::new();
        if let Some(port) = config.port_claim() {
            results.push(self.claim_port(port, plugin));
        }
        if let Some(host) = config.host_claim() {
            results.push(self.claim_host(host, plugin));
        }
        if let Some(customizer) = config.request_customizer() {
            results.push(self.claim_request(customizer.clone(), plugin));
        }
        if let Some(customizer) = config.response_customizer() {
            results.push(self.claim_response(customizer.clone(), plugin));
        }
        results.into_iter().filter_map(Result::err).collect()
    }

    pub fn claim_port(&mut self, port: u16, plugin: &str) -> Result<(), ClaimConflict> {
        let result = claim(&mut self.port, ClaimAxis::Port, port, plugin);
        self.record(result)
    }

    pub fn claim_host(&mut self, host: &str, plugin: &str) -> Result<(), ClaimConflict> {
        let result = claim(&mut self.host, ClaimAxis::Host, host.to_string(), plugin);
        self.record(result)
    }

    pub fn claim_request(
        &mut self,
        customizer: RequestCustomizer,
        plugin: &str,
    ) -> Result<(), ClaimConflict> {
        let result = claim(&mut self.request, ClaimAxis::Request, customizer, plugin);
        self.record(result)
    }

    pub fn claim_response(
        &mut self,
        customizer: ResponseCustomizer,
        plugin: &str,
    ) -> Result<(), ClaimConflict> {
        let result = claim(&mut self.response, ClaimAxis::Response, customizer, plugin);
        self.record(result)
    }

    fn record(&mut self, result: Result<(), ClaimConflict>) -> Result<(), ClaimConflict> {
        if let Err(conflict) = &result {
            tracing::warn!(
                axis = %conflict.axis,
                owner = %conflict.owner,
                claimant = %conflict.claimant,
                "Server customization conflict"
            );
            self.conflicts.push(conflict.clone());
        }
        result
    }

    /// Returns false when this exact gateway instance is already registered.
    pub fn register_gateway(&mut self, gateway: Arc<dyn Gateway>) -> bool {
        if self.gateways.iter().any(|g| Arc::ptr_eq(g, &gateway)) {
            return false;
        }
        tracing::info!(gateway = %gateway.name(), "Gateway registered");
        self.gateways.push(gateway);
        true
    }

    pub fn port(&self) -> Option<u16> {
        self.port.as_ref().map(|c| c.value)
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_ref().map(|c| c.value.as_str())
    }

    /// Plugin id holding the claim on `axis`.
    pub fn owner(&self, axis: ClaimAxis) -> Option<&str> {
        match axis {
            ClaimAxis::Port => self.port.as_ref().map(|c| c.owner.as_str()),
            ClaimAxis::Host => self.host.as_ref().map(|c| c.owner.as_str()),
            ClaimAxis::Request => self.request.as_ref().map(|c| c.owner.as_str()),
            ClaimAxis::Response => self.response.as_ref().map(|c| c.owner.as_str()),
        }
    }

    pub fn request_customizer(&self) -> Option<RequestCustomizer> {
        self.request.as_ref().map(|c| c.value.clone())
    }

    pub fn response_customizer(&self) -> Option<ResponseCustomizer> {
        self.response.as_ref().map(|c| c.value.clone())
    }

    /// Parse through the request claim, if any. `Ok(None)` means default parsing.
    pub fn customize_request(&self, raw: &RawRequest) -> Result<Option<HttpRequest>, BoxError> {
        match &self.request {
            Some(claim) => (claim.value)(raw),
            None => Ok(None),
        }
    }

    pub fn customize_response(&self, response: &mut HttpResponse, request: &HttpRequest) {
        if let Some(claim) = &self.response {
            (claim.value)(response, request);
        }
    }

    pub fn conflicts(&self) -> &[ClaimConflict] {
        &self.conflicts
    }

    pub fn gateways(&self) -> &[Arc<dyn Gateway>] {
        &self.gateways
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::gateway::GatewayEndpoints;
    use axum::http::Method;

    struct Named(&'static str);

    impl Gateway for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn initialize(&self, _endpoints: &mut GatewayEndpoints) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[test]
    fn test_first_claim_wins_per_axis() {
        let mut customizer = ServerCustomizer::new();

        let first = ServerConfiguration::new().port(9090).host("localhost");
        assert!(customizer.apply(&first, "com.example.first").is_empty());

        let second = ServerConfiguration::new().port(7070);
        let conflicts = customizer.apply(&second, "com.example.second");

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].axis, ClaimAxis::Port);
        assert_eq!(conflicts[0].owner, "com.example.first");
        assert_eq!(conflicts[0].claimant, "com.example.second");
        assert_eq!(customizer.port(), Some(9090));
        assert_eq!(customizer.host(), Some("localhost"));
        assert_eq!(customizer.conflicts().len(), 1);
    }

    #[test]
    fn test_disjoint_axes_do_not_conflict() {
        let mut customizer = ServerCustomizer::new();
        customizer.apply(&ServerConfiguration::new().port(9090), "a");
        let conflicts = customizer.apply(
            &ServerConfiguration::new()
                .host("127.0.0.1")
                .customize_response(|response, _| response.set_header("x-served-by", "b")),
            "b",
        );

        assert!(conflicts.is_empty());
        assert_eq!(customizer.owner(ClaimAxis::Port), Some("a"));
        assert_eq!(customizer.owner(ClaimAxis::Host), Some("b"));
        assert_eq!(customizer.owner(ClaimAxis::Response), Some("b"));
        assert_eq!(customizer.owner(ClaimAxis::Request), None);
    }

    #[test]
    fn test_request_and_response_customization() {
        let mut customizer = ServerCustomizer::new();
        customizer
            .claim_request(
                Arc::new(|raw: &RawRequest| {
                    Ok(Some(raw.parse().with_header("x-parsed-by", "plugin")))
                }),
                "parser",
            )
            .unwrap();
        customizer
            .claim_response(
                Arc::new(|response: &mut HttpResponse, _: &HttpRequest| {
                    response.set_header("x-served-by", "plugin");
                }),
                "decorator",
            )
            .unwrap();

        let (parts, ()) = axum::http::Request::builder()
            .method(Method::GET)
            .uri("/x")
            .body(())
            .unwrap()
            .into_parts();
        let raw = RawRequest::new(parts, Default::default());
        let request = customizer.customize_request(&raw).unwrap().unwrap();
        assert_eq!(request.header("x-parsed-by"), Some("plugin"));

        let mut response = HttpResponse::ok();
        customizer.customize_response(&mut response, &request);
        assert_eq!(response.header_value("x-served-by"), Some("plugin"));
    }

    #[test]
    fn test_second_request_claim_is_rejected() {
        let mut customizer = ServerCustomizer::new();
        let parser: RequestCustomizer = Arc::new(|_: &RawRequest| Ok(None));
        customizer.claim_request(parser.clone(), "a").unwrap();

        let conflict = customizer.claim_request(parser, "b").unwrap_err();
        assert_eq!(conflict.axis, ClaimAxis::Request);
        assert!(conflict.to_string().contains("request parsing"));
    }

    #[test]
    fn test_gateways_keep_order_and_dedupe_instances() {
        let mut customizer = ServerCustomizer::new();
        let sessions: Arc<dyn Gateway> = Arc::new(Named("Session Gateway"));
        let metrics: Arc<dyn Gateway> = Arc::new(Named("Metrics Gateway"));

        assert!(customizer.register_gateway(sessions.clone()));
        assert!(customizer.register_gateway(metrics));
        assert!(!customizer.register_gateway(sessions));

        let names: Vec<&str> = customizer.gateways().iter().map(|g| g.name()).collect();
        assert_eq!(names, vec!["Session Gateway", "Metrics Gateway"]);
    }
}
