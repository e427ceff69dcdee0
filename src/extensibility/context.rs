//! Read-only request view handed to parameter handlers.

use std::collections::HashMap;

use axum::http::HeaderMap;

use crate::http::request::HttpRequest;

#[derive(Debug, Clone, Copy)]
pub struct ParameterContext<'a> {
    request: &'a HttpRequest,
}

impl<'a> ParameterContext<'a> {
    pub fn new(request: &'a HttpRequest) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &'a HttpRequest {
        self.request
    }

    pub fn path_param(&self, name: &str) -> Option<&'a str> {
        self.request.path_param(name)
    }

    pub fn query_param(&self, name: &str) -> Option<&'a str> {
        self.request.query_param(name)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.request.header(name)
    }

    pub fn headers(&self) -> &'a HeaderMap {
        self.request.headers()
    }

    pub fn query_params(&self) -> &'a HashMap<String, String> {
        self.request.query_params()
    }

    pub fn body(&self) -> Option<&'a str> {
        self.request.body()
    }

    /// Value of a cookie from the `Cookie` header.
    pub fn cookie(&self, name: &str) -> Option<&'a str> {
        self.header("cookie")?
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }
}
