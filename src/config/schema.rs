//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the runtime.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for an application.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Default transport settings (bind host and port).
    pub server: ServerConfig,

    /// Route compilation settings.
    pub routing: RoutingConfig,

    /// Request limits applied by the default transport.
    pub limits: LimitsConfig,

    /// Logging settings.
    pub logging: LoggingConfig,

    /// Application namespace settings.
    pub application: ApplicationConfig,
}

impl RuntimeConfig {
    /// Bind address for the default transport, before plugin claims.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Default transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host or IP to bind (e.g., "0.0.0.0").
    pub host: String,

    /// Port to bind.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Base path for controllers that do not declare one.
    pub default_base_path: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_base_path: "/api".to_string(),
        }
    }
}

/// Limits enforced by the default transport.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            request_timeout_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub filter: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "webcore=info,tower_http=info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Application namespace configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Display name used in startup logs.
    pub name: String,

    /// Root namespace scanned for components (e.g., "app").
    pub namespace: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "webcore application".to_string(),
            namespace: "app".to_string(),
        }
    }
}
