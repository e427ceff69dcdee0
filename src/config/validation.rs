//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Validate path and namespace shapes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RuntimeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::RuntimeConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g., "server.port").
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every semantic rule and collect all failures.
pub fn validate_config(config: &RuntimeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.host.trim().is_empty() {
        errors.push(ValidationError::new("server.host", "must not be empty"));
    }
    if config.server.port == 0 {
        errors.push(ValidationError::new("server.port", "must be between 1 and 65535"));
    }

    let base = &config.routing.default_base_path;
    if !base.is_empty() && !base.starts_with('/') {
        errors.push(ValidationError::new(
            "routing.default_base_path",
            format!("'{}' must start with '/'", base),
        ));
    }
    if base.contains('{') || base.contains('}') {
        errors.push(ValidationError::new(
            "routing.default_base_path",
            "must not contain path variables",
        ));
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::new("limits.max_body_bytes", "must be greater than 0"));
    }
    if config.limits.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "limits.request_timeout_secs",
            "must be greater than 0",
        ));
    }

    let namespace = &config.application.namespace;
    if namespace.trim().is_empty() {
        errors.push(ValidationError::new("application.namespace", "must not be empty"));
    } else if namespace.split("::").any(|segment| segment.is_empty()) {
        errors.push(ValidationError::new(
            "application.namespace",
            format!("'{}' contains an empty segment", namespace),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&RuntimeConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = RuntimeConfig::default();
        config.server.port = 0;
        config.server.host = " ".into();
        config.routing.default_base_path = "api".into();
        config.limits.request_timeout_secs = 0;
        config.application.namespace = "app::::controllers".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "server.host",
                "server.port",
                "routing.default_base_path",
                "limits.request_timeout_secs",
                "application.namespace",
            ]
        );
    }

    #[test]
    fn test_empty_base_path_is_allowed() {
        let mut config = RuntimeConfig::default();
        config.routing.default_base_path = String::new();
        assert!(validate_config(&config).is_ok());
    }
}
