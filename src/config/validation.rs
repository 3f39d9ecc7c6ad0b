//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals and timeouts > 0)
//! - Validate that bind addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LbConfig → Result<(), Vec<ValidationError>>
//! - Backend addresses are only checked for emptiness; resolution happens at dial time

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::LbConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_config(config: &LbConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }

    for (i, backend) in config.backends.iter().enumerate() {
        if backend.address.trim().is_empty() {
            errors.push(ValidationError::new(format!("backends[{i}].address"), "must not be empty"));
        }
    }

    if config.health_check.interval_ms == 0 {
        errors.push(ValidationError::new("health_check.interval_ms", "must be greater than 0"));
    }
    if config.health_check.timeout_ms == 0 {
        errors.push(ValidationError::new("health_check.timeout_ms", "must be greater than 0"));
    }
    if config.timeouts.connect_ms == 0 {
        errors.push(ValidationError::new("timeouts.connect_ms", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    let adaptive = &config.routing.adaptive;
    if !adaptive.error_rate_threshold.is_finite() || adaptive.error_rate_threshold <= 0.0 {
        errors.push(ValidationError::new(
            "routing.adaptive.error_rate_threshold",
            "must be a positive number",
        ));
    }
    if adaptive.max_conns_threshold < 0 {
        errors.push(ValidationError::new("routing.adaptive.max_conns_threshold", "must not be negative"));
    }
    if adaptive.decision_log_capacity == 0 {
        errors.push(ValidationError::new(
            "routing.adaptive.decision_log_capacity",
            "must be greater than 0",
        ));
    }

    if config.observability.metrics_enabled {
        check_socket_addr(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }
    if config.admin.enabled {
        check_socket_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("'{value}' is not a valid socket address")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::BackendConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&LbConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = LbConfig::default();
        config.listener.bind_address = "not-an-addr".into();
        config.backends.push(BackendConfig {
            address: " ".into(),
            weight: 1,
        });
        config.routing.adaptive.error_rate_threshold = f64::NAN;
        config.routing.adaptive.decision_log_capacity = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "backends[0].address",
                "routing.adaptive.error_rate_threshold",
                "routing.adaptive.decision_log_capacity",
            ]
        );
    }

    #[test]
    fn test_disabled_endpoints_are_not_checked() {
        let mut config = LbConfig::default();
        config.admin.enabled = false;
        config.admin.bind_address = String::new();
        config.observability.metrics_enabled = false;
        config.observability.metrics_address = String::new();
        assert!(validate_config(&config).is_ok());
    }
}
