//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Detect duplicate listeners
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SyncConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::SyncConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
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

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &SyncConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.registry.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "registry.base_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("registry.base_url", e.to_string())),
    }
    if config.registry.timeout_secs == 0 {
        errors.push(ValidationError::new("registry.timeout_secs", "must be greater than 0"));
    }

    if let Some(auth) = &config.auth {
        if let Err(e) = Url::parse(&auth.token_url) {
            errors.push(ValidationError::new("auth.token_url", e.to_string()));
        }
        if auth.client_id.is_empty() {
            errors.push(ValidationError::new("auth.client_id", "must not be empty"));
        }
        if auth.client_secret_env.is_empty() {
            errors.push(ValidationError::new("auth.client_secret_env", "must not be empty"));
        }
    } else if config.registry.token_env.is_empty() {
        errors.push(ValidationError::new(
            "registry.token_env",
            "must not be empty when [auth] is absent",
        ));
    }

    if config.inventory.path.is_empty() {
        errors.push(ValidationError::new("inventory.path", "must not be empty"));
    }
    if config.inventory.instance_id_annotation.is_empty() {
        errors.push(ValidationError::new("inventory.instance_id_annotation", "must not be empty"));
    }

    let r = &config.reconcile;
    if r.interval_secs == 0 {
        errors.push(ValidationError::new("reconcile.interval_secs", "must be greater than 0"));
    }
    if r.backoff_base_ms == 0 {
        errors.push(ValidationError::new("reconcile.backoff_base_ms", "must be greater than 0"));
    }
    if r.backoff_base_ms > r.backoff_max_ms {
        errors.push(ValidationError::new(
            "reconcile.backoff_max_ms",
            "must not be less than backoff_base_ms",
        ));
    }

    if config.listeners.is_empty() {
        errors.push(ValidationError::new("listeners", "at least one listener is required"));
    }
    let mut seen = HashSet::new();
    for (i, listener) in config.listeners.iter().enumerate() {
        if listener.load_balancer_id.is_empty() {
            errors.push(ValidationError::new(
                format!("listeners[{}].load_balancer_id", i),
                "must not be empty",
            ));
        }
        if listener.listener_id.is_empty() {
            errors.push(ValidationError::new(
                format!("listeners[{}].listener_id", i),
                "must not be empty",
            ));
        }
        if listener.port == 0 {
            errors.push(ValidationError::new(
                format!("listeners[{}].port", i),
                "must be in 1..=65535",
            ));
        }
        if !seen.insert((&listener.load_balancer_id, &listener.listener_id)) {
            errors.push(ValidationError::new(
                format!("listeners[{}]", i),
                format!(
                    "duplicate listener {}/{}",
                    listener.load_balancer_id, listener.listener_id
                ),
            ));
        }
    }

    let obs = &config.observability;
    if !LOG_LEVELS.contains(&obs.log_level.to_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", obs.log_level),
        ));
    }
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", obs.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
