//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate listener settings (ports, address, TLS material)
//! - Detect containers competing for the same socket
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure: no file or socket access
//! - Containers re-run `validate_listener` at start, after setters may have
//!   changed the listener

use std::collections::HashSet;
use std::net::IpAddr;

use thiserror::Error;

use crate::config::schema::{ListenerConfig, ServerConfig};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{container}: no ports configured")]
    NoPorts { container: String },

    #[error("{container}: invalid listen address {address:?}")]
    InvalidAddress { container: String, address: String },

    #[error("{container}: TLS enabled but {missing} is empty")]
    MissingTlsMaterial { container: String, missing: &'static str },

    #[error("{container}: {address}:{port} is already used by {other}")]
    DuplicatePort {
        container: String,
        other: String,
        address: String,
        port: u16,
    },

    #[error("{container}: max_body_bytes must be greater than zero")]
    ZeroBodyLimit { container: String },

    #[error("shutdown.timeout_ms must be greater than zero")]
    ZeroShutdownTimeout,
}

/// Check one listener. `container` names it in the errors.
pub fn validate_listener(container: &str, listener: &ListenerConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if listener.ports.is_empty() {
        errors.push(ValidationError::NoPorts {
            container: container.to_string(),
        });
    }

    if listener.address.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            container: container.to_string(),
            address: listener.address.clone(),
        });
    }

    if listener.enable_tls {
        if listener.cert_file.trim().is_empty() {
            errors.push(ValidationError::MissingTlsMaterial {
                container: container.to_string(),
                missing: "cert_file",
            });
        }
        if listener.key_file.trim().is_empty() {
            errors.push(ValidationError::MissingTlsMaterial {
                container: container.to_string(),
                missing: "key_file",
            });
        }
    }

    errors
}

/// Check a whole configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.shutdown.timeout_ms == 0 {
        errors.push(ValidationError::ZeroShutdownTimeout);
    }

    let mut taken: Vec<(String, u16, &str)> = Vec::new();
    for container in &config.containers {
        errors.extend(validate_listener(&container.name, &container.listener));

        if container.max_body_bytes == 0 {
            errors.push(ValidationError::ZeroBodyLimit {
                container: container.name.clone(),
            });
        }

        let mut own = HashSet::new();
        for port in container.listener.ports.iter().copied().filter(|port| *port != 0) {
            let clash = taken
                .iter()
                .find(|(address, taken_port, _)| *taken_port == port && *address == container.listener.address)
                .map(|(_, _, other)| other.to_string());
            let repeated = !own.insert(port);
            if let Some(other) = clash.or_else(|| repeated.then(|| container.name.clone())) {
                errors.push(ValidationError::DuplicatePort {
                    container: container.name.clone(),
                    other,
                    address: container.listener.address.clone(),
                    port,
                });
            }
        }
        for port in own {
            taken.push((container.listener.address.clone(), port, &container.name));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
