//! Port checks before binding
//!
//! A successful check does not reserve the port; the real bind can still
//! fail. Checks exist for early, readable startup errors.

use tokio::net::TcpListener;
use tracing::{debug, error, warn};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};

/// Every configured port is free and the HTTP and metrics ports differ
pub async fn validate_ports_available(config: &ServerConfig) -> Result<()> {
    validate_config_ports(config)?;

    for (protocol, port) in configured_ports(config) {
        validate_single_port(&config.host, port, protocol).await?;
    }
    Ok(())
}

/// Static checks only: no zero ports, no collision
pub fn validate_config_ports(config: &ServerConfig) -> Result<()> {
    for (_, port) in configured_ports(config) {
        validate_port_range(port)?;
    }
    if let (Some(http), Some(metrics)) = (config.http_port, config.metrics_port) {
        if http == metrics {
            return Err(ServerError::ConfigError(format!(
                "HTTP and metrics ports are both {}",
                http
            )));
        }
    }
    Ok(())
}

pub fn validate_port_range(port: u16) -> Result<()> {
    if port == 0 {
        Err(ServerError::ConfigError(
            "Port cannot be 0 for an explicit binding".to_string(),
        ))
    } else {
        if port < 1024 {
            warn!(port, "Privileged port requires elevated permissions");
        }
        Ok(())
    }
}

fn configured_ports(config: &ServerConfig) -> Vec<(&'static str, u16)> {
    [("HTTP", config.http_port), ("metrics", config.metrics_port)]
        .into_iter()
        .filter_map(|(protocol, port)| port.map(|p| (protocol, p)))
        .collect()
}

async fn validate_single_port(host: &str, port: u16, protocol: &str) -> Result<()> {
    match TcpListener::bind(format!("{}:{}", host, port)).await {
        Ok(_) => {
            debug!(protocol, port, "Port available");
            Ok(())
        }
        Err(e) => {
            error!(protocol, port, error = %e, "Port not available");
            Err(ServerError::port_in_use(port, e.to_string()))
        }
    }
}
