//! Server configuration

use crate::error::{Result, ServerError};
use std::net::SocketAddr;

/// Default port assignments
pub mod ports {
    /// HTTP read API
    pub const CCPI_HTTP: u16 = 8087;
    /// Prometheus scrape endpoint
    pub const CCPI_METRICS: u16 = 9187;
}

/// Bind configuration for the HTTP API and the optional metrics exporter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    pub http_port: Option<u16>,
    pub metrics_port: Option<u16>,
}

impl ServerConfig {
    pub fn http_only(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            http_port: Some(port),
            metrics_port: None,
        }
    }

    /// Override the HTTP port (e.g. from a command-line flag)
    pub fn with_http_port(mut self, port: Option<u16>) -> Self {
        if port.is_some() {
            self.http_port = port;
        }
        self
    }

    pub fn http_addr(&self) -> Option<Result<SocketAddr>> {
        self.http_port.map(|p| self.parse_addr(p))
    }

    fn parse_addr(&self, port: u16) -> Result<SocketAddr> {
        format!("{}:{}", self.host, port)
            .parse()
            .map_err(|_| ServerError::InvalidAddress(format!("{}:{}", self.host, port)))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: Some(ports::CCPI_HTTP),
            metrics_port: None,
        }
    }
}

impl From<&::config::ServerConfig> for ServerConfig {
    fn from(cfg: &::config::ServerConfig) -> Self {
        Self {
            host: cfg.host.clone(),
            http_port: Some(cfg.http_port),
            metrics_port: cfg.metrics_port,
        }
    }
}
