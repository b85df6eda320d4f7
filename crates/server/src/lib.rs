//! Server infrastructure for the CCPI service
//!
//! Runs the read API over HTTP with graceful shutdown. Servers implement the
//! [`Server`] trait; [`ServerExt`] adds `spawn()`.
//! Shutdown is coordinated with `CancellationToken` from `tokio_util`.
//!
//! # Modules
//!
//! - [`config`] - Bind configuration and default ports
//! - [`traits`] - `Server` and `ServerExt`
//! - [`http`] - Axum HTTP server
//! - [`shutdown`] - Shutdown controller and helpers
//! - [`port_validator`] - Early port checks

pub mod config;
pub mod error;
pub mod http;
pub mod port_validator;
pub mod shutdown;
pub mod traits;

pub use crate::config::{ports, ServerConfig};
pub use error::{Result, ServerError};
pub use http::HttpServer;
pub use port_validator::{validate_config_ports, validate_ports_available};
pub use shutdown::{run_until_shutdown, ShutdownController};
pub use traits::{Server, ServerExt};
