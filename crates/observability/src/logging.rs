//! Logging initialization
//!
//! Installs the tracing subscriber in one of three output formats.

use tracing::Dispatch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    #[default]
    Pretty,
    /// JSON lines for log aggregation
    Json,
    /// Single-line, less verbose than pretty
    Compact,
}

impl LogFormat {
    /// Parse from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown log format: {}", s))
    }
}

/// Build the level filter. `RUST_LOG` wins over the configured default.
fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the logging system.
///
/// The level comes from `RUST_LOG` when set (e.g. `ccpi_engine=debug,info`),
/// otherwise from `default_level`. Logs go to stderr; stdout is reserved for
/// command output. Fails if a subscriber is already installed.
pub fn init_logging(service_name: &str, format: LogFormat, default_level: &str) -> anyhow::Result<()> {
    let filter = env_filter(default_level);

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()?,
    }

    tracing::info!(
        service = service_name,
        format = ?format,
        "Logging initialized"
    );

    Ok(())
}

/// Subscriber for the window before configuration is loaded.
///
/// Install it with `tracing::dispatcher::with_default` around config loading
/// so those messages reach stderr; the real subscriber comes from
/// [`init_logging`] once the configured level and format are known.
pub fn bootstrap_dispatch(format: LogFormat, default_level: &str) -> Dispatch {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Pretty => Dispatch::new(builder.with_target(true).finish()),
        LogFormat::Json => Dispatch::new(builder.json().finish()),
        LogFormat::Compact => Dispatch::new(builder.compact().finish()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!(LogFormat::parse("pretty"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("compact"), Some(LogFormat::Compact));
        assert_eq!(LogFormat::parse("xml"), None);

        assert_eq!("pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("invalid".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_bootstrap_dispatch_is_scoped() {
        for format in [LogFormat::Pretty, LogFormat::Json, LogFormat::Compact] {
            let dispatch = bootstrap_dispatch(format, "info");
            let loaded = tracing::dispatcher::with_default(&dispatch, || {
                tracing::info!(format = ?format, "bootstrap message");
                format
            });
            assert_eq!(loaded, format);
        }
    }

    #[test]
    fn test_bad_default_level_falls_back() {
        // Must not panic on an unparseable directive
        let _ = env_filter("not a [valid directive");
    }
}
