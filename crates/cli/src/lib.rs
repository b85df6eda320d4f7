use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const DEFAULT_CONFIG: &str = "ccpi.yaml";

#[derive(Parser, Debug)]
#[command(name = "ccpi")]
#[command(about = "CCPI - composite market-risk indicator engine")]
#[command(version)]
pub struct Cli {
    /// Log output format (overrides the configuration file)
    #[arg(long, value_enum, global = true, env = "CCPI_LOG_FORMAT")]
    pub log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the refresh worker and the read API until Ctrl+C
    Start {
        /// Path to the configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Override HTTP port
        #[arg(long)]
        http: Option<u16>,
    },

    /// Run one aggregation and print the snapshot as JSON
    Run {
        /// Path to the configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,

        /// Print only the headline result, without pillars and indicators
        #[arg(long)]
        summary: bool,
    },

    /// Validate configuration without starting anything
    Validate {
        /// Path to the configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Write a configuration file with all defaults
    Init {
        /// Output path for the new configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        output: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormatArg {
    /// Multi-line, human-readable
    Pretty,
    /// One JSON object per line
    Json,
    /// Single-line, human-readable
    Compact,
}

impl LogFormatArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormatArg::Pretty => "pretty",
            LogFormatArg::Json => "json",
            LogFormatArg::Compact => "compact",
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
