//! CCPI command-line tool and service binary
//!
//! `start` runs the refresh worker and the read API, `run` performs a single
//! aggregation, `validate` checks a configuration file and `init` writes one.

use anyhow::{Context, Result};
use ccpi_engine::api::{create_router, CcpiApiState};
use ccpi_engine::{CcpiEngine, RefreshWorker, SnapshotStore};
use cli::{Cli, Commands, LogFormatArg};
use config::{generate_default_config, load_config, save_config, validate_config, CcpiConfig};
use observability::{bootstrap_dispatch, init_logging, init_metrics, LogFormat};
use server::{
    run_until_shutdown, validate_ports_available, HttpServer, Server, ServerConfig,
    ShutdownController,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Start { config, http } => {
            let cfg = load(&config, cli.log_format)?;
            setup_logging(&cfg, cli.log_format)?;
            start_command(cfg, http).await
        }
        Commands::Run {
            config,
            pretty,
            summary,
        } => {
            let cfg = load(&config, cli.log_format)?;
            setup_logging(&cfg, cli.log_format)?;
            run_command(cfg, pretty, summary).await
        }
        Commands::Validate { config } => {
            init_logging("ccpi", cli_format(cli.log_format), "warn")?;
            validate_command(config)
        }
        Commands::Init { output } => {
            init_logging("ccpi", cli_format(cli.log_format), "info")?;
            init_command(output)
        }
    }
}

/// Load under a temporary stderr subscriber; the configured one is
/// installed only after the file has been read
fn load(path: &Path, arg: Option<LogFormatArg>) -> Result<CcpiConfig> {
    let dispatch = bootstrap_dispatch(cli_format(arg), "info");
    tracing::dispatcher::with_default(&dispatch, || load_config(path))
        .with_context(|| format!("Failed to load configuration from {:?}", path))
}

fn cli_format(arg: Option<LogFormatArg>) -> LogFormat {
    arg.and_then(|f| LogFormat::parse(f.as_str())).unwrap_or_default()
}

/// Command-line format wins over the configured one
fn setup_logging(cfg: &CcpiConfig, arg: Option<LogFormatArg>) -> Result<()> {
    let format = match arg {
        Some(_) => cli_format(arg),
        None => LogFormat::parse(&cfg.logging.format).unwrap_or_default(),
    };
    init_logging(&cfg.service.name, format, &cfg.logging.level)
}

/// Log warnings and refuse to continue on errors
fn ensure_valid(cfg: &CcpiConfig) -> Result<()> {
    let report = validate_config(cfg);
    for warning in &report.warnings {
        warn!(field = %warning.field, message = %warning.message, "Configuration warning");
    }
    if !report.is_valid() {
        for err in &report.errors {
            error!("{}", err);
        }
        anyhow::bail!(
            "Configuration has {} error(s); run 'ccpi validate' for details",
            report.errors.len()
        );
    }
    Ok(())
}

async fn start_command(cfg: CcpiConfig, http_override: Option<u16>) -> Result<()> {
    ensure_valid(&cfg)?;

    let server_config = ServerConfig::from(&cfg.server).with_http_port(http_override);
    validate_ports_available(&server_config).await?;
    if let Some(port) = server_config.metrics_port {
        init_metrics(port)?;
    }

    let engine = Arc::new(CcpiEngine::from_config(&cfg).context("Failed to build CCPI engine")?);
    let store = Arc::new(SnapshotStore::new(cfg.engine.history_size));
    let worker = RefreshWorker::from_config(Arc::clone(&engine), Arc::clone(&store), &cfg.engine);

    let state = Arc::new(CcpiApiState::new(Arc::clone(&store), cfg.service.name.clone()));
    let http = HttpServer::new(server_config, create_router(state));

    info!(
        service = %cfg.service.name,
        environment = %cfg.service.environment,
        http_port = ?http.config().http_port,
        metrics_port = ?http.config().metrics_port,
        "Starting CCPI service"
    );

    let shutdown = ShutdownController::with_ctrl_c();
    let worker_token = shutdown.child_token();
    let worker_handle = tokio::spawn(async move { worker.run(worker_token).await });

    let result = http.run(shutdown.child_token()).await;

    // The worker must stop even if the server failed
    shutdown.shutdown();
    if let Err(e) = worker_handle.await {
        warn!(error = %e, "Refresh worker task ended abnormally");
    }

    result?;
    info!("CCPI service stopped");
    Ok(())
}

async fn run_command(cfg: CcpiConfig, pretty: bool, summary: bool) -> Result<()> {
    ensure_valid(&cfg)?;
    let engine = CcpiEngine::from_config(&cfg).context("Failed to build CCPI engine")?;

    let shutdown = ShutdownController::with_ctrl_c();
    let snapshot = run_until_shutdown(shutdown.token(), engine.run())
        .await
        .context("Interrupted before the run completed")?;
    debug!(run_id = %snapshot.run_id, "Run finished, printing snapshot");

    let json = match (summary, pretty) {
        (true, true) => serde_json::to_string_pretty(&snapshot.composite())?,
        (true, false) => serde_json::to_string(&snapshot.composite())?,
        (false, true) => serde_json::to_string_pretty(&snapshot)?,
        (false, false) => serde_json::to_string(&snapshot)?,
    };
    println!("{}", json);
    Ok(())
}

fn validate_command<P: AsRef<Path>>(config_path: P) -> Result<()> {
    let config_path = config_path.as_ref();
    let cfg = load_config(config_path)
        .with_context(|| format!("Failed to load configuration from {:?}", config_path))?;
    let report = validate_config(&cfg);

    println!("\n=== Configuration Validation Report ===\n");

    if !report.defaults_applied.is_empty() {
        println!("Defaults Applied ({}):", report.defaults_applied.len());
        for default in &report.defaults_applied {
            println!("  [info] {} = {}", default.field, default.value);
        }
        println!();
    }

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    // Registry and adapter chains are checked by building the engine
    let engine = CcpiEngine::from_config(&cfg).context("Indicator registry rejected")?;

    let referenced = engine.registry().referenced_sources();
    let unused: Vec<&str> = cfg
        .sources
        .iter()
        .map(|s| s.name.as_str())
        .filter(|name| !referenced.contains(name))
        .collect();
    if !unused.is_empty() {
        println!("Unused sources ({}):", unused.len());
        for name in &unused {
            println!("  [warn] [sources.{}] No indicator chain references this source", name);
        }
        println!();
    }

    println!("[ok] Configuration is valid!");
    println!();
    println!("Service: {} ({})", cfg.service.name, cfg.service.environment);
    println!("Indicators: {}", engine.registry().len());
    println!("Sources:");
    for source in &cfg.sources {
        let state = match (&source.credential_env, source.enabled) {
            (_, false) => "disabled",
            (Some(var), true) if !config::credential_present(var) => "credential missing, skipped",
            _ if !referenced.contains(source.name.as_str()) => "unused",
            _ => "ready",
        };
        println!("  - {} ({:?}): {}", source.name, source.kind, state);
    }
    println!(
        "Refresh: every {}s, run deadline {}s",
        cfg.engine.refresh_interval_seconds, cfg.engine.run_deadline_seconds
    );

    Ok(())
}

fn init_command<P: AsRef<Path>>(output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!(?output_path, "Initializing new configuration file");

    let cfg = generate_default_config();

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
    }
    save_config(&cfg, output_path)?;

    println!("[ok] Configuration file created successfully!");
    println!();
    println!("Location: {:?}", output_path);
    println!();
    println!("Data sources ({}):", cfg.sources.len());
    for source in &cfg.sources {
        match &source.credential_env {
            Some(var) => println!("  - {} (key from ${})", source.name, var),
            None => println!("  - {}", source.name),
        }
    }
    println!();
    println!("Next steps:");
    println!("  1. Export the API keys listed above (missing keys skip that source)");
    println!("  2. Run 'ccpi validate --config {:?}' to check configuration", output_path);
    println!("  3. Run 'ccpi run --config {:?} --pretty' for a one-off score", output_path);
    println!("  4. Run 'ccpi start --config {:?}' to serve the API", output_path);

    Ok(())
}
