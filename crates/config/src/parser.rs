use crate::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

#[instrument(skip(path))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CcpiConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    debug!("Config file content length: {} bytes", content.len());

    let config = parse_config(&content)?;
    info!(
        sources = config.sources.len(),
        "Configuration loaded successfully"
    );
    Ok(config)
}

/// Substitute environment variables and parse YAML text
pub fn parse_config(content: &str) -> Result<CcpiConfig> {
    let substituted = substitution::substitute_env_vars(content)?;
    debug!("Environment variable substitution completed");

    serde_yaml::from_str(&substituted).with_context(|| "Failed to parse YAML configuration")
}

#[instrument]
pub fn generate_default_config() -> CcpiConfig {
    use defaults::*;

    let fred = SourceConfig {
        base_url: Some("https://api.stlouisfed.org/fred".to_string()),
        path_template: Some(
            "/series/observations?series_id={query}&api_key={credential}&file_type=json&sort_order=desc&limit=1"
                .to_string(),
        ),
        value_pointer: Some("/observations/0/value".to_string()),
        date_pointer: Some("/observations/0/date".to_string()),
        credential_env: Some("FRED_API_KEY".to_string()),
        ..SourceConfig::new("fred", SourceKind::HttpJson)
    };

    let fmp = SourceConfig {
        base_url: Some("https://financialmodelingprep.com/api/v3".to_string()),
        path_template: Some("/{query}".to_string()),
        value_pointer: Some("/0/price".to_string()),
        credential_env: Some("FMP_API_KEY".to_string()),
        credential_param: Some("apikey".to_string()),
        ..SourceConfig::new("fmp", SourceKind::HttpJson)
    };

    let alpha_vantage = SourceConfig {
        base_url: Some("https://www.alphavantage.co".to_string()),
        path_template: Some("/query?{query}".to_string()),
        value_pointer: Some("/data/0/value".to_string()),
        date_pointer: Some("/data/0/date".to_string()),
        credential_env: Some("ALPHA_VANTAGE_API_KEY".to_string()),
        credential_param: Some("apikey".to_string()),
        // Free tier allows very few calls per minute
        max_concurrent: 1,
        ..SourceConfig::new("alpha_vantage", SourceKind::HttpJson)
    };

    let ai_estimate = SourceConfig {
        base_url: Some("https://api.openai.com/v1".to_string()),
        path_template: Some("/chat/completions".to_string()),
        credential_env: Some("OPENAI_API_KEY".to_string()),
        model: Some(default_ai_model()),
        prompt_template: Some(default_prompt_template()),
        max_concurrent: 2,
        ..SourceConfig::new("ai_estimate", SourceKind::AiCompletion)
    };

    CcpiConfig {
        service: ServiceConfig {
            name: default_service_name(),
            environment: default_environment(),
        },
        server: ServerConfig::default(),
        logging: LoggingConfig::default(),
        engine: EngineConfig::default(),
        timeouts: TimeoutsConfig::default(),
        sources: vec![fred, fmp, alpha_vantage, ai_estimate],
        policy: PolicyConfig::default(),
    }
}

#[instrument]
pub fn save_config<P: AsRef<Path> + std::fmt::Debug>(config: &CcpiConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("Saving configuration to: {:?}", path);

    let yaml = serde_yaml::to_string(config)
        .with_context(|| "Failed to serialize configuration to YAML")?;

    fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    info!("Configuration saved successfully");
    Ok(())
}
