use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

// ==================================================================================
// ROOT CONFIG
// ==================================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CcpiConfig {
    pub service: ServiceConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub policy: PolicyConfig,
}

impl CcpiConfig {
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Free-form label (production, staging, local)
    #[serde(default = "default_environment")]
    pub environment: String,
}

// ==================================================================================
// SERVER / LOGGING
// ==================================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Prometheus exporter port; exporter disabled when absent
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            metrics_port: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// pretty, json or compact
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// ==================================================================================
// ENGINE
// ==================================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default = "default_refresh_interval_seconds")]
    pub refresh_interval_seconds: u64,
    /// Wall-clock bound on one aggregation run
    #[serde(default = "default_run_deadline_seconds")]
    pub run_deadline_seconds: u64,
    #[serde(default = "default_enabled")]
    pub run_on_startup: bool,
    /// Number of history points kept in memory
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refresh_interval_seconds: default_refresh_interval_seconds(),
            run_deadline_seconds: default_run_deadline_seconds(),
            run_on_startup: true,
            history_size: default_history_size(),
        }
    }
}

/// Per-tier adapter timeouts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_primary_timeout_ms")]
    pub primary_ms: u64,
    #[serde(default = "default_secondary_timeout_ms")]
    pub secondary_ms: u64,
    #[serde(default = "default_tertiary_timeout_ms")]
    pub tertiary_ms: u64,
    #[serde(default = "default_ai_estimate_timeout_ms")]
    pub ai_estimate_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            primary_ms: default_primary_timeout_ms(),
            secondary_ms: default_secondary_timeout_ms(),
            tertiary_ms: default_tertiary_timeout_ms(),
            ai_estimate_ms: default_ai_estimate_timeout_ms(),
        }
    }
}

// ==================================================================================
// SOURCES
// ==================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// REST endpoint returning JSON
    HttpJson,
    /// OpenAI-compatible chat completion
    AiCompletion,
    /// Fixed values from this file
    Static,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub name: String,
    pub kind: SourceKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Appended to base_url; `{query}` and `{credential}` are substituted
    #[serde(default)]
    pub path_template: Option<String>,
    /// JSON pointer to the value, unless an indicator overrides it
    #[serde(default)]
    pub value_pointer: Option<String>,
    /// JSON pointer to the observation date
    #[serde(default)]
    pub date_pointer: Option<String>,
    /// Environment variable holding the API key
    #[serde(default)]
    pub credential_env: Option<String>,
    /// Send the credential as this query parameter
    #[serde(default)]
    pub credential_param: Option<String>,
    /// Send the credential in this header
    #[serde(default)]
    pub credential_header: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub prompt_template: Option<String>,
    /// Concurrent calls allowed against this source
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Indicator id to value, for static sources
    #[serde(default)]
    pub values: HashMap<String, f64>,
}

impl SourceConfig {
    /// Minimal source of the given kind; remaining fields empty
    pub fn new(name: &str, kind: SourceKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            enabled: true,
            base_url: None,
            path_template: None,
            value_pointer: None,
            date_pointer: None,
            credential_env: None,
            credential_param: None,
            credential_header: None,
            model: None,
            prompt_template: None,
            max_concurrent: default_max_concurrent(),
            values: HashMap::new(),
        }
    }
}

// ==================================================================================
// POLICY
// ==================================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PolicyConfig {
    /// Overrides for the built-in pillar weights, keyed by pillar name
    #[serde(default)]
    pub pillar_weights: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub confidence: ConfidenceConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConfidenceConfig {
    #[serde(default = "default_freshness_weight")]
    pub freshness_weight: f64,
    #[serde(default = "default_tier_weight")]
    pub tier_weight: f64,
    #[serde(default = "default_consistency_weight")]
    pub consistency_weight: f64,
    /// Pillar-score standard deviation at which consistency reaches zero
    #[serde(default = "default_max_dispersion")]
    pub max_dispersion: f64,
    #[serde(default)]
    pub tier_credits: TierCreditsConfig,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            freshness_weight: default_freshness_weight(),
            tier_weight: default_tier_weight(),
            consistency_weight: default_consistency_weight(),
            max_dispersion: default_max_dispersion(),
            tier_credits: TierCreditsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TierCreditsConfig {
    #[serde(default = "default_primary_credit")]
    pub primary: f64,
    #[serde(default = "default_secondary_credit")]
    pub secondary: f64,
    #[serde(default = "default_tertiary_credit")]
    pub tertiary: f64,
    #[serde(default = "default_ai_estimate_credit")]
    pub ai_estimate: f64,
    #[serde(default)]
    pub baseline: f64,
}

impl Default for TierCreditsConfig {
    fn default() -> Self {
        Self {
            primary: default_primary_credit(),
            secondary: default_secondary_credit(),
            tertiary: default_tertiary_credit(),
            ai_estimate: default_ai_estimate_credit(),
            baseline: 0.0,
        }
    }
}

/// Active-canary counts at which each alert level begins
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertConfig {
    #[serde(default = "default_watch_at")]
    pub watch_at: usize,
    #[serde(default = "default_elevated_at")]
    pub elevated_at: usize,
    #[serde(default = "default_critical_at")]
    pub critical_at: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            watch_at: default_watch_at(),
            elevated_at: default_elevated_at(),
            critical_at: default_critical_at(),
        }
    }
}
