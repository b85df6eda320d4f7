use crate::*;
use std::collections::HashSet;
use thiserror::Error;

/// Pillar names accepted in `policy.pillar_weights`
pub const KNOWN_PILLARS: [&str; 6] = [
    "valuation",
    "technical",
    "macro",
    "sentiment",
    "flows",
    "structural",
];

const LOG_FORMATS: [&str; 3] = ["pretty", "json", "compact"];
const WEIGHT_EPSILON: f64 = 1e-6;

#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("Service name is required")]
    MissingServiceName,

    #[error("{field}: port {port} is not usable")]
    InvalidPort { field: String, port: u16 },

    #[error("HTTP and metrics ports must differ (both {0})")]
    PortConflict(u16),

    #[error("Invalid log format: {0}. Must be one of: pretty, json, compact")]
    InvalidLogFormat(String),

    #[error("{field} must be a positive integer")]
    InvalidPositiveInteger { field: String },

    #[error("Duplicate source name '{0}'")]
    DuplicateSource(String),

    #[error("Source '{name}': {message}")]
    InvalidSource { name: String, message: String },

    #[error("Unknown pillar '{0}' in policy.pillar_weights")]
    UnknownPillar(String),

    #[error("Pillar weights: {message}")]
    InvalidPillarWeights { message: String },

    #[error("Confidence policy: {message}")]
    InvalidConfidence { message: String },

    #[error("Alert policy: {message}")]
    InvalidAlerts { message: String },

    #[error("Environment variable '{var}' is missing or invalid: {message}")]
    InvalidEnvVar { var: String, message: String },
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DefaultApplied {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub defaults_applied: Vec<DefaultApplied>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            defaults_applied: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_default(&mut self, field: &str, value: &str) {
        self.defaults_applied.push(DefaultApplied {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_config(config: &CcpiConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_service(config, &mut report);
    validate_engine(config, &mut report);
    validate_sources(&config.sources, &mut report);
    validate_policy(&config.policy, &mut report);

    report
}

fn validate_service(config: &CcpiConfig, report: &mut ValidationReport) {
    if config.service.name.trim().is_empty() {
        report.add_error(ValidationError::MissingServiceName);
    }

    let server = &config.server;
    if server.http_port == 0 {
        report.add_error(ValidationError::InvalidPort {
            field: "server.http_port".to_string(),
            port: server.http_port,
        });
    }
    match server.metrics_port {
        Some(0) => report.add_error(ValidationError::InvalidPort {
            field: "server.metrics_port".to_string(),
            port: 0,
        }),
        Some(port) if port == server.http_port => {
            report.add_error(ValidationError::PortConflict(port))
        }
        Some(_) => {}
        None => report.add_default("server.metrics_port", "disabled"),
    }

    let format = config.logging.format.to_ascii_lowercase();
    if !LOG_FORMATS.contains(&format.as_str()) {
        report.add_error(ValidationError::InvalidLogFormat(config.logging.format.clone()));
    }
}

fn validate_engine(config: &CcpiConfig, report: &mut ValidationReport) {
    let engine = &config.engine;
    let positive = [
        ("engine.refresh_interval_seconds", engine.refresh_interval_seconds),
        ("engine.run_deadline_seconds", engine.run_deadline_seconds),
        ("engine.history_size", engine.history_size as u64),
        ("timeouts.primary_ms", config.timeouts.primary_ms),
        ("timeouts.secondary_ms", config.timeouts.secondary_ms),
        ("timeouts.tertiary_ms", config.timeouts.tertiary_ms),
        ("timeouts.ai_estimate_ms", config.timeouts.ai_estimate_ms),
    ];
    for (field, value) in positive {
        if value == 0 {
            report.add_error(ValidationError::InvalidPositiveInteger {
                field: field.to_string(),
            });
        }
    }

    let timeouts = &config.timeouts;
    if timeouts.ai_estimate_ms < timeouts.primary_ms {
        report.add_warning(
            "timeouts.ai_estimate_ms",
            "AI estimate timeout is shorter than the primary API timeout; completions are usually slower",
        );
    }
    if engine.run_deadline_seconds.saturating_mul(1000) < timeouts.ai_estimate_ms {
        report.add_warning(
            "engine.run_deadline_seconds",
            "Run deadline is shorter than the AI estimate timeout; AI tiers may never complete",
        );
    }
    if engine.run_deadline_seconds > engine.refresh_interval_seconds {
        report.add_warning(
            "engine.run_deadline_seconds",
            "Run deadline exceeds the refresh interval; runs may overlap",
        );
    }
}

fn validate_sources(sources: &[SourceConfig], report: &mut ValidationReport) {
    if sources.is_empty() {
        report.add_warning(
            "sources",
            "No sources configured; every indicator will fall back to its baseline",
        );
        return;
    }

    let mut seen = HashSet::new();
    for source in sources {
        if source.name.trim().is_empty() {
            report.add_error(ValidationError::InvalidSource {
                name: source.name.clone(),
                message: "name is required".to_string(),
            });
            continue;
        }
        if !seen.insert(source.name.as_str()) {
            report.add_error(ValidationError::DuplicateSource(source.name.clone()));
        }
        if source.max_concurrent == 0 {
            report.add_error(ValidationError::InvalidSource {
                name: source.name.clone(),
                message: "max_concurrent must be at least 1".to_string(),
            });
        }
        if !source.enabled {
            report.add_warning(
                &format!("sources.{}", source.name),
                "Source is disabled and will be skipped",
            );
            continue;
        }

        match source.kind {
            SourceKind::HttpJson => validate_http_source(source, report),
            SourceKind::AiCompletion => validate_ai_source(source, report),
            SourceKind::Static => {
                if source.values.is_empty() {
                    report.add_warning(
                        &format!("sources.{}.values", source.name),
                        "Static source has no values",
                    );
                }
            }
        }
    }
}

fn validate_http_source(source: &SourceConfig, report: &mut ValidationReport) {
    validate_endpoint(source, report);

    if source.value_pointer.is_none() {
        report.add_warning(
            &format!("sources.{}.value_pointer", source.name),
            "No default value pointer; every indicator binding must supply one",
        );
    }
    for pointer in [&source.value_pointer, &source.date_pointer].into_iter().flatten() {
        if !pointer.is_empty() && !pointer.starts_with('/') {
            report.add_error(ValidationError::InvalidSource {
                name: source.name.clone(),
                message: format!("JSON pointer '{}' must start with '/'", pointer),
            });
        }
    }

    if source.credential_param.is_some() && source.credential_header.is_some() {
        report.add_error(ValidationError::InvalidSource {
            name: source.name.clone(),
            message: "credential_param and credential_header are mutually exclusive".to_string(),
        });
    }
    validate_credential(source, report);
}

fn validate_ai_source(source: &SourceConfig, report: &mut ValidationReport) {
    validate_endpoint(source, report);

    if source.model.as_deref().map_or(true, |m| m.trim().is_empty()) {
        report.add_error(ValidationError::InvalidSource {
            name: source.name.clone(),
            message: "model is required for ai_completion sources".to_string(),
        });
    }
    if source.prompt_template.is_none() {
        report.add_default(
            &format!("sources.{}.prompt_template", source.name),
            &default_prompt_template(),
        );
    }
    validate_credential(source, report);
}

fn validate_endpoint(source: &SourceConfig, report: &mut ValidationReport) {
    let Some(base_url) = source.base_url.as_deref() else {
        report.add_error(ValidationError::InvalidSource {
            name: source.name.clone(),
            message: "base_url is required".to_string(),
        });
        return;
    };

    match url::Url::parse(base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => report.add_error(ValidationError::InvalidSource {
            name: source.name.clone(),
            message: format!("unsupported URL scheme '{}'", url.scheme()),
        }),
        Err(e) => report.add_error(ValidationError::InvalidSource {
            name: source.name.clone(),
            message: format!("invalid base_url '{}': {}", base_url, e),
        }),
    }

    if has_unresolved_env_vars(base_url) {
        report.add_error(ValidationError::InvalidEnvVar {
            var: base_url.to_string(),
            message: format!("unresolved placeholder in sources.{}.base_url", source.name),
        });
    }
}

fn validate_credential(source: &SourceConfig, report: &mut ValidationReport) {
    match source.credential_env.as_deref() {
        Some(var) if !credential_present(var) => report.add_warning(
            &format!("sources.{}.credential_env", source.name),
            &format!("{} is not set; this source will be skipped", var),
        ),
        _ => {}
    }
}

fn validate_policy(policy: &PolicyConfig, report: &mut ValidationReport) {
    match &policy.pillar_weights {
        None => report.add_default("policy.pillar_weights", "built-in"),
        Some(weights) => {
            for (name, weight) in weights {
                if !KNOWN_PILLARS.contains(&name.to_ascii_lowercase().as_str()) {
                    report.add_error(ValidationError::UnknownPillar(name.clone()));
                }
                if !weight.is_finite() || *weight <= 0.0 || *weight > 1.0 {
                    report.add_error(ValidationError::InvalidPillarWeights {
                        message: format!("{} weight {} must be within (0, 1]", name, weight),
                    });
                }
            }
            if weights.len() == KNOWN_PILLARS.len() {
                let sum: f64 = weights.values().sum();
                if (sum - 1.0).abs() > WEIGHT_EPSILON {
                    report.add_error(ValidationError::InvalidPillarWeights {
                        message: format!("weights sum to {}, expected 1.0", sum),
                    });
                }
            } else {
                report.add_warning(
                    "policy.pillar_weights",
                    "Partial override; merged with built-in weights and checked at startup",
                );
            }
        }
    }

    let confidence = &policy.confidence;
    let components = [
        confidence.freshness_weight,
        confidence.tier_weight,
        confidence.consistency_weight,
    ];
    if components.iter().any(|w| !w.is_finite() || *w < 0.0) {
        report.add_error(ValidationError::InvalidConfidence {
            message: "component weights must be non-negative".to_string(),
        });
    } else {
        let sum: f64 = components.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_EPSILON {
            report.add_error(ValidationError::InvalidConfidence {
                message: format!("component weights sum to {}, expected 1.0", sum),
            });
        }
    }
    if confidence.max_dispersion.is_nan() || confidence.max_dispersion <= 0.0 {
        report.add_error(ValidationError::InvalidConfidence {
            message: "max_dispersion must be positive".to_string(),
        });
    }

    let credits = &confidence.tier_credits;
    let ordered = [
        ("primary", credits.primary),
        ("secondary", credits.secondary),
        ("tertiary", credits.tertiary),
        ("ai_estimate", credits.ai_estimate),
        ("baseline", credits.baseline),
    ];
    for (tier, credit) in ordered {
        if !credit.is_finite() || !(0.0..=1.0).contains(&credit) {
            report.add_error(ValidationError::InvalidConfidence {
                message: format!("{} tier credit {} must be within [0, 1]", tier, credit),
            });
        }
    }
    if ordered.windows(2).any(|pair| pair[1].1 > pair[0].1) {
        report.add_warning(
            "policy.confidence.tier_credits",
            "A later fallback tier earns more credit than an earlier one",
        );
    }

    let alerts = &policy.alerts;
    if alerts.watch_at == 0 {
        report.add_error(ValidationError::InvalidAlerts {
            message: "watch_at must be at least 1".to_string(),
        });
    }
    if !(alerts.watch_at < alerts.elevated_at && alerts.elevated_at < alerts.critical_at) {
        report.add_error(ValidationError::InvalidAlerts {
            message: format!(
                "steps must increase: watch {} < elevated {} < critical {}",
                alerts.watch_at, alerts.elevated_at, alerts.critical_at
            ),
        });
    }
}
