pub fn default_enabled() -> bool {
    true
}

pub fn default_service_name() -> String {
    "ccpi".to_string()
}

pub fn default_environment() -> String {
    "local".to_string()
}

// Server defaults
pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_http_port() -> u16 {
    8087
}

// Logging defaults
pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_log_format() -> String {
    "pretty".to_string()
}

// Engine defaults
pub fn default_refresh_interval_seconds() -> u64 {
    300
}

pub fn default_run_deadline_seconds() -> u64 {
    45
}

pub fn default_history_size() -> usize {
    288
}

// Tier timeouts, AI completions are tolerated longer
pub fn default_primary_timeout_ms() -> u64 {
    4_000
}

pub fn default_secondary_timeout_ms() -> u64 {
    6_000
}

pub fn default_tertiary_timeout_ms() -> u64 {
    8_000
}

pub fn default_ai_estimate_timeout_ms() -> u64 {
    25_000
}

// Source defaults
pub fn default_max_concurrent() -> usize {
    4
}

pub fn default_ai_model() -> String {
    "gpt-4o-mini".to_string()
}

pub fn default_prompt_template() -> String {
    "Give the most recent value of the {name} ({query}) in {unit}. \
     Reply with the number only."
        .to_string()
}

// Confidence policy defaults
pub fn default_freshness_weight() -> f64 {
    0.35
}

pub fn default_tier_weight() -> f64 {
    0.40
}

pub fn default_consistency_weight() -> f64 {
    0.25
}

pub fn default_max_dispersion() -> f64 {
    35.0
}

pub fn default_primary_credit() -> f64 {
    1.0
}

pub fn default_secondary_credit() -> f64 {
    0.9
}

pub fn default_tertiary_credit() -> f64 {
    0.8
}

pub fn default_ai_estimate_credit() -> f64 {
    0.5
}

// Alert level steps
pub fn default_watch_at() -> usize {
    1
}

pub fn default_elevated_at() -> usize {
    3
}

pub fn default_critical_at() -> usize {
    6
}
