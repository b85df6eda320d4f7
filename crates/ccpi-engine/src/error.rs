//! Engine error types

use crate::types::Pillar;
use thiserror::Error;

/// Failure of a single source adapter call.
///
/// Always recovered by the resolver advancing to the next tier; never
/// surfaced as a run failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// The tier deadline elapsed before the source answered
    #[error("Timed out")]
    Timeout,

    /// Credential missing or rejected by the source
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Value absent or unparseable in the response
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Source refused the call for rate reasons
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Value parsed but outside the indicator's plausible range
    #[error("Implausible value {value} (allowed {min}..={max})")]
    Implausible { value: f64, min: f64, max: f64 },

    /// Source is not configured for use (no credential, disabled)
    #[error("Source not offered")]
    NotOffered,

    /// Connection or protocol level failure
    #[error("Transport error: {0}")]
    Transport(String),
}

impl FetchError {
    /// Short label used for metrics and structured logs
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Unauthorized(_) => "unauthorized",
            Self::MalformedResponse(_) => "malformed",
            Self::RateLimited(_) => "rate_limited",
            Self::Implausible { .. } => "implausible",
            Self::NotOffered => "not_offered",
            Self::Transport(_) => "transport",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Indicator registry configuration defects.
///
/// These are fatal and only ever raised while loading, never mid-run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Indicator '{0}' has an empty adapter chain")]
    EmptyAdapterChain(String),

    #[error("Duplicate indicator id '{0}'")]
    DuplicateIndicator(String),

    #[error("Pillar weights sum to {sum}, expected 1.0")]
    PillarWeightSum { sum: f64 },

    #[error("Indicator weights in pillar {pillar} sum to {sum}, expected 1.0")]
    IndicatorWeightSum { pillar: Pillar, sum: f64 },

    #[error("Indicator '{id}': weight {weight} must be within (0, 1]")]
    InvalidWeight { id: String, weight: f64 },

    #[error("Pillar {pillar}: weight {weight} must be within (0, 1]")]
    InvalidPillarWeight { pillar: Pillar, weight: f64 },

    #[error("Pillar {0} has no indicators")]
    EmptyPillar(Pillar),

    #[error("Unknown pillar '{0}'")]
    UnknownPillar(String),

    #[error("Indicator '{id}': invalid thresholds: {message}")]
    InvalidThresholds { id: String, message: String },

    #[error("Indicator '{id}': invalid plausible range {min}..={max}")]
    InvalidRange { id: String, min: f64, max: f64 },

    #[error("Indicator '{id}': baseline {value} lies outside its plausible range")]
    InvalidBaseline { id: String, value: f64 },

    #[error("Indicator '{id}': refresh window must be positive")]
    InvalidRefreshWindow { id: String },

    #[error("Indicator '{id}' references unknown source '{source_name}'")]
    UnknownSource { id: String, source_name: String },

    #[error("Indicator '{id}': {message}")]
    TierOrder { id: String, message: String },
}

/// Errors raised while assembling the engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// Registry validation failed
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A source could not be built from configuration
    #[error("Source '{source_name}': {message}")]
    Source {
        source_name: String,
        message: String,
    },

    /// Configuration is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    pub fn source(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_reasons_are_distinct() {
        let errors = [
            FetchError::Timeout,
            FetchError::Unauthorized("x".into()),
            FetchError::MalformedResponse("x".into()),
            FetchError::RateLimited("x".into()),
            FetchError::Implausible {
                value: 1.0,
                min: 0.0,
                max: 0.5,
            },
            FetchError::NotOffered,
            FetchError::Transport("x".into()),
        ];

        let reasons: std::collections::HashSet<_> = errors.iter().map(|e| e.reason()).collect();
        assert_eq!(reasons.len(), errors.len());
    }

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::IndicatorWeightSum {
            pillar: Pillar::Macro,
            sum: 0.9,
        };
        assert_eq!(
            err.to_string(),
            "Indicator weights in pillar macro sum to 0.9, expected 1.0"
        );

        let err: EngineError = RegistryError::EmptyAdapterChain("vix".into()).into();
        assert_eq!(err.to_string(), "Indicator 'vix' has an empty adapter chain");
    }
}
