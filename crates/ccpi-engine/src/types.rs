//! Shared types for the CCPI engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::registry::Indicator;

/// Top-level risk category grouping related indicators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pillar {
    Valuation,
    Technical,
    Macro,
    Sentiment,
    Flows,
    Structural,
}

impl Pillar {
    /// All pillars in canonical output order
    pub const ALL: [Pillar; 6] = [
        Pillar::Valuation,
        Pillar::Technical,
        Pillar::Macro,
        Pillar::Sentiment,
        Pillar::Flows,
        Pillar::Structural,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Pillar::Valuation => "valuation",
            Pillar::Technical => "technical",
            Pillar::Macro => "macro",
            Pillar::Sentiment => "sentiment",
            Pillar::Flows => "flows",
            Pillar::Structural => "structural",
        }
    }

    /// Parse a pillar name, case-insensitive
    pub fn parse(name: &str) -> Option<Pillar> {
        let name = name.trim().to_ascii_lowercase();
        Pillar::ALL.into_iter().find(|p| p.as_str() == name)
    }
}

impl fmt::Display for Pillar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position in an indicator's fallback chain that produced its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tier {
    Primary,
    Secondary,
    Tertiary,
    AiEstimate,
    Baseline,
    Unavailable,
}

impl Tier {
    /// API tiers indexed by their position among API bindings
    pub const API: [Tier; 3] = [Tier::Primary, Tier::Secondary, Tier::Tertiary];

    /// Resolved from a live market-data API
    pub fn is_live(&self) -> bool {
        matches!(self, Tier::Primary | Tier::Secondary | Tier::Tertiary)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Primary => "primary",
            Tier::Secondary => "secondary",
            Tier::Tertiary => "tertiary",
            Tier::AiEstimate => "aiEstimate",
            Tier::Baseline => "baseline",
            Tier::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canary severity, fixed per indicator at registry time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

/// Discrete alert level derived from the active canary count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Normal,
    Watch,
    Elevated,
    Critical,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertLevel::Normal => "normal",
            AlertLevel::Watch => "watch",
            AlertLevel::Elevated => "elevated",
            AlertLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Fixed interpretation band of a CCPI score. Display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    Low,
    Moderate,
    High,
    Extreme,
}

impl RiskBand {
    /// Band of a score: 0-30 low, 31-60 moderate, 61-85 high, 86-100 extreme.
    ///
    /// The score is rounded to the nearest integer first so fractional
    /// scores between two bands land deterministically.
    pub fn from_score(score: f64) -> Self {
        let rounded = score.round();
        if rounded <= 30.0 {
            RiskBand::Low
        } else if rounded <= 60.0 {
            RiskBand::Moderate
        } else if rounded <= 85.0 {
            RiskBand::High
        } else {
            RiskBand::Extreme
        }
    }
}

/// Which side of the threshold triggers a canary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Above,
    Below,
}

/// Canary trigger condition carried by every indicator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanaryTrigger {
    pub threshold: f64,
    pub direction: Direction,
    pub severity: Severity,
}

impl CanaryTrigger {
    pub fn above(threshold: f64, severity: Severity) -> Self {
        Self {
            threshold,
            direction: Direction::Above,
            severity,
        }
    }

    pub fn below(threshold: f64, severity: Severity) -> Self {
        Self {
            threshold,
            direction: Direction::Below,
            severity,
        }
    }

    /// Boundary is inclusive: a value equal to the threshold triggers
    pub fn is_triggered(&self, value: f64) -> bool {
        match self.direction {
            Direction::Above => value >= self.threshold,
            Direction::Below => value <= self.threshold,
        }
    }
}

/// A value returned by a source adapter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub value: f64,
    /// When the source observed the value (not when we fetched it)
    pub observed_at: DateTime<Utc>,
}

impl Reading {
    pub fn new(value: f64, observed_at: DateTime<Utc>) -> Self {
        Self { value, observed_at }
    }

    pub fn now(value: f64) -> Self {
        Self::new(value, Utc::now())
    }
}

/// Snapshot of one indicator after a resolution attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedIndicator {
    pub id: String,
    pub pillar: Pillar,
    /// None when every tier failed
    pub raw_value: Option<f64>,
    pub resolved_tier: Tier,
    /// Threshold sub-score in [0, 100]; None when unavailable
    pub sub_score: Option<f64>,
    /// When this run obtained the value or gave up on the chain
    pub fetched_at: DateTime<Utc>,
    /// When the source observed the value; freshness is judged on this
    #[serde(default)]
    pub observed_at: Option<DateTime<Utc>>,
    /// Value shown to consumers; the static baseline when unavailable
    pub display_value: Option<f64>,
    /// Source that produced the value
    pub source: Option<String>,
}

impl ResolvedIndicator {
    /// Indicator satisfied by a tier of its chain
    pub fn resolved(indicator: &Indicator, tier: Tier, source: &str, reading: Reading) -> Self {
        Self {
            id: indicator.id.clone(),
            pillar: indicator.pillar,
            raw_value: Some(reading.value),
            resolved_tier: tier,
            sub_score: Some(indicator.thresholds.score(reading.value)),
            fetched_at: Utc::now(),
            observed_at: Some(reading.observed_at),
            display_value: Some(reading.value),
            source: Some(source.to_string()),
        }
    }

    /// Indicator whose chain was exhausted (or cut off by the run deadline)
    pub fn exhausted(indicator: &Indicator, now: DateTime<Utc>) -> Self {
        let tier = if indicator.baseline.is_some() {
            Tier::Baseline
        } else {
            Tier::Unavailable
        };
        Self {
            id: indicator.id.clone(),
            pillar: indicator.pillar,
            raw_value: None,
            resolved_tier: tier,
            sub_score: None,
            fetched_at: now,
            observed_at: None,
            display_value: indicator.baseline,
            source: None,
        }
    }

    /// Has a raw value that can feed scoring
    pub fn is_available(&self) -> bool {
        self.raw_value.is_some()
    }
}

/// Score of one pillar for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PillarScore {
    pub pillar: Pillar,
    pub score: f64,
    /// Configured pillar weight (before renormalization)
    pub weight: f64,
    pub indicator_count: usize,
    /// Indicators resolved at a live API tier
    pub live_count: usize,
}

/// Active canary counts per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityBreakdown {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityBreakdown {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

/// One triggered canary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCanary {
    pub indicator_id: String,
    pub severity: Severity,
    pub direction: Direction,
    pub value: f64,
    pub threshold: f64,
}

/// Canary detector output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanarySummary {
    pub count: usize,
    pub severity_breakdown: SeverityBreakdown,
    pub alert_level: AlertLevel,
    pub active: Vec<ActiveCanary>,
}

/// Components of the confidence score, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceBreakdown {
    pub freshness: f64,
    pub tier_health: f64,
    pub consistency: f64,
    /// Weighted result in [0, 100]
    pub score: f64,
}

/// Headline output of one aggregation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeResult {
    pub ccpi_score: f64,
    pub confidence: f64,
    pub canary_count: usize,
    pub canary_severity_breakdown: SeverityBreakdown,
    pub alert_level: AlertLevel,
    pub risk_band: RiskBand,
    pub timestamp: DateTime<Utc>,
}

/// Full, immutable result of one aggregation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CcpiSnapshot {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub ccpi_score: f64,
    pub confidence: f64,
    pub confidence_breakdown: ConfidenceBreakdown,
    pub risk_band: RiskBand,
    pub pillars: Vec<PillarScore>,
    pub indicators: Vec<ResolvedIndicator>,
    pub canaries: CanarySummary,
}

impl CcpiSnapshot {
    pub fn composite(&self) -> CompositeResult {
        CompositeResult {
            ccpi_score: self.ccpi_score,
            confidence: self.confidence,
            canary_count: self.canaries.count,
            canary_severity_breakdown: self.canaries.severity_breakdown,
            alert_level: self.canaries.alert_level,
            risk_band: self.risk_band,
            timestamp: self.timestamp,
        }
    }

    pub fn indicator(&self, id: &str) -> Option<&ResolvedIndicator> {
        self.indicators.iter().find(|i| i.id == id)
    }

    pub fn pillar(&self, pillar: Pillar) -> Option<&PillarScore> {
        self.pillars.iter().find(|p| p.pillar == pillar)
    }

    /// Indicators without a raw value
    pub fn unavailable_count(&self) -> usize {
        self.indicators.iter().filter(|i| !i.is_available()).count()
    }
}
