//! Composite market-risk indicator engine (CCPI)
//!
//! Collects the market indicators grouped into six weighted pillars,
//! resolves each one through an ordered chain of data sources, and condenses
//! the result into a single 0-100 risk score with a confidence figure and a
//! set of early-warning canaries.
//!
//! # Core Components
//!
//! - [`adapter`] - Source adapters (REST/JSON, AI completion, static values)
//! - [`resolver`] - Tiered fallback resolution per indicator
//! - [`registry`] - Immutable indicator definitions, validated at load
//! - [`catalog`] - The built-in set of 23 indicators
//! - [`pillar`] - Indicator sub-scores folded into pillar scores
//! - [`composite`] - Pillar scores folded into the CCPI score
//! - [`confidence`] - Certainty derived from freshness, tiers and agreement
//! - [`canary`] - Threshold-crossing early warnings and alert levels
//! - [`engine`] - One aggregation run end to end
//! - [`store`] - Latest snapshot plus bounded history
//! - [`worker`] - Periodic refresh loop
//!
//! # Key Invariants
//!
//! - Pillar weights and indicator weights within a pillar each sum to 1
//! - Sub-scores and the CCPI score stay within [0, 100]
//! - A later tier is never preferred over an earlier tier that succeeded
//! - Indicators without a raw value never contribute to a pillar score
//! - Confidence never feeds back into the CCPI score

pub mod adapter;
pub mod canary;
pub mod catalog;
pub mod composite;
pub mod confidence;
pub mod engine;
pub mod error;
pub mod pillar;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod thresholds;
pub mod types;
pub mod worker;

#[cfg(feature = "api")]
pub mod api;

pub use engine::{CcpiEngine, EngineSettings};
pub use error::{EngineError, FetchError, RegistryError};
pub use registry::{Indicator, IndicatorRegistry, SourceBinding};
pub use resolver::{FallbackResolver, TierTimeouts};
pub use store::{HistoryPoint, SnapshotStore};
pub use types::{
    AlertLevel, CanarySummary, CcpiSnapshot, CompositeResult, Pillar, PillarScore, Reading,
    ResolvedIndicator, RiskBand, Severity, SeverityBreakdown, Tier,
};
pub use worker::RefreshWorker;

/// Result type for engine construction
pub type Result<T> = std::result::Result<T, EngineError>;
