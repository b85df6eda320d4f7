//! One aggregation run end to end
//!
//! All indicators are resolved concurrently under a run deadline; anything
//! still pending when it passes is forced to its exhausted state. The
//! resolved set is then evaluated synchronously: pillars, composite,
//! confidence and canaries are pure functions of it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use observability::EngineMetrics;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::adapter::AdapterSet;
use crate::canary::{AlertPolicy, CanaryDetector};
use crate::catalog;
use crate::composite::{CompositeScorer, NEUTRAL_SCORE};
use crate::confidence::{ConfidenceCalculator, ConfidencePolicy};
use crate::error::EngineError;
use crate::pillar::PillarAggregator;
use crate::registry::IndicatorRegistry;
use crate::resolver::{FallbackResolver, TierTimeouts};
use crate::types::{CcpiSnapshot, ResolvedIndicator, RiskBand};

/// Longest run deadline honoured; larger settings are capped
pub const MAX_RUN_DEADLINE: Duration = Duration::from_secs(24 * 60 * 60);

/// Run-level policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    /// Wall-clock bound on resolving all indicators
    pub run_deadline: Duration,
    pub confidence: ConfidencePolicy,
    pub alerts: AlertPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            run_deadline: Duration::from_secs(config::default_run_deadline_seconds()),
            confidence: ConfidencePolicy::default(),
            alerts: AlertPolicy::default(),
        }
    }
}

impl From<&config::CcpiConfig> for EngineSettings {
    fn from(cfg: &config::CcpiConfig) -> Self {
        Self {
            run_deadline: Duration::from_secs(cfg.engine.run_deadline_seconds),
            confidence: ConfidencePolicy::from(&cfg.policy.confidence),
            alerts: AlertPolicy::from(&cfg.policy.alerts),
        }
    }
}

pub struct CcpiEngine {
    registry: Arc<IndicatorRegistry>,
    resolver: Arc<FallbackResolver>,
    settings: EngineSettings,
    metrics: EngineMetrics,
}

impl CcpiEngine {
    pub fn new(registry: IndicatorRegistry, resolver: FallbackResolver, settings: EngineSettings) -> Self {
        Self {
            registry: Arc::new(registry),
            resolver: Arc::new(resolver),
            settings,
            metrics: EngineMetrics::new(),
        }
    }

    /// Build the catalog registry, adapters and resolver from configuration.
    ///
    /// Registry and chain defects surface here, before any run.
    pub fn from_config(cfg: &config::CcpiConfig) -> Result<Self, EngineError> {
        let mut registry = catalog::default_registry()?;
        if let Some(weights) = &cfg.policy.pillar_weights {
            registry = registry.with_pillar_weights(weights)?;
        }

        let adapters = AdapterSet::from_config(&cfg.sources)?;
        let metrics = EngineMetrics::new();
        let resolver = FallbackResolver::new(&registry, &adapters, TierTimeouts::from(&cfg.timeouts))?
            .with_metrics(metrics.clone());

        info!(
            indicators = registry.len(),
            sources = adapters.len(),
            "CCPI engine initialized"
        );

        Ok(Self {
            registry: Arc::new(registry),
            resolver: Arc::new(resolver),
            settings: EngineSettings::from(cfg),
            metrics,
        })
    }

    pub fn registry(&self) -> &IndicatorRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &FallbackResolver {
        &self.resolver
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Resolve every indicator and evaluate the result. Always produces a
    /// complete snapshot, however degraded the data.
    #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run(&self) -> CcpiSnapshot {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));

        let started = tokio::time::Instant::now();
        let deadline = started + self.settings.run_deadline.min(MAX_RUN_DEADLINE);

        let pending = self.registry.indicators().iter().map(|indicator| async move {
            match tokio::time::timeout_at(deadline, self.resolver.resolve(indicator)).await {
                Ok(resolved) => resolved,
                Err(_) => {
                    warn!(indicator = %indicator.id, "Run deadline reached, indicator forced unavailable");
                    let forced = ResolvedIndicator::exhausted(indicator, Utc::now());
                    self.metrics.record_resolution(forced.resolved_tier.as_str());
                    forced
                }
            }
        });
        let resolved = join_all(pending).await;

        self.evaluate(run_id, resolved, Utc::now(), started.elapsed())
    }

    /// Turn a resolved set into a snapshot.
    ///
    /// Output is ordered by the registry, whatever the input order; ids not
    /// in the registry are ignored and registry indicators missing from the
    /// input are treated as exhausted.
    pub fn evaluate(
        &self,
        run_id: Uuid,
        resolved: Vec<ResolvedIndicator>,
        now: DateTime<Utc>,
        duration: Duration,
    ) -> CcpiSnapshot {
        let mut by_id: HashMap<String, ResolvedIndicator> =
            resolved.into_iter().map(|r| (r.id.clone(), r)).collect();
        let indicators: Vec<ResolvedIndicator> = self
            .registry
            .indicators()
            .iter()
            .map(|indicator| {
                by_id
                    .remove(&indicator.id)
                    .unwrap_or_else(|| ResolvedIndicator::exhausted(indicator, now))
            })
            .collect();

        let pillars = PillarAggregator::new(&self.registry).aggregate_all(&indicators);
        let mut confidence = ConfidenceCalculator::new(&self.registry, &self.settings.confidence)
            .with_pillars(&indicators, &pillars, now);

        let ccpi_score = match CompositeScorer::score(&pillars) {
            Some(score) => score,
            None => {
                warn!("No pillar has data, reporting neutral score with zero confidence");
                confidence.score = 0.0;
                NEUTRAL_SCORE
            }
        };

        let canaries = CanaryDetector::new(&self.registry, &self.settings.alerts).detect(&indicators);

        let snapshot = CcpiSnapshot {
            run_id,
            timestamp: now,
            duration_ms: duration.as_millis() as u64,
            ccpi_score,
            confidence: confidence.score,
            confidence_breakdown: confidence,
            risk_band: RiskBand::from_score(ccpi_score),
            pillars,
            indicators,
            canaries,
        };

        let unavailable = snapshot.unavailable_count();
        self.metrics.record_run(
            duration,
            snapshot.ccpi_score,
            snapshot.confidence,
            snapshot.canaries.count,
            unavailable,
        );
        info!(
            %run_id,
            score = snapshot.ccpi_score,
            confidence = snapshot.confidence,
            band = ?snapshot.risk_band,
            canaries = snapshot.canaries.count,
            alert = %snapshot.canaries.alert_level,
            pillars = snapshot.pillars.len(),
            unavailable,
            elapsed_ms = snapshot.duration_ms,
            "CCPI run complete"
        );

        snapshot
    }
}
