//! Tiered fallback resolution
//!
//! Each indicator's chain is turned into a tier plan once, at startup. A
//! resolution walks the plan strictly in order and stops at the first tier
//! that yields a plausible value; a later tier is never consulted once an
//! earlier one succeeded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use observability::EngineMetrics;
use tracing::{debug, instrument, warn};

use crate::adapter::{fetch_checked, AdapterKind, AdapterSet, FetchRequest, SourceAdapter};
use crate::error::{FetchError, RegistryError};
use crate::registry::{Indicator, IndicatorRegistry};
use crate::types::{ResolvedIndicator, Tier};

/// Timeout applied to each tier; AI completions are given longer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierTimeouts {
    pub primary: Duration,
    pub secondary: Duration,
    pub tertiary: Duration,
    pub ai_estimate: Duration,
}

impl TierTimeouts {
    pub fn for_tier(&self, tier: Tier) -> Duration {
        match tier {
            Tier::Primary => self.primary,
            Tier::Secondary => self.secondary,
            Tier::Tertiary => self.tertiary,
            Tier::AiEstimate => self.ai_estimate,
            Tier::Baseline | Tier::Unavailable => Duration::ZERO,
        }
    }
}

impl Default for TierTimeouts {
    fn default() -> Self {
        Self::from(&config::TimeoutsConfig::default())
    }
}

impl From<&config::TimeoutsConfig> for TierTimeouts {
    fn from(cfg: &config::TimeoutsConfig) -> Self {
        Self {
            primary: Duration::from_millis(cfg.primary_ms),
            secondary: Duration::from_millis(cfg.secondary_ms),
            tertiary: Duration::from_millis(cfg.tertiary_ms),
            ai_estimate: Duration::from_millis(cfg.ai_estimate_ms),
        }
    }
}

/// One step of an indicator's plan
#[derive(Clone)]
struct PlannedTier {
    tier: Tier,
    adapter: Arc<dyn SourceAdapter>,
    query: String,
    value_pointer: Option<String>,
}

pub struct FallbackResolver {
    plans: HashMap<String, Vec<PlannedTier>>,
    timeouts: TierTimeouts,
    metrics: EngineMetrics,
}

impl FallbackResolver {
    /// Plan every chain in the registry. Unknown sources and illegal tier
    /// orders are configuration errors and fail here, not mid-run.
    pub fn new(
        registry: &IndicatorRegistry,
        adapters: &AdapterSet,
        timeouts: TierTimeouts,
    ) -> Result<Self, RegistryError> {
        let mut plans = HashMap::with_capacity(registry.len());
        for indicator in registry.indicators() {
            plans.insert(indicator.id.clone(), plan_chain(indicator, adapters)?);
        }

        Ok(Self {
            plans,
            timeouts,
            metrics: EngineMetrics::new(),
        })
    }

    pub fn with_metrics(mut self, metrics: EngineMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn timeouts(&self) -> &TierTimeouts {
        &self.timeouts
    }

    /// Planned `(tier, source)` pairs for an indicator, in order
    pub fn tiers_for(&self, id: &str) -> Vec<(Tier, &str)> {
        self.plans
            .get(id)
            .map(|plan| plan.iter().map(|p| (p.tier, p.adapter.name())).collect())
            .unwrap_or_default()
    }

    /// Resolve one indicator. Never fails: exhaustion yields a snapshot
    /// without a raw value.
    #[instrument(skip_all, fields(indicator = %indicator.id))]
    pub async fn resolve(&self, indicator: &Indicator) -> ResolvedIndicator {
        let Some(plan) = self.plans.get(&indicator.id) else {
            warn!("Indicator has no tier plan");
            return ResolvedIndicator::exhausted(indicator, Utc::now());
        };

        for step in plan {
            let source = step.adapter.name();
            let request = FetchRequest {
                indicator_id: &indicator.id,
                indicator_name: &indicator.name,
                query: &step.query,
                unit: &indicator.unit,
                value_pointer: step.value_pointer.as_deref(),
                timeout: self.timeouts.for_tier(step.tier),
            };

            match fetch_checked(step.adapter.as_ref(), &request, indicator.plausible_range).await {
                Ok(reading) => {
                    debug!(tier = %step.tier, source, value = reading.value, "Indicator resolved");
                    self.metrics.record_resolution(step.tier.as_str());
                    return ResolvedIndicator::resolved(indicator, step.tier, source, reading);
                }
                Err(FetchError::NotOffered) => {
                    debug!(tier = %step.tier, source, "Tier not offered, skipping");
                }
                Err(e) => {
                    match e {
                        FetchError::Implausible { .. } | FetchError::Unauthorized(_) => {
                            warn!(tier = %step.tier, source, error = %e, "Tier failed")
                        }
                        _ => debug!(tier = %step.tier, source, error = %e, "Tier failed"),
                    }
                    self.metrics.record_adapter_failure(source, e.reason());
                }
            }
        }

        let exhausted = ResolvedIndicator::exhausted(indicator, Utc::now());
        warn!(
            tier = %exhausted.resolved_tier,
            display = ?exhausted.display_value,
            "All tiers exhausted"
        );
        self.metrics.record_resolution(exhausted.resolved_tier.as_str());
        exhausted
    }
}

/// Assign tiers to a chain: API sources by position (at most three), then
/// AI estimates. An API source may not follow an AI source.
fn plan_chain(indicator: &Indicator, adapters: &AdapterSet) -> Result<Vec<PlannedTier>, RegistryError> {
    let mut plan = Vec::with_capacity(indicator.adapter_chain.len());
    let mut api_count = 0;
    let mut seen_ai = false;

    for binding in &indicator.adapter_chain {
        let adapter = adapters
            .get(&binding.source)
            .ok_or_else(|| RegistryError::UnknownSource {
                id: indicator.id.clone(),
                source_name: binding.source.clone(),
            })?;

        let tier = match adapter.kind() {
            AdapterKind::Api => {
                if seen_ai {
                    return Err(RegistryError::TierOrder {
                        id: indicator.id.clone(),
                        message: format!("API source '{}' follows an AI estimate", binding.source),
                    });
                }
                let tier = Tier::API.get(api_count).copied().ok_or_else(|| {
                    RegistryError::TierOrder {
                        id: indicator.id.clone(),
                        message: "more than three API sources in chain".to_string(),
                    }
                })?;
                api_count += 1;
                tier
            }
            AdapterKind::AiEstimate => {
                seen_ai = true;
                Tier::AiEstimate
            }
        };

        plan.push(PlannedTier {
            tier,
            adapter: Arc::clone(adapter),
            query: binding.query.clone(),
            value_pointer: binding.value_pointer.clone(),
        });
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::ScriptedAdapter;
    use crate::registry::testing::{linear_indicator, pillar_weights};
    use crate::types::Pillar;
    use assert_matches::assert_matches;

    fn registry_with(chain: &[&str]) -> IndicatorRegistry {
        let indicators = Pillar::ALL
            .iter()
            .map(|p| linear_indicator(p.as_str(), *p, 1.0, chain))
            .collect();
        IndicatorRegistry::new(indicators, &pillar_weights()).unwrap()
    }

    fn timeouts() -> TierTimeouts {
        TierTimeouts {
            primary: Duration::from_secs(1),
            secondary: Duration::from_secs(2),
            tertiary: Duration::from_secs(3),
            ai_estimate: Duration::from_secs(10),
        }
    }

    #[tokio::test]
    async fn test_secondary_after_primary_failure() {
        let primary = Arc::new(ScriptedAdapter::failing("primary", FetchError::Timeout));
        let secondary = Arc::new(ScriptedAdapter::ok("secondary", 70.0));
        let adapters = AdapterSet::new().with(primary.clone()).with(secondary.clone());

        let registry = registry_with(&["primary", "secondary"]);
        let resolver = FallbackResolver::new(&registry, &adapters, timeouts()).unwrap();
        let indicator = registry.get("macro").unwrap();

        let resolved = resolver.resolve(indicator).await;
        assert_eq!(resolved.resolved_tier, Tier::Secondary);
        assert_eq!(resolved.raw_value, Some(70.0));
        assert_eq!(resolved.sub_score, Some(indicator.thresholds.score(70.0)));
        assert_eq!(resolved.source.as_deref(), Some("secondary"));
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn test_earlier_success_wins() {
        let primary = Arc::new(ScriptedAdapter::ok("primary", 20.0));
        let secondary = Arc::new(ScriptedAdapter::ok("secondary", 90.0));
        let adapters = AdapterSet::new().with(primary.clone()).with(secondary.clone());

        let registry = registry_with(&["primary", "secondary"]);
        let resolver = FallbackResolver::new(&registry, &adapters, timeouts()).unwrap();

        let resolved = resolver.resolve(registry.get("flows").unwrap()).await;
        assert_eq!(resolved.resolved_tier, Tier::Primary);
        assert_eq!(resolved.raw_value, Some(20.0));
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn test_resolution_is_deterministic() {
        let adapters = AdapterSet::new()
            .with(Arc::new(ScriptedAdapter::failing("a", FetchError::RateLimited("429".into()))))
            .with(Arc::new(ScriptedAdapter::failing("b", FetchError::Unauthorized("401".into()))))
            .with(Arc::new(ScriptedAdapter::ok("c", 33.0)));
        let registry = registry_with(&["a", "b", "c"]);
        let resolver = FallbackResolver::new(&registry, &adapters, timeouts()).unwrap();
        let indicator = registry.get("technical").unwrap();

        let first = resolver.resolve(indicator).await;
        let second = resolver.resolve(indicator).await;
        assert_eq!(first.resolved_tier, Tier::Tertiary);
        assert_eq!(first.resolved_tier, second.resolved_tier);
        assert_eq!(first.raw_value, second.raw_value);
    }

    #[tokio::test]
    async fn test_not_offered_keeps_position() {
        let adapters = AdapterSet::new()
            .with(Arc::new(ScriptedAdapter::ok("keyless", 10.0).not_offered()))
            .with(Arc::new(ScriptedAdapter::ok("open", 40.0)));
        let registry = registry_with(&["keyless", "open"]);
        let resolver = FallbackResolver::new(&registry, &adapters, timeouts()).unwrap();

        let resolved = resolver.resolve(registry.get("valuation").unwrap()).await;
        assert_eq!(resolved.resolved_tier, Tier::Secondary);
        assert_eq!(resolved.raw_value, Some(40.0));
    }

    #[tokio::test]
    async fn test_implausible_value_falls_through_to_ai() {
        let adapters = AdapterSet::new()
            .with(Arc::new(ScriptedAdapter::ok("api", 250.0)))
            .with(Arc::new(ScriptedAdapter::ok("llm", 61.0).ai()));
        let registry = registry_with(&["api", "llm"]);
        let resolver = FallbackResolver::new(&registry, &adapters, timeouts()).unwrap();

        let resolved = resolver.resolve(registry.get("sentiment").unwrap()).await;
        assert_eq!(resolved.resolved_tier, Tier::AiEstimate);
        assert_eq!(resolved.raw_value, Some(61.0));
    }

    #[tokio::test]
    async fn test_exhausted_chain_shows_baseline() {
        let adapters = AdapterSet::new()
            .with(Arc::new(ScriptedAdapter::failing("api", FetchError::Transport("reset".into()))))
            .with(Arc::new(ScriptedAdapter::failing("llm", FetchError::MalformedResponse("?".into())).ai()));
        let registry = registry_with(&["api", "llm"]);
        let resolver = FallbackResolver::new(&registry, &adapters, timeouts()).unwrap();

        let resolved = resolver.resolve(registry.get("macro").unwrap()).await;
        assert_eq!(resolved.resolved_tier, Tier::Baseline);
        assert_eq!(resolved.raw_value, None);
        assert_eq!(resolved.sub_score, None);
        assert_eq!(resolved.display_value, Some(50.0));
        assert!(!resolved.is_available());
    }

    #[tokio::test]
    async fn test_exhausted_without_baseline_is_unavailable() {
        let adapters =
            AdapterSet::new().with(Arc::new(ScriptedAdapter::failing("api", FetchError::Timeout)));
        let mut indicators: Vec<_> = Pillar::ALL
            .iter()
            .map(|p| linear_indicator(p.as_str(), *p, 1.0, &["api"]))
            .collect();
        indicators[0].baseline = None;
        let registry = IndicatorRegistry::new(indicators, &pillar_weights()).unwrap();
        let resolver = FallbackResolver::new(&registry, &adapters, timeouts()).unwrap();

        let resolved = resolver.resolve(registry.get("valuation").unwrap()).await;
        assert_eq!(resolved.resolved_tier, Tier::Unavailable);
        assert_eq!(resolved.display_value, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_primary_times_out_per_tier() {
        let slow = Arc::new(ScriptedAdapter::ok("slow", 10.0).delayed(Duration::from_secs(5)));
        let fast = Arc::new(ScriptedAdapter::ok("fast", 12.0));
        let adapters = AdapterSet::new().with(slow).with(fast);
        let registry = registry_with(&["slow", "fast"]);
        let resolver = FallbackResolver::new(&registry, &adapters, timeouts()).unwrap();

        let resolved = resolver.resolve(registry.get("structural").unwrap()).await;
        assert_eq!(resolved.resolved_tier, Tier::Secondary);
        assert_eq!(resolved.raw_value, Some(12.0));
    }

    #[test]
    fn test_tier_plan() {
        let adapters = AdapterSet::new()
            .with(Arc::new(ScriptedAdapter::ok("a", 1.0)))
            .with(Arc::new(ScriptedAdapter::ok("b", 1.0)))
            .with(Arc::new(ScriptedAdapter::ok("llm", 1.0).ai()));
        let registry = registry_with(&["a", "b", "llm"]);
        let resolver = FallbackResolver::new(&registry, &adapters, timeouts()).unwrap();

        assert_eq!(
            resolver.tiers_for("macro"),
            vec![(Tier::Primary, "a"), (Tier::Secondary, "b"), (Tier::AiEstimate, "llm")]
        );
        assert!(resolver.tiers_for("unknown").is_empty());
        assert_eq!(resolver.timeouts().for_tier(Tier::AiEstimate), Duration::from_secs(10));
    }

    #[test]
    fn test_plan_errors() {
        let adapters = AdapterSet::new()
            .with(Arc::new(ScriptedAdapter::ok("a", 1.0)))
            .with(Arc::new(ScriptedAdapter::ok("b", 1.0)))
            .with(Arc::new(ScriptedAdapter::ok("c", 1.0)))
            .with(Arc::new(ScriptedAdapter::ok("d", 1.0)))
            .with(Arc::new(ScriptedAdapter::ok("llm", 1.0).ai()));

        assert_matches!(
            FallbackResolver::new(&registry_with(&["a", "ghost"]), &adapters, timeouts())
                .err(),
            Some(RegistryError::UnknownSource { source_name, .. }) if source_name == "ghost"
        );
        assert_matches!(
            FallbackResolver::new(&registry_with(&["llm", "a"]), &adapters, timeouts())
                .err(),
            Some(RegistryError::TierOrder { .. })
        );
        assert_matches!(
            FallbackResolver::new(&registry_with(&["a", "b", "c", "d"]), &adapters, timeouts())
                .err(),
            Some(RegistryError::TierOrder { .. })
        );
    }

    #[test]
    fn test_timeouts_from_config() {
        let t = TierTimeouts::default();
        assert_eq!(t.primary, Duration::from_millis(4_000));
        assert_eq!(t.ai_estimate, Duration::from_millis(25_000));
        assert!(t.for_tier(Tier::AiEstimate) > t.for_tier(Tier::Primary));
    }
}
