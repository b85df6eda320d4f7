//! Confidence (certainty) of a run
//!
//! Three components, each in [0, 1], blended by configurable weights:
//!
//! - freshness: share of registry indicators with a value younger than
//!   their refresh window
//! - tier health: mean tier credit over all registry indicators
//! - consistency: agreement between pillar scores, scaled by pillar coverage
//!
//! Every denominator is the full registry, so an indicator that is missing
//! from the resolved set counts against confidence exactly like one that
//! failed. Confidence never feeds back into the CCPI score.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::pillar::PillarAggregator;
use crate::registry::IndicatorRegistry;
use crate::types::{ConfidenceBreakdown, Pillar, PillarScore, ResolvedIndicator, Tier};

/// Trust credit per resolution tier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierCredits {
    pub primary: f64,
    pub secondary: f64,
    pub tertiary: f64,
    pub ai_estimate: f64,
    pub baseline: f64,
}

impl TierCredits {
    pub fn credit(&self, tier: Tier) -> f64 {
        match tier {
            Tier::Primary => self.primary,
            Tier::Secondary => self.secondary,
            Tier::Tertiary => self.tertiary,
            Tier::AiEstimate => self.ai_estimate,
            Tier::Baseline => self.baseline,
            Tier::Unavailable => 0.0,
        }
    }
}

impl From<&config::TierCreditsConfig> for TierCredits {
    fn from(cfg: &config::TierCreditsConfig) -> Self {
        Self {
            primary: cfg.primary,
            secondary: cfg.secondary,
            tertiary: cfg.tertiary,
            ai_estimate: cfg.ai_estimate,
            baseline: cfg.baseline,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidencePolicy {
    pub freshness_weight: f64,
    pub tier_weight: f64,
    pub consistency_weight: f64,
    /// Pillar-score standard deviation at which consistency bottoms out
    pub max_dispersion: f64,
    pub credits: TierCredits,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self::from(&config::ConfidenceConfig::default())
    }
}

impl From<&config::ConfidenceConfig> for ConfidencePolicy {
    fn from(cfg: &config::ConfidenceConfig) -> Self {
        Self {
            freshness_weight: cfg.freshness_weight,
            tier_weight: cfg.tier_weight,
            consistency_weight: cfg.consistency_weight,
            max_dispersion: cfg.max_dispersion,
            credits: TierCredits::from(&cfg.tier_credits),
        }
    }
}

pub struct ConfidenceCalculator<'a> {
    registry: &'a IndicatorRegistry,
    policy: &'a ConfidencePolicy,
}

impl<'a> ConfidenceCalculator<'a> {
    pub fn new(registry: &'a IndicatorRegistry, policy: &'a ConfidencePolicy) -> Self {
        Self { registry, policy }
    }

    /// Confidence of a resolved snapshot as of `now`
    pub fn confidence(&self, resolved: &[ResolvedIndicator], now: DateTime<Utc>) -> ConfidenceBreakdown {
        let pillars = PillarAggregator::new(self.registry).aggregate_all(resolved);
        self.with_pillars(resolved, &pillars, now)
    }

    /// Same as [`confidence`](Self::confidence) with pillar scores already computed
    pub fn with_pillars(
        &self,
        resolved: &[ResolvedIndicator],
        pillars: &[PillarScore],
        now: DateTime<Utc>,
    ) -> ConfidenceBreakdown {
        let freshness = self.freshness(resolved, now);
        let tier_health = self.tier_health(resolved);
        let consistency = self.consistency(pillars);

        let p = self.policy;
        let weight_sum = p.freshness_weight + p.tier_weight + p.consistency_weight;
        let blended = if weight_sum > 0.0 {
            (p.freshness_weight * freshness + p.tier_weight * tier_health + p.consistency_weight * consistency)
                / weight_sum
        } else {
            0.0
        };

        ConfidenceBreakdown {
            freshness,
            tier_health,
            consistency,
            score: (blended * 100.0).clamp(0.0, 100.0),
        }
    }

    fn freshness(&self, resolved: &[ResolvedIndicator], now: DateTime<Utc>) -> f64 {
        let total = self.registry.len();
        if total == 0 {
            return 0.0;
        }
        let by_id = index(resolved);
        let fresh = self
            .registry
            .indicators()
            .iter()
            .filter(|indicator| {
                by_id.get(indicator.id.as_str()).is_some_and(|r| {
                    // Future-dated observations count as age zero
                    r.is_available()
                        && r.observed_at.is_some_and(|at| {
                            (now - at)
                                .to_std()
                                .map_or(true, |age| age <= indicator.refresh_window)
                        })
                })
            })
            .count();
        fresh as f64 / total as f64
    }

    fn tier_health(&self, resolved: &[ResolvedIndicator]) -> f64 {
        let total = self.registry.len();
        if total == 0 {
            return 0.0;
        }
        let by_id = index(resolved);
        let credit: f64 = self
            .registry
            .indicators()
            .iter()
            .filter_map(|indicator| by_id.get(indicator.id.as_str()))
            .map(|r| self.policy.credits.credit(r.resolved_tier).clamp(0.0, 1.0))
            .sum();
        credit / total as f64
    }

    fn consistency(&self, pillars: &[PillarScore]) -> f64 {
        if pillars.is_empty() {
            return 0.0;
        }
        let n = pillars.len() as f64;
        let mean = pillars.iter().map(|p| p.score).sum::<f64>() / n;
        let variance = pillars.iter().map(|p| (p.score - mean).powi(2)).sum::<f64>() / n;
        let dispersion = variance.sqrt();

        let agreement = if self.policy.max_dispersion > 0.0 {
            1.0 - (dispersion / self.policy.max_dispersion).min(1.0)
        } else {
            0.0
        };
        let coverage = (n / Pillar::ALL.len() as f64).min(1.0);
        agreement * coverage
    }
}

fn index(resolved: &[ResolvedIndicator]) -> HashMap<&str, &ResolvedIndicator> {
    resolved.iter().map(|r| (r.id.as_str(), r)).collect()
}
