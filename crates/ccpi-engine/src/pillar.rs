//! Pillar aggregation
//!
//! A pillar score is the weight-averaged sub-score of the pillar's
//! indicators that have a raw value. Missing indicators are excluded and
//! their weight is spread proportionally over the rest, so a gap does not
//! pull the pillar toward any fixed value.

use std::collections::HashMap;

use crate::registry::IndicatorRegistry;
use crate::thresholds::{MAX_SCORE, MIN_SCORE};
use crate::types::{Pillar, PillarScore, ResolvedIndicator};

type ResolvedIndex<'r> = HashMap<&'r str, &'r ResolvedIndicator>;

pub struct PillarAggregator<'a> {
    registry: &'a IndicatorRegistry,
}

impl<'a> PillarAggregator<'a> {
    pub fn new(registry: &'a IndicatorRegistry) -> Self {
        Self { registry }
    }

    /// Score one pillar; `None` when none of its indicators has a value
    pub fn aggregate(&self, pillar: Pillar, resolved: &[ResolvedIndicator]) -> Option<PillarScore> {
        self.aggregate_indexed(pillar, &index(resolved))
    }

    /// Score every pillar that has data, in canonical pillar order
    pub fn aggregate_all(&self, resolved: &[ResolvedIndicator]) -> Vec<PillarScore> {
        let index = index(resolved);
        Pillar::ALL
            .iter()
            .filter_map(|&pillar| self.aggregate_indexed(pillar, &index))
            .collect()
    }

    fn aggregate_indexed(&self, pillar: Pillar, index: &ResolvedIndex<'_>) -> Option<PillarScore> {
        let mut indicator_count = 0;
        let mut live_count = 0;
        let mut weighted = 0.0;
        let mut weight_sum = 0.0;

        // Registry order keeps the floating-point summation order fixed
        for indicator in self.registry.in_pillar(pillar) {
            indicator_count += 1;

            let Some(resolved) = index.get(indicator.id.as_str()) else {
                continue;
            };
            let Some(value) = resolved.raw_value else {
                continue;
            };

            weighted += indicator.thresholds.score(value) * indicator.weight_in_pillar;
            weight_sum += indicator.weight_in_pillar;
            if resolved.resolved_tier.is_live() {
                live_count += 1;
            }
        }

        if weight_sum <= 0.0 {
            return None;
        }

        Some(PillarScore {
            pillar,
            score: (weighted / weight_sum).clamp(MIN_SCORE, MAX_SCORE),
            weight: self.registry.pillar_weight(pillar),
            indicator_count,
            live_count,
        })
    }
}

fn index(resolved: &[ResolvedIndicator]) -> ResolvedIndex<'_> {
    resolved.iter().map(|r| (r.id.as_str(), r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::testing::{linear_indicator, pillar_weights};
    use crate::registry::Indicator;
    use crate::types::{Reading, Tier};
    use chrono::Utc;

    /// Valuation has four indicators; every other pillar one
    fn registry() -> IndicatorRegistry {
        let mut indicators = vec![
            linear_indicator("v1", Pillar::Valuation, 0.4, &["api"]),
            linear_indicator("v2", Pillar::Valuation, 0.3, &["api"]),
            linear_indicator("v3", Pillar::Valuation, 0.2, &["api"]),
            linear_indicator("v4", Pillar::Valuation, 0.1, &["api"]),
        ];
        for pillar in &Pillar::ALL[1..] {
            indicators.push(linear_indicator(pillar.as_str(), *pillar, 1.0, &["api"]));
        }
        IndicatorRegistry::new(indicators, &pillar_weights()).unwrap()
    }

    fn at(indicator: &Indicator, tier: Tier, value: f64) -> ResolvedIndicator {
        ResolvedIndicator::resolved(indicator, tier, "api", Reading::now(value))
    }

    fn missing(indicator: &Indicator) -> ResolvedIndicator {
        ResolvedIndicator::exhausted(indicator, Utc::now())
    }

    #[test]
    fn test_weighted_average() {
        let registry = registry();
        let r = |id: &str, v: f64| at(registry.get(id).unwrap(), Tier::Primary, v);
        let resolved = vec![r("v1", 10.0), r("v2", 20.0), r("v3", 30.0), r("v4", 40.0)];

        let score = PillarAggregator::new(&registry)
            .aggregate(Pillar::Valuation, &resolved)
            .unwrap();
        // 0.4*10 + 0.3*20 + 0.2*30 + 0.1*40
        assert!((score.score - 20.0).abs() < 1e-9);
        assert_eq!(score.weight, 0.25);
        assert_eq!(score.indicator_count, 4);
        assert_eq!(score.live_count, 4);
    }

    #[test]
    fn test_missing_indicator_weight_is_redistributed() {
        let registry = registry();
        let get = |id: &str| registry.get(id).unwrap();
        let resolved = vec![
            at(get("v1"), Tier::Primary, 10.0),
            missing(get("v2")),
            at(get("v3"), Tier::Secondary, 30.0),
            at(get("v4"), Tier::AiEstimate, 40.0),
        ];

        let score = PillarAggregator::new(&registry)
            .aggregate(Pillar::Valuation, &resolved)
            .unwrap();
        // (0.4*10 + 0.2*30 + 0.1*40) / 0.7
        assert!((score.score - 14.0 / 0.7).abs() < 1e-9);
        assert_eq!(score.indicator_count, 4);
        assert_eq!(score.live_count, 2);
    }

    #[test]
    fn test_all_missing_excludes_pillar() {
        let registry = registry();
        let resolved: Vec<_> = registry
            .in_pillar(Pillar::Valuation)
            .map(missing)
            .chain(std::iter::once(at(registry.get("macro").unwrap(), Tier::Primary, 70.0)))
            .collect();

        let aggregator = PillarAggregator::new(&registry);
        assert!(aggregator.aggregate(Pillar::Valuation, &resolved).is_none());
        assert!(aggregator.aggregate(Pillar::Flows, &resolved).is_none());

        let all = aggregator.aggregate_all(&resolved);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].pillar, Pillar::Macro);
        assert_eq!(all[0].score, 70.0);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let registry = registry();
        let resolved: Vec<_> = registry
            .indicators()
            .iter()
            .enumerate()
            .map(|(i, ind)| at(ind, Tier::Primary, 7.3 * i as f64 + 1.1))
            .collect();
        let mut reversed = resolved.clone();
        reversed.reverse();

        let aggregator = PillarAggregator::new(&registry);
        let a = aggregator.aggregate_all(&resolved);
        let b = aggregator.aggregate_all(&reversed);
        assert_eq!(a, b);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.score.to_bits(), y.score.to_bits());
        }
    }

    #[test]
    fn test_secondary_value_feeds_pillar_like_primary() {
        let registry = registry();
        let macro_ind = registry.get("macro").unwrap();
        let aggregator = PillarAggregator::new(&registry);

        let primary = aggregator
            .aggregate(Pillar::Macro, &[at(macro_ind, Tier::Primary, 70.0)])
            .unwrap();
        let secondary = aggregator
            .aggregate(Pillar::Macro, &[at(macro_ind, Tier::Secondary, 70.0)])
            .unwrap();
        assert_eq!(primary.score, secondary.score);
    }
}
