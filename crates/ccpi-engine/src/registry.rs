//! Indicator registry
//!
//! Immutable definitions of every indicator plus the pillar weights. All
//! structural invariants are checked once in [`IndicatorRegistry::new`]; a
//! registry that exists is a registry that is valid.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use tracing::error;

use crate::error::RegistryError;
use crate::thresholds::Thresholds;
use crate::types::{CanaryTrigger, Pillar};

/// Tolerance for weight sums
pub const WEIGHT_EPSILON: f64 = 1e-6;

/// Reference from an indicator to one configured source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBinding {
    /// Name of the source in the adapter set
    pub source: String,
    /// Source-specific query (series id, endpoint path fragment, symbol)
    pub query: String,
    /// Overrides the source's default JSON pointer for this indicator
    pub value_pointer: Option<String>,
}

impl SourceBinding {
    pub fn new(source: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            query: query.into(),
            value_pointer: None,
        }
    }

    pub fn with_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.value_pointer = Some(pointer.into());
        self
    }
}

/// Values an adapter may legitimately return for an indicator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlausibleRange {
    pub min: f64,
    pub max: f64,
}

impl PlausibleRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

/// Immutable indicator definition
#[derive(Debug, Clone)]
pub struct Indicator {
    pub id: String,
    pub name: String,
    pub unit: String,
    pub pillar: Pillar,
    pub weight_in_pillar: f64,
    pub thresholds: Thresholds,
    pub plausible_range: PlausibleRange,
    /// Ordered fallback chain, highest priority first
    pub adapter_chain: Vec<SourceBinding>,
    /// Historical-average constant shown when every tier fails
    pub baseline: Option<f64>,
    /// Maximum age for a value to count as fresh
    pub refresh_window: Duration,
    pub canary: CanaryTrigger,
}

/// Validated set of indicators and pillar weights
#[derive(Debug, Clone)]
pub struct IndicatorRegistry {
    indicators: Vec<Indicator>,
    index: HashMap<String, usize>,
    pillar_weights: BTreeMap<Pillar, f64>,
}

impl IndicatorRegistry {
    /// Validate and build a registry. Any defect is fatal.
    pub fn new(
        indicators: Vec<Indicator>,
        pillar_weights: &[(Pillar, f64)],
    ) -> Result<Self, RegistryError> {
        let pillar_weights: BTreeMap<Pillar, f64> = pillar_weights.iter().copied().collect();
        let registry = Self::build(indicators, pillar_weights);
        if let Err(e) = &registry {
            error!(error = %e, "Indicator registry rejected");
        }
        registry
    }

    fn build(
        indicators: Vec<Indicator>,
        pillar_weights: BTreeMap<Pillar, f64>,
    ) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(indicators.len());
        for (i, indicator) in indicators.iter().enumerate() {
            validate_indicator(indicator)?;
            if index.insert(indicator.id.clone(), i).is_some() {
                return Err(RegistryError::DuplicateIndicator(indicator.id.clone()));
            }
        }

        let mut pillar_total = 0.0;
        for pillar in Pillar::ALL {
            // A zero-weight pillar would carry live data into the composite
            // with no influence, so every pillar must count
            let weight = pillar_weights.get(&pillar).copied().unwrap_or(0.0);
            if !weight.is_finite() || weight <= 0.0 || weight > 1.0 {
                return Err(RegistryError::InvalidPillarWeight { pillar, weight });
            }
            pillar_total += weight;

            let members: Vec<&Indicator> =
                indicators.iter().filter(|i| i.pillar == pillar).collect();
            if members.is_empty() {
                return Err(RegistryError::EmptyPillar(pillar));
            }
            let sum: f64 = members.iter().map(|i| i.weight_in_pillar).sum();
            if (sum - 1.0).abs() > WEIGHT_EPSILON {
                return Err(RegistryError::IndicatorWeightSum { pillar, sum });
            }
        }
        if (pillar_total - 1.0).abs() > WEIGHT_EPSILON {
            return Err(RegistryError::PillarWeightSum { sum: pillar_total });
        }

        Ok(Self {
            indicators,
            index,
            pillar_weights,
        })
    }

    /// Replace pillar weights by name, re-validating the result
    pub fn with_pillar_weights(
        self,
        overrides: &BTreeMap<String, f64>,
    ) -> Result<Self, RegistryError> {
        let mut weights = self.pillar_weights;
        for (name, weight) in overrides {
            let pillar =
                Pillar::parse(name).ok_or_else(|| RegistryError::UnknownPillar(name.clone()))?;
            weights.insert(pillar, *weight);
        }
        Self::build(self.indicators, weights)
    }

    /// Indicators in registry order
    pub fn indicators(&self) -> &[Indicator] {
        &self.indicators
    }

    pub fn get(&self, id: &str) -> Option<&Indicator> {
        self.index.get(id).map(|&i| &self.indicators[i])
    }

    pub fn in_pillar(&self, pillar: Pillar) -> impl Iterator<Item = &Indicator> {
        self.indicators.iter().filter(move |i| i.pillar == pillar)
    }

    pub fn pillar_weight(&self, pillar: Pillar) -> f64 {
        self.pillar_weights.get(&pillar).copied().unwrap_or(0.0)
    }

    /// Source names referenced by any chain
    pub fn referenced_sources(&self) -> HashSet<&str> {
        self.indicators
            .iter()
            .flat_map(|i| i.adapter_chain.iter().map(|b| b.source.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }
}

fn validate_indicator(indicator: &Indicator) -> Result<(), RegistryError> {
    let id = &indicator.id;

    if indicator.adapter_chain.is_empty() {
        return Err(RegistryError::EmptyAdapterChain(id.clone()));
    }

    let weight = indicator.weight_in_pillar;
    if !weight.is_finite() || weight <= 0.0 || weight > 1.0 {
        return Err(RegistryError::InvalidWeight {
            id: id.clone(),
            weight,
        });
    }

    indicator
        .thresholds
        .validate()
        .map_err(|message| RegistryError::InvalidThresholds {
            id: id.clone(),
            message,
        })?;

    let range = indicator.plausible_range;
    if !range.min.is_finite() || !range.max.is_finite() || range.min >= range.max {
        return Err(RegistryError::InvalidRange {
            id: id.clone(),
            min: range.min,
            max: range.max,
        });
    }

    if let Some(value) = indicator.baseline {
        if !range.contains(value) {
            return Err(RegistryError::InvalidBaseline {
                id: id.clone(),
                value,
            });
        }
    }

    if indicator.refresh_window.is_zero() {
        return Err(RegistryError::InvalidRefreshWindow { id: id.clone() });
    }

    Ok(())
}
