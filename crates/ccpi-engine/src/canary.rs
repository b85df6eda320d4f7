//! Canary detection
//!
//! Every indicator carries one trigger condition with a fixed severity.
//! Only indicators with a raw value are evaluated; a baseline display value
//! can never trip a canary.

use std::collections::HashMap;

use crate::registry::IndicatorRegistry;
use crate::types::{ActiveCanary, AlertLevel, CanarySummary, ResolvedIndicator, SeverityBreakdown};

/// Active-canary counts at which each alert level starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPolicy {
    pub watch_at: usize,
    pub elevated_at: usize,
    pub critical_at: usize,
}

impl AlertPolicy {
    /// Step function: 0 normal, then watch, elevated, critical
    pub fn level(&self, count: usize) -> AlertLevel {
        if count >= self.critical_at {
            AlertLevel::Critical
        } else if count >= self.elevated_at {
            AlertLevel::Elevated
        } else if count >= self.watch_at {
            AlertLevel::Watch
        } else {
            AlertLevel::Normal
        }
    }
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self::from(&config::AlertConfig::default())
    }
}

impl From<&config::AlertConfig> for AlertPolicy {
    fn from(cfg: &config::AlertConfig) -> Self {
        Self {
            // A zero count is always normal
            watch_at: cfg.watch_at.max(1),
            elevated_at: cfg.elevated_at,
            critical_at: cfg.critical_at,
        }
    }
}

pub struct CanaryDetector<'a> {
    registry: &'a IndicatorRegistry,
    policy: &'a AlertPolicy,
}

impl<'a> CanaryDetector<'a> {
    pub fn new(registry: &'a IndicatorRegistry, policy: &'a AlertPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn detect(&self, resolved: &[ResolvedIndicator]) -> CanarySummary {
        let by_id: HashMap<&str, &ResolvedIndicator> =
            resolved.iter().map(|r| (r.id.as_str(), r)).collect();

        let mut severity_breakdown = SeverityBreakdown::default();
        let mut active = Vec::new();

        for indicator in self.registry.indicators() {
            let Some(value) = by_id.get(indicator.id.as_str()).and_then(|r| r.raw_value) else {
                continue;
            };
            let trigger = &indicator.canary;
            if trigger.is_triggered(value) {
                severity_breakdown.record(trigger.severity);
                active.push(ActiveCanary {
                    indicator_id: indicator.id.clone(),
                    severity: trigger.severity,
                    direction: trigger.direction,
                    value,
                    threshold: trigger.threshold,
                });
            }
        }

        let count = active.len();
        CanarySummary {
            count,
            severity_breakdown,
            alert_level: self.policy.level(count),
            active,
        }
    }
}
