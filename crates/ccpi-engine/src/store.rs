//! In-memory snapshot store
//!
//! Holds the latest published snapshot plus a bounded history of compact
//! points. Readers never observe a half-written snapshot: publishing swaps
//! an `Arc` under the write lock.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::types::{AlertLevel, CcpiSnapshot, RiskBand};

/// One history entry per published run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPoint {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub ccpi_score: f64,
    pub confidence: f64,
    pub risk_band: RiskBand,
    pub alert_level: AlertLevel,
    pub canary_count: usize,
}

impl From<&CcpiSnapshot> for HistoryPoint {
    fn from(snapshot: &CcpiSnapshot) -> Self {
        Self {
            run_id: snapshot.run_id,
            timestamp: snapshot.timestamp,
            ccpi_score: snapshot.ccpi_score,
            confidence: snapshot.confidence,
            risk_band: snapshot.risk_band,
            alert_level: snapshot.canaries.alert_level,
            canary_count: snapshot.canaries.count,
        }
    }
}

struct Inner {
    latest: Option<Arc<CcpiSnapshot>>,
    history: VecDeque<HistoryPoint>,
}

pub struct SnapshotStore {
    inner: RwLock<Inner>,
    capacity: usize,
}

impl SnapshotStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: RwLock::new(Inner {
                latest: None,
                history: VecDeque::with_capacity(capacity),
            }),
            capacity,
        }
    }

    /// Replace the latest snapshot unless the current one is newer. The
    /// oldest history point is evicted once capacity is reached.
    ///
    /// Returns the snapshot that is latest after the call.
    pub fn publish(&self, snapshot: CcpiSnapshot) -> Arc<CcpiSnapshot> {
        let mut inner = self.inner.write();
        if let Some(current) = &inner.latest {
            if current.timestamp > snapshot.timestamp {
                debug!(
                    run_id = %snapshot.run_id,
                    current = %current.run_id,
                    "Discarding snapshot older than the published one"
                );
                return Arc::clone(current);
            }
        }

        let snapshot = Arc::new(snapshot);
        if inner.history.len() == self.capacity {
            inner.history.pop_front();
        }
        inner.history.push_back(HistoryPoint::from(snapshot.as_ref()));
        inner.latest = Some(Arc::clone(&snapshot));
        snapshot
    }

    pub fn latest(&self) -> Option<Arc<CcpiSnapshot>> {
        self.inner.read().latest.clone()
    }

    /// Most recent `limit` points, oldest first
    pub fn history(&self, limit: usize) -> Vec<HistoryPoint> {
        let inner = self.inner.read();
        let skip = inner.history.len().saturating_sub(limit);
        inner.history.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(config::default_history_size())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::types::{CanarySummary, ConfidenceBreakdown, SeverityBreakdown};

    /// Minimal snapshot with the given score and no indicators
    pub fn snapshot(score: f64) -> CcpiSnapshot {
        CcpiSnapshot {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            duration_ms: 12,
            ccpi_score: score,
            confidence: 80.0,
            confidence_breakdown: ConfidenceBreakdown {
                freshness: 1.0,
                tier_health: 0.8,
                consistency: 0.6,
                score: 80.0,
            },
            risk_band: RiskBand::from_score(score),
            pillars: Vec::new(),
            indicators: Vec::new(),
            canaries: CanarySummary {
                count: 0,
                severity_breakdown: SeverityBreakdown::default(),
                alert_level: AlertLevel::Normal,
                active: Vec::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::snapshot;
    use super::*;

    #[test]
    fn test_empty_store() {
        let store = SnapshotStore::new(4);
        assert!(store.latest().is_none());
        assert!(store.history(10).is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_last_publish_wins() {
        let store = SnapshotStore::new(4);
        store.publish(snapshot(10.0));
        let second = store.publish(snapshot(70.0));

        let latest = store.latest().unwrap();
        assert_eq!(latest.run_id, second.run_id);
        assert_eq!(latest.ccpi_score, 70.0);
    }

    #[test]
    fn test_older_snapshot_does_not_replace_newer() {
        let store = SnapshotStore::new(4);
        let newer = store.publish(snapshot(60.0));

        let mut stale = snapshot(20.0);
        stale.timestamp = newer.timestamp - chrono::Duration::seconds(30);
        let kept = store.publish(stale);

        assert_eq!(kept.run_id, newer.run_id);
        assert_eq!(store.latest().unwrap().ccpi_score, 60.0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_history_is_bounded_and_ordered() {
        let store = SnapshotStore::new(3);
        for score in [10.0, 20.0, 30.0, 40.0, 50.0] {
            store.publish(snapshot(score));
        }

        assert_eq!(store.len(), 3);
        let scores: Vec<f64> = store.history(10).iter().map(|p| p.ccpi_score).collect();
        assert_eq!(scores, vec![30.0, 40.0, 50.0]);

        let recent: Vec<f64> = store.history(2).iter().map(|p| p.ccpi_score).collect();
        assert_eq!(recent, vec![40.0, 50.0]);
        assert!(store.history(0).is_empty());
    }

    #[test]
    fn test_history_point_fields() {
        let store = SnapshotStore::new(2);
        let published = store.publish(snapshot(90.0));
        let point = &store.history(1)[0];
        assert_eq!(point.run_id, published.run_id);
        assert_eq!(point.risk_band, RiskBand::Extreme);
        assert_eq!(point.alert_level, AlertLevel::Normal);

        let json = serde_json::to_value(point).unwrap();
        assert!(json.get("ccpiScore").is_some());
        assert!(json.get("canaryCount").is_some());
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let store = SnapshotStore::new(0);
        store.publish(snapshot(1.0));
        store.publish(snapshot(2.0));
        assert_eq!(store.capacity(), 1);
        assert_eq!(store.history(5).len(), 1);
    }
}
