//! Composite (CCPI) scoring

use crate::thresholds::{MAX_SCORE, MIN_SCORE};
use crate::types::PillarScore;

/// Reported when no pillar has data; paired with zero confidence
pub const NEUTRAL_SCORE: f64 = 50.0;

pub struct CompositeScorer;

impl CompositeScorer {
    /// Pillar-weighted average over the included pillars.
    ///
    /// Excluded pillars simply are not in `pillars`; the remaining weights
    /// are renormalized to sum to one. `None` when nothing is included.
    pub fn score(pillars: &[PillarScore]) -> Option<f64> {
        let total_weight: f64 = pillars.iter().map(|p| p.weight).sum();
        if total_weight <= 0.0 {
            return None;
        }
        let weighted: f64 = pillars.iter().map(|p| p.score * p.weight).sum();
        Some((weighted / total_weight).clamp(MIN_SCORE, MAX_SCORE))
    }
}
