//! Threshold functions mapping a raw indicator value to a 0-100 risk sub-score

use serde::{Deserialize, Serialize};

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// One breakpoint of a threshold function
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub value: f64,
    pub score: f64,
}

/// Piecewise-linear threshold function.
///
/// Breakpoint values are strictly increasing and their scores are monotone,
/// so moving a raw value toward the calm end never raises the sub-score.
/// Values outside the breakpoints take the score of the nearest end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    breakpoints: Vec<Breakpoint>,
}

impl Thresholds {
    /// Build from `(value, score)` pairs. Call [`Thresholds::validate`] before use.
    pub fn new(points: &[(f64, f64)]) -> Self {
        Self {
            breakpoints: points
                .iter()
                .map(|&(value, score)| Breakpoint { value, score })
                .collect(),
        }
    }

    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    /// Check the structural rules; returns a human-readable reason on failure
    pub fn validate(&self) -> Result<(), String> {
        if self.breakpoints.len() < 2 {
            return Err("at least two breakpoints are required".to_string());
        }

        for bp in &self.breakpoints {
            if !bp.value.is_finite() || !bp.score.is_finite() {
                return Err("breakpoints must be finite".to_string());
            }
            if !(MIN_SCORE..=MAX_SCORE).contains(&bp.score) {
                return Err(format!("score {} outside [0, 100]", bp.score));
            }
        }

        let mut rising = false;
        let mut falling = false;
        for pair in self.breakpoints.windows(2) {
            if pair[1].value <= pair[0].value {
                return Err(format!(
                    "breakpoint values must be strictly increasing ({} then {})",
                    pair[0].value, pair[1].value
                ));
            }
            if pair[1].score > pair[0].score {
                rising = true;
            }
            if pair[1].score < pair[0].score {
                falling = true;
            }
        }

        if rising && falling {
            return Err("breakpoint scores must be monotone".to_string());
        }

        Ok(())
    }

    /// Sub-score for a raw value, clipped to [0, 100]
    pub fn score(&self, value: f64) -> f64 {
        let (first, last) = match (self.breakpoints.first(), self.breakpoints.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return MIN_SCORE,
        };

        let raw = if value <= first.value {
            first.score
        } else if value >= last.value {
            last.score
        } else {
            let idx = self
                .breakpoints
                .partition_point(|bp| bp.value <= value)
                .saturating_sub(1);
            let lo = self.breakpoints[idx];
            let hi = self.breakpoints[idx + 1];
            let t = (value - lo.value) / (hi.value - lo.value);
            lo.score + t * (hi.score - lo.score)
        };

        raw.clamp(MIN_SCORE, MAX_SCORE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vix() -> Thresholds {
        Thresholds::new(&[(12.0, 0.0), (16.0, 20.0), (20.0, 45.0), (30.0, 75.0), (40.0, 100.0)])
    }

    #[test]
    fn test_interpolation() {
        let t = vix();
        assert!(t.validate().is_ok());
        assert_eq!(t.score(12.0), 0.0);
        assert_eq!(t.score(16.0), 20.0);
        assert!((t.score(18.0) - 32.5).abs() < 1e-9);
        assert!((t.score(25.0) - 60.0).abs() < 1e-9);
        assert_eq!(t.score(40.0), 100.0);
    }

    #[test]
    fn test_flat_beyond_ends() {
        let t = vix();
        assert_eq!(t.score(5.0), 0.0);
        assert_eq!(t.score(150.0), 100.0);
        assert_eq!(t.score(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_decreasing_thresholds() {
        let t = Thresholds::new(&[(-1.0, 100.0), (0.0, 60.0), (1.5, 0.0)]);
        assert!(t.validate().is_ok());
        assert_eq!(t.score(-2.0), 100.0);
        assert!((t.score(-0.5) - 80.0).abs() < 1e-9);
        assert_eq!(t.score(3.0), 0.0);
    }

    #[test]
    fn test_validation_failures() {
        assert!(Thresholds::new(&[(1.0, 10.0)]).validate().is_err());
        assert!(Thresholds::new(&[(1.0, 10.0), (1.0, 20.0)]).validate().is_err());
        assert!(Thresholds::new(&[(1.0, 10.0), (2.0, 120.0)]).validate().is_err());
        assert!(Thresholds::new(&[(1.0, 10.0), (2.0, 50.0), (3.0, 20.0)])
            .validate()
            .is_err());
        assert!(Thresholds::new(&[(1.0, f64::NAN), (2.0, 50.0)]).validate().is_err());
    }

    #[test]
    fn test_monotone_toward_healthy() {
        // Walking a rising-risk indicator down toward calm never raises the score
        let t = vix();
        let mut previous = f64::INFINITY;
        let mut value = 60.0;
        while value >= 0.0 {
            let score = t.score(value);
            assert!(score <= previous, "score rose at {value}");
            previous = score;
            value -= 0.25;
        }
    }
}
