use crate::progression::{ProgressionError, ProgressionResult};

/// Pure scoring policy for quiz submissions.
///
/// Maps `(score, attempt_number, base_points)` to the points awarded: a pass
/// on attempt 1 earns the full `base_points`, each retry multiplies the award
/// by `decay_factor`, and anything below `pass_threshold` earns nothing.
/// Both knobs are deployment configuration; two presets have shipped
/// (80 / 0.7 and the older 70 / 0.5), so neither is hard-coded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringPolicy {
    pass_threshold: i32,
    decay_factor: f64,
}

impl Default for ScoringPolicy {
    /// The preset of the current deployment: pass at 80, 30% decay per retry.
    fn default() -> Self {
        Self {
            pass_threshold: 80,
            decay_factor: 0.7,
        }
    }
}

impl ScoringPolicy {
    pub fn new(pass_threshold: i32, decay_factor: f64) -> ProgressionResult<Self> {
        if !(0..=100).contains(&pass_threshold) {
            return Err(ProgressionError::InvalidArgument(format!(
                "pass threshold {pass_threshold} is outside 0-100"
            )));
        }
        if !(decay_factor > 0.0 && decay_factor <= 1.0) {
            return Err(ProgressionError::InvalidArgument(format!(
                "decay factor {decay_factor} is outside (0, 1]"
            )));
        }
        Ok(Self {
            pass_threshold,
            decay_factor,
        })
    }

    /// The older shipped preset: pass at 70, points halve per retry.
    pub fn halving() -> Self {
        Self {
            pass_threshold: 70,
            decay_factor: 0.5,
        }
    }

    /// Builds the policy from the process configuration
    /// (`QUIZ_PASS_THRESHOLD` / `QUIZ_DECAY_FACTOR`).
    pub fn from_config() -> ProgressionResult<Self> {
        let config = common::Config::get();
        Self::new(config.quiz_pass_threshold, config.quiz_decay_factor)
    }

    pub fn pass_threshold(&self) -> i32 {
        self.pass_threshold
    }

    /// Points for one submission. Deterministic, no side effects.
    ///
    /// Invalid inputs are rejected rather than clamped: a negative score or
    /// base points configuration is a caller bug, not a zero-point attempt.
    pub fn points_awarded(
        &self,
        score: i32,
        attempt_number: i64,
        base_points: i64,
    ) -> ProgressionResult<i64> {
        if !(0..=100).contains(&score) {
            return Err(ProgressionError::InvalidArgument(format!(
                "score {score} is outside 0-100"
            )));
        }
        if attempt_number < 1 {
            return Err(ProgressionError::InvalidArgument(format!(
                "attempt number {attempt_number} must be at least 1"
            )));
        }
        if base_points < 0 {
            return Err(ProgressionError::InvalidArgument(format!(
                "base points {base_points} must not be negative"
            )));
        }

        if score < self.pass_threshold {
            return Ok(0);
        }

        let multiplier = self.decay_factor.powi((attempt_number - 1) as i32);
        Ok((base_points as f64 * multiplier).floor() as i64)
    }
}
