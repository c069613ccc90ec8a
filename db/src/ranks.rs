use crate::progression::{ProgressionError, ProgressionResult};

/// Ordered table of `(minimum points, rank name)` tiers.
///
/// The ladder is injected configuration rather than branching logic: a user's
/// rank is always the highest tier whose threshold does not exceed their
/// cumulative points. Deployments have shipped two scales (the default below
/// and a steeper 50/100/200/500/1000 one), so the table is constructible.
#[derive(Debug, Clone, PartialEq)]
pub struct RankLadder {
    tiers: Vec<(i64, String)>,
}

impl Default for RankLadder {
    fn default() -> Self {
        Self {
            tiers: vec![
                (0, "Newbie".to_owned()),
                (40, "Explorer".to_owned()),
                (60, "Achiever".to_owned()),
                (80, "Specialist".to_owned()),
                (100, "Expert".to_owned()),
                (120, "Master".to_owned()),
            ],
        }
    }
}

impl RankLadder {
    /// Builds a ladder from ascending `(min_points, name)` pairs. The first
    /// tier must start at 0 so every point total maps to a rank.
    pub fn new<S: Into<String>>(tiers: Vec<(i64, S)>) -> ProgressionResult<Self> {
        let tiers: Vec<(i64, String)> =
            tiers.into_iter().map(|(min, name)| (min, name.into())).collect();

        match tiers.first() {
            None => {
                return Err(ProgressionError::InvalidArgument(
                    "rank ladder must have at least one tier".to_owned(),
                ));
            }
            Some((min, _)) if *min != 0 => {
                return Err(ProgressionError::InvalidArgument(
                    "rank ladder must start at 0 points".to_owned(),
                ));
            }
            _ => {}
        }

        for window in tiers.windows(2) {
            if window[1].0 <= window[0].0 {
                return Err(ProgressionError::InvalidArgument(format!(
                    "rank ladder thresholds must be strictly ascending ({} then {})",
                    window[0].0, window[1].0
                )));
            }
        }

        Ok(Self { tiers })
    }

    /// The rank given at registration, before any points are earned.
    pub fn floor(&self) -> &str {
        &self.tiers[0].1
    }

    /// Highest tier whose threshold does not exceed `points`.
    pub fn rank_for(&self, points: i64) -> &str {
        self.tiers
            .iter()
            .rev()
            .find(|(min, _)| points >= *min)
            .map(|(_, name)| name.as_str())
            .unwrap_or_else(|| self.floor())
    }
}
