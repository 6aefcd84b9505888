// ============================================
// UCB1 (Upper Confidence Bound) Selector
// ============================================
//
// Multi-armed bandit algorithm for explore-exploit balance
//
// UCB1 Formula:
//   UCB(i) = avg_reward(i) + c * sqrt(ln(max(N, 1)) / n(i))
//
// Where:
//   - avg_reward(i): average reward for item i
//   - c: confidence width (default: 1.5)
//   - N: total pulls across all arms
//   - n(i): pulls for item i
//
// Items that were never pulled score +inf and are always tried first.
// Ties go to the candidate that comes first in the candidate list.

use super::ArmView;
use crate::models::{ItemId, Recommendation, RecommendationReason};
use tracing::{debug, info};

/// Deterministic UCB1 selector over a candidate list
pub struct Ucb1Selector {
    /// Confidence width (c in UCB formula)
    /// Higher = more exploration, lower = more exploitation
    exploration_constant: f64,
}

impl Default for Ucb1Selector {
    fn default() -> Self {
        Self {
            exploration_constant: 1.5,
        }
    }
}

impl Ucb1Selector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom exploration constant
    pub fn with_exploration_constant(mut self, c: f64) -> Self {
        self.exploration_constant = c;
        self
    }

    pub fn exploration_constant(&self) -> f64 {
        self.exploration_constant
    }

    /// Compute UCB score for an arm
    ///
    /// # Arguments
    /// * `pull_count` - Number of rewards recorded for the item
    /// * `average_reward` - Mean of those rewards
    /// * `total_pulls` - Pulls summed over every arm
    ///
    /// # Returns
    /// UCB score (higher = should be shown sooner)
    pub fn ucb_score(&self, pull_count: u64, average_reward: f64, total_pulls: u64) -> f64 {
        if pull_count == 0 {
            return f64::INFINITY;
        }

        let explore = self.exploration_constant
            * ((total_pulls.max(1) as f64).ln() / pull_count as f64).sqrt();

        average_reward + explore
    }

    /// Pick up to `count` items, best UCB first, without replacement.
    ///
    /// The reported score is the arm's average reward, not the UCB value.
    pub fn select(
        &self,
        view: &ArmView,
        candidates: &[ItemId],
        count: usize,
    ) -> Vec<Recommendation> {
        let mut remaining: Vec<ItemId> = candidates.to_vec();
        let mut picks = Vec::with_capacity(count.min(remaining.len()));

        while picks.len() < count && !remaining.is_empty() {
            let mut best_idx = 0;
            let mut best_score = f64::NEG_INFINITY;

            for (idx, item_id) in remaining.iter().enumerate() {
                let score = self.ucb_score(
                    view.pull_count(*item_id),
                    view.average_reward(*item_id),
                    view.total_pulls,
                );
                // strict comparison keeps the first candidate on ties
                if score > best_score {
                    best_score = score;
                    best_idx = idx;
                }
            }

            let item_id = remaining.remove(best_idx);
            let pull_count = view.pull_count(item_id);
            let reason = if pull_count == 0 {
                RecommendationReason::Exploration
            } else {
                RecommendationReason::Exploitation
            };

            debug!(
                item_id = item_id,
                pull_count = pull_count,
                ucb = best_score,
                reason = reason.as_str(),
                "UCB pick"
            );

            picks.push(Recommendation::new(
                item_id,
                view.average_reward(item_id),
                reason,
            ));
        }

        info!(
            pool_size = candidates.len(),
            selected = picks.len(),
            total_pulls = view.total_pulls,
            "UCB selection completed"
        );

        picks
    }
}
