// ============================================
// Epsilon-Greedy Selector
// ============================================
//
// For every slot:
//   r ~ U[0, 1)
//   r < epsilon, or the store has no arms at all -> uniform random pick ("exploration")
//   otherwise -> best average reward among candidates with an arm ("exploitation")
//              -> uniform random when no candidate has an arm ("cold start")

use super::ArmView;
use crate::models::{ItemId, Recommendation, RecommendationReason};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

pub struct EpsilonGreedySelector {
    epsilon: f64,
    rng: Mutex<StdRng>,
}

impl Default for EpsilonGreedySelector {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl EpsilonGreedySelector {
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon: epsilon.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible exploration sequence
    pub fn with_seed(epsilon: f64, seed: u64) -> Self {
        Self {
            epsilon: epsilon.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn select(
        &self,
        view: &ArmView,
        candidates: &[ItemId],
        count: usize,
    ) -> Vec<Recommendation> {
        let mut remaining: Vec<ItemId> = candidates.to_vec();
        let mut picks = Vec::with_capacity(count.min(remaining.len()));
        let mut rng = self.rng.lock();

        while picks.len() < count && !remaining.is_empty() {
            let explore = rng.gen::<f64>() < self.epsilon || !view.store_has_arms;

            let (idx, reason) = if explore {
                (
                    rng.gen_range(0..remaining.len()),
                    RecommendationReason::Exploration,
                )
            } else {
                match best_known(view, &remaining) {
                    Some(idx) => (idx, RecommendationReason::Exploitation),
                    None => (
                        rng.gen_range(0..remaining.len()),
                        RecommendationReason::ColdStart,
                    ),
                }
            };

            let item_id = remaining.remove(idx);
            debug!(
                item_id = item_id,
                reason = reason.as_str(),
                "Epsilon-greedy pick"
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
            epsilon = self.epsilon,
            "Epsilon-greedy selection completed"
        );

        picks
    }
}

/// Index of the candidate with the highest average reward, first one on ties.
fn best_known(view: &ArmView, remaining: &[ItemId]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;

    for (idx, item_id) in remaining.iter().enumerate() {
        let Some(arm) = view.arm(*item_id) else {
            continue;
        };
        let average = arm.average_reward();
        if best.map_or(true, |(_, best_avg)| average > best_avg) {
            best = Some((idx, average));
        }
    }

    best.map(|(idx, _)| idx)
}
