// ============================================
// Recommendation Strategies
// ============================================
//
// One implementation per `Strategy` variant behind a common trait.
// The engine picks the implementation with a `match`, never by name.

use crate::config::{BanditConfig, HybridConfig};
use crate::models::{Interaction, ItemId, Recommendation, RecommendationReason, Strategy, UserId};
use crate::services::content_index::ContentSimilarityIndex;
use crate::services::exploration::{ArmStore, EpsilonGreedySelector, Ucb1Selector};
use crate::services::hybrid::HybridScorer;
use crate::services::latent::TwoTowerModel;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::info;

/// Everything a strategy may look at for one request.
#[derive(Debug, Clone, Copy)]
pub struct RecommendationContext<'a> {
    pub user_id: UserId,
    /// Full catalog, in catalog order
    pub catalog: &'a [ItemId],
    /// Catalog minus the items the user interacted with
    pub candidates: &'a [ItemId],
    pub history: &'a [Interaction],
}

pub trait RecommendationStrategy: Send + Sync {
    fn recommend(&self, ctx: &RecommendationContext<'_>, n: usize) -> Vec<Recommendation>;

    fn strategy(&self) -> Strategy;

    /// Whether the scoring path has the model state it needs.
    ///
    /// Strategies still answer when not ready, using their fallbacks.
    fn is_ready(&self) -> bool;
}

pub struct EpsilonGreedyStrategy {
    arms: Arc<ArmStore>,
    selector: EpsilonGreedySelector,
}

impl EpsilonGreedyStrategy {
    pub fn new(arms: Arc<ArmStore>, config: &BanditConfig) -> Self {
        let selector = match config.seed {
            Some(seed) => EpsilonGreedySelector::with_seed(config.epsilon, seed),
            None => EpsilonGreedySelector::new(config.epsilon),
        };
        Self { arms, selector }
    }
}

impl RecommendationStrategy for EpsilonGreedyStrategy {
    fn recommend(&self, ctx: &RecommendationContext<'_>, n: usize) -> Vec<Recommendation> {
        let view = self.arms.view(ctx.candidates);
        self.selector.select(&view, ctx.candidates, n)
    }

    fn strategy(&self) -> Strategy {
        Strategy::BanditEpsilonGreedy
    }

    fn is_ready(&self) -> bool {
        true
    }
}

pub struct Ucb1Strategy {
    arms: Arc<ArmStore>,
    selector: Ucb1Selector,
}

impl Ucb1Strategy {
    pub fn new(arms: Arc<ArmStore>, config: &BanditConfig) -> Self {
        Self {
            arms,
            selector: Ucb1Selector::new().with_exploration_constant(config.ucb_c),
        }
    }
}

impl RecommendationStrategy for Ucb1Strategy {
    fn recommend(&self, ctx: &RecommendationContext<'_>, n: usize) -> Vec<Recommendation> {
        let view = self.arms.view(ctx.candidates);
        self.selector.select(&view, ctx.candidates, n)
    }

    fn strategy(&self) -> Strategy {
        Strategy::BanditUcb1
    }

    fn is_ready(&self) -> bool {
        true
    }
}

pub struct HybridStrategy {
    index: Arc<ContentSimilarityIndex>,
    scorer: HybridScorer,
}

impl HybridStrategy {
    pub fn new(index: Arc<ContentSimilarityIndex>, config: HybridConfig) -> Self {
        Self {
            index,
            scorer: HybridScorer::new(config),
        }
    }
}

impl RecommendationStrategy for HybridStrategy {
    fn recommend(&self, ctx: &RecommendationContext<'_>, n: usize) -> Vec<Recommendation> {
        let snapshot = self.index.snapshot();
        self.scorer.recommend(&snapshot, ctx.catalog, ctx.history, n)
    }

    fn strategy(&self) -> Strategy {
        Strategy::Hybrid
    }

    fn is_ready(&self) -> bool {
        self.index.is_fitted()
    }
}

pub struct LatentStrategy {
    model: Arc<TwoTowerModel>,
    rng: Mutex<StdRng>,
}

impl LatentStrategy {
    pub fn new(model: Arc<TwoTowerModel>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            model,
            rng: Mutex::new(rng),
        }
    }
}

impl RecommendationStrategy for LatentStrategy {
    fn recommend(&self, ctx: &RecommendationContext<'_>, n: usize) -> Vec<Recommendation> {
        let snapshot = self.model.snapshot();
        let noise = self.model.cold_start_noise();

        let mut scored: Vec<Recommendation> = {
            let mut rng = self.rng.lock();
            ctx.candidates
                .iter()
                .map(|&item_id| {
                    let prediction =
                        snapshot.predict(ctx.user_id, item_id, ctx.history, noise, &mut *rng);
                    let reason = if prediction.cold_start {
                        RecommendationReason::ColdStart
                    } else {
                        RecommendationReason::EmbeddingSimilarity
                    };
                    Recommendation::new(item_id, prediction.score, reason)
                })
                .collect()
        };

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(n);

        info!(
            user_id = ctx.user_id,
            candidates = ctx.candidates.len(),
            returned = scored.len(),
            fitted = snapshot.is_fitted(),
            "Latent scoring completed"
        );

        scored
    }

    fn strategy(&self) -> Strategy {
        Strategy::Latent
    }

    fn is_ready(&self) -> bool {
        self.model.is_fitted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LatentConfig;
    use crate::models::{Feedback, ItemContent};

    fn ctx<'a>(
        catalog: &'a [ItemId],
        candidates: &'a [ItemId],
        history: &'a [Interaction],
    ) -> RecommendationContext<'a> {
        RecommendationContext {
            user_id: 1,
            catalog,
            candidates,
            history,
        }
    }

    #[tokio::test]
    async fn test_bandit_strategies_read_arm_store() {
        let arms = Arc::new(ArmStore::new());
        for _ in 0..3 {
            arms.update(5, 1.0).await.unwrap();
        }
        arms.update(6, -0.5).await.unwrap();

        let config = BanditConfig {
            epsilon: 0.0,
            seed: Some(1),
            ..BanditConfig::default()
        };
        let greedy = EpsilonGreedyStrategy::new(arms.clone(), &config);
        let recs = greedy.recommend(&ctx(&[5, 6], &[5, 6], &[]), 1);
        assert_eq!(recs[0].item_id, 5);
        assert_eq!(greedy.strategy(), Strategy::BanditEpsilonGreedy);

        let ucb = Ucb1Strategy::new(arms, &config);
        let recs = ucb.recommend(&ctx(&[5, 6, 7], &[5, 6, 7], &[]), 1);
        assert_eq!(recs[0].item_id, 7);
        assert_eq!(recs[0].reason, RecommendationReason::Exploration);
    }

    #[test]
    fn test_hybrid_readiness_follows_index() {
        let index = Arc::new(ContentSimilarityIndex::new(200));
        let hybrid = HybridStrategy::new(index.clone(), HybridConfig::default());
        assert!(!hybrid.is_ready());

        index
            .rebuild(&[(1, ItemContent::new("dragon castle", vec![]))])
            .unwrap();
        assert!(hybrid.is_ready());
    }

    #[test]
    fn test_latent_cold_start_returns_n_sorted() {
        let model = Arc::new(TwoTowerModel::new(&LatentConfig::default()));
        let latent = LatentStrategy::new(model, Some(42));
        let history = [Interaction::new(9, Some(100), Feedback::Liked)];

        let recs = latent.recommend(&ctx(&[1, 2, 3, 9], &[1, 2, 3], &history), 2);

        assert!(!latent.is_ready());
        assert_eq!(recs.len(), 2);
        assert!(recs.iter().all(|r| r.reason == RecommendationReason::ColdStart));
        assert!(recs[0].score >= recs[1].score);
        assert!(recs.iter().all(|r| r.item_id != 9));
    }
}
