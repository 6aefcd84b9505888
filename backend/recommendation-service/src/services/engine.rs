// ============================================
// Recommendation Engine
// ============================================
//
// Per request:
// 1. Validate the requested count
// 2. Read the catalog and the user's history from the collaborators
// 3. Candidates = catalog − interacted items (catalog order preserved)
// 4. Lazily build the models once if the chosen path is not ready
// 5. Dispatch to the strategy implementation
//
// Feedback updates the arm store synchronously and never triggers a rebuild.

use crate::config::Config;
use crate::error::{RecommendationError, Result};
use crate::jobs::{ModelRefresher, RefreshScheduler};
use crate::models::{Arm, EngineStats, Interaction, ItemId, Recommendation, Strategy, UserId};
use crate::services::content_index::ContentSimilarityIndex;
use crate::services::exploration::{rewards_for, ArmStore, RedisArmSink, LIKE_REWARD};
use crate::services::latent::TwoTowerModel;
use crate::services::strategy::{
    EpsilonGreedyStrategy, HybridStrategy, LatentStrategy, RecommendationContext,
    RecommendationStrategy, Ucb1Strategy,
};
use crate::sources::{CatalogReader, InteractionReader};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const STATS_BEST_ARMS: usize = 5;

pub struct RecommendationEngine {
    config: Config,
    catalog: Arc<dyn CatalogReader>,
    interactions: Arc<dyn InteractionReader>,
    arms: Arc<ArmStore>,
    content_index: Arc<ContentSimilarityIndex>,
    latent: Arc<TwoTowerModel>,
    refresher: Arc<ModelRefresher>,
    epsilon_greedy: EpsilonGreedyStrategy,
    ucb1: Ucb1Strategy,
    hybrid: HybridStrategy,
    latent_strategy: LatentStrategy,
}

impl RecommendationEngine {
    /// Engine with in-memory arm statistics.
    pub fn new(
        config: Config,
        catalog: Arc<dyn CatalogReader>,
        interactions: Arc<dyn InteractionReader>,
    ) -> Self {
        Self::with_arm_store(config, catalog, interactions, Arc::new(ArmStore::new()))
    }

    pub fn with_arm_store(
        config: Config,
        catalog: Arc<dyn CatalogReader>,
        interactions: Arc<dyn InteractionReader>,
        arms: Arc<ArmStore>,
    ) -> Self {
        let content_index = Arc::new(ContentSimilarityIndex::new(
            config.content_index.max_features,
        ));
        let latent = Arc::new(TwoTowerModel::new(&config.latent));
        let refresher = Arc::new(ModelRefresher::new(
            catalog.clone(),
            interactions.clone(),
            content_index.clone(),
            latent.clone(),
        ));

        let epsilon_greedy = EpsilonGreedyStrategy::new(arms.clone(), &config.bandit);
        let ucb1 = Ucb1Strategy::new(arms.clone(), &config.bandit);
        let hybrid = HybridStrategy::new(content_index.clone(), config.hybrid.clone());
        let latent_strategy = LatentStrategy::new(latent.clone(), config.latent.seed);

        info!(
            epsilon = config.bandit.epsilon,
            ucb_c = config.bandit.ucb_c,
            max_recommendations = config.engine.max_recommendations,
            embedding_dim = config.latent.embedding_dim,
            "Recommendation engine initialized"
        );

        Self {
            config,
            catalog,
            interactions,
            arms,
            content_index,
            latent,
            refresher,
            epsilon_greedy,
            ucb1,
            hybrid,
            latent_strategy,
        }
    }

    /// Engine whose arm statistics persist to Redis when `REDIS_URL` is set.
    pub async fn from_config(
        config: Config,
        catalog: Arc<dyn CatalogReader>,
        interactions: Arc<dyn InteractionReader>,
    ) -> Result<Self> {
        let arms = match &config.redis.url {
            Some(url) => {
                let sink = RedisArmSink::from_url(url, config.redis.key_prefix.clone())?;
                Arc::new(ArmStore::restore(Arc::new(sink)).await?)
            }
            None => Arc::new(ArmStore::new()),
        };

        Ok(Self::with_arm_store(config, catalog, interactions, arms))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn arm_store(&self) -> &Arc<ArmStore> {
        &self.arms
    }

    pub fn content_index(&self) -> &Arc<ContentSimilarityIndex> {
        &self.content_index
    }

    pub fn latent_model(&self) -> &Arc<TwoTowerModel> {
        &self.latent
    }

    pub fn refresher(&self) -> Arc<ModelRefresher> {
        self.refresher.clone()
    }

    /// Background refresh driven by the `REFRESH_` settings, `None` when
    /// `REFRESH_ENABLED` is false.
    pub fn scheduler(&self) -> Option<RefreshScheduler> {
        RefreshScheduler::from_config(self.refresher.clone(), &self.config.refresh)
    }

    fn strategy_impl(&self, strategy: Strategy) -> &dyn RecommendationStrategy {
        match strategy {
            Strategy::BanditEpsilonGreedy => &self.epsilon_greedy,
            Strategy::BanditUcb1 => &self.ucb1,
            Strategy::Hybrid => &self.hybrid,
            Strategy::Latent => &self.latent_strategy,
        }
    }

    /// Whether the given scoring path has fitted model state.
    pub fn is_ready(&self, strategy: Strategy) -> bool {
        self.strategy_impl(strategy).is_ready()
    }

    /// Ranked recommendations for `user_id`, never including items the
    /// user already interacted with.
    #[tracing::instrument(
        skip(self, strategy),
        fields(request_id = %Uuid::new_v4(), strategy = tracing::field::Empty)
    )]
    pub async fn get_recommendations(
        &self,
        user_id: UserId,
        strategy: Strategy,
        n: usize,
    ) -> Result<Vec<Recommendation>> {
        let max = self.config.engine.max_recommendations;
        if n == 0 || n > max {
            return Err(RecommendationError::InvalidCount(format!(
                "n must be between 1 and {}, got {}",
                max, n
            )));
        }

        let scorer = self.strategy_impl(strategy);
        tracing::Span::current().record("strategy", scorer.strategy().as_str());
        if self.config.engine.lazy_refresh
            && !scorer.is_ready()
            && self.refresher.claim_first_refresh()
        {
            info!("Model not ready, running first refresh");
            if let Err(e) = self.refresher.refresh_all().await {
                warn!(error = %e, "Lazy model refresh failed, using fallbacks");
            }
        }

        let catalog = self.catalog.list_items().await?;
        let history = self.interactions.list_interactions(user_id).await?;

        let interacted: HashSet<ItemId> = history.iter().map(|i| i.item_id).collect();
        let candidates: Vec<ItemId> = catalog
            .iter()
            .copied()
            .filter(|id| !interacted.contains(id))
            .collect();

        let ctx = RecommendationContext {
            user_id,
            catalog: &catalog,
            candidates: &candidates,
            history: &history,
        };
        let recommendations = scorer.recommend(&ctx, n);

        info!(
            user_id = user_id,
            catalog = catalog.len(),
            candidates = candidates.len(),
            returned = recommendations.len(),
            ready = scorer.is_ready(),
            "Recommendations generated"
        );

        Ok(recommendations)
    }

    /// Same as `get_recommendations`, with the strategy given by name.
    pub async fn get_recommendations_by_name(
        &self,
        user_id: UserId,
        strategy: &str,
        n: usize,
    ) -> Result<Vec<Recommendation>> {
        let strategy = strategy.parse::<Strategy>()?;
        self.get_recommendations(user_id, strategy, n).await
    }

    /// Apply one reward to an item's arm.
    pub async fn record_feedback(&self, item_id: ItemId, reward: f64) -> Result<Arm> {
        Ok(self.arms.update(item_id, reward).await?)
    }

    /// Turn an interaction event into bandit rewards and apply them in order.
    ///
    /// Returns the number of rewards applied.
    pub async fn record_interaction(&self, interaction: &Interaction) -> Result<usize> {
        let rewards = rewards_for(interaction);
        for reward in &rewards {
            self.arms.update(interaction.item_id, *reward).await?;
        }
        Ok(rewards.len())
    }

    pub fn get_stats(&self) -> EngineStats {
        let latent = self.latent.stats();

        EngineStats {
            arm_count: self.arms.len(),
            total_pulls: self.arms.total_pulls(),
            content_index_fitted: self.content_index.is_fitted(),
            latent_model_fitted: latent.fitted,
            indexed_items: self.content_index.len(),
            latent_users: latent.users,
            latent_items: latent.items,
            embedding_dim: latent.embedding_dim,
            best_arms: self.arms.best_arms(STATS_BEST_ARMS),
            cumulative_regret: self.arms.cumulative_regret(LIKE_REWARD),
        }
    }

    pub async fn reset_bandit(&self) -> Result<()> {
        Ok(self.arms.reset().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Feedback, ItemContent};
    use crate::sources::{InMemoryCatalog, InMemoryInteractionLog};

    fn engine() -> (RecommendationEngine, Arc<InMemoryInteractionLog>) {
        let catalog = Arc::new(InMemoryCatalog::with_items(vec![
            (1, ItemContent::new("dragon castle knight", vec!["fantasy".into()])),
            (2, ItemContent::new("dragon castle princess", vec!["fantasy".into()])),
            (3, ItemContent::new("ocean whale reef", vec!["nature".into()])),
        ]));
        let log = Arc::new(InMemoryInteractionLog::new());
        let mut config = Config::default();
        config.bandit.seed = Some(11);
        (
            RecommendationEngine::new(config, catalog, log.clone()),
            log,
        )
    }

    #[tokio::test]
    async fn test_count_validation() {
        let (engine, _) = engine();

        for n in [0, 101] {
            let result = engine.get_recommendations(1, Strategy::Hybrid, n).await;
            assert!(matches!(result, Err(RecommendationError::InvalidCount(_))));
        }
        // rejected before any work, so no refresh was attempted
        assert!(!engine.refresher().has_attempted());
    }

    #[tokio::test]
    async fn test_unknown_strategy_name() {
        let (engine, _) = engine();
        let result = engine.get_recommendations_by_name(1, "popularity", 3).await;

        let err = result.unwrap_err();
        assert!(err.is_caller_error());
        assert!(matches!(err, RecommendationError::UnknownStrategy(_)));
    }

    #[tokio::test]
    async fn test_lazy_refresh_on_first_hybrid_request() {
        let (engine, log) = engine();
        log.record(1, Interaction::new(1, Some(100), Feedback::Liked));
        assert!(!engine.is_ready(Strategy::Hybrid));

        let recs = engine.get_recommendations(1, Strategy::Hybrid, 2).await.unwrap();

        assert!(engine.is_ready(Strategy::Hybrid));
        assert!(engine.is_ready(Strategy::Latent));
        assert_eq!(recs[0].item_id, 2);
        assert!(recs.iter().all(|r| r.item_id != 1));
    }

    #[tokio::test]
    async fn test_record_interaction_updates_arms() {
        let (engine, _) = engine();

        let applied = engine
            .record_interaction(&Interaction::new(3, Some(50), Feedback::Liked))
            .await
            .unwrap();
        assert_eq!(applied, 2);

        let stats = engine.get_stats();
        assert_eq!(stats.arm_count, 1);
        assert_eq!(stats.total_pulls, 2);
        assert_eq!(stats.best_arms, vec![(3, 0.75, 2)]);
        // 2 pulls × 1.0 optimal − 1.5 earned
        assert!((stats.cumulative_regret - 0.5).abs() < 1e-12);

        engine.reset_bandit().await.unwrap();
        assert_eq!(engine.get_stats().total_pulls, 0);
    }

    #[test]
    fn test_dispatch_matches_requested_strategy() {
        let (engine, _) = engine();
        for strategy in Strategy::ALL {
            assert_eq!(engine.strategy_impl(strategy).strategy(), strategy);
        }
    }

    #[test]
    fn test_scheduler_follows_refresh_flag() {
        let (engine, _) = engine();
        assert!(engine.scheduler().is_some());

        let mut config = engine.config().clone();
        config.refresh.enabled = false;
        let disabled = RecommendationEngine::new(
            config,
            Arc::new(InMemoryCatalog::new()),
            Arc::new(InMemoryInteractionLog::new()),
        );
        assert!(disabled.scheduler().is_none());
    }

    #[tokio::test]
    async fn test_invalid_reward_is_reported() {
        let (engine, _) = engine();
        let result = engine.record_feedback(1, f64::INFINITY).await;

        assert!(matches!(result, Err(RecommendationError::ArmStore(_))));
        assert_eq!(engine.get_stats().arm_count, 0);
    }
}
