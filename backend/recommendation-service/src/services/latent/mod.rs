// ============================================
// Latent Interaction Model (two-tower)
// ============================================
//
// User tower: behavioural features → standardize → D-dim embedding
// Item tower: TF-IDF of text + labels → D-dim embedding
//
// Affinity = (cosine(user, item) + 1) / 2.
// Users or items without an embedding fall back to a cold-start estimate
// built from the user's like/dislike history plus a little noise.

pub mod features;
pub mod reduction;

use crate::config::LatentConfig;
use crate::models::{Feedback, Interaction, InteractionRecord, ItemContent, ItemId, UserId};
use crate::services::content_index::{ContentIndexError, TfidfVectorizer};
use crate::utils::{cosine_similarity, cosine_to_score};
use ndarray::Array1;
use parking_lot::RwLock;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use self::features::user_feature_matrix;
use self::reduction::{reduce_to, standardize};

#[derive(Debug, Error)]
pub enum LatentError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Item vectorization failed: {0}")]
    Vectorization(#[from] ContentIndexError),
}

pub type Result<T> = std::result::Result<T, LatentError>;

const LIKED_BIAS: f64 = 0.8;
const DISLIKED_BIAS: f64 = 0.2;
const NEUTRAL_BIAS: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub score: f64,
    /// True when at least one embedding was missing
    pub cold_start: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatentStats {
    pub users: usize,
    pub items: usize,
    pub embedding_dim: usize,
    pub fitted: bool,
}

/// One immutable build of both towers.
#[derive(Debug, Clone, Default)]
pub struct LatentSnapshot {
    user_embeddings: HashMap<UserId, Array1<f64>>,
    item_embeddings: HashMap<ItemId, Array1<f64>>,
    embedding_dim: usize,
    fitted: bool,
}

impl LatentSnapshot {
    pub fn empty(embedding_dim: usize) -> Self {
        Self {
            embedding_dim,
            ..Self::default()
        }
    }

    /// Build user and item embeddings from one consistent read of the data.
    pub fn build(
        interactions: &[InteractionRecord],
        items: &[(ItemId, ItemContent)],
        embedding_dim: usize,
        max_features: usize,
    ) -> Result<Self> {
        if interactions.is_empty() {
            return Err(LatentError::InsufficientData(
                "no interactions recorded".to_string(),
            ));
        }

        let documents: Vec<(ItemId, String)> = items
            .iter()
            .filter(|(_, content)| !content.is_blank())
            .map(|(id, content)| (*id, content.document()))
            .collect();
        if documents.is_empty() {
            return Err(LatentError::InsufficientData(
                "no item has text or labels".to_string(),
            ));
        }

        // User tower
        let (user_ids, user_features) = user_feature_matrix(interactions);
        let user_matrix = reduce_to(&standardize(&user_features), embedding_dim);
        let user_embeddings = user_ids
            .into_iter()
            .zip(user_matrix.outer_iter())
            .map(|(id, row)| (id, row.to_owned()))
            .collect();

        // Item tower
        let texts: Vec<&str> = documents.iter().map(|(_, doc)| doc.as_str()).collect();
        let tfidf = TfidfVectorizer::new(max_features).fit_transform(&texts)?;
        let item_matrix = reduce_to(&tfidf.to_dense(), embedding_dim);
        let item_embeddings = documents
            .iter()
            .zip(item_matrix.outer_iter())
            .map(|((id, _), row)| (*id, row.to_owned()))
            .collect();

        Ok(Self {
            user_embeddings,
            item_embeddings,
            embedding_dim,
            fitted: true,
        })
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn user_embedding(&self, user_id: UserId) -> Option<&Array1<f64>> {
        self.user_embeddings.get(&user_id)
    }

    pub fn item_embedding(&self, item_id: ItemId) -> Option<&Array1<f64>> {
        self.item_embeddings.get(&item_id)
    }

    pub fn stats(&self) -> LatentStats {
        LatentStats {
            users: self.user_embeddings.len(),
            items: self.item_embeddings.len(),
            embedding_dim: self.embedding_dim,
            fitted: self.fitted,
        }
    }

    /// Affinity of `user_id` for `item_id` in [0, 1].
    ///
    /// `history` is only consulted on the cold-start path.
    pub fn predict<R: Rng + ?Sized>(
        &self,
        user_id: UserId,
        item_id: ItemId,
        history: &[Interaction],
        noise: f64,
        rng: &mut R,
    ) -> Prediction {
        if let (Some(user), Some(item)) = (
            self.user_embeddings.get(&user_id),
            self.item_embeddings.get(&item_id),
        ) {
            return Prediction {
                score: cosine_to_score(cosine_similarity(user, item)),
                cold_start: false,
            };
        }

        Prediction {
            score: cold_start_score(history, noise, rng),
            cold_start: true,
        }
    }
}

/// Mean like/dislike bias of the history, jittered by uniform noise.
pub fn cold_start_score<R: Rng + ?Sized>(history: &[Interaction], noise: f64, rng: &mut R) -> f64 {
    let base = if history.is_empty() {
        NEUTRAL_BIAS
    } else {
        history
            .iter()
            .map(|i| match i.feedback {
                Feedback::Liked => LIKED_BIAS,
                Feedback::Disliked => DISLIKED_BIAS,
                Feedback::Neutral => NEUTRAL_BIAS,
            })
            .sum::<f64>()
            / history.len() as f64
    };

    let jitter = if noise > 0.0 {
        rng.gen_range(-noise..=noise)
    } else {
        0.0
    };

    (base + jitter).clamp(0.0, 1.0)
}

pub struct TwoTowerModel {
    snapshot: RwLock<Arc<LatentSnapshot>>,
    embedding_dim: usize,
    max_features: usize,
    cold_start_noise: f64,
}

impl TwoTowerModel {
    pub fn new(config: &LatentConfig) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(LatentSnapshot::empty(config.embedding_dim))),
            embedding_dim: config.embedding_dim,
            max_features: config.max_features,
            cold_start_noise: config.cold_start_noise,
        }
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    pub fn max_features(&self) -> usize {
        self.max_features
    }

    pub fn cold_start_noise(&self) -> f64 {
        self.cold_start_noise
    }

    pub fn snapshot(&self) -> Arc<LatentSnapshot> {
        self.snapshot.read().clone()
    }

    /// Swap in a new snapshot; both towers change together.
    pub fn install(&self, snapshot: LatentSnapshot) {
        let stats = snapshot.stats();
        *self.snapshot.write() = Arc::new(snapshot);

        info!(
            users = stats.users,
            items = stats.items,
            embedding_dim = stats.embedding_dim,
            "Installed latent model snapshot"
        );
    }

    /// Rebuild both towers; on failure the previous snapshot stays active.
    pub fn rebuild(
        &self,
        interactions: &[InteractionRecord],
        items: &[(ItemId, ItemContent)],
    ) -> Result<LatentStats> {
        match LatentSnapshot::build(interactions, items, self.embedding_dim, self.max_features) {
            Ok(snapshot) => {
                let stats = snapshot.stats();
                self.install(snapshot);
                Ok(stats)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    interactions = interactions.len(),
                    items = items.len(),
                    "Latent model rebuild failed"
                );
                Err(e)
            }
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.snapshot.read().is_fitted()
    }

    pub fn predict<R: Rng + ?Sized>(
        &self,
        user_id: UserId,
        item_id: ItemId,
        history: &[Interaction],
        rng: &mut R,
    ) -> Prediction {
        self.snapshot()
            .predict(user_id, item_id, history, self.cold_start_noise, rng)
    }

    pub fn user_embedding(&self, user_id: UserId) -> Option<Array1<f64>> {
        self.snapshot().user_embedding(user_id).cloned()
    }

    pub fn item_embedding(&self, item_id: ItemId) -> Option<Array1<f64>> {
        self.snapshot().item_embedding(item_id).cloned()
    }

    pub fn stats(&self) -> LatentStats {
        self.snapshot.read().stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn record(user_id: UserId, item_id: ItemId, watched: u8, feedback: Feedback) -> InteractionRecord {
        InteractionRecord {
            user_id,
            interaction: Interaction::new(item_id, Some(watched), feedback),
            timestamp: Utc::now(),
        }
    }

    fn catalog() -> Vec<(ItemId, ItemContent)> {
        vec![
            (1, ItemContent::new("dragon castle knight", vec!["fantasy".into()])),
            (2, ItemContent::new("ocean whale reef", vec!["nature".into()])),
            (3, ItemContent::new("", vec![])),
        ]
    }

    fn config(dim: usize) -> LatentConfig {
        LatentConfig {
            embedding_dim: dim,
            ..LatentConfig::default()
        }
    }

    #[test]
    fn test_rebuild_produces_embeddings() {
        let model = TwoTowerModel::new(&config(16));
        let interactions = vec![
            record(10, 1, 100, Feedback::Liked),
            record(11, 2, 30, Feedback::Disliked),
        ];

        let stats = model.rebuild(&interactions, &catalog()).unwrap();

        assert!(stats.fitted);
        assert_eq!(stats.users, 2);
        // blank item 3 gets no embedding
        assert_eq!(stats.items, 2);
        assert_eq!(model.user_embedding(10).unwrap().len(), 16);
        assert_eq!(model.item_embedding(1).unwrap().len(), 16);
        assert!(model.item_embedding(3).is_none());
    }

    #[test]
    fn test_predict_uses_embeddings_when_present() {
        let model = TwoTowerModel::new(&config(16));
        let interactions = vec![
            record(10, 1, 100, Feedback::Liked),
            record(11, 2, 30, Feedback::Disliked),
        ];
        model.rebuild(&interactions, &catalog()).unwrap();

        let mut rng = StdRng::seed_from_u64(1);
        let prediction = model.predict(10, 2, &[], &mut rng);
        assert!(!prediction.cold_start);
        assert!((0.0..=1.0).contains(&prediction.score));

        // deterministic for a fixed snapshot
        assert_eq!(model.predict(10, 2, &[], &mut rng), prediction);
    }

    #[test]
    fn test_insufficient_data_keeps_previous_snapshot() {
        let model = TwoTowerModel::new(&config(8));
        assert!(matches!(
            model.rebuild(&[], &catalog()),
            Err(LatentError::InsufficientData(_))
        ));
        assert!(!model.is_fitted());

        model
            .rebuild(&[record(1, 1, 50, Feedback::Neutral)], &catalog())
            .unwrap();
        let blank = vec![(1, ItemContent::default())];
        assert!(model
            .rebuild(&[record(1, 1, 50, Feedback::Neutral)], &blank)
            .is_err());

        assert!(model.is_fitted());
        assert_eq!(model.stats().items, 2);
    }

    #[test]
    fn test_cold_start_bias() {
        let mut rng = StdRng::seed_from_u64(7);
        let liked = vec![Interaction::new(1, None, Feedback::Liked)];
        let disliked = vec![Interaction::new(1, None, Feedback::Disliked)];

        assert_eq!(cold_start_score(&liked, 0.0, &mut rng), 0.8);
        assert_eq!(cold_start_score(&disliked, 0.0, &mut rng), 0.2);
        assert_eq!(cold_start_score(&[], 0.0, &mut rng), 0.5);

        for _ in 0..100 {
            let score = cold_start_score(&liked, 0.1, &mut rng);
            assert!((0.7 - 1e-12..=0.9 + 1e-12).contains(&score));
        }
    }

    #[test]
    fn test_unknown_user_is_cold_start() {
        let model = TwoTowerModel::new(&config(8));
        let mut rng = StdRng::seed_from_u64(3);

        let prediction = model.predict(99, 1, &[], &mut rng);
        assert!(prediction.cold_start);
        assert!((0.4 - 1e-12..=0.6 + 1e-12).contains(&prediction.score));
    }
}
