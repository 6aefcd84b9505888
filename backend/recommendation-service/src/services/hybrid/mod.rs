// ============================================
// Hybrid Scorer
// ============================================
//
// Content-based ranking driven by the user's weighted history:
//
//   weight(i)  = watched/100 × (liked 1.5 | disliked 0.2 | neutral 1.0)
//   score(c)   = Σ sim(c, i) × weight(i) / contributors
//                + min(contributors × step, cap)
//
// Slots left after scoring are filled with unscored catalog items
// tagged as exploration. Items the user already interacted with are
// never returned.

use crate::config::HybridConfig;
use crate::models::{Feedback, Interaction, ItemId, Recommendation, RecommendationReason};
use crate::services::content_index::ContentSnapshot;
use std::collections::HashSet;
use tracing::{debug, info};

const COLD_START_BASE: f64 = 0.6;
const COLD_START_DECAY: f64 = 0.92;
const EXPLORATION_HIGH: f64 = 0.3;
const EXPLORATION_LOW: f64 = 0.1;

pub struct HybridScorer {
    config: HybridConfig,
}

impl HybridScorer {
    pub fn new(config: HybridConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }

    /// Weight of one history entry, `None` when the entry is ignored.
    pub fn interaction_weight(&self, interaction: &Interaction) -> Option<f64> {
        let watched = interaction.watched_fraction();

        match interaction.feedback {
            Feedback::Liked => Some(watched * self.config.liked_multiplier),
            Feedback::Disliked => {
                // Missing or zero progress is not an early exit
                let early = matches!(
                    interaction.watched_percent,
                    Some(w) if w > 0 && w < self.config.early_dislike_threshold
                );
                if self.config.skip_early_dislikes && early {
                    None
                } else {
                    Some(watched * self.config.disliked_multiplier)
                }
            }
            Feedback::Neutral => Some(watched),
        }
    }

    /// Rank up to `n` catalog items for a user with the given history.
    pub fn recommend(
        &self,
        index: &ContentSnapshot,
        catalog: &[ItemId],
        history: &[Interaction],
        n: usize,
    ) -> Vec<Recommendation> {
        if history.is_empty() {
            return cold_start(catalog, n);
        }

        let interacted: HashSet<ItemId> = history.iter().map(|i| i.item_id).collect();
        let candidates: Vec<ItemId> = catalog
            .iter()
            .copied()
            .filter(|id| !interacted.contains(id))
            .collect();

        let mut scored = if index.is_fitted() {
            self.score_candidates(index, &candidates, history)
        } else {
            Vec::new()
        };

        // Stable sort keeps catalog order on equal scores
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(n);

        let scored_count = scored.len();
        let picked: HashSet<ItemId> = scored.iter().map(|r| r.item_id).collect();
        let fill: Vec<ItemId> = candidates
            .iter()
            .copied()
            .filter(|id| !picked.contains(id))
            .take(n - scored.len())
            .collect();

        let fill_len = fill.len();
        scored.extend(
            fill.into_iter()
                .enumerate()
                .map(|(i, id)| {
                    Recommendation::new(
                        id,
                        exploration_score(i, fill_len),
                        RecommendationReason::Exploration,
                    )
                }),
        );

        info!(
            history = history.len(),
            candidates = candidates.len(),
            scored = scored_count,
            exploration = fill_len,
            "Hybrid scoring completed"
        );

        scored
    }

    fn score_candidates(
        &self,
        index: &ContentSnapshot,
        candidates: &[ItemId],
        history: &[Interaction],
    ) -> Vec<Recommendation> {
        let weighted: Vec<(ItemId, f64)> = history
            .iter()
            .filter_map(|i| self.interaction_weight(i).map(|w| (i.item_id, w)))
            .filter(|(id, _)| index.contains(*id))
            .collect();

        if weighted.is_empty() {
            debug!("No usable history for content scoring");
            return Vec::new();
        }

        candidates
            .iter()
            .filter_map(|&candidate| {
                let mut total = 0.0;
                let mut contributors = 0usize;

                for &(item_id, weight) in &weighted {
                    let similarity = index.similarity(item_id, candidate);
                    if similarity > 0.0 {
                        total += similarity * weight;
                        contributors += 1;
                    }
                }

                if contributors == 0 {
                    return None;
                }

                let boost = (contributors as f64 * self.config.multi_interaction_step)
                    .min(self.config.multi_interaction_cap);
                let reason = if contributors > 1 {
                    RecommendationReason::ContentSimilarityBoosted
                } else {
                    RecommendationReason::ContentSimilarity
                };

                Some(Recommendation::new(
                    candidate,
                    total / contributors as f64 + boost,
                    reason,
                ))
            })
            .collect()
    }
}

fn cold_start(catalog: &[ItemId], n: usize) -> Vec<Recommendation> {
    let picks: Vec<Recommendation> = catalog
        .iter()
        .take(n)
        .enumerate()
        .map(|(i, id)| {
            Recommendation::new(
                *id,
                COLD_START_BASE * COLD_START_DECAY.powi(i as i32),
                RecommendationReason::ColdStart,
            )
        })
        .collect();

    info!(returned = picks.len(), "Hybrid cold start for empty history");
    picks
}

/// Placeholder in (0.1, 0.3], decreasing with position.
fn exploration_score(position: usize, total: usize) -> f64 {
    let span = EXPLORATION_HIGH - EXPLORATION_LOW;
    EXPLORATION_HIGH - span * position as f64 / total.max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemContent;

    fn index() -> ContentSnapshot {
        let corpus = vec![
            (1, ItemContent::new("dragon castle knight", vec!["fantasy".into()])),
            (2, ItemContent::new("dragon castle princess", vec!["fantasy".into()])),
            (3, ItemContent::new("ocean whale submarine", vec!["nature".into()])),
            (4, ItemContent::new("ocean reef coral", vec!["nature".into()])),
            (5, ItemContent::new("tax accounting spreadsheet", vec![])),
        ];
        ContentSnapshot::build(&corpus, 200).unwrap()
    }

    fn scorer() -> HybridScorer {
        HybridScorer::new(HybridConfig::default())
    }

    #[test]
    fn test_cold_start_returns_catalog_prefix() {
        let recs = scorer().recommend(&index(), &[4, 3, 2, 1], &[], 3);

        let ids: Vec<ItemId> = recs.iter().map(|r| r.item_id).collect();
        assert_eq!(ids, vec![4, 3, 2]);
        assert!(recs.iter().all(|r| r.reason == RecommendationReason::ColdStart));
        assert!(recs.windows(2).all(|w| w[0].score > w[1].score));
    }

    #[test]
    fn test_similar_items_rank_first() {
        let history = vec![Interaction::new(1, Some(100), Feedback::Liked)];
        let recs = scorer().recommend(&index(), &[1, 2, 3, 4, 5], &history, 4);

        assert_eq!(recs.len(), 4);
        assert_eq!(recs[0].item_id, 2);
        assert_eq!(recs[0].reason, RecommendationReason::ContentSimilarity);
        assert!(recs[1..]
            .iter()
            .all(|r| r.reason == RecommendationReason::Exploration));
        assert!(recs.iter().all(|r| r.item_id != 1));
    }

    #[test]
    fn test_multi_interaction_boost() {
        let history = vec![
            Interaction::new(1, Some(100), Feedback::Liked),
            Interaction::new(3, Some(100), Feedback::Neutral),
        ];
        let idx = index();
        let recs = scorer().recommend(&idx, &[1, 2, 3, 4, 5], &history, 2);

        // 2 is close to 1 only, 4 close to 3 only: neither is boosted
        assert!(recs
            .iter()
            .all(|r| r.reason != RecommendationReason::ContentSimilarityBoosted));

        let expected = idx.similarity(1, 2) * 1.5 + 0.1;
        let two = recs.iter().find(|r| r.item_id == 2).unwrap();
        assert!((two.score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_early_dislike_skipped() {
        let s = scorer();
        assert_eq!(
            s.interaction_weight(&Interaction::new(1, Some(10), Feedback::Disliked)),
            None
        );
        let weight = s
            .interaction_weight(&Interaction::new(1, Some(50), Feedback::Disliked))
            .unwrap();
        assert!((weight - 0.1).abs() < 1e-12);
        assert_eq!(
            s.interaction_weight(&Interaction::new(1, None, Feedback::Neutral)),
            Some(0.0)
        );
    }

    #[test]
    fn test_dislike_without_progress_is_weighted_not_skipped() {
        let scorer = scorer();

        let no_progress = Interaction::new(3, None, Feedback::Disliked);
        assert_eq!(scorer.interaction_weight(&no_progress), Some(0.0));

        let zero_progress = Interaction::new(3, Some(0), Feedback::Disliked);
        assert_eq!(scorer.interaction_weight(&zero_progress), Some(0.0));

        let early = Interaction::new(3, Some(10), Feedback::Disliked);
        assert_eq!(scorer.interaction_weight(&early), None);
    }

    #[test]
    fn test_unfitted_index_only_explores() {
        let history = vec![Interaction::new(1, Some(100), Feedback::Liked)];
        let recs = scorer().recommend(&ContentSnapshot::empty(), &[1, 2, 3], &history, 5);

        let ids: Vec<ItemId> = recs.iter().map(|r| r.item_id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(recs
            .iter()
            .all(|r| r.reason == RecommendationReason::Exploration));
        assert!(recs[0].score > recs[1].score);
        assert!(recs.iter().all(|r| r.score > 0.1 && r.score <= 0.3));
    }

    #[test]
    fn test_never_returns_interacted_items() {
        let history = vec![
            Interaction::new(2, Some(90), Feedback::Liked),
            Interaction::new(5, Some(5), Feedback::Disliked),
        ];
        let recs = scorer().recommend(&index(), &[1, 2, 3, 4, 5], &history, 10);

        assert_eq!(recs.len(), 3);
        assert!(recs.iter().all(|r| r.item_id != 2 && r.item_id != 5));
    }
}
