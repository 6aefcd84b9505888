use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RecommendationError;

pub type ItemId = i64;
pub type UserId = i64;

/// Per-item bandit statistics.
///
/// `average_reward` is never stored; it is always derived from the
/// cumulative reward and the pull count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Arm {
    pub pull_count: u64,
    pub cumulative_reward: f64,
}

impl Arm {
    pub fn average_reward(&self) -> f64 {
        if self.pull_count == 0 {
            0.0
        } else {
            self.cumulative_reward / self.pull_count as f64
        }
    }

    pub(crate) fn record(&mut self, reward: f64) {
        self.pull_count += 1;
        self.cumulative_reward += reward;
    }
}

/// Explicit like/dislike signal, stored upstream as -1 / 0 / 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Feedback {
    Disliked,
    #[default]
    Neutral,
    Liked,
}

impl Feedback {
    pub fn as_i8(&self) -> i8 {
        match self {
            Feedback::Disliked => -1,
            Feedback::Neutral => 0,
            Feedback::Liked => 1,
        }
    }
}

impl From<Feedback> for i8 {
    fn from(feedback: Feedback) -> Self {
        feedback.as_i8()
    }
}

impl TryFrom<i8> for Feedback {
    type Error = RecommendationError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Feedback::Disliked),
            0 => Ok(Feedback::Neutral),
            1 => Ok(Feedback::Liked),
            other => Err(RecommendationError::InvalidInput(format!(
                "liked must be -1, 0 or 1, got {}",
                other
            ))),
        }
    }
}

/// One user's interaction with one item, as seen by the scorers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub item_id: ItemId,
    /// 0..=100, absent when the client never reported watch progress
    pub watched_percent: Option<u8>,
    pub feedback: Feedback,
}

impl Interaction {
    pub fn new(item_id: ItemId, watched_percent: Option<u8>, feedback: Feedback) -> Self {
        Self {
            item_id,
            watched_percent: watched_percent.map(|w| w.min(100)),
            feedback,
        }
    }

    /// Watch progress as a fraction, missing progress counts as zero.
    pub fn watched_fraction(&self) -> f64 {
        f64::from(self.watched_percent.unwrap_or(0)) / 100.0
    }
}

/// Interaction row owned by the interaction store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub user_id: UserId,
    pub interaction: Interaction,
    pub timestamp: DateTime<Utc>,
}

/// Text and labels attached to a catalog item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemContent {
    pub text: String,
    pub labels: Vec<String>,
}

impl ItemContent {
    pub fn new(text: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            text: text.into(),
            labels,
        }
    }

    /// Text and labels joined into a single document for vectorization.
    pub fn document(&self) -> String {
        format!("{} {}", self.text, self.labels.join(" "))
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty() && self.labels.iter().all(|l| l.trim().is_empty())
    }
}

/// Recommendation strategies exposed to the serving layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    BanditEpsilonGreedy,
    BanditUcb1,
    Hybrid,
    Latent,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::BanditEpsilonGreedy,
        Strategy::BanditUcb1,
        Strategy::Hybrid,
        Strategy::Latent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::BanditEpsilonGreedy => "bandit-epsilon-greedy",
            Strategy::BanditUcb1 => "bandit-ucb1",
            Strategy::Hybrid => "hybrid",
            Strategy::Latent => "latent",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = RecommendationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bandit-epsilon-greedy" | "epsilon-greedy" | "epsilon_greedy" | "bandit" => {
                Ok(Strategy::BanditEpsilonGreedy)
            }
            "bandit-ucb1" | "ucb1" | "ucb" => Ok(Strategy::BanditUcb1),
            "hybrid" => Ok(Strategy::Hybrid),
            "latent" | "two-tower" | "two_tower" | "twotower" => Ok(Strategy::Latent),
            _ => Err(RecommendationError::UnknownStrategy(s.to_string())),
        }
    }
}

/// Why an item ended up in a recommendation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationReason {
    Exploration,
    Exploitation,
    ColdStart,
    ContentSimilarity,
    /// content similarity reinforced by several interactions
    ContentSimilarityBoosted,
    EmbeddingSimilarity,
}

impl RecommendationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationReason::Exploration => "exploration",
            RecommendationReason::Exploitation => "exploitation",
            RecommendationReason::ColdStart => "cold start",
            RecommendationReason::ContentSimilarity => "content similarity",
            RecommendationReason::ContentSimilarityBoosted => {
                "content similarity + multi-interaction boost"
            }
            RecommendationReason::EmbeddingSimilarity => "embedding similarity",
        }
    }
}

impl fmt::Display for RecommendationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub item_id: ItemId,
    pub score: f64,
    pub reason: RecommendationReason,
}

impl Recommendation {
    pub fn new(item_id: ItemId, score: f64, reason: RecommendationReason) -> Self {
        Self {
            item_id,
            score,
            reason,
        }
    }
}

/// Observability snapshot returned by the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStats {
    pub arm_count: usize,
    pub total_pulls: u64,
    pub content_index_fitted: bool,
    pub latent_model_fitted: bool,
    pub indexed_items: usize,
    pub latent_users: usize,
    pub latent_items: usize,
    pub embedding_dim: usize,
    /// (item, average reward, pull count), best first
    pub best_arms: Vec<(ItemId, f64, u64)>,
    pub cumulative_regret: f64,
}
