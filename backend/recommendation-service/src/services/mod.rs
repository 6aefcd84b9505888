//! Recommendation services
//!
//! Three scoring paths share one catalog and interaction feed:
//! 1. `exploration` - multi-armed bandit over item rewards
//! 2. `hybrid` - content-based ranking over `content_index`
//! 3. `latent` - two-tower embedding similarity
//!
//! `engine` dispatches requests to a path through `strategy`.

pub mod content_index;
pub mod engine;
pub mod exploration;
pub mod hybrid;
pub mod latent;
pub mod strategy;

pub use content_index::{ContentIndexError, ContentSimilarityIndex, ContentSnapshot};
pub use engine::RecommendationEngine;
pub use exploration::{ArmSink, ArmStore, ArmStoreError, InMemoryArmSink, RedisArmSink};
pub use hybrid::HybridScorer;
pub use latent::{LatentError, LatentSnapshot, Prediction, TwoTowerModel};
pub use strategy::{RecommendationContext, RecommendationStrategy};
