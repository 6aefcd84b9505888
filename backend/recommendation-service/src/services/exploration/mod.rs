// ============================================
// Exploration Module (Multi-Armed Bandit)
// ============================================
//
// Reward-driven explore/exploit selection over the catalog.
// Every item is an arm; feedback events become rewards that update
// the arm statistics, and selectors pick items from a candidate set:
//
// 1. ArmStore keeps pull counts and cumulative rewards (optionally in Redis)
// 2. EpsilonGreedySelector explores uniformly with probability epsilon
// 3. Ucb1Selector adds a confidence bonus that shrinks with pulls
//
// Selection samples without replacement: a picked item leaves the
// candidate pool before the next slot is filled.

pub mod arm_store;
pub mod epsilon_greedy;
pub mod persistence;
pub mod reward;
pub mod ucb;

pub use arm_store::{ArmStore, ArmView};
pub use epsilon_greedy::EpsilonGreedySelector;
pub use persistence::{ArmSink, InMemoryArmSink, RedisArmSink};
pub use reward::{rewards_for, DISLIKE_REWARD, LIKE_REWARD};
pub use ucb::Ucb1Selector;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArmStoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Invalid reward: {0}")]
    InvalidReward(f64),
}

pub type Result<T> = std::result::Result<T, ArmStoreError>;
