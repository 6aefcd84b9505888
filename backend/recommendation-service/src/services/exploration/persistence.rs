// ============================================
// Arm Persistence
// ============================================
//
// Durable storage for arm statistics so bandit learning survives restarts.
//
// Redis layout:
//   {prefix}:{item_id}  -> Hash { pull_count, cumulative_reward }
//   {prefix}:index      -> Set of item ids that have an arm

use super::{ArmStoreError, Result};
use crate::models::{Arm, ItemId};
use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use std::collections::HashMap;
use tracing::{debug, info};

const PULL_COUNT_FIELD: &str = "pull_count";
const CUMULATIVE_REWARD_FIELD: &str = "cumulative_reward";

/// Write-through sink for arm statistics.
///
/// `record` must apply the increment atomically: either both counters move
/// or neither does.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArmSink: Send + Sync {
    async fn record(&self, item_id: ItemId, reward: f64) -> Result<()>;

    async fn load_all(&self) -> Result<Vec<(ItemId, Arm)>>;

    async fn reset(&self) -> Result<()>;
}

/// Sink that keeps arms in process memory only.
///
/// Useful for tests and for deployments where bandit state may be lost.
#[derive(Default)]
pub struct InMemoryArmSink {
    arms: DashMap<ItemId, Arm>,
}

impl InMemoryArmSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArmSink for InMemoryArmSink {
    async fn record(&self, item_id: ItemId, reward: f64) -> Result<()> {
        self.arms.entry(item_id).or_default().record(reward);
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<(ItemId, Arm)>> {
        Ok(self
            .arms
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect())
    }

    async fn reset(&self) -> Result<()> {
        self.arms.clear();
        Ok(())
    }
}

pub struct RedisArmSink {
    redis_client: redis::Client,
    key_prefix: String,
}

impl RedisArmSink {
    pub fn new(redis_client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            redis_client,
            key_prefix: key_prefix.into(),
        }
    }

    pub fn from_url(url: &str, key_prefix: impl Into<String>) -> Result<Self> {
        let redis_client = redis::Client::open(url)?;
        Ok(Self::new(redis_client, key_prefix))
    }

    fn arm_key(&self, item_id: ItemId) -> String {
        format!("{}:{}", self.key_prefix, item_id)
    }

    fn index_key(&self) -> String {
        format!("{}:index", self.key_prefix)
    }
}

#[async_trait]
impl ArmSink for RedisArmSink {
    async fn record(&self, item_id: ItemId, reward: f64) -> Result<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        // MULTI/EXEC: HINCRBY + HINCRBYFLOAT + SADD
        let _: () = redis::pipe()
            .atomic()
            .hincr(self.arm_key(item_id), PULL_COUNT_FIELD, 1i64)
            .ignore()
            .hincr(self.arm_key(item_id), CUMULATIVE_REWARD_FIELD, reward)
            .ignore()
            .sadd(self.index_key(), item_id)
            .ignore()
            .query_async(&mut conn)
            .await?;

        debug!(item_id = item_id, reward = reward, "Persisted arm update");
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<(ItemId, Arm)>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let item_ids: Vec<ItemId> = conn.smembers(self.index_key()).await?;
        let mut arms = Vec::with_capacity(item_ids.len());

        for item_id in item_ids {
            let fields: HashMap<String, f64> = conn.hgetall(self.arm_key(item_id)).await?;
            let pull_count = fields.get(PULL_COUNT_FIELD).copied().unwrap_or(0.0);
            if pull_count < 0.0 {
                return Err(ArmStoreError::Storage(format!(
                    "negative pull count stored for item {}",
                    item_id
                )));
            }

            arms.push((
                item_id,
                Arm {
                    pull_count: pull_count as u64,
                    cumulative_reward: fields
                        .get(CUMULATIVE_REWARD_FIELD)
                        .copied()
                        .unwrap_or(0.0),
                },
            ));
        }

        info!(arms = arms.len(), "Loaded arm statistics from Redis");
        Ok(arms)
    }

    async fn reset(&self) -> Result<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let item_ids: Vec<ItemId> = conn.smembers(self.index_key()).await?;
        let mut keys: Vec<String> = item_ids.iter().map(|id| self.arm_key(*id)).collect();
        keys.push(self.index_key());

        let _: () = conn.del(keys).await?;

        info!(arms = item_ids.len(), "Cleared arm statistics in Redis");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        let sink = RedisArmSink::from_url("redis://localhost:6379", "bandit:arms")
            .expect("Redis client failed");

        assert_eq!(sink.arm_key(42), "bandit:arms:42");
        assert_eq!(sink.index_key(), "bandit:arms:index");
    }

    #[tokio::test]
    async fn test_in_memory_sink_round_trip() {
        let sink = InMemoryArmSink::new();
        sink.record(1, 1.0).await.unwrap();
        sink.record(1, 0.5).await.unwrap();

        let arms = sink.load_all().await.unwrap();
        assert_eq!(arms.len(), 1);
        assert_eq!(arms[0].1.pull_count, 2);

        sink.reset().await.unwrap();
        assert!(sink.load_all().await.unwrap().is_empty());
    }

    #[test]
    fn test_invalid_url_is_reported() {
        let result = RedisArmSink::from_url("not a url", "bandit:arms");
        assert!(matches!(result, Err(ArmStoreError::Redis(_))));
    }
}
