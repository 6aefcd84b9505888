// ============================================
// Arm Statistics Store
// ============================================
//
// Per-item pull counts and cumulative rewards.
//
// Concurrency:
// - DashMap entry locks make each update atomic per item
// - `writes` is held shared by updates and exclusively by reset across the
//   sink call and the memory apply, so sink and memory see the same order
// - `epoch` guards in-memory reads against a half-cleared map
// - the persistence sink is written before memory; a failed write leaves
//   memory untouched

use super::{ArmSink, ArmStoreError, Result};
use crate::models::{Arm, ItemId};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

pub struct ArmStore {
    arms: DashMap<ItemId, Arm>,
    total_pulls: AtomicU64,
    epoch: RwLock<()>,
    writes: tokio::sync::RwLock<()>,
    sink: Option<Arc<dyn ArmSink>>,
}

/// Consistent read of the arms relevant to one selection.
#[derive(Debug, Clone, Default)]
pub struct ArmView {
    /// Arms of the requested candidates that have at least one record
    pub arms: HashMap<ItemId, Arm>,
    /// Sum of pull counts over every arm in the store
    pub total_pulls: u64,
    /// Whether the store holds any arm at all
    pub store_has_arms: bool,
}

impl ArmView {
    pub fn arm(&self, item_id: ItemId) -> Option<&Arm> {
        self.arms.get(&item_id)
    }

    pub fn average_reward(&self, item_id: ItemId) -> f64 {
        self.arm(item_id).map(Arm::average_reward).unwrap_or(0.0)
    }

    pub fn pull_count(&self, item_id: ItemId) -> u64 {
        self.arm(item_id).map(|arm| arm.pull_count).unwrap_or(0)
    }
}

impl Default for ArmStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ArmStore {
    /// In-memory store, statistics are lost on restart.
    pub fn new() -> Self {
        Self {
            arms: DashMap::new(),
            total_pulls: AtomicU64::new(0),
            epoch: RwLock::new(()),
            writes: tokio::sync::RwLock::new(()),
            sink: None,
        }
    }

    /// Store that writes every update through to `sink`.
    pub fn with_sink(sink: Arc<dyn ArmSink>) -> Self {
        Self {
            sink: Some(sink),
            ..Self::new()
        }
    }

    /// Rebuild the in-memory arms from what the sink has persisted.
    pub async fn restore(sink: Arc<dyn ArmSink>) -> Result<Self> {
        let persisted = sink.load_all().await?;
        let store = Self::with_sink(sink);

        let mut total = 0u64;
        for (item_id, arm) in persisted {
            total += arm.pull_count;
            store.arms.insert(item_id, arm);
        }
        store.total_pulls.store(total, Ordering::Release);

        info!(
            arms = store.arms.len(),
            total_pulls = total,
            "Restored arm statistics"
        );
        Ok(store)
    }

    /// Apply one reward to an item's arm, creating the arm on first use.
    pub async fn update(&self, item_id: ItemId, reward: f64) -> Result<Arm> {
        if !reward.is_finite() {
            return Err(ArmStoreError::InvalidReward(reward));
        }

        let _writes = self.writes.read().await;
        if let Some(sink) = &self.sink {
            sink.record(item_id, reward).await.map_err(|e| {
                error!(item_id = item_id, error = %e, "Failed to persist arm update");
                e
            })?;
        }

        let _epoch = self.epoch.read();
        let arm = {
            let mut entry = self.arms.entry(item_id).or_default();
            entry.record(reward);
            *entry
        };
        self.total_pulls.fetch_add(1, Ordering::AcqRel);

        debug!(
            item_id = item_id,
            reward = reward,
            pull_count = arm.pull_count,
            average_reward = arm.average_reward(),
            "Updated arm"
        );

        Ok(arm)
    }

    pub fn get(&self, item_id: ItemId) -> Option<Arm> {
        self.arms.get(&item_id).map(|arm| *arm)
    }

    /// Clear every arm and the global pull counter.
    pub async fn reset(&self) -> Result<()> {
        let _writes = self.writes.write().await;
        if let Some(sink) = &self.sink {
            sink.reset().await?;
        }

        let _epoch = self.epoch.write();
        let cleared = self.arms.len();
        self.arms.clear();
        self.total_pulls.store(0, Ordering::Release);

        info!(arms = cleared, "Reset all bandit arms");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.arms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arms.is_empty()
    }

    pub fn total_pulls(&self) -> u64 {
        self.total_pulls.load(Ordering::Acquire)
    }

    pub fn view(&self, candidates: &[ItemId]) -> ArmView {
        let _epoch = self.epoch.read();
        let arms = candidates
            .iter()
            .filter_map(|id| self.arms.get(id).map(|arm| (*id, *arm)))
            .collect();

        ArmView {
            arms,
            total_pulls: self.total_pulls.load(Ordering::Acquire),
            store_has_arms: !self.arms.is_empty(),
        }
    }

    pub fn snapshot(&self) -> HashMap<ItemId, Arm> {
        let _epoch = self.epoch.read();
        self.arms
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }

    /// Top `n` arms by average reward, pull count breaking ties.
    pub fn best_arms(&self, n: usize) -> Vec<(ItemId, f64, u64)> {
        let mut performance: Vec<(ItemId, f64, u64)> = self
            .snapshot()
            .into_iter()
            .filter(|(_, arm)| arm.pull_count > 0)
            .map(|(id, arm)| (id, arm.average_reward(), arm.pull_count))
            .collect();

        performance.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.2.cmp(&a.2))
                .then_with(|| a.0.cmp(&b.0))
        });
        performance.truncate(n);
        performance
    }

    /// Regret against always receiving `optimal_reward`.
    pub fn cumulative_regret(&self, optimal_reward: f64) -> f64 {
        let snapshot = self.snapshot();
        let pulls: u64 = snapshot.values().map(|arm| arm.pull_count).sum();
        if pulls == 0 {
            return 0.0;
        }

        let actual: f64 = snapshot.values().map(|arm| arm.cumulative_reward).sum();
        (optimal_reward * pulls as f64 - actual).max(0.0)
    }
}
