// ============================================
// Data Sources
// ============================================
//
// Collaborator interfaces the engine reads from. Catalog and interaction
// storage belong to other services; the engine only consumes them.
//
// In-memory implementations are provided for embedding and tests.

use crate::models::{Interaction, InteractionRecord, ItemContent, ItemId, UserId};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Read access to the video catalog.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Every recommendable item, in catalog order.
    async fn list_items(&self) -> Result<Vec<ItemId>>;

    async fn get_item_content(&self, item_id: ItemId) -> Result<Option<ItemContent>>;
}

/// Read access to recorded user interactions.
#[async_trait]
pub trait InteractionReader: Send + Sync {
    async fn list_interactions(&self, user_id: UserId) -> Result<Vec<Interaction>>;

    async fn list_all_interactions(&self) -> Result<Vec<InteractionRecord>>;
}

#[derive(Default)]
pub struct InMemoryCatalog {
    items: RwLock<Vec<ItemId>>,
    contents: RwLock<HashMap<ItemId, ItemContent>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items<I>(items: I) -> Self
    where
        I: IntoIterator<Item = (ItemId, ItemContent)>,
    {
        let catalog = Self::new();
        for (item_id, content) in items {
            catalog.upsert(item_id, content);
        }
        catalog
    }

    /// Add an item, or replace its content if it already exists.
    pub fn upsert(&self, item_id: ItemId, content: ItemContent) {
        let mut contents = self.contents.write();
        if contents.insert(item_id, content).is_none() {
            self.items.write().push(item_id);
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CatalogReader for InMemoryCatalog {
    async fn list_items(&self) -> Result<Vec<ItemId>> {
        Ok(self.items.read().clone())
    }

    async fn get_item_content(&self, item_id: ItemId) -> Result<Option<ItemContent>> {
        Ok(self.contents.read().get(&item_id).cloned())
    }
}

/// Interaction log holding at most one record per (user, item).
#[derive(Default)]
pub struct InMemoryInteractionLog {
    records: RwLock<Vec<InteractionRecord>>,
}

impl InMemoryInteractionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an interaction, replacing any earlier one for the same pair.
    pub fn record(&self, user_id: UserId, interaction: Interaction) {
        let record = InteractionRecord {
            user_id,
            interaction,
            timestamp: Utc::now(),
        };

        let mut records = self.records.write();
        match records
            .iter_mut()
            .find(|r| r.user_id == user_id && r.interaction.item_id == interaction.item_id)
        {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl InteractionReader for InMemoryInteractionLog {
    async fn list_interactions(&self, user_id: UserId) -> Result<Vec<Interaction>> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.interaction)
            .collect())
    }

    async fn list_all_interactions(&self) -> Result<Vec<InteractionRecord>> {
        Ok(self.records.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Feedback;

    #[tokio::test]
    async fn test_catalog_keeps_insertion_order() {
        let catalog = InMemoryCatalog::with_items(vec![
            (3, ItemContent::new("third", vec![])),
            (1, ItemContent::new("first", vec![])),
        ]);
        catalog.upsert(3, ItemContent::new("third, edited", vec![]));

        assert_eq!(catalog.list_items().await.unwrap(), vec![3, 1]);
        assert_eq!(
            catalog.get_item_content(3).await.unwrap().unwrap().text,
            "third, edited"
        );
        assert!(catalog.get_item_content(9).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_interaction_log_upserts_per_pair() {
        let log = InMemoryInteractionLog::new();
        log.record(1, Interaction::new(10, Some(20), Feedback::Neutral));
        log.record(1, Interaction::new(11, Some(90), Feedback::Liked));
        log.record(2, Interaction::new(10, Some(50), Feedback::Disliked));
        log.record(1, Interaction::new(10, Some(100), Feedback::Liked));

        assert_eq!(log.len(), 3);
        let history = log.list_interactions(1).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].watched_percent, Some(100));
        assert_eq!(history[0].feedback, Feedback::Liked);
        assert_eq!(log.list_all_interactions().await.unwrap().len(), 3);
    }
}
