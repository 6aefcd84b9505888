// ============================================
// Model Refresh Job
// ============================================
//
// Rebuilds the content similarity index and the latent model from the
// current catalog and interaction log.
//
// Workflow:
// 1. Read catalog contents and every interaction once (consistent input)
// 2. Build both snapshots on the blocking pool
// 3. Swap each snapshot in; a failed build keeps the previous one
//
// RefreshScheduler runs the refresh on a fixed interval until shut down.

use crate::config::RefreshConfig;
use crate::error::Result;
use crate::models::{ItemContent, ItemId};
use crate::services::content_index::{ContentSimilarityIndex, ContentSnapshot};
use crate::services::latent::{LatentError, LatentSnapshot, LatentStats, TwoTowerModel};
use crate::sources::{CatalogReader, InteractionReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Outcome of one refresh pass.
#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    pub catalog_items: usize,
    pub interactions: usize,
    /// Items in the installed content snapshot, `None` if the build failed
    pub content_index_items: Option<usize>,
    /// Stats of the installed latent snapshot, `None` if not rebuilt
    pub latent: Option<LatentStats>,
    /// Paths skipped for lack of data
    pub skipped: Vec<String>,
    /// Paths whose build failed
    pub failures: Vec<String>,
    pub duration_ms: u64,
}

impl RefreshReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct ModelRefresher {
    catalog: Arc<dyn CatalogReader>,
    interactions: Arc<dyn InteractionReader>,
    content_index: Arc<ContentSimilarityIndex>,
    latent: Arc<TwoTowerModel>,
    refresh_lock: Mutex<()>,
    attempted: AtomicBool,
}

impl ModelRefresher {
    pub fn new(
        catalog: Arc<dyn CatalogReader>,
        interactions: Arc<dyn InteractionReader>,
        content_index: Arc<ContentSimilarityIndex>,
        latent: Arc<TwoTowerModel>,
    ) -> Self {
        Self {
            catalog,
            interactions,
            content_index,
            latent,
            refresh_lock: Mutex::new(()),
            attempted: AtomicBool::new(false),
        }
    }

    /// Whether any refresh has started since construction.
    pub fn has_attempted(&self) -> bool {
        self.attempted.load(Ordering::Acquire)
    }

    /// Returns true for exactly one caller, and only if no refresh has
    /// been attempted yet.
    pub fn claim_first_refresh(&self) -> bool {
        !self.attempted.swap(true, Ordering::AcqRel)
    }

    /// Rebuild both scoring paths. Only one refresh runs at a time.
    ///
    /// Collaborator read failures abort the pass before anything is
    /// swapped. Build failures are contained and listed in the report.
    pub async fn refresh_all(&self) -> Result<RefreshReport> {
        let _guard = self.refresh_lock.lock().await;
        self.attempted.store(true, Ordering::Release);

        let refresh_id = Uuid::new_v4();
        let start = Instant::now();
        info!(refresh_id = %refresh_id, "Starting model refresh");

        let corpus = self.load_corpus().await?;
        let interactions = self.interactions.list_all_interactions().await?;

        let mut report = RefreshReport {
            catalog_items: corpus.len(),
            interactions: interactions.len(),
            ..Default::default()
        };

        let max_features = self.content_index.max_features();
        let embedding_dim = self.latent.embedding_dim();
        let latent_features = self.latent.max_features();

        let (content, latent) = tokio::task::spawn_blocking(move || {
            let content = ContentSnapshot::build(&corpus, max_features);
            let latent =
                LatentSnapshot::build(&interactions, &corpus, embedding_dim, latent_features);
            (content, latent)
        })
        .await?;

        match content {
            Ok(snapshot) => {
                report.content_index_items = Some(snapshot.len());
                self.content_index.install(snapshot);
            }
            Err(e) => {
                warn!(refresh_id = %refresh_id, error = %e, "Content index rebuild failed, keeping previous snapshot");
                report.failures.push(format!("content index: {}", e));
            }
        }

        match latent {
            Ok(snapshot) => {
                report.latent = Some(snapshot.stats());
                self.latent.install(snapshot);
            }
            Err(LatentError::InsufficientData(reason)) => {
                info!(refresh_id = %refresh_id, reason = %reason, "Skipping latent model rebuild");
                report.skipped.push(format!("latent model: {}", reason));
            }
            Err(e) => {
                warn!(refresh_id = %refresh_id, error = %e, "Latent model rebuild failed, keeping previous snapshot");
                report.failures.push(format!("latent model: {}", e));
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            refresh_id = %refresh_id,
            catalog_items = report.catalog_items,
            interactions = report.interactions,
            content_fitted = self.content_index.is_fitted(),
            latent_fitted = self.latent.is_fitted(),
            failures = report.failures.len(),
            duration_ms = report.duration_ms,
            "Model refresh completed"
        );

        Ok(report)
    }

    async fn load_corpus(&self) -> Result<Vec<(ItemId, ItemContent)>> {
        let items = self.catalog.list_items().await?;

        // Contents are fetched concurrently; catalog order is kept
        let contents = futures::future::try_join_all(
            items
                .iter()
                .map(|&item_id| self.catalog.get_item_content(item_id)),
        )
        .await?;

        Ok(items
            .into_iter()
            .zip(contents)
            .filter_map(|(item_id, content)| content.map(|c| (item_id, c)))
            .collect())
    }
}

/// Periodic driver for `ModelRefresher`.
pub struct RefreshScheduler {
    refresher: Arc<ModelRefresher>,
    interval: Duration,
}

impl RefreshScheduler {
    pub fn new(refresher: Arc<ModelRefresher>, interval: Duration) -> Self {
        Self {
            refresher,
            interval,
        }
    }

    /// `None` when background refresh is disabled.
    pub fn from_config(refresher: Arc<ModelRefresher>, config: &RefreshConfig) -> Option<Self> {
        if !config.enabled {
            info!("Background model refresh disabled");
            return None;
        }
        Some(Self::new(refresher, config.interval()))
    }

    /// Spawn the refresh loop. The first refresh runs immediately.
    ///
    /// # Returns
    /// - `watch::Sender<()>` - send (or drop) to stop the loop
    /// - `JoinHandle<()>` - completes once the loop has stopped
    pub fn spawn(self) -> (watch::Sender<()>, JoinHandle<()>) {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(());

        let handle = tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                "Model refresh scheduler started"
            );

            let mut timer = interval(self.interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut consecutive_failures = 0u32;

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        info!("Model refresh scheduler received shutdown signal");
                        break;
                    }
                    _ = timer.tick() => {
                        // Shutdown is honoured mid-refresh; swaps happen
                        // synchronously so nothing is left half-installed
                        let stopped = tokio::select! {
                            _ = shutdown_rx.changed() => true,
                            result = self.refresher.refresh_all() => {
                                consecutive_failures = track_outcome(result, consecutive_failures);
                                false
                            }
                        };

                        if stopped {
                            info!("Model refresh scheduler stopped during refresh");
                            break;
                        }
                    }
                }
            }

            info!("Model refresh scheduler stopped");
        });

        (shutdown_tx, handle)
    }
}

fn track_outcome(result: Result<RefreshReport>, consecutive_failures: u32) -> u32 {
    match result {
        Ok(report) if report.is_success() => {
            if consecutive_failures > 0 {
                info!(
                    recovered_after = consecutive_failures,
                    "Model refresh recovered after failures"
                );
            }
            0
        }
        Ok(report) => {
            let failures = consecutive_failures + 1;
            warn!(
                failures = ?report.failures,
                consecutive_failures = failures,
                "Model refresh completed with failures, will retry on next interval"
            );
            failures
        }
        Err(e) => {
            let failures = consecutive_failures + 1;
            error!(
                error = %e,
                consecutive_failures = failures,
                "Model refresh failed, serving previous snapshots"
            );
            failures
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LatentConfig;
    use crate::models::{Feedback, Interaction};
    use crate::sources::{InMemoryCatalog, InMemoryInteractionLog};
    use async_trait::async_trait;

    struct FailingCatalog;

    #[async_trait]
    impl CatalogReader for FailingCatalog {
        async fn list_items(&self) -> anyhow::Result<Vec<ItemId>> {
            Err(anyhow::anyhow!("catalog unavailable"))
        }

        async fn get_item_content(&self, _item_id: ItemId) -> anyhow::Result<Option<ItemContent>> {
            Ok(None)
        }
    }

    fn build_refresher(
        catalog: Arc<dyn CatalogReader>,
        log: Arc<InMemoryInteractionLog>,
    ) -> (Arc<ModelRefresher>, Arc<ContentSimilarityIndex>, Arc<TwoTowerModel>) {
        let index = Arc::new(ContentSimilarityIndex::new(200));
        let latent = Arc::new(TwoTowerModel::new(&LatentConfig {
            embedding_dim: 8,
            ..LatentConfig::default()
        }));
        let refresher = Arc::new(ModelRefresher::new(
            catalog,
            log,
            index.clone(),
            latent.clone(),
        ));
        (refresher, index, latent)
    }

    fn catalog() -> Arc<InMemoryCatalog> {
        Arc::new(InMemoryCatalog::with_items(vec![
            (1, ItemContent::new("dragon castle knight", vec!["fantasy".into()])),
            (2, ItemContent::new("dragon castle princess", vec!["fantasy".into()])),
            (3, ItemContent::new("ocean whale", vec!["nature".into()])),
        ]))
    }

    #[tokio::test]
    async fn test_refresh_builds_both_paths() {
        let log = Arc::new(InMemoryInteractionLog::new());
        log.record(7, Interaction::new(1, Some(90), Feedback::Liked));
        let (refresher, index, latent) = build_refresher(catalog(), log);

        let report = refresher.refresh_all().await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.catalog_items, 3);
        assert_eq!(report.content_index_items, Some(3));
        assert!(index.is_fitted());
        assert!(latent.is_fitted());
        assert!(refresher.has_attempted());
    }

    #[tokio::test]
    async fn test_refresh_without_interactions_skips_latent() {
        let (refresher, index, latent) =
            build_refresher(catalog(), Arc::new(InMemoryInteractionLog::new()));

        let report = refresher.refresh_all().await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.skipped.len(), 1);
        assert!(index.is_fitted());
        assert!(!latent.is_fitted());
    }

    #[tokio::test]
    async fn test_source_failure_keeps_snapshots() {
        let (refresher, index, _) =
            build_refresher(Arc::new(FailingCatalog), Arc::new(InMemoryInteractionLog::new()));

        let result = refresher.refresh_all().await;

        assert!(result.is_err());
        assert!(!index.is_fitted());
    }

    #[tokio::test]
    async fn test_first_refresh_claimed_once() {
        let (refresher, _, _) = build_refresher(catalog(), Arc::new(InMemoryInteractionLog::new()));

        assert!(refresher.claim_first_refresh());
        assert!(!refresher.claim_first_refresh());
    }

    #[tokio::test]
    async fn test_scheduler_refreshes_then_stops() {
        let (refresher, index, _) = build_refresher(catalog(), Arc::new(InMemoryInteractionLog::new()));
        let scheduler = RefreshScheduler::new(refresher, Duration::from_secs(3600));

        let (shutdown_tx, handle) = scheduler.spawn();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !index.is_fitted() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(index.is_fitted());

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }

    #[test]
    fn test_track_outcome_counts_failures() {
        let failed = RefreshReport {
            failures: vec!["content index: empty vocabulary".to_string()],
            ..Default::default()
        };
        assert_eq!(track_outcome(Ok(failed), 1), 2);
        assert_eq!(track_outcome(Ok(RefreshReport::default()), 3), 0);
        assert_eq!(
            track_outcome(
                Err(crate::error::RecommendationError::Source("down".into())),
                0
            ),
            1
        );
    }
}
