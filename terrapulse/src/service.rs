//! Service facade: submission, polling, and lifecycle of the worker pool.
//!
//! [`AnalysisService`] owns the task store, the result cache, the worker
//! pool, and a maintenance sweep that bounds memory. The submission and
//! polling paths never block on workers; they only touch the store's atomic
//! API.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cache::{CacheStats, ResultCache};
use crate::config::ServiceSettings;
use crate::geo::{AnalysisRequest, ValidationError};
use crate::provider::ImageryProvider;
use crate::store::{TaskId, TaskSnapshot, TaskStore};
use crate::summary::Summarizer;
use crate::worker::{WorkerContext, WorkerPool};

/// Running change-detection service.
pub struct AnalysisService {
    store: Arc<TaskStore>,
    cache: Arc<ResultCache>,
    shutdown: CancellationToken,
    workers: WorkerPool,
    maintenance: JoinHandle<()>,
}

impl AnalysisService {
    /// Starts the service: spawns the worker pool and the maintenance
    /// sweep. Must be called within a tokio runtime.
    pub fn new<P, S>(settings: &ServiceSettings, imagery: P, summarizer: S) -> Self
    where
        P: ImageryProvider + 'static,
        S: Summarizer + 'static,
    {
        let store = Arc::new(TaskStore::new());
        let cache = Arc::new(ResultCache::new(settings.cache_ttl));
        let shutdown = CancellationToken::new();

        let context = WorkerContext::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            Arc::new(imagery),
            Arc::new(summarizer),
        );
        let workers = WorkerPool::spawn(settings.worker_count, context, shutdown.clone());

        let maintenance = tokio::spawn(maintenance_loop(
            Arc::clone(&store),
            Arc::clone(&cache),
            settings.clone(),
            shutdown.clone(),
        ));

        info!(workers = settings.worker_count, "Analysis service started");
        Self {
            store,
            cache,
            shutdown,
            workers,
            maintenance,
        }
    }

    /// Validates and submits a request; returns the new task id.
    ///
    /// Validation failures are rejected synchronously, before any task
    /// exists. A successful submission is immediately visible to
    /// [`poll`](Self::poll) as `queued` (or `processing` if a worker is
    /// faster than the caller).
    pub fn submit(&self, request: AnalysisRequest) -> Result<TaskId, ValidationError> {
        request.validate()?;
        Ok(self.store.create(request))
    }

    /// Returns the current view of a task, or `None` for an unknown id.
    pub fn poll(&self, id: TaskId) -> Option<TaskSnapshot> {
        self.store.get(id)
    }

    /// Returns a snapshot of the result-cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Stops the workers and the maintenance sweep, waiting for in-flight
    /// attempts to finish.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        self.workers.join().await;
        let _ = self.maintenance.await;
        info!("Analysis service stopped");
    }
}

/// Periodically reclaims expired cache entries and horizon-expired terminal
/// task records.
async fn maintenance_loop(
    store: Arc<TaskStore>,
    cache: Arc<ResultCache>,
    settings: ServiceSettings,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(settings.sweep_interval);
    // The first tick fires immediately; skip it so a fresh service does not
    // sweep an empty store.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let purged = cache.purge_expired();
                let horizon = chrono::Duration::from_std(settings.task_horizon)
                    .unwrap_or_else(|_| chrono::Duration::hours(24));
                let evicted = store.evict_finished_before(Utc::now() - horizon);
                if purged > 0 || evicted > 0 {
                    tracing::debug!(
                        cache_entries = purged,
                        task_records = evicted,
                        "Maintenance sweep reclaimed expired state"
                    );
                }
            }
        }
    }
}
