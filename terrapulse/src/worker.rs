//! Job workers: claim queued tasks, resolve them, record the outcome.
//!
//! A bounded pool of workers drains the task store's queue. Each attempt is
//! cache-first: on a fingerprint hit the task completes immediately without
//! touching any upstream. On a miss the worker fetches the scenes, runs the
//! index engine (or the summarizer for the comparative mode), stores the
//! value in the cache, and completes the task.
//!
//! Failure discipline: a worker never retries within an attempt (clients
//! resubmit, which is a fresh task), and nothing escapes the loop. Every
//! attempt runs inside its own spawned task, so even a panic is caught at
//! the boundary and converted into a failed task instead of taking down the
//! pool.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::analysis::AnalysisResult;
use crate::cache::ResultCache;
use crate::engine;
use crate::error::{ErrorKind, TaskFailure};
use crate::fingerprint::fingerprint;
use crate::geo::{AnalysisRequest, IndexKind};
use crate::provider::{ImageryProvider, ProviderError};
use crate::store::{ClaimedTask, TaskStore};
use crate::summary::{InlineImage, SummaryError, Summarizer, COMPARISON_PROMPT};

/// Shared dependencies handed to every worker.
pub struct WorkerContext<P, S> {
    store: Arc<TaskStore>,
    cache: Arc<ResultCache>,
    imagery: Arc<P>,
    summarizer: Arc<S>,
}

impl<P, S> WorkerContext<P, S> {
    /// Bundles the shared state for a worker pool.
    pub fn new(
        store: Arc<TaskStore>,
        cache: Arc<ResultCache>,
        imagery: Arc<P>,
        summarizer: Arc<S>,
    ) -> Self {
        Self {
            store,
            cache,
            imagery,
            summarizer,
        }
    }
}

impl<P, S> Clone for WorkerContext<P, S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            imagery: Arc::clone(&self.imagery),
            summarizer: Arc::clone(&self.summarizer),
        }
    }
}

/// Handle to a running pool of workers.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `worker_count` workers draining the store's queue.
    ///
    /// Workers park on the store's notifier when the queue is empty and
    /// exit when `shutdown` is cancelled. In-flight attempts run to
    /// completion; the token is only consulted between tasks.
    pub fn spawn<P, S>(
        worker_count: usize,
        context: WorkerContext<P, S>,
        shutdown: CancellationToken,
    ) -> Self
    where
        P: ImageryProvider + 'static,
        S: Summarizer + 'static,
    {
        let handles = (0..worker_count)
            .map(|worker| {
                let context = context.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(worker_loop(worker, context, shutdown))
            })
            .collect();
        Self { handles }
    }

    /// Waits for every worker to exit. Call after cancelling the shutdown
    /// token.
    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn worker_loop<P, S>(worker: usize, context: WorkerContext<P, S>, shutdown: CancellationToken)
where
    P: ImageryProvider + 'static,
    S: Summarizer + 'static,
{
    debug!(worker, "Worker started");
    loop {
        if shutdown.is_cancelled() {
            break;
        }
        match context.store.claim_next_queued() {
            Some(claimed) => run_attempt(&context, claimed).await,
            None => {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = context.store.wait_for_work() => {}
                }
            }
        }
    }
    debug!(worker, "Worker stopped");
}

/// Runs one task attempt and records its outcome.
///
/// The attempt itself is spawned so a panic inside provider or engine code
/// surfaces as a `JoinError` here instead of unwinding the worker loop.
async fn run_attempt<P, S>(context: &WorkerContext<P, S>, claimed: ClaimedTask)
where
    P: ImageryProvider + 'static,
    S: Summarizer + 'static,
{
    let ClaimedTask { id, request } = claimed;

    let attempt = tokio::spawn(process_task(
        Arc::clone(&context.cache),
        Arc::clone(&context.imagery),
        Arc::clone(&context.summarizer),
        request,
    ));

    let outcome = match attempt.await {
        Ok(outcome) => outcome,
        Err(join_error) => {
            error!(task_id = %id, error = %join_error, "Task attempt aborted unexpectedly");
            Err(TaskFailure::internal("an unexpected internal error occurred"))
        }
    };

    let transition = match outcome {
        Ok(result) => context.store.complete(id, result),
        Err(failure) => context.store.fail(id, failure),
    };
    if let Err(store_error) = transition {
        // The claiming worker is the only writer, so this is a bug.
        error!(task_id = %id, error = %store_error, "Task transition rejected");
    }
}

/// Resolves one request to a result: cache-first, then upstreams + engine.
async fn process_task<P, S>(
    cache: Arc<ResultCache>,
    imagery: Arc<P>,
    summarizer: Arc<S>,
    request: AnalysisRequest,
) -> Result<AnalysisResult, TaskFailure>
where
    P: ImageryProvider,
    S: Summarizer,
{
    let fingerprint = fingerprint(&request);
    if let Some(cached) = cache.lookup(&fingerprint) {
        debug!(fingerprint = %fingerprint, "Result cache hit");
        return Ok(cached);
    }

    let result = match request.kind.index() {
        Some(index_kind) => run_index_analysis(&*imagery, &request, index_kind).await?,
        None => run_imagery_comparison(&*imagery, &*summarizer, &request).await?,
    };

    cache.store(fingerprint, result.clone());
    Ok(result)
}

/// Index analysis: fetch rasters, compare means, render heatmap previews.
///
/// Single-image mode (equal dates) fetches one scene and compares it
/// against itself; the change is zero by construction and only one preview
/// is produced.
async fn run_index_analysis<P: ImageryProvider>(
    imagery: &P,
    request: &AnalysisRequest,
    kind: IndexKind,
) -> Result<AnalysisResult, TaskFailure> {
    let from = imagery
        .fetch_index_raster(&request.bbox, request.from_date, kind)
        .await
        .map_err(imagery_failure)?;

    let to = if request.is_single_image() {
        None
    } else {
        Some(
            imagery
                .fetch_index_raster(&request.bbox, request.to_date, kind)
                .await
                .map_err(imagery_failure)?,
        )
    };

    let comparison =
        engine::compare_means(&from, to.as_ref().unwrap_or(&from)).map_err(engine_failure)?;

    let preview_from = engine::encode_preview(&from).map_err(preview_failure)?;
    let preview_to = match &to {
        Some(raster) => Some(engine::encode_preview(raster).map_err(preview_failure)?),
        None => None,
    };

    Ok(AnalysisResult {
        analysis_kind: request.kind,
        from_date: request.from_date,
        to_date: request.to_date,
        from_value: Some(comparison.from_value),
        to_value: Some(comparison.to_value),
        change_percentage: Some(comparison.change_percentage),
        preview_from: Some(preview_from),
        preview_to,
        summary: None,
    })
}

/// Comparative-imagery analysis: fetch true-color scenes and summarize.
async fn run_imagery_comparison<P: ImageryProvider, S: Summarizer>(
    imagery: &P,
    summarizer: &S,
    request: &AnalysisRequest,
) -> Result<AnalysisResult, TaskFailure> {
    let before = imagery
        .fetch_true_color(&request.bbox, request.from_date)
        .await
        .map_err(imagery_failure)?;

    let after = if request.is_single_image() {
        None
    } else {
        Some(
            imagery
                .fetch_true_color(&request.bbox, request.to_date)
                .await
                .map_err(imagery_failure)?,
        )
    };

    let mut images = vec![InlineImage::jpeg(&before)];
    if let Some(after) = &after {
        images.push(InlineImage::jpeg(after));
    }

    let summary = summarizer
        .describe(&images, COMPARISON_PROMPT)
        .await
        .map_err(summary_failure)?;

    Ok(AnalysisResult {
        analysis_kind: request.kind,
        from_date: request.from_date,
        to_date: request.to_date,
        from_value: None,
        to_value: None,
        change_percentage: None,
        preview_from: Some(engine::encode_jpeg_preview(&before)),
        preview_to: after.as_deref().map(engine::encode_jpeg_preview),
        summary: Some(summary),
    })
}

fn imagery_failure(error: ProviderError) -> TaskFailure {
    let kind = match &error {
        ProviderError::NoData => ErrorKind::NoDataAvailable,
        ProviderError::Auth => ErrorKind::AuthFailure,
        ProviderError::Transient(_) => ErrorKind::TransientUpstream,
        ProviderError::InvalidResponse(_) => ErrorKind::Internal,
    };
    warn!(kind = kind.as_str(), error = %error, "Imagery fetch failed");
    TaskFailure::new(kind, error.to_string())
}

fn summary_failure(error: SummaryError) -> TaskFailure {
    let kind = match &error {
        SummaryError::Auth => ErrorKind::AuthFailure,
        SummaryError::Transient(_) => ErrorKind::TransientUpstream,
        SummaryError::InvalidResponse(_) => ErrorKind::Internal,
    };
    warn!(kind = kind.as_str(), error = %error, "Summarization failed");
    TaskFailure::new(kind, error.to_string())
}

fn engine_failure(error: engine::EngineError) -> TaskFailure {
    match error {
        engine::EngineError::NoDataAvailable => {
            TaskFailure::new(ErrorKind::NoDataAvailable, error.to_string())
        }
    }
}

fn preview_failure(error: engine::PreviewError) -> TaskFailure {
    error!(error = %error, "Preview encoding failed");
    TaskFailure::internal("preview encoding failed")
}
