//! Integration tests for the analysis service.
//!
//! These drive the full submit -> claim -> process -> poll path with stub
//! upstream clients, verifying:
//! - submission is immediately pollable and never transiently NotFound
//! - identical requests share one cached result and one upstream round trip
//! - the change-percentage and no-data contracts survive the whole pipeline
//! - task statuses only ever move forward
//! - K workers against M tasks terminate every task exactly once

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use terrapulse::config::ServiceSettings;
use terrapulse::error::ErrorKind;
use terrapulse::geo::{AnalysisKind, AnalysisRequest, BoundingBox, IndexKind};
use terrapulse::provider::{ImageryProvider, ProviderError};
use terrapulse::raster::RasterSample;
use terrapulse::service::AnalysisService;
use terrapulse::store::{TaskId, TaskSnapshot, TaskStatus};
use terrapulse::summary::{InlineImage, SummaryError, Summarizer};

// =============================================================================
// Test Helpers
// =============================================================================

/// Imagery stub: returns a configured raster per date, counting every call.
///
/// The counters are shared `Arc`s so tests can keep a handle after the stub
/// moves into the service.
struct StubImagery {
    rasters: Mutex<HashMap<NaiveDate, RasterSample>>,
    fallback: Option<RasterSample>,
    index_calls: Arc<AtomicUsize>,
    true_color_calls: Arc<AtomicUsize>,
}

impl StubImagery {
    fn new() -> Self {
        Self {
            rasters: Mutex::new(HashMap::new()),
            fallback: None,
            index_calls: Arc::new(AtomicUsize::new(0)),
            true_color_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_fallback(raster: RasterSample) -> Self {
        Self {
            fallback: Some(raster),
            ..Self::new()
        }
    }

    fn set_raster(&self, date: NaiveDate, raster: RasterSample) {
        self.rasters.lock().unwrap().insert(date, raster);
    }

    fn counters(&self) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        (
            Arc::clone(&self.index_calls),
            Arc::clone(&self.true_color_calls),
        )
    }
}

impl ImageryProvider for StubImagery {
    async fn fetch_index_raster(
        &self,
        _bbox: &BoundingBox,
        date: NaiveDate,
        _kind: IndexKind,
    ) -> Result<RasterSample, ProviderError> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        self.rasters
            .lock()
            .unwrap()
            .get(&date)
            .cloned()
            .or_else(|| self.fallback.clone())
            .ok_or(ProviderError::NoData)
    }

    async fn fetch_true_color(
        &self,
        _bbox: &BoundingBox,
        _date: NaiveDate,
    ) -> Result<Vec<u8>, ProviderError> {
        self.true_color_calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0xFF, 0xD8, 0xFF, 0xE0])
    }

    fn name(&self) -> &str {
        "stub imagery"
    }
}

/// Summarizer stub with a canned answer.
struct StubSummarizer {
    calls: Arc<AtomicUsize>,
}

impl StubSummarizer {
    fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl Summarizer for StubSummarizer {
    async fn describe(
        &self,
        _images: &[InlineImage],
        _prompt: &str,
    ) -> Result<String, SummaryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("New reservoir visible in the southern half.".into())
    }

    fn name(&self) -> &str {
        "stub summarizer"
    }
}

fn settings(worker_count: usize) -> ServiceSettings {
    ServiceSettings {
        worker_count,
        ..ServiceSettings::default()
    }
}

fn date(text: &str) -> NaiveDate {
    text.parse().unwrap()
}

fn request(kind: AnalysisKind) -> AnalysisRequest {
    AnalysisRequest {
        bbox: BoundingBox::new(2.2, 48.8, 2.4, 48.9).unwrap(),
        from_date: date("2023-06-01"),
        to_date: date("2024-06-01"),
        kind,
    }
}

/// Polls until the task is terminal, panicking after two seconds.
async fn wait_terminal(service: &AnalysisService, id: TaskId) -> TaskSnapshot {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let snapshot = service.poll(id).expect("submitted task must be pollable");
        if snapshot.status.is_terminal() {
            return snapshot;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("task {id} did not reach a terminal state in time");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// =============================================================================
// Integration Tests
// =============================================================================

#[tokio::test]
async fn test_submit_is_immediately_pollable() {
    let imagery = StubImagery::with_fallback(RasterSample::filled(2, 2, 0.5));
    let service = AnalysisService::new(&settings(2), imagery, StubSummarizer::new());

    let id = service.submit(request(AnalysisKind::Ndvi)).unwrap();

    // Never NotFound right after a successful submit, whatever the workers
    // have done in the meantime.
    let snapshot = service.poll(id).expect("fresh task must be visible");
    assert!(matches!(
        snapshot.status,
        TaskStatus::Queued | TaskStatus::Processing | TaskStatus::Completed
    ));

    wait_terminal(&service, id).await;
    service.shutdown().await;
}

#[tokio::test]
async fn test_validation_rejected_before_task_creation() {
    let imagery = StubImagery::new();
    let service = AnalysisService::new(&settings(1), imagery, StubSummarizer::new());

    let mut bad = request(AnalysisKind::Ndvi);
    bad.bbox.west = bad.bbox.east + 1.0;
    assert!(service.submit(bad).is_err());

    service.shutdown().await;
}

#[tokio::test]
async fn test_unknown_id_is_not_found() {
    let imagery = StubImagery::new();
    let service = AnalysisService::new(&settings(1), imagery, StubSummarizer::new());

    let unknown: TaskId = "00000000-0000-4000-8000-000000000000".parse().unwrap();
    assert!(service.poll(unknown).is_none());

    service.shutdown().await;
}

#[tokio::test]
async fn test_change_percentage_contract_end_to_end() {
    let imagery = StubImagery::new();
    imagery.set_raster(date("2023-06-01"), RasterSample::filled(4, 4, 0.6));
    imagery.set_raster(date("2024-06-01"), RasterSample::filled(4, 4, 0.4));
    let service = AnalysisService::new(&settings(2), imagery, StubSummarizer::new());

    let id = service.submit(request(AnalysisKind::Ndvi)).unwrap();
    let snapshot = wait_terminal(&service, id).await;

    assert_eq!(snapshot.status, TaskStatus::Completed);
    let result = snapshot.result.unwrap();
    assert_eq!(result.from_value, Some(0.6));
    assert_eq!(result.to_value, Some(0.4));
    assert_eq!(result.change_percentage, Some(-33.33));
    assert!(snapshot.error.is_none());

    service.shutdown().await;
}

#[tokio::test]
async fn test_near_zero_baseline_yields_zero_change() {
    let imagery = StubImagery::new();
    imagery.set_raster(date("2023-06-01"), RasterSample::filled(4, 4, 0.000_000_1));
    imagery.set_raster(date("2024-06-01"), RasterSample::filled(4, 4, 0.5));
    let service = AnalysisService::new(&settings(2), imagery, StubSummarizer::new());

    let id = service.submit(request(AnalysisKind::Ndwi)).unwrap();
    let snapshot = wait_terminal(&service, id).await;

    let result = snapshot.result.unwrap();
    assert_eq!(result.to_value, Some(0.5));
    assert_eq!(
        result.change_percentage,
        Some(0.0),
        "epsilon guard must win over the huge ratio"
    );

    service.shutdown().await;
}

#[tokio::test]
async fn test_idempotent_caching_suppresses_second_fetch() {
    let imagery = StubImagery::with_fallback(RasterSample::filled(4, 4, 0.6));
    let (index_calls, _) = imagery.counters();
    let service = AnalysisService::new(&settings(2), imagery, StubSummarizer::new());

    let first = service.submit(request(AnalysisKind::Ndvi)).unwrap();
    let first_snapshot = wait_terminal(&service, first).await;

    let second = service.submit(request(AnalysisKind::Ndvi)).unwrap();
    let second_snapshot = wait_terminal(&service, second).await;

    assert_ne!(first, second, "resubmission is a fresh task");
    assert_eq!(first_snapshot.status, TaskStatus::Completed);
    assert_eq!(second_snapshot.status, TaskStatus::Completed);
    assert_eq!(
        first_snapshot.result, second_snapshot.result,
        "cached result must be bit-identical"
    );
    assert_eq!(
        index_calls.load(Ordering::SeqCst),
        2,
        "one scene per date; the second submission must not fetch"
    );

    let stats = service.cache_stats();
    assert_eq!(stats.hits, 1);

    service.shutdown().await;
}

#[tokio::test]
async fn test_no_data_task_fails_with_kind() {
    let imagery = StubImagery::with_fallback(RasterSample::filled(4, 4, f32::NAN));
    let service = AnalysisService::new(&settings(2), imagery, StubSummarizer::new());

    let id = service.submit(request(AnalysisKind::Ndvi)).unwrap();
    let snapshot = wait_terminal(&service, id).await;

    assert_eq!(snapshot.status, TaskStatus::Failed);
    assert!(snapshot.result.is_none(), "no fabricated numeric result");
    let error = snapshot.error.unwrap();
    assert_eq!(error.kind, ErrorKind::NoDataAvailable);

    service.shutdown().await;
}

#[tokio::test]
async fn test_failed_results_are_not_cached() {
    let imagery = StubImagery::new(); // no rasters: every fetch is NoData
    let service = AnalysisService::new(&settings(1), imagery, StubSummarizer::new());

    let first = service.submit(request(AnalysisKind::Ndvi)).unwrap();
    wait_terminal(&service, first).await;
    let second = service.submit(request(AnalysisKind::Ndvi)).unwrap();
    let snapshot = wait_terminal(&service, second).await;

    assert_eq!(snapshot.status, TaskStatus::Failed);
    assert_eq!(service.cache_stats().hits, 0);

    service.shutdown().await;
}

#[tokio::test]
async fn test_true_color_mode_returns_summary() {
    let imagery = StubImagery::new();
    let (_, true_color_calls) = imagery.counters();
    let summarizer = StubSummarizer::new();
    let summary_calls = summarizer.counter();
    let service = AnalysisService::new(&settings(2), imagery, summarizer);

    let id = service.submit(request(AnalysisKind::TrueColor)).unwrap();
    let snapshot = wait_terminal(&service, id).await;

    assert_eq!(snapshot.status, TaskStatus::Completed);
    let result = snapshot.result.unwrap();
    assert_eq!(
        result.summary.as_deref(),
        Some("New reservoir visible in the southern half.")
    );
    assert!(result.from_value.is_none());
    assert!(result
        .preview_from
        .as_deref()
        .unwrap()
        .starts_with("data:image/jpeg;base64,"));
    assert!(result.preview_to.is_some());
    assert_eq!(true_color_calls.load(Ordering::SeqCst), 2);
    assert_eq!(summary_calls.load(Ordering::SeqCst), 1);

    service.shutdown().await;
}

#[tokio::test]
async fn test_statuses_only_move_forward() {
    let imagery = StubImagery::with_fallback(RasterSample::filled(2, 2, 0.5));
    let service = AnalysisService::new(&settings(1), imagery, StubSummarizer::new());

    let id = service.submit(request(AnalysisKind::Ndvi)).unwrap();

    // Record every status we can observe until the task settles.
    let order = |status: TaskStatus| match status {
        TaskStatus::Queued => 0,
        TaskStatus::Processing => 1,
        TaskStatus::Completed | TaskStatus::Failed => 2,
    };
    let mut observed = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let snapshot = service.poll(id).unwrap();
        observed.push(snapshot.status);
        if snapshot.status.is_terminal() {
            break;
        }
        assert!(
            tokio::time::Instant::now() <= deadline,
            "task did not settle in time"
        );
        tokio::task::yield_now().await;
    }

    for pair in observed.windows(2) {
        assert!(
            order(pair[0]) <= order(pair[1]),
            "status regressed: {:?} -> {:?}",
            pair[0],
            pair[1]
        );
    }

    // Terminal means terminal: later polls must agree.
    let settled = service.poll(id).unwrap();
    assert_eq!(settled.status, observed.last().copied().unwrap());

    service.shutdown().await;
}

#[tokio::test]
async fn test_k_workers_m_tasks_each_processed_exactly_once() {
    let imagery = StubImagery::with_fallback(RasterSample::filled(2, 2, 0.5));
    let (index_calls, _) = imagery.counters();
    let service = AnalysisService::new(&settings(4), imagery, StubSummarizer::new());

    // Distinct bounding boxes: distinct fingerprints, so the cache cannot
    // mask duplicate or lost processing.
    let task_count = 24usize;
    let mut ids = Vec::new();
    for i in 0..task_count {
        let mut req = request(AnalysisKind::Ndvi);
        req.bbox = BoundingBox::new(2.2 + i as f64 * 0.01, 48.8, 2.5 + i as f64 * 0.01, 48.9)
            .unwrap();
        ids.push(service.submit(req).unwrap());
    }

    let mut completed = 0;
    for id in &ids {
        let snapshot = wait_terminal(&service, *id).await;
        if snapshot.status == TaskStatus::Completed {
            completed += 1;
        }
    }
    assert_eq!(completed, task_count, "every task reaches Completed");
    assert_eq!(
        index_calls.load(Ordering::SeqCst),
        task_count * 2,
        "two scenes per task: no task processed twice, none lost"
    );

    let stats = service.cache_stats();
    assert_eq!(stats.hits, 0, "distinct requests cannot hit the cache");

    service.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_workers() {
    let imagery = StubImagery::with_fallback(RasterSample::filled(2, 2, 0.5));
    let service = AnalysisService::new(&settings(3), imagery, StubSummarizer::new());

    let id = service.submit(request(AnalysisKind::Ndvi)).unwrap();
    wait_terminal(&service, id).await;

    // Must return rather than hang on parked workers.
    tokio::time::timeout(Duration::from_secs(2), service.shutdown())
        .await
        .expect("shutdown must not hang");
}
