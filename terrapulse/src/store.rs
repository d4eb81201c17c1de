//! Task store: lifecycle tracking for submitted analyses.
//!
//! The store is the only holder of task state. All mutation goes through
//! its narrow API, which keeps every transition for a given id linearizable:
//! a task moves `Queued -> Processing -> {Completed, Failed}` and never
//! backwards, never skips `Processing`, and never reaches two terminal
//! states. Claiming is atomic, so two workers can never process the same
//! task.
//!
//! Records are kept after completion so clients can poll for results;
//! memory is bounded by evicting terminal records older than a configurable
//! horizon (see [`TaskStore::evict_finished_before`]).

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::analysis::AnalysisResult;
use crate::error::TaskFailure;
use crate::geo::AnalysisRequest;

/// Opaque unique task identifier, generated at submission, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Ok(Self(text.parse()?))
    }
}

/// Lifecycle state of a task. Transitions are monotonic and forward-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Created, waiting for a worker
    Queued,
    /// Claimed by exactly one worker
    Processing,
    /// Finished with a result; terminal
    Completed,
    /// Finished with an error; terminal
    Failed,
}

impl TaskStatus {
    /// Returns true for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns the wire name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transition errors. These indicate a caller bug, not a runtime condition:
/// only the worker that claimed a task may finish it, exactly once.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// No record for the given id
    #[error("task {id} not found")]
    NotFound { id: TaskId },

    /// The task was not in the state the transition requires
    #[error("invalid transition for task {id}: {from} -> {to}")]
    InvalidTransition {
        id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },
}

/// A queued task handed to the worker that claimed it.
#[derive(Debug, Clone)]
pub struct ClaimedTask {
    /// Identifier of the claimed task
    pub id: TaskId,
    /// The request to process
    pub request: AnalysisRequest,
}

/// Client-visible view of a task, shaped for the polling response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Current lifecycle state
    pub status: TaskStatus,
    /// Present exactly when `status` is `completed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
    /// Present exactly when `status` is `failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskFailure>,
}

/// Full task record. Private: observers get snapshots, workers get claims.
#[derive(Debug)]
struct TaskRecord {
    request: AnalysisRequest,
    status: TaskStatus,
    result: Option<AnalysisResult>,
    error: Option<TaskFailure>,
    finished_at: Option<DateTime<Utc>>,
}

/// Concurrent task store with an internal FIFO claim queue.
pub struct TaskStore {
    tasks: DashMap<TaskId, TaskRecord>,
    queue: Mutex<VecDeque<TaskId>>,
    work_available: Notify,
}

impl TaskStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
            queue: Mutex::new(VecDeque::new()),
            work_available: Notify::new(),
        }
    }

    /// Creates a task in `Queued` state and returns its fresh id.
    ///
    /// Always succeeds; the request must already have been validated by the
    /// submission path.
    pub fn create(&self, request: AnalysisRequest) -> TaskId {
        let id = TaskId::generate();
        self.tasks.insert(
            id,
            TaskRecord {
                request,
                status: TaskStatus::Queued,
                result: None,
                error: None,
                finished_at: None,
            },
        );
        self.queue.lock().unwrap().push_back(id);
        self.work_available.notify_one();

        tracing::debug!(task_id = %id, "Task queued");
        id
    }

    /// Atomically claims the oldest queued task, flipping it to
    /// `Processing`.
    ///
    /// Returns `None` when the queue is empty. The queue lock is held across
    /// the status flip, so no two workers can claim the same task.
    pub fn claim_next_queued(&self) -> Option<ClaimedTask> {
        let mut queue = self.queue.lock().unwrap();
        while let Some(id) = queue.pop_front() {
            if let Some(mut record) = self.tasks.get_mut(&id) {
                if record.status == TaskStatus::Queued {
                    record.status = TaskStatus::Processing;
                    tracing::debug!(task_id = %id, "Task claimed");
                    return Some(ClaimedTask {
                        id,
                        request: record.request.clone(),
                    });
                }
                // Stale queue entry; the record already moved on.
            }
        }
        None
    }

    /// Parks the caller until [`create`](Self::create) enqueues new work.
    ///
    /// May wake spuriously; callers claim in a loop.
    pub async fn wait_for_work(&self) {
        self.work_available.notified().await;
    }

    /// Records a successful result, transitioning `Processing -> Completed`.
    ///
    /// Rejects (and logs) any task that is not currently `Processing`:
    /// completion is exactly-once and only valid from the claiming worker.
    pub fn complete(&self, id: TaskId, result: AnalysisResult) -> Result<(), StoreError> {
        let mut record = self.tasks.get_mut(&id).ok_or(StoreError::NotFound { id })?;
        if record.status != TaskStatus::Processing {
            tracing::error!(
                task_id = %id,
                status = %record.status,
                "Rejected completion of a task that is not processing"
            );
            return Err(StoreError::InvalidTransition {
                id,
                from: record.status,
                to: TaskStatus::Completed,
            });
        }

        record.status = TaskStatus::Completed;
        record.result = Some(result);
        record.finished_at = Some(Utc::now());

        tracing::info!(task_id = %id, "Task completed");
        Ok(())
    }

    /// Records a failure, transitioning `Processing -> Failed`.
    ///
    /// Same exactly-once rules as [`complete`](Self::complete).
    pub fn fail(&self, id: TaskId, error: TaskFailure) -> Result<(), StoreError> {
        let mut record = self.tasks.get_mut(&id).ok_or(StoreError::NotFound { id })?;
        if record.status != TaskStatus::Processing {
            tracing::error!(
                task_id = %id,
                status = %record.status,
                "Rejected failure of a task that is not processing"
            );
            return Err(StoreError::InvalidTransition {
                id,
                from: record.status,
                to: TaskStatus::Failed,
            });
        }

        record.status = TaskStatus::Failed;
        tracing::warn!(
            task_id = %id,
            kind = error.kind.as_str(),
            message = %error.message,
            "Task failed"
        );
        record.error = Some(error);
        record.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Returns a snapshot of the task, or `None` for an unknown id.
    pub fn get(&self, id: TaskId) -> Option<TaskSnapshot> {
        self.tasks.get(&id).map(|record| TaskSnapshot {
            status: record.status,
            result: record.result.clone(),
            error: record.error.clone(),
        })
    }

    /// Evicts terminal tasks that finished before `cutoff`.
    ///
    /// Live tasks are never evicted, whatever their age; removing a queued
    /// or processing record would break the lifecycle contract. Returns the
    /// number of evicted records.
    pub fn evict_finished_before(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, record| {
            !(record.status.is_terminal()
                && record.finished_at.map_or(false, |finished| finished < cutoff))
        });
        let evicted = before.saturating_sub(self.tasks.len());
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted expired task records");
        }
        evicted
    }

    /// Number of records currently held, any state.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true when no records are held.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}
