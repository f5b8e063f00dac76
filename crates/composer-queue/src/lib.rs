// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The job queue (spec §4.5): a single shared in-memory structure with
//! three logical sets (waiting, running, completed), guarded by one lock,
//! with a cooperative, cancel-safe `claim`.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use composer_recipe::Recipe;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

/// Lifecycle status of a [`Job`]. See spec §4.5 for the allowed
/// transitions — only `Running -> Finished` and `Running -> Failed` are
/// legal; everything else is [`Error::InvalidTransition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Waiting,
    Running,
    Finished,
    Failed,
}

/// A built image, referenced by its location in the content-addressed
/// output store (`refs/<output-id>/<filename>`, spec §3 `ImageResult`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResult {
    pub format: String,
    pub filename: String,
    pub mime_type: String,
    pub output_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub recipe: Recipe,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result: Option<ImageResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    waiting: VecDeque<Uuid>,
    jobs: HashMap<Uuid, Job>,
}

/// Multi-producer, single-consumer job queue. Cloning shares the
/// underlying state (it is an `Arc` handle), matching the shared-daemon
/// state pattern the HTTP service wraps in an `AppState`.
#[derive(Clone)]
pub struct JobQueue {
    state: Arc<Mutex<State>>,
    notify: Arc<Notify>,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Append a new `WAITING` job and wake any blocked `claim`.
    pub async fn enqueue(&self, recipe: Recipe) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let job = Job {
            id,
            recipe,
            status: JobStatus::Waiting,
            result: None,
            created_at: now,
            updated_at: now,
        };

        let mut state = self.state.lock().await;
        state.waiting.push_back(id);
        state.jobs.insert(id, job);
        drop(state);

        self.notify.notify_one();

        id
    }

    /// Pop the oldest waiting job, move it to running, and return it.
    /// Blocks until a job is available. Cancel-safe: if the returned
    /// future is dropped before completing, no job is consumed — the
    /// notification loop only mutates state once a job is actually
    /// available and popped within a single non-suspending step.
    pub async fn claim(&self) -> Job {
        loop {
            {
                let mut state = self.state.lock().await;
                if let Some(id) = state.waiting.pop_front() {
                    let job = state.jobs.get_mut(&id).expect("waiting job tracked in jobs map");
                    job.status = JobStatus::Running;
                    job.updated_at = Utc::now();
                    return job.clone();
                }
            }

            self.notify.notified().await;
        }
    }

    /// Apply a terminal status update. Re-posting the same terminal
    /// status on an already-terminal job is a no-op; any other transition
    /// away from a non-`Running` job, or `Failed -> Finished`, is rejected.
    pub async fn update(&self, id: Uuid, status: JobStatus, result: Option<ImageResult>) -> Result<(), Error> {
        if !matches!(status, JobStatus::Finished | JobStatus::Failed) {
            return Err(Error::InvalidTransition {
                from: None,
                to: status,
            });
        }

        let mut state = self.state.lock().await;
        let job = state.jobs.get_mut(&id).ok_or(Error::NotFound(id))?;

        if job.status == status {
            return Ok(());
        }

        if job.status != JobStatus::Running {
            return Err(Error::InvalidTransition {
                from: Some(job.status),
                to: status,
            });
        }

        job.status = status;
        job.result = result;
        job.updated_at = Utc::now();

        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Job, Error> {
        let state = self.state.lock().await;
        state.jobs.get(&id).cloned().ok_or(Error::NotFound(id))
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("job {0} not found")]
    NotFound(Uuid),
    #[error("invalid job transition {from:?} -> {to:?}")]
    InvalidTransition { from: Option<JobStatus>, to: JobStatus },
}

#[cfg(test)]
mod test {
    use composer_recipe::{Assembler, Options, Pipeline};

    use super::*;

    fn recipe() -> Recipe {
        Recipe {
            build: Pipeline::new(),
            stages: Pipeline::new(),
            assembler: Assembler::new("tar", Options::new()),
        }
    }

    #[tokio::test]
    async fn claim_order_matches_enqueue_order() {
        let queue = JobQueue::new();
        let first = queue.enqueue(recipe()).await;
        let second = queue.enqueue(recipe()).await;

        assert_eq!(queue.claim().await.id, first);
        assert_eq!(queue.claim().await.id, second);
    }

    #[tokio::test]
    async fn claim_blocks_until_enqueue() {
        let queue = JobQueue::new();
        let claimer = queue.clone();

        let handle = tokio::spawn(async move { claimer.claim().await });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let id = queue.enqueue(recipe()).await;

        let job = handle.await.unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.status, JobStatus::Running);
    }

    #[tokio::test]
    async fn update_lifecycle_and_invalid_transitions() {
        let queue = JobQueue::new();
        let id = queue.enqueue(recipe()).await;
        let job = queue.claim().await;
        assert_eq!(job.status, JobStatus::Running);

        queue.update(id, JobStatus::Finished, None).await.unwrap();
        assert_eq!(queue.get(id).await.unwrap().status, JobStatus::Finished);

        // Re-posting the same terminal status is a no-op, not an error.
        queue.update(id, JobStatus::Finished, None).await.unwrap();

        // Switching from one terminal status to another is rejected.
        let err = queue.update(id, JobStatus::Failed, None).await.unwrap_err();
        assert_eq!(
            err,
            Error::InvalidTransition {
                from: Some(JobStatus::Finished),
                to: JobStatus::Failed
            }
        );
    }

    #[tokio::test]
    async fn update_unknown_job_is_not_found() {
        let queue = JobQueue::new();
        let err = queue.update(Uuid::new_v4(), JobStatus::Finished, None).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn each_job_is_claimed_at_most_once() {
        let queue = JobQueue::new();
        for _ in 0..5 {
            queue.enqueue(recipe()).await;
        }

        let mut seen = std::collections::HashSet::new();
        for _ in 0..5 {
            let job = queue.claim().await;
            assert!(seen.insert(job.id), "job claimed twice");
        }
    }
}
