use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use uuid::Uuid;

use crate::domain::entities::batch_job::{BatchFile, BatchJob};

/// Progress snapshot returned to status polling.
#[derive(Debug, Clone, Copy)]
pub struct BatchProgress {
    pub total: usize,
    pub completed: usize,
}

/// Process-wide registry of batch jobs, shared between the submission
/// handler, the drain loops and the completion webhook.
///
/// Every queue/counter mutation goes through this one mutex: the drain
/// loop and the inbound completion signal are two producers of "advance
/// progress" events, and serializing them here keeps the counters
/// consistent. Both can still fire for logically the same file; the
/// clamped counter makes the only observable effect a `completed` that
/// reaches `total` early.
///
/// Jobs are not kept forever: once a job's queue has drained, it stays
/// pollable for `retention` and is then swept on a later submission.
pub struct BatchJobStore {
    jobs: Mutex<HashMap<String, BatchJob>>,
    retention: Duration,
}

impl BatchJobStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            retention,
        }
    }

    /// Registers a new batch and returns its identifier and size.
    ///
    /// Submission is the only growth path of the registry, so it doubles
    /// as the sweep trigger for expired entries.
    #[tracing::instrument(name = "Registering batch job", skip(self, files), fields(nb_files = files.len()))]
    pub fn submit(&self, files: Vec<BatchFile>) -> (String, usize) {
        let mut jobs = self.lock();

        let retention = self.retention;
        jobs.retain(|_, job| match job.drained_at() {
            Some(drained_at) => drained_at.elapsed() < retention,
            None => true,
        });

        let job_id = Uuid::new_v4().to_string();
        let total = files.len();
        jobs.insert(job_id.clone(), BatchJob::new(files));

        (job_id, total)
    }

    pub fn status(&self, job_id: &str) -> Option<BatchProgress> {
        self.lock().get(job_id).map(|job| BatchProgress {
            total: job.total(),
            completed: job.completed(),
        })
    }

    /// Returns false when the job is unknown or a drain loop already runs.
    pub fn try_begin_processing(&self, job_id: &str) -> bool {
        self.lock()
            .get_mut(job_id)
            .map_or(false, BatchJob::try_begin_processing)
    }

    pub fn finish_processing(&self, job_id: &str) {
        if let Some(job) = self.lock().get_mut(job_id) {
            job.finish_processing();
        }
    }

    pub fn front_file(&self, job_id: &str) -> Option<BatchFile> {
        self.lock().get(job_id).and_then(BatchJob::front_file)
    }

    pub fn complete_front(&self, job_id: &str) {
        if let Some(job) = self.lock().get_mut(job_id) {
            job.complete_front();
        }
    }

    pub fn skip_front(&self, job_id: &str) {
        if let Some(job) = self.lock().get_mut(job_id) {
            job.skip_front();
        }
    }

    /// The completion webhook's path to advance progress without holding
    /// the drain loop's position. Returns whether the job was known.
    pub fn record_external_completion(&self, job_id: &str) -> bool {
        match self.lock().get_mut(job_id) {
            Some(job) => {
                job.record_completion();
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, BatchJob>> {
        // A poisoned registry is still structurally sound: every mutation
        // keeps the invariants before releasing the guard.
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
