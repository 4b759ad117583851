//! Lock-guarded job store.
//!
//! One mutex covers the whole map: job creation, deletion and status
//! updates from background tasks all serialize on it. Reads hand out
//! clones taken under the lock so callers never hold it across I/O.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;
use vblur_models::{Job, JobId, NewJob};

use crate::error::{JobsError, JobsResult};

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Job>> {
        // A panic while holding the lock leaves the map structurally intact.
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a queued job and return a snapshot of it.
    pub fn create(&self, new: NewJob) -> Job {
        let job = Job::new(new);
        self.lock().insert(job.id.clone(), job.clone());
        job
    }

    /// Snapshot of a job.
    pub fn get(&self, id: &JobId) -> JobsResult<Job> {
        self.lock()
            .get(id)
            .cloned()
            .ok_or_else(|| JobsError::NotFound(id.clone()))
    }

    /// Mutate a job in place under the lock.
    ///
    /// Returns `None` without calling `f` when the job no longer exists;
    /// a deleted job is never recreated.
    pub fn update<R>(&self, id: &JobId, f: impl FnOnce(&mut Job) -> R) -> Option<R> {
        let mut jobs = self.lock();
        match jobs.get_mut(id) {
            Some(job) => Some(f(job)),
            None => {
                debug!(job_id = %id, "Job no longer registered, skipping update");
                None
            }
        }
    }

    /// Remove a job, returning its final snapshot.
    pub fn delete(&self, id: &JobId) -> JobsResult<Job> {
        self.lock()
            .remove(id)
            .ok_or_else(|| JobsError::NotFound(id.clone()))
    }

    /// IDs of jobs created more than `retention` before `now`.
    pub fn list_expired(&self, now: DateTime<Utc>, retention: Duration) -> Vec<JobId> {
        // Nothing can be older than a retention window chrono cannot represent.
        let Some(cutoff) = chrono::Duration::from_std(retention)
            .ok()
            .and_then(|retention| now.checked_sub_signed(retention))
        else {
            return Vec::new();
        };

        let mut expired: Vec<JobId> = self
            .lock()
            .values()
            .filter(|job| job.created_before(cutoff))
            .map(|job| job.id.clone())
            .collect();
        expired.sort();
        expired
    }

    /// Snapshots of every job.
    pub fn list(&self) -> Vec<Job> {
        self.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;
    use vblur_models::{JobParameters, JobStatus};

    fn new_job(name: &str) -> NewJob {
        let id = JobId::new();
        NewJob {
            input_file: name.to_string(),
            output_file: format!("blurred_{}", name),
            input_path: PathBuf::from(format!("uploads/{}_{}", id, name)),
            output_path: PathBuf::from(format!("outputs/{}_blurred_{}", id, name)),
            parameters: JobParameters::default(),
            id,
        }
    }

    #[test]
    fn test_create_and_get() {
        let registry = JobRegistry::new();
        let job = registry.create(new_job("a.mp4"));

        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(registry.get(&job.id).unwrap().input_file, "a.mp4");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_returns_snapshot() {
        let registry = JobRegistry::new();
        let job = registry.create(new_job("a.mp4"));

        let mut snapshot = registry.get(&job.id).unwrap();
        snapshot.progress = 77;

        assert_eq!(registry.get(&job.id).unwrap().progress, 0);
    }

    #[test]
    fn test_update_missing_job_is_noop() {
        let registry = JobRegistry::new();
        let job = registry.create(new_job("a.mp4"));
        registry.delete(&job.id).unwrap();

        let mut called = false;
        let result = registry.update(&job.id, |j| {
            called = true;
            j.start();
        });

        assert!(result.is_none());
        assert!(!called);
        assert!(registry.get(&job.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_update_isolated_between_jobs() {
        let registry = JobRegistry::new();
        let a = registry.create(new_job("a.mp4"));
        let b = registry.create(new_job("b.mp4"));
        let b_before = serde_json::to_value(registry.get(&b.id).unwrap()).ok();

        registry.update(&a.id, |j| {
            j.start();
            j.fail("boom");
        });

        assert_eq!(registry.get(&a.id).unwrap().status, JobStatus::Failed);
        let b_after = serde_json::to_value(registry.get(&b.id).unwrap()).ok();
        assert_eq!(b_before, b_after);
    }

    #[test]
    fn test_delete_twice() {
        let registry = JobRegistry::new();
        let job = registry.create(new_job("a.mp4"));

        assert!(registry.delete(&job.id).is_ok());
        assert!(registry.delete(&job.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_list_expired() {
        let registry = JobRegistry::new();
        let old = registry.create(new_job("old.mp4"));
        let fresh = registry.create(new_job("fresh.mp4"));
        registry.update(&old.id, |j| j.created_at = Utc::now() - chrono::Duration::hours(48));

        let expired = registry.list_expired(Utc::now(), Duration::from_secs(86_400));

        assert_eq!(expired, vec![old.id.clone()]);
        assert!(!expired.contains(&fresh.id));
    }

    #[test]
    fn test_concurrent_updates_from_threads() {
        let registry = Arc::new(JobRegistry::new());
        let ids: Vec<JobId> = (0..8)
            .map(|i| registry.create(new_job(&format!("{i}.mp4"))).id)
            .collect();

        let handles: Vec<_> = ids
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, id)| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for p in 0..=(i as u8 * 10) {
                        registry.update(&id, |j| j.set_progress(p));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for (i, id) in ids.iter().enumerate() {
            assert_eq!(registry.get(id).unwrap().progress, (i as u8 * 10).min(100));
        }
    }
}
