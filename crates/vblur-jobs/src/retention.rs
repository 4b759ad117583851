//! Periodic removal of expired jobs.
//!
//! The sweep goes through the same registry lock as an explicit delete, so a
//! job removed by both paths is deleted exactly once and the loser sees
//! `NotFound`, which is ignored.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::artifacts::ArtifactStore;
use crate::metrics;
use crate::registry::JobRegistry;

/// Shortest period between sweeps; a zero interval would panic the ticker.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Retention sweeper service.
pub struct RetentionSweeper {
    registry: Arc<JobRegistry>,
    artifacts: Arc<ArtifactStore>,
    retention: Duration,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(
        registry: Arc<JobRegistry>,
        artifacts: Arc<ArtifactStore>,
        retention: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            artifacts,
            retention,
            interval: interval.max(MIN_SWEEP_INTERVAL),
        }
    }

    /// Run the sweep loop forever. Spawn this as a background task.
    pub async fn run(&self) {
        info!(
            "Starting retention sweeper (retention: {:?}, interval: {:?})",
            self.retention, self.interval
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let removed = self.sweep_once(Utc::now()).await;
            if removed > 0 {
                info!("Retention sweep removed {} expired jobs", removed);
            }
        }
    }

    /// Remove every job older than the retention window as of `now`.
    ///
    /// Returns the number of jobs this sweep removed.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;

        for id in self.registry.list_expired(now, self.retention) {
            let job = match self.registry.delete(&id) {
                Ok(job) => job,
                Err(e) => {
                    debug!(job_id = %id, "Expired job already gone: {}", e);
                    continue;
                }
            };

            self.artifacts.remove_job_artifacts(&job).await;
            debug!(job_id = %id, status = %job.status, "Expired job removed");
            removed += 1;
        }

        if removed > 0 {
            metrics::record_jobs_expired(removed);
        }
        removed
    }
}
