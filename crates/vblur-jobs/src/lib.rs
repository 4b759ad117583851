//! Asynchronous blur job service.
//!
//! - [`JobRegistry`]: lock-guarded store of job records
//! - [`ArtifactStore`]: upload/output file layout and cleanup
//! - [`JobOrchestrator`]: one background task per job, bounded by a semaphore
//! - [`RetentionSweeper`]: periodic removal of expired jobs

pub mod artifacts;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod registry;
pub mod retention;

pub use artifacts::ArtifactStore;
pub use config::JobsConfig;
pub use error::{JobsError, JobsResult};
pub use logging::JobLogger;
pub use orchestrator::{result_url, JobOrchestrator};
pub use registry::JobRegistry;
pub use retention::RetentionSweeper;
