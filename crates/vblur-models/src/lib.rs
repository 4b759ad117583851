//! Shared data models for the VBlur backend.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs and their status lifecycle
//! - Submission parameters and their validation
//! - Blur policies
//! - Detected text regions

pub mod job;
pub mod parameters;
pub mod policy;
pub mod region;

// Re-export common types
pub use job::{Job, JobId, JobStatus, NewJob};
pub use parameters::{JobParameters, ParameterError};
pub use policy::BlurPolicy;
pub use region::{DetectedRegion, PixelRect};
