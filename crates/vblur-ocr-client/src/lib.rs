//! Client for the external text detection (OCR) service.
//!
//! Frames are sent as base64 PNG together with the requested languages;
//! the service answers with polygons, recognized strings and confidences.
//! [`OcrClient`] implements [`vblur_media::TextDetector`] so it plugs
//! straight into the blur pipeline.

pub mod client;
pub mod error;
pub mod metrics;
pub mod retry;

pub use client::{OcrClient, OcrConfig};
pub use error::{OcrClientError, OcrResult};
pub use retry::RetryConfig;
