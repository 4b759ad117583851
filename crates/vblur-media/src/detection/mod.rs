//! Text detection provider interface.
//!
//! The detection engine itself lives outside this crate; implementations
//! (e.g. the HTTP OCR client) plug in through [`TextDetector`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vblur_models::DetectedRegion;

use crate::error::MediaResult;
use crate::Frame;

/// One recognized string and where it was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDetection {
    /// Bounding polygon in frame pixels, in drawing order
    pub polygon: Vec<(i32, i32)>,
    /// Recognized text
    pub text: String,
    /// Recognition confidence (0.0 to 1.0)
    pub confidence: f64,
}

impl TextDetection {
    pub fn new(polygon: Vec<(i32, i32)>, text: impl Into<String>, confidence: f64) -> Self {
        Self {
            polygon,
            text: text.into(),
            confidence,
        }
    }

    /// Axis-aligned region for a frame of the given size.
    pub fn to_region(&self, frame_width: u32, frame_height: u32) -> Option<DetectedRegion> {
        DetectedRegion::from_polygon(
            &self.polygon,
            self.text.clone(),
            self.confidence,
            frame_width,
            frame_height,
        )
    }
}

/// Text detection provider.
#[async_trait]
pub trait TextDetector: Send + Sync {
    /// Detect text in a single frame.
    ///
    /// `languages` are engine language codes (e.g. `"en"`).
    async fn detect(&self, frame: &Frame, languages: &[String]) -> MediaResult<Vec<TextDetection>>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_to_region() {
        let detection = TextDetection::new(vec![(5, 5), (40, 5), (40, 20), (5, 20)], "Total", 0.8);
        let region = detection.to_region(32, 32).unwrap();

        assert_eq!((region.x1, region.y1, region.x2, region.y2), (5, 5, 32, 20));
        assert_eq!(region.text, "Total");
    }

    #[test]
    fn test_detection_without_points() {
        let detection = TextDetection::new(Vec::new(), "ghost", 0.9);
        assert!(detection.to_region(32, 32).is_none());
    }
}
