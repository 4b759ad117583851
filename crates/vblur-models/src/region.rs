//! Text regions in frame pixel coordinates.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An axis-aligned, half-open pixel rectangle `[x1, x2) x [y1, y2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct PixelRect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl PixelRect {
    /// Create a new rectangle. Corners are reordered so that `x1 <= x2` and `y1 <= y2`.
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    /// Number of pixels covered.
    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Zero-area rectangles cover no pixels.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Grow by `padding` on every side, then clip to `[0, width) x [0, height)`.
    pub fn expand_clamped(&self, padding: u32, width: u32, height: u32) -> Self {
        Self {
            x1: self.x1.saturating_sub(padding).min(width),
            y1: self.y1.saturating_sub(padding).min(height),
            x2: self.x2.saturating_add(padding).min(width),
            y2: self.y2.saturating_add(padding).min(height),
        }
    }

    /// Whether the two rectangles share at least one pixel.
    pub fn intersects(&self, other: &PixelRect) -> bool {
        self.x1 < other.x2 && other.x1 < self.x2 && self.y1 < other.y2 && other.y1 < self.y2
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &PixelRect) -> Self {
        Self {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }
}

/// A region of a frame believed to contain text selected for blurring.
///
/// Produced by one detection pass and carried forward unchanged across
/// frames that skip detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DetectedRegion {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
    /// Recognized text inside the region
    pub text: String,
    /// Recognition confidence (0.0 to 1.0)
    pub confidence: f64,
}

impl DetectedRegion {
    /// Build a region from a detection polygon.
    ///
    /// The region is the polygon's axis-aligned bounding box clamped to
    /// `[0, frame_width] x [0, frame_height]`. Returns `None` for an empty polygon.
    pub fn from_polygon(
        polygon: &[(i32, i32)],
        text: impl Into<String>,
        confidence: f64,
        frame_width: u32,
        frame_height: u32,
    ) -> Option<Self> {
        let (first, rest) = polygon.split_first()?;

        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.0, first.1, first.0, first.1);
        for &(x, y) in rest {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        let clamp = |v: i32, max: u32| -> u32 { v.clamp(0, max.min(i32::MAX as u32) as i32) as u32 };

        Some(Self {
            x1: clamp(min_x, frame_width),
            y1: clamp(min_y, frame_height),
            x2: clamp(max_x, frame_width),
            y2: clamp(max_y, frame_height),
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
        })
    }

    /// Pixel rectangle covered by this region.
    pub fn rect(&self) -> PixelRect {
        PixelRect::new(self.x1, self.y1, self.x2, self.y2)
    }
}
