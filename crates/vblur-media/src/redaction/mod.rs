//! Region selection, temporal sampling and blur compositing.

mod compositor;
mod matcher;
mod sampling;

pub use compositor::{gaussian_sigma, merge_overlapping, FrameBlurCompositor};
pub use matcher::RegionMatcher;
pub use sampling::SampleController;
