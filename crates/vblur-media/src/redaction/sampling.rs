use vblur_models::DetectedRegion;

/// Temporal sampling cursor for one pipeline run.
///
/// Detection runs on frames whose index is a multiple of `sample_rate`;
/// every other frame reuses the regions from the last detection pass.
#[derive(Debug, Clone)]
pub struct SampleController {
    sample_rate: u64,
    frame_index: u64,
    last_regions: Vec<DetectedRegion>,
}

impl SampleController {
    /// A `sample_rate` of 0 is treated as 1.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: u64::from(sample_rate.max(1)),
            frame_index: 0,
            last_regions: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> u64 {
        self.sample_rate
    }

    /// Whether detection should run for `frame_index`.
    pub fn observe(&mut self, frame_index: u64) -> bool {
        self.frame_index = frame_index;
        frame_index % self.sample_rate == 0
    }

    /// Replace the carried region set with a fresh detection result.
    pub fn update(&mut self, regions: Vec<DetectedRegion>) {
        self.last_regions = regions;
    }

    /// Regions to apply to the current frame.
    pub fn regions(&self) -> &[DetectedRegion] {
        &self.last_regions
    }

    /// Index of the most recently observed frame.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(text: &str) -> DetectedRegion {
        DetectedRegion {
            x1: 0,
            y1: 0,
            x2: 4,
            y2: 4,
            text: text.to_string(),
            confidence: 0.9,
        }
    }

    #[test]
    fn test_detects_on_multiples_of_rate() {
        let mut controller = SampleController::new(3);
        let decisions: Vec<bool> = (0..7).map(|i| controller.observe(i)).collect();

        assert_eq!(decisions, vec![true, false, false, true, false, false, true]);
    }

    #[test]
    fn test_rate_one_detects_every_frame() {
        let mut controller = SampleController::new(1);
        assert!((0..50).all(|i| controller.observe(i)));
    }

    #[test]
    fn test_zero_rate_is_clamped() {
        let mut controller = SampleController::new(0);
        assert_eq!(controller.sample_rate(), 1);
        assert!(controller.observe(7));
    }

    #[test]
    fn test_regions_carried_until_next_detection() {
        let mut controller = SampleController::new(2);
        assert!(controller.regions().is_empty());

        assert!(controller.observe(0));
        controller.update(vec![region("a")]);

        assert!(!controller.observe(1));
        assert_eq!(controller.regions(), &[region("a")]);

        assert!(controller.observe(2));
        controller.update(Vec::new());
        assert!(!controller.observe(3));
        assert!(controller.regions().is_empty());
    }
}
