use rayon::prelude::*;
use vblur_models::policy::normalize_strength;
use vblur_models::{BlurPolicy, DetectedRegion, PixelRect};

use crate::Frame;

/// Applies a Gaussian blur to padded text regions of a frame.
///
/// Padded rectangles are clipped to the frame, and rectangles that overlap
/// are merged into their bounding union first. Each merged rectangle is
/// smoothed exactly once from the source pixels, so the output does not
/// depend on region order.
#[derive(Debug, Clone)]
pub struct FrameBlurCompositor {
    kernel_size: u32,
    kernel: Vec<f32>,
}

impl FrameBlurCompositor {
    /// Create a compositor; even sizes are rounded up to the next odd value.
    pub fn new(kernel_size: u32) -> Self {
        let kernel_size = normalize_strength(kernel_size);
        Self {
            kernel_size,
            kernel: gaussian_kernel(kernel_size),
        }
    }

    pub fn from_policy(policy: &BlurPolicy) -> Self {
        Self::new(policy.strength())
    }

    pub fn kernel_size(&self) -> u32 {
        self.kernel_size
    }

    /// Rectangles that [`apply`](Self::apply) would smooth for this frame size.
    pub fn plan(
        &self,
        regions: &[DetectedRegion],
        padding: u32,
        width: u32,
        height: u32,
    ) -> Vec<PixelRect> {
        let rects = regions
            .iter()
            .map(|r| r.rect().expand_clamped(padding, width, height))
            .filter(|r| !r.is_empty())
            .collect();
        merge_overlapping(rects)
    }

    /// Return a copy of `frame` with every region blurred.
    pub fn apply(&self, frame: &Frame, regions: &[DetectedRegion], padding: u32) -> Frame {
        let mut out = frame.clone();
        for rect in self.plan(regions, padding, frame.width(), frame.height()) {
            self.blur_rect(frame, &mut out, rect);
        }
        out
    }

    /// Separable Gaussian over `rect` of `src`, written into `dst`.
    /// Samples past the rectangle edge replicate the edge pixel.
    fn blur_rect(&self, src: &Frame, dst: &mut Frame, rect: PixelRect) {
        if self.kernel.len() == 1 {
            return;
        }

        let w = rect.width() as usize;
        let h = rect.height() as usize;
        let radius = self.kernel.len() / 2;
        let kernel = &self.kernel;
        let row_len = w * 3;

        let mut patch = vec![0f32; w * h * 3];
        patch
            .par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| {
                for x in 0..w {
                    let px = src.get_pixel(rect.x1 + x as u32, rect.y1 + y as u32);
                    for c in 0..3 {
                        row[x * 3 + c] = px.0[c] as f32;
                    }
                }
            });

        let mut horizontal = vec![0f32; w * h * 3];
        horizontal
            .par_chunks_mut(row_len)
            .zip(patch.par_chunks(row_len))
            .for_each(|(out_row, in_row)| {
                for x in 0..w {
                    let mut acc = [0f32; 3];
                    for (k, weight) in kernel.iter().enumerate() {
                        let sx = (x + k).saturating_sub(radius).min(w - 1);
                        for c in 0..3 {
                            acc[c] += weight * in_row[sx * 3 + c];
                        }
                    }
                    out_row[x * 3..x * 3 + 3].copy_from_slice(&acc);
                }
            });

        let mut vertical = vec![0f32; w * h * 3];
        vertical
            .par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, out_row)| {
                for (k, weight) in kernel.iter().enumerate() {
                    let sy = (y + k).saturating_sub(radius).min(h - 1);
                    let in_row = &horizontal[sy * row_len..(sy + 1) * row_len];
                    for (o, i) in out_row.iter_mut().zip(in_row) {
                        *o += weight * i;
                    }
                }
            });

        for y in 0..h {
            for x in 0..w {
                let base = (y * w + x) * 3;
                let px = dst.get_pixel_mut(rect.x1 + x as u32, rect.y1 + y as u32);
                for c in 0..3 {
                    px.0[c] = vertical[base + c].round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }
}

/// Sigma used for a kernel of `kernel_size` taps when none is given.
pub fn gaussian_sigma(kernel_size: u32) -> f64 {
    0.3 * ((kernel_size as f64 - 1.0) * 0.5 - 1.0) + 0.8
}

fn gaussian_kernel(kernel_size: u32) -> Vec<f32> {
    let sigma = gaussian_sigma(kernel_size);
    let radius = (kernel_size / 2) as i64;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|i| (-((i * i) as f64) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.into_iter().map(|w| (w / sum) as f32).collect()
}

/// Merge intersecting rectangles into their bounding unions until no two
/// rectangles intersect. The result is sorted top-to-bottom, left-to-right.
pub fn merge_overlapping(mut rects: Vec<PixelRect>) -> Vec<PixelRect> {
    let mut merged = true;
    while merged {
        merged = false;
        'outer: for i in 0..rects.len() {
            for j in (i + 1)..rects.len() {
                if rects[i].intersects(&rects[j]) {
                    let other = rects.swap_remove(j);
                    rects[i] = rects[i].union(&other);
                    merged = true;
                    break 'outer;
                }
            }
        }
    }
    rects.sort_by_key(|r| (r.y1, r.x1, r.y2, r.x2));
    rects
}
