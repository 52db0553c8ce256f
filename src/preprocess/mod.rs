//! Frame preprocessing: global brightness/contrast and iterative adaptive
//! contrast enhancement.
//!
//! Both run in the 8-bit domain on the CPU. The GPU backend re-implements
//! the global contrast transfer in its preprocessing shader (around 0.5 in
//! the normalized domain, brightness scaled by 1/255); adaptive contrast is
//! stateful and iterative and therefore always executes here, even when the
//! rest of the pipeline runs on the GPU.

pub(crate) mod clahe;

use crate::image::GrayImage;
use crate::util::math::mean_stddev_u8;

pub use clahe::Clahe;

/// Linear brightness/contrast around the 8-bit domain center:
/// `out = clamp((v - 128) * contrast + 128 + brightness, 0, 255)`.
///
/// Empty input yields empty output.
pub fn apply_global_contrast(image: &GrayImage, brightness: f32, contrast: f32) -> GrayImage {
    let mut out = image.clone();
    for v in out.data_mut() {
        let centered = (*v as f32 - 128.0) * contrast + 128.0 + brightness;
        *v = centered.clamp(0.0, 255.0).round() as u8;
    }
    out
}

/// Contrast metric used by the adaptive loop: `stddev / (mean + 1e-6)`.
pub fn contrast_metric(image: &GrayImage) -> f32 {
    let (mean, stddev) = mean_stddev_u8(image.data());
    stddev / (mean + 1e-6)
}

/// Iterative adaptive-contrast enhancement settings.
#[derive(Clone, Copy, Debug)]
pub struct AdaptiveContrast {
    /// Upper bound on equalization rounds; the loop always terminates here.
    pub max_iterations: usize,
    /// Target contrast metric; iteration stops early once reached.
    pub target_contrast: f32,
}

impl Default for AdaptiveContrast {
    fn default() -> Self {
        Self {
            max_iterations: 2,
            target_contrast: 0.3,
        }
    }
}

impl AdaptiveContrast {
    /// Runs up to `max_iterations` rounds of adaptive histogram
    /// equalization. After each round the contrast metric is rechecked;
    /// when it sits below half the target, the equalizer's clip limit grows
    /// by 20 % (capped at 4.0) before the next round. Reaching the target
    /// is not guaranteed.
    pub fn apply(&self, image: &GrayImage) -> GrayImage {
        let mut enhanced = image.clone();
        let mut clahe = Clahe::default();

        for _ in 0..self.max_iterations {
            enhanced = clahe.apply(&enhanced);
            let contrast = contrast_metric(&enhanced);
            if contrast >= self.target_contrast {
                break;
            }
            if contrast < self.target_contrast * 0.5 {
                clahe.clip_limit = (clahe.clip_limit * 1.2).min(4.0);
            }
        }
        enhanced
    }
}

#[cfg(test)]
mod tests {
    use super::{apply_global_contrast, contrast_metric, AdaptiveContrast};
    use crate::image::GrayImage;

    fn gradient_image(width: usize, height: usize, lo: u8, hi: u8) -> GrayImage {
        let span = (hi - lo) as f32;
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let t = (x + y) as f32 / (width + height - 2) as f32;
                data.push(lo + (span * t).round() as u8);
            }
        }
        GrayImage::new(data, width, height).unwrap()
    }

    #[test]
    fn unit_contrast_zero_brightness_is_identity() {
        let img = gradient_image(16, 16, 10, 240);
        assert_eq!(apply_global_contrast(&img, 0.0, 1.0), img);
    }

    #[test]
    fn contrast_scales_around_the_domain_center() {
        let img = GrayImage::new(vec![128, 138, 118], 3, 1).unwrap();
        let out = apply_global_contrast(&img, 0.0, 2.0);
        assert_eq!(out.data(), &[128, 148, 108]);
    }

    #[test]
    fn output_saturates_at_both_ends() {
        let img = GrayImage::new(vec![0, 255, 128], 3, 1).unwrap();
        let out = apply_global_contrast(&img, 100.0, 3.0);
        assert_eq!(out.data()[0], 0);
        assert_eq!(out.data()[1], 255);
        assert_eq!(out.data()[2], 228);
    }

    #[test]
    fn constant_image_has_zero_contrast() {
        let img = GrayImage::new(vec![90; 64], 8, 8).unwrap();
        assert!(contrast_metric(&img) < 1e-6);
    }

    #[test]
    fn equalization_raises_the_metric_of_a_flat_gradient() {
        let img = gradient_image(48, 48, 100, 140);
        let before = contrast_metric(&img);
        let enhanced = AdaptiveContrast {
            max_iterations: 3,
            target_contrast: 0.9,
        }
        .apply(&img);
        let after = contrast_metric(&enhanced);
        assert_eq!(enhanced.width(), 48);
        assert_eq!(enhanced.height(), 48);
        assert!(after > before, "contrast {before} -> {after}");
    }

    #[test]
    fn loop_terminates_when_target_is_unreachable() {
        // A constant image never reaches a positive target; the loop must
        // still stop at max_iterations.
        let img = GrayImage::new(vec![128; 36 * 36], 36, 36).unwrap();
        let _ = AdaptiveContrast {
            max_iterations: 5,
            target_contrast: 0.8,
        }
        .apply(&img);
    }
}
