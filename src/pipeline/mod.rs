//! Per-frame processing contract and backend selection.
//!
//! `FrangiProcessor` binds one of two backends at construction time and
//! keeps it for the life of the process: the GPU compute pipeline when the
//! `gpu` feature is enabled and a device can be acquired, the scalar CPU
//! path otherwise. The probe runs exactly once; a GPU that fails to
//! initialize is never retried mid-session.

pub(crate) mod cpu;

use crate::approval::{Approval, ApprovalRegion};
use crate::image::{Frame, GrayImage};
use crate::preprocess::AdaptiveContrast;
use crate::trace::trace_event;
use crate::util::NirveinResult;

/// Pipeline artifact returned by [`FrangiProcessor::process`].
///
/// One canonical index-to-artifact mapping is used by both backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayStage {
    /// Grayscale input after preprocessing.
    Grayscale,
    /// Polarity-inverted grayscale (identical to grayscale when inversion
    /// is off).
    Inverted,
    /// Second-derivative debug rendering (`|Dxx| * 10`).
    Hessian,
    /// Eigenvalue debug rendering (`|lambda1| * 10`).
    Eigenvalues,
    /// Raw vesselness scores.
    Vesselness,
    /// Binary segmentation mask.
    Segmentation,
    /// Segmentation composited over the grayscale input, at the input
    /// resolution.
    Overlay,
}

impl DisplayStage {
    /// Maps a stage index (0..=6) to the canonical artifact.
    pub fn from_index(index: usize) -> Option<DisplayStage> {
        match index {
            0 => Some(DisplayStage::Grayscale),
            1 => Some(DisplayStage::Inverted),
            2 => Some(DisplayStage::Hessian),
            3 => Some(DisplayStage::Eigenvalues),
            4 => Some(DisplayStage::Vesselness),
            5 => Some(DisplayStage::Segmentation),
            6 => Some(DisplayStage::Overlay),
            _ => None,
        }
    }

    /// The canonical index of this artifact.
    pub fn index(&self) -> usize {
        match self {
            DisplayStage::Grayscale => 0,
            DisplayStage::Inverted => 1,
            DisplayStage::Hessian => 2,
            DisplayStage::Eigenvalues => 3,
            DisplayStage::Vesselness => 4,
            DisplayStage::Segmentation => 5,
            DisplayStage::Overlay => 6,
        }
    }
}

/// Global brightness/contrast settings for the preprocessing stage.
#[derive(Clone, Copy, Debug)]
pub struct GlobalContrast {
    /// Additive brightness in 8-bit units.
    pub brightness: f32,
    /// Multiplicative contrast around the domain center.
    pub contrast: f32,
}

impl Default for GlobalContrast {
    fn default() -> Self {
        Self {
            brightness: 20.0,
            contrast: 3.0,
        }
    }
}

/// Per-frame filter parameters.
#[derive(Clone, Copy, Debug)]
pub struct FrameParams {
    /// Derivative scale, matched to the expected vessel width.
    pub sigma: f32,
    /// Blob-suppression sensitivity.
    pub beta: f32,
    /// Background-suppression constant (always explicit per frame; the
    /// multiscale auto estimation lives in [`crate::frangi_multiscale`]).
    pub c: f32,
    /// Which pipeline artifact to return.
    pub stage: DisplayStage,
    /// Invert the grayscale input; the scorer then targets bright ridges.
    pub invert: bool,
    /// Optional global brightness/contrast preprocessing.
    pub global_contrast: Option<GlobalContrast>,
    /// Optional iterative adaptive-contrast preprocessing (always CPU).
    pub adaptive_contrast: Option<AdaptiveContrast>,
    /// Binary segmentation threshold over the vesselness scores.
    pub segmentation_threshold: f32,
    /// Resolution reduction for the heavy stages (GPU backend only);
    /// clamped to `[0.25, 1.0]`.
    pub downscale_factor: f32,
    /// Gaussian pre-smoothing at `sigma` before the derivatives (CPU
    /// backend only; mirrors the reference single-scale path).
    pub pre_blur: bool,
    /// Evaluate the vessel-density gate on the segmentation mask.
    pub approval: Option<ApprovalRegion>,
}

impl Default for FrameParams {
    fn default() -> Self {
        Self {
            sigma: 1.5,
            beta: 0.5,
            c: 15.0,
            stage: DisplayStage::Overlay,
            invert: true,
            global_contrast: None,
            adaptive_contrast: None,
            segmentation_threshold: 0.01,
            downscale_factor: 1.0,
            pre_blur: false,
            approval: None,
        }
    }
}

/// Result of one `process` call.
#[derive(Clone, Debug)]
pub struct ProcessOutput {
    /// The requested 8-bit artifact.
    pub image: GrayImage,
    /// Resolution the heavy stages ran at; differs from the frame size only
    /// on the GPU backend with a downscale factor below 1.0. Callers use it
    /// to scale regions of interest.
    pub processed_size: (usize, usize),
    /// Gate outcome, present when `FrameParams::approval` was set.
    pub approval: Option<Approval>,
}

/// Clamps a downscale factor to the supported `[0.25, 1.0]` range.
pub fn clamp_downscale_factor(factor: f32) -> f32 {
    factor.clamp(0.25, 1.0)
}

/// Buffer dimensions after downscaling: rounded, floored at 1x1.
pub fn downscaled_dims(width: usize, height: usize, factor: f32) -> (usize, usize) {
    let factor = clamp_downscale_factor(factor);
    let w = ((width as f32 * factor).round() as usize).max(1);
    let h = ((height as f32 * factor).round() as usize).max(1);
    (w, h)
}

enum Backend {
    Cpu(cpu::CpuPipeline),
    #[cfg(feature = "gpu")]
    Gpu(crate::gpu::GpuPipeline),
}

/// Frame processor with a backend bound once at construction.
pub struct FrangiProcessor {
    backend: Backend,
}

impl FrangiProcessor {
    /// Probes GPU capability once and binds the best available backend.
    /// Falls back to the CPU path when no device can be acquired; never
    /// fails.
    pub fn new() -> Self {
        #[cfg(feature = "gpu")]
        match crate::gpu::GpuPipeline::new() {
            Ok(gpu) => {
                trace_event!("backend_selected", gpu = true);
                return Self {
                    backend: Backend::Gpu(gpu),
                };
            }
            Err(err) => {
                let reason = err.to_string();
                trace_event!("gpu_unavailable", reason = reason.as_str());
            }
        }

        trace_event!("backend_selected", gpu = false);
        Self {
            backend: Backend::Cpu(cpu::CpuPipeline::new()),
        }
    }

    /// Builds a processor pinned to the CPU backend.
    pub fn cpu() -> Self {
        Self {
            backend: Backend::Cpu(cpu::CpuPipeline::new()),
        }
    }

    /// True when frames run through the GPU pipeline.
    pub fn is_gpu(&self) -> bool {
        !matches!(self.backend, Backend::Cpu(_))
    }

    /// Human-readable processing method for diagnostics.
    pub fn method_name(&self) -> &'static str {
        match self.backend {
            Backend::Cpu(_) => "CPU (scalar)",
            #[cfg(feature = "gpu")]
            Backend::Gpu(_) => "GPU (wgpu)",
        }
    }

    /// Runs the full pipeline for one frame and returns the requested
    /// artifact.
    ///
    /// Adaptive contrast always runs on the CPU first; the remaining stages
    /// run on the bound backend. Invalid input fails synchronously; an
    /// internal stage failure yields an all-zero artifact for this frame
    /// without corrupting pipeline state.
    pub fn process(&mut self, frame: &Frame, params: &FrameParams) -> NirveinResult<ProcessOutput> {
        let preprocessed;
        let frame = if let Some(adaptive) = params.adaptive_contrast {
            preprocessed = Frame::from_gray(adaptive.apply(&frame.to_gray()));
            &preprocessed
        } else {
            frame
        };

        match &mut self.backend {
            Backend::Cpu(pipeline) => pipeline.process(frame, params),
            #[cfg(feature = "gpu")]
            Backend::Gpu(pipeline) => pipeline.process(frame, params),
        }
    }
}

impl Default for FrangiProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{clamp_downscale_factor, downscaled_dims, DisplayStage};

    #[test]
    fn stage_indices_round_trip() {
        for index in 0..=6 {
            let stage = DisplayStage::from_index(index).unwrap();
            assert_eq!(stage.index(), index);
        }
        assert!(DisplayStage::from_index(7).is_none());
    }

    #[test]
    fn downscale_factor_clamps_to_supported_range() {
        assert_eq!(clamp_downscale_factor(0.1), 0.25);
        assert_eq!(clamp_downscale_factor(0.5), 0.5);
        assert_eq!(clamp_downscale_factor(2.0), 1.0);
    }

    #[test]
    fn half_factor_halves_buffer_dimensions() {
        assert_eq!(downscaled_dims(640, 480, 0.5), (320, 240));
        assert_eq!(downscaled_dims(641, 481, 0.5), (321, 241));
    }

    #[test]
    fn downscaled_dims_floor_at_one_pixel() {
        assert_eq!(downscaled_dims(2, 2, 0.25), (1, 1));
    }
}
