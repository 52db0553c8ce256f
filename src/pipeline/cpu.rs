//! Scalar CPU backend: the reference single-scale per-frame path.

use crate::eigen::eigen_decompose;
use crate::hessian::{gaussian_blur, hessian_exact};
use crate::image::{Field, Frame, GrayImage};
use crate::multiscale::{frangi_multiscale, AutoC, MultiScaleParams, ScaleSweep};
use crate::pipeline::{DisplayStage, FrameParams, ProcessOutput};
use crate::preprocess::apply_global_contrast;
use crate::segment::threshold_mask;
use crate::trace::{trace_event, trace_span};
use crate::util::NirveinResult;

pub(crate) struct CpuPipeline;

impl CpuPipeline {
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) fn process(
        &mut self,
        frame: &Frame,
        params: &FrameParams,
    ) -> NirveinResult<ProcessOutput> {
        let width = frame.width();
        let height = frame.height();
        let _span = trace_span!("cpu_process", width = width, height = height).entered();

        let mut gray8 = frame.to_gray();
        if let Some(gc) = params.global_contrast {
            gray8 = apply_global_contrast(&gray8, gc.brightness, gc.contrast);
        }
        let gray = gray8.to_field();

        let mut working = gray.clone();
        if params.invert {
            for v in working.as_mut_slice() {
                *v = 1.0 - *v;
            }
        }

        let mut artifact = match params.stage {
            DisplayStage::Grayscale => Some(gray.to_gray()),
            DisplayStage::Inverted => Some(working.to_gray()),
            _ => None,
        };
        if let (Some(image), None) = (&artifact, &params.approval) {
            return Ok(ProcessOutput {
                image: image.clone(),
                processed_size: (width, height),
                approval: None,
            });
        }

        let smoothed = if params.pre_blur {
            gaussian_blur(&working, params.sigma)
        } else {
            working
        };

        // Debug artifacts reuse the standalone strategy entry points; the
        // scored path below recomputes from scratch only when it is needed.
        match params.stage {
            DisplayStage::Hessian => {
                let hessian = hessian_exact(&smoothed, params.sigma);
                artifact = Some(debug_gain(&hessian.dxx));
            }
            DisplayStage::Eigenvalues => {
                let hessian = hessian_exact(&smoothed, params.sigma);
                let eigen = eigen_decompose(&hessian);
                artifact = Some(debug_gain(&eigen.lambda1));
            }
            _ => {}
        }
        if let (Some(image), None) = (&artifact, &params.approval) {
            return Ok(ProcessOutput {
                image: image.clone(),
                processed_size: (width, height),
                approval: None,
            });
        }

        let engine_params = MultiScaleParams {
            sweep: ScaleSweep::single(params.sigma),
            beta: params.beta,
            c: params.c,
            dark_ridges: !params.invert,
            auto_c: AutoC::Off,
        };
        let vesselness = match frangi_multiscale(&smoothed, &engine_params) {
            Ok(result) => result.vesselness,
            Err(err) => {
                // Degrade to an all-zero frame rather than aborting the
                // session; the next frame starts clean.
                let reason = err.to_string();
                trace_event!("cpu_frame_degraded", reason = reason.as_str());
                Field::zeros(width, height)
            }
        };

        if params.stage == DisplayStage::Vesselness {
            artifact = Some(vesselness.to_gray());
        }

        let mask = threshold_mask(&vesselness, params.segmentation_threshold);
        if params.stage == DisplayStage::Segmentation {
            artifact = Some(mask.to_gray());
        }

        if params.stage == DisplayStage::Overlay {
            let mut overlay = gray;
            let mask_data = mask.data();
            for (v, &m) in overlay.as_mut_slice().iter_mut().zip(mask_data) {
                *v = (*v + 0.5 * m as f32).min(1.0);
            }
            artifact = Some(overlay.to_gray());
        }

        let approval = params.approval.map(|region| region.evaluate(&mask));

        let image = artifact.unwrap_or_else(|| mask.to_gray());
        Ok(ProcessOutput {
            image,
            processed_size: (width, height),
            approval,
        })
    }
}

/// Debug rendering used by the Hessian and eigenvalue stages: `|v| * 10`,
/// clamped into the displayable range.
fn debug_gain(field: &Field) -> GrayImage {
    let mut out = Field::zeros(field.width(), field.height());
    for (dst, &v) in out.as_mut_slice().iter_mut().zip(field.as_slice()) {
        *dst = (v.abs() * 10.0).min(1.0);
    }
    out.to_gray()
}
