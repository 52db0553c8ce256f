//! Multiscale vesselness aggregation (CPU path).
//!
//! Sweeps a validated range of scales, caches the eigen planes of every
//! scale, optionally estimates the background-suppression constant from the
//! pooled eigenvalue statistics, then scores each scale and reduces by
//! elementwise maximum. Ties go to the later (larger) sigma, so the
//! recorded winning scale is deterministic.

use crate::eigen::{eigen_decompose, EigenField};
use crate::hessian::hessian_exact;
use crate::image::Field;
use crate::trace::{trace_event, trace_span};
use crate::util::{NirveinError, NirveinResult};
use crate::vesselness::{score_field, VesselnessCoeffs, VesselnessParams};

/// Discrete scale range: `sigma_start, sigma_start + sigma_step, ...` while
/// the value does not exceed `sigma_end`.
#[derive(Clone, Copy, Debug)]
pub struct ScaleSweep {
    pub sigma_start: f32,
    pub sigma_end: f32,
    pub sigma_step: f32,
}

impl ScaleSweep {
    /// Single-scale sweep.
    pub fn single(sigma: f32) -> Self {
        Self {
            sigma_start: sigma,
            sigma_end: sigma,
            sigma_step: 1.0,
        }
    }

    /// Validates the bounds and the step.
    pub fn validate(&self) -> NirveinResult<()> {
        if self.sigma_start > self.sigma_end {
            return Err(NirveinError::SigmaRange {
                start: self.sigma_start,
                end: self.sigma_end,
            });
        }
        if self.sigma_step <= 0.0 {
            return Err(NirveinError::SigmaStep {
                step: self.sigma_step,
            });
        }
        Ok(())
    }

    /// The swept sigma values; non-empty for a valid sweep.
    pub fn sigmas(&self) -> Vec<f32> {
        let mut out = Vec::new();
        let mut sigma = self.sigma_start;
        while sigma <= self.sigma_end {
            out.push(sigma);
            sigma += self.sigma_step;
        }
        out
    }
}

impl Default for ScaleSweep {
    fn default() -> Self {
        Self {
            sigma_start: 0.5,
            sigma_end: 3.5,
            sigma_step: 0.5,
        }
    }
}

/// Background-suppression constant selection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AutoC {
    /// Use the explicit `c` parameter.
    Off,
    /// Half the maximum pooled eigenvalue norm `S^2`.
    MaxNorm,
    /// Half the given percentile of the pooled `S^2` distribution.
    Percentile(f32),
}

impl Default for AutoC {
    fn default() -> Self {
        AutoC::Percentile(75.0)
    }
}

/// Parameters of the multiscale sweep.
#[derive(Clone, Copy, Debug)]
pub struct MultiScaleParams {
    pub sweep: ScaleSweep,
    /// Blob-suppression sensitivity.
    pub beta: f32,
    /// Background-suppression constant; ignored unless `auto_c` is `Off`.
    pub c: f32,
    /// Score dark ridges when true, bright ridges otherwise.
    pub dark_ridges: bool,
    pub auto_c: AutoC,
}

impl Default for MultiScaleParams {
    fn default() -> Self {
        Self {
            sweep: ScaleSweep::default(),
            beta: 1.6,
            c: 0.08,
            dark_ridges: true,
            auto_c: AutoC::default(),
        }
    }
}

/// Pointwise-maximum aggregate over the swept scales.
pub struct MultiScaleResult {
    /// Maximum vesselness per pixel.
    pub vesselness: Field,
    /// Sigma that produced the maximum (ties resolve to the larger sigma).
    pub scale: Field,
    /// Ridge orientation at the winning scale.
    pub angle: Field,
}

struct ScalePlane {
    sigma: f32,
    eigen: EigenField,
}

/// Half the maximum pooled `S^2` over all cached scales.
fn pooled_max_norm(planes: &[ScalePlane]) -> NirveinResult<f32> {
    let mut max_s2 = f32::NEG_INFINITY;
    let mut seen = false;
    for plane in planes {
        let l1 = plane.eigen.lambda1.as_slice();
        let l2 = plane.eigen.lambda2.as_slice();
        for i in 0..l1.len() {
            let s2 = l1[i] * l1[i] + l2[i] * l2[i];
            if s2 > max_s2 {
                max_s2 = s2;
            }
            seen = true;
        }
    }
    if !seen {
        return Err(NirveinError::EmptyEigenPool);
    }
    Ok(max_s2)
}

/// The requested percentile of the pooled `S^2` distribution, by partial
/// selection over one flat pool of every pixel of every scale.
fn pooled_percentile(planes: &[ScalePlane], percentile: f32) -> NirveinResult<f32> {
    let total: usize = planes
        .iter()
        .map(|p| p.eigen.lambda1.as_slice().len())
        .sum();
    if total == 0 {
        return Err(NirveinError::EmptyEigenPool);
    }

    let mut pool = Vec::with_capacity(total);
    for plane in planes {
        let l1 = plane.eigen.lambda1.as_slice();
        let l2 = plane.eigen.lambda2.as_slice();
        for i in 0..l1.len() {
            pool.push(l1[i] * l1[i] + l2[i] * l2[i]);
        }
    }

    let idx = (((percentile / 100.0) * pool.len() as f32) as usize).min(pool.len() - 1);
    let (_, value, _) = pool.select_nth_unstable_by(idx, |a, b| a.total_cmp(b));
    Ok(*value)
}

/// Runs the full multiscale Frangi filter over a normalized intensity plane.
pub fn frangi_multiscale(src: &Field, params: &MultiScaleParams) -> NirveinResult<MultiScaleResult> {
    if src.is_empty() {
        return Err(NirveinError::InvalidDimensions {
            width: src.width(),
            height: src.height(),
        });
    }
    params.sweep.validate()?;

    let sigmas = params.sweep.sigmas();
    let _span = trace_span!("frangi_multiscale", scales = sigmas.len()).entered();

    // First pass: cache eigen planes; scoring waits until the background
    // constant is resolved over the whole cache.
    let mut planes = Vec::with_capacity(sigmas.len());
    for &sigma in &sigmas {
        let hessian = hessian_exact(src, sigma);
        planes.push(ScalePlane {
            sigma,
            eigen: eigen_decompose(&hessian),
        });
    }

    let coeffs = match params.auto_c {
        AutoC::Off => VesselnessCoeffs::from_params(&VesselnessParams {
            beta: params.beta,
            c: params.c,
            dark_ridges: params.dark_ridges,
        }),
        AutoC::MaxNorm => VesselnessCoeffs::with_pooled_norm(
            params.beta,
            pooled_max_norm(&planes)?,
            params.dark_ridges,
        ),
        AutoC::Percentile(p) => VesselnessCoeffs::with_pooled_norm(
            params.beta,
            pooled_percentile(&planes, p)?,
            params.dark_ridges,
        ),
    };
    trace_event!("background_suppression", two_c_sq = coeffs.two_c_sq);

    // Second pass: score each cached scale and reduce by elementwise max.
    // `>=` updates make the later (larger) sigma win exact ties.
    let width = src.width();
    let height = src.height();
    let mut vesselness = Field::zeros(width, height);
    let mut scale = Field::zeros(width, height);
    let mut angle = Field::zeros(width, height);

    for (idx, plane) in planes.iter().enumerate() {
        let scored = score_field(&plane.eigen, &coeffs);
        let src_v = scored.as_slice();
        let src_a = plane.eigen.angle.as_slice();
        let dst_v = vesselness.as_mut_slice();
        let dst_s = scale.as_mut_slice();
        let dst_a = angle.as_mut_slice();
        for i in 0..src_v.len() {
            if idx == 0 || src_v[i] >= dst_v[i] {
                dst_v[i] = src_v[i];
                dst_s[i] = plane.sigma;
                dst_a[i] = src_a[i];
            }
        }
    }

    Ok(MultiScaleResult {
        vesselness,
        scale,
        angle,
    })
}
