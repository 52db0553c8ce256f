//! Two-term Frangi vesselness scoring.
//!
//! `v = exp(-Rb^2 / (2*beta^2)) * (1 - exp(-S^2 / (2*c^2)))` where
//! `Rb = lambda1/lambda2` suppresses blob-like structures and
//! `S^2 = lambda1^2 + lambda2^2` suppresses low-contrast background. The
//! score is polarity-gated: dark ridges require `lambda2 > 0`, bright
//! ridges `lambda2 < 0`; the opposite sign scores zero.

use crate::eigen::EigenField;
use crate::image::Field;

/// Guard value substituted for a vanishing `lambda2` in the ratio term.
const LAMBDA_EPSILON: f32 = 1e-10;

/// User-facing scoring parameters.
#[derive(Clone, Copy, Debug)]
pub struct VesselnessParams {
    /// Blob-suppression sensitivity (`beta` in the Frangi formula).
    pub beta: f32,
    /// Background-suppression constant (`c` in the Frangi formula).
    pub c: f32,
    /// Score dark ridges on a bright background when true, bright ridges
    /// otherwise.
    pub dark_ridges: bool,
}

impl Default for VesselnessParams {
    fn default() -> Self {
        Self {
            beta: 1.6,
            c: 0.08,
            dark_ridges: true,
        }
    }
}

/// Precomputed score denominators. Auto estimation supplies the background
/// denominator directly instead of deriving it from a nominal `c`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct VesselnessCoeffs {
    pub two_beta_sq: f32,
    pub two_c_sq: f32,
    pub dark_ridges: bool,
}

impl VesselnessCoeffs {
    pub(crate) fn from_params(params: &VesselnessParams) -> Self {
        Self {
            two_beta_sq: 2.0 * params.beta * params.beta,
            two_c_sq: 2.0 * params.c * params.c,
            dark_ridges: params.dark_ridges,
        }
    }

    /// Coefficients with the background denominator taken from a pooled
    /// eigenvalue-norm statistic (half the pooled value).
    pub(crate) fn with_pooled_norm(beta: f32, pooled_s2: f32, dark_ridges: bool) -> Self {
        Self {
            two_beta_sq: 2.0 * beta * beta,
            two_c_sq: pooled_s2 / 2.0,
            dark_ridges,
        }
    }
}

/// Scores one eigenvalue pair. The result lies in `[0, 1)`.
#[inline]
pub(crate) fn score_at(lambda1: f32, lambda2: f32, coeffs: &VesselnessCoeffs) -> f32 {
    let active = if coeffs.dark_ridges {
        lambda2 > 0.0
    } else {
        lambda2 < 0.0
    };
    if !active {
        return 0.0;
    }

    let lambda2_safe = if lambda2.abs() < LAMBDA_EPSILON {
        if coeffs.dark_ridges {
            LAMBDA_EPSILON
        } else {
            -LAMBDA_EPSILON
        }
    } else {
        lambda2
    };

    let rb = lambda1 / lambda2_safe;
    let rb2 = rb * rb;
    let s2 = lambda1 * lambda1 + lambda2_safe * lambda2_safe;

    let shape = (-rb2 / coeffs.two_beta_sq).exp();
    let structure = 1.0 - (-s2 / coeffs.two_c_sq).exp();
    shape * structure
}

/// Scores a whole eigen field into a vesselness plane.
pub(crate) fn score_field(eigen: &EigenField, coeffs: &VesselnessCoeffs) -> Field {
    let mut out = Field::zeros(eigen.lambda1.width(), eigen.lambda1.height());
    let l1 = eigen.lambda1.as_slice();
    let l2 = eigen.lambda2.as_slice();
    let dst = out.as_mut_slice();
    for i in 0..l1.len() {
        dst[i] = score_at(l1[i], l2[i], coeffs);
    }
    out
}

/// Scores one eigenvalue pair with explicit parameters.
pub fn vesselness_at(lambda1: f32, lambda2: f32, params: &VesselnessParams) -> f32 {
    score_at(lambda1, lambda2, &VesselnessCoeffs::from_params(params))
}

#[cfg(test)]
mod tests {
    use super::{vesselness_at, VesselnessParams};

    fn params(dark: bool) -> VesselnessParams {
        VesselnessParams {
            beta: 0.5,
            c: 15.0,
            dark_ridges: dark,
        }
    }

    #[test]
    fn wrong_polarity_scores_zero() {
        assert_eq!(vesselness_at(0.1, -20.0, &params(true)), 0.0);
        assert_eq!(vesselness_at(0.1, 20.0, &params(false)), 0.0);
        // lambda2 == 0 matches neither polarity.
        assert_eq!(vesselness_at(0.5, 0.0, &params(true)), 0.0);
    }

    #[test]
    fn score_stays_in_unit_interval() {
        let p = params(true);
        for &(l1, l2) in &[
            (0.0f32, 1e-12f32),
            (0.0, 50.0),
            (10.0, 10.0),
            (-3.0, 40.0),
            (1e6, 1e6),
        ] {
            let v = vesselness_at(l1, l2, &p);
            assert!(v.is_finite());
            assert!((0.0..1.0).contains(&v), "({l1}, {l2}) -> {v}");
        }
    }

    #[test]
    fn elongated_structure_outscores_a_blob() {
        let p = params(true);
        let line = vesselness_at(0.0, 40.0, &p);
        let blob = vesselness_at(40.0, 40.0, &p);
        assert!(line > 0.9);
        assert!(blob < 0.2);
        assert!(line > 4.0 * blob);
    }

    #[test]
    fn weak_contrast_is_suppressed() {
        let p = params(true);
        let faint = vesselness_at(0.0, 0.5, &p);
        let strong = vesselness_at(0.0, 60.0, &p);
        assert!(faint < 0.01);
        assert!(strong > 0.9);
    }

    #[test]
    fn tiny_lambda2_is_guarded() {
        let p = params(true);
        let v = vesselness_at(1.0, 1e-20, &p);
        assert!(v.is_finite());
        // A huge ratio collapses the shape term.
        assert!(v < 1e-6);
    }
}
