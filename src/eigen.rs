//! Closed-form eigen decomposition of 2x2 symmetric Hessian matrices.
//!
//! Eigenvalues are sorted by magnitude (`|lambda1| <= |lambda2|`) and the
//! orientation of the eigenvector paired with `lambda2` is carried as a
//! phase angle in `[0, 2*pi)`. Degenerate matrices decompose to zeros
//! without dividing by zero: a vanishing eigenvector stays the zero vector
//! and reports angle 0.

use crate::hessian::HessianField;
use crate::image::Field;
use crate::util::math::wrap_two_pi;

/// Per-pixel sorted eigenvalues and dominant-eigenvector orientation.
pub struct EigenField {
    /// Smaller-magnitude eigenvalue plane.
    pub lambda1: Field,
    /// Larger-magnitude eigenvalue plane.
    pub lambda2: Field,
    /// Orientation of the eigenvector paired with `lambda2`, in `[0, 2*pi)`.
    pub angle: Field,
}

/// Decomposes one symmetric matrix `[[dxx, dxy], [dxy, dyy]]`.
///
/// Returns `(lambda1, lambda2, angle)` with `|lambda1| <= |lambda2|`.
#[inline]
pub fn eigen_at(dxx: f32, dxy: f32, dyy: f32) -> (f32, f32, f32) {
    let trace = dxx + dyy;
    let diff = dxx - dyy;
    let tmp = (diff * diff + 4.0 * dxy * dxy).sqrt();

    let mu1 = 0.5 * (trace + tmp);
    let mu2 = 0.5 * (trace - tmp);

    // Eigenvector of the `+tmp` branch; its orthogonal partner belongs to
    // the other branch.
    let mut vx = 2.0 * dxy;
    let mut vy = dyy - dxx + tmp;
    let mag = (vx * vx + vy * vy).sqrt();
    if mag != 0.0 {
        vx /= mag;
        vy /= mag;
    }

    if mu1.abs() > mu2.abs() {
        // mu1 dominates: its eigenvector is the carried direction.
        (mu2, mu1, wrap_two_pi(vy.atan2(vx)))
    } else {
        // mu2 dominates: carry the orthogonal direction.
        let (ox, oy) = (-vy, vx);
        (mu1, mu2, wrap_two_pi(oy.atan2(ox)))
    }
}

/// Decomposes every pixel of a Hessian field.
pub fn eigen_decompose(hessian: &HessianField) -> EigenField {
    let width = hessian.dxx.width();
    let height = hessian.dxx.height();
    let mut lambda1 = Field::zeros(width, height);
    let mut lambda2 = Field::zeros(width, height);
    let mut angle = Field::zeros(width, height);

    let dxx = hessian.dxx.as_slice();
    let dxy = hessian.dxy.as_slice();
    let dyy = hessian.dyy.as_slice();
    let l1 = lambda1.as_mut_slice();
    let l2 = lambda2.as_mut_slice();
    let an = angle.as_mut_slice();

    for i in 0..dxx.len() {
        let (a, b, theta) = eigen_at(dxx[i], dxy[i], dyy[i]);
        l1[i] = a;
        l2[i] = b;
        an[i] = theta;
    }

    EigenField {
        lambda1,
        lambda2,
        angle,
    }
}

#[cfg(test)]
mod tests {
    use super::eigen_at;
    use rand::Rng;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn zero_matrix_decomposes_without_nan() {
        let (l1, l2, angle) = eigen_at(0.0, 0.0, 0.0);
        assert_eq!(l1, 0.0);
        assert_eq!(l2, 0.0);
        assert_eq!(angle, 0.0);
    }

    #[test]
    fn diagonal_matrix_eigenvalues() {
        let (l1, l2, _) = eigen_at(2.0, 0.0, -5.0);
        assert!((l1 - 2.0).abs() < 1e-6);
        assert!((l2 + 5.0).abs() < 1e-6);
    }

    #[test]
    fn symmetric_off_diagonal_matrix() {
        // [[0, 1], [1, 0]] has eigenvalues +-1 with eigenvectors at 45 deg.
        let (l1, l2, angle) = eigen_at(0.0, 1.0, 0.0);
        assert!((l1.abs() - 1.0).abs() < 1e-6);
        assert!((l2.abs() - 1.0).abs() < 1e-6);
        let quarter = PI / 4.0;
        let off_diag = [quarter, 3.0 * quarter, 5.0 * quarter, 7.0 * quarter];
        assert!(off_diag.iter().any(|&q| (angle - q).abs() < 1e-5));
    }

    #[test]
    fn vertical_ridge_direction() {
        // Strong curvature across x, none across y: the dominant
        // eigenvector points along x.
        let (l1, l2, angle) = eigen_at(-4.0, 0.5, -0.1);
        assert!(l1.abs() <= l2.abs());
        let along_x = angle.min((angle - PI).abs()).min((angle - 2.0 * PI).abs());
        assert!(along_x < 0.2, "angle {angle}");
        let along_y = (angle - FRAC_PI_2).abs();
        assert!(along_y > 0.5);
    }

    #[test]
    fn magnitude_sort_holds_for_random_matrices() {
        let mut rng = rand::rng();
        for _ in 0..1000 {
            let dxx: f32 = rng.random_range(-10.0..10.0);
            let dxy: f32 = rng.random_range(-10.0..10.0);
            let dyy: f32 = rng.random_range(-10.0..10.0);
            let (l1, l2, angle) = eigen_at(dxx, dxy, dyy);
            assert!(l1.abs() <= l2.abs() + 1e-5);
            assert!(angle.is_finite());
            // Trace and determinant are preserved.
            assert!((l1 + l2 - (dxx + dyy)).abs() < 1e-3);
            assert!((l1 * l2 - (dxx * dyy - dxy * dxy)).abs() < 2e-2);
        }
    }
}
