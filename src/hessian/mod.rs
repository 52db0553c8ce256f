//! Second-derivative (Hessian) field estimation.
//!
//! Two interchangeable strategies approximate the same continuous operator:
//!
//! * [`hessian_exact`] convolves with analytic 2D Gaussian-derivative
//!   kernels (the reference CPU strategy);
//! * [`hessian_separable`] composes 1D Gaussian-derivative passes exactly
//!   the way the GPU convolution shader does.
//!
//! The mixed derivative differs between them (true 2D `x*y` kernel versus a
//! product of 1D first derivatives) and the border policies differ
//! (reflect-101 versus clamp), so their outputs agree only approximately.
//! Both return scale-normalized planes (multiplied by `sigma^2`).

pub(crate) mod convolve;

use crate::image::Field;
use crate::kernels::{gaussian_1d, hessian_kernels};

pub(crate) use convolve::{convolve_cols, convolve_rows};

/// Scale-normalized per-pixel second derivatives at one scale.
pub struct HessianField {
    /// d2/dx2 plane.
    pub dxx: Field,
    /// Mixed d2/dxdy plane.
    pub dxy: Field,
    /// d2/dy2 plane.
    pub dyy: Field,
    /// Scale the field was computed at.
    pub sigma: f32,
}

fn scale_normalize(field: &mut Field, sigma: f32) {
    let s2 = sigma * sigma;
    for v in field.as_mut_slice() {
        *v *= s2;
    }
}

/// Computes the Hessian field with the analytic 2D kernels.
pub fn hessian_exact(src: &Field, sigma: f32) -> HessianField {
    let kernels = hessian_kernels(sigma);
    let mut dxx = convolve::convolve2d(src, &kernels.xx, kernels.size);
    let mut dxy = convolve::convolve2d(src, &kernels.xy, kernels.size);
    let mut dyy = convolve::convolve2d(src, &kernels.yy, kernels.size);
    scale_normalize(&mut dxx, sigma);
    scale_normalize(&mut dxy, sigma);
    scale_normalize(&mut dyy, sigma);
    HessianField {
        dxx,
        dxy,
        dyy,
        sigma,
    }
}

/// Computes the Hessian field with separable 1D passes (the GPU strategy):
/// `Dxx = (d2G/dx2) x G`, `Dyy = G x (d2G/dy2)`, `Dxy = (dG/dx) x (dG/dy)`.
pub fn hessian_separable(src: &Field, sigma: f32) -> HessianField {
    let g = gaussian_1d(sigma, 0);
    let dg = gaussian_1d(sigma, 1);
    let d2g = gaussian_1d(sigma, 2);

    let mut dxx = convolve_cols(&convolve_rows(src, &d2g), &g);
    let mut dyy = convolve_cols(&convolve_rows(src, &g), &d2g);
    let mut dxy = convolve_cols(&convolve_rows(src, &dg), &dg);
    scale_normalize(&mut dxx, sigma);
    scale_normalize(&mut dyy, sigma);
    scale_normalize(&mut dxy, sigma);
    HessianField {
        dxx,
        dxy,
        dyy,
        sigma,
    }
}

/// Separable Gaussian smoothing at scale `sigma` (order-0 kernel both axes).
pub fn gaussian_blur(src: &Field, sigma: f32) -> Field {
    let g = gaussian_1d(sigma, 0);
    convolve_cols(&convolve_rows(src, &g), &g)
}

#[cfg(test)]
mod tests {
    use super::{gaussian_blur, hessian_exact, hessian_separable};
    use crate::image::Field;

    fn vertical_edge_ramp(width: usize, height: usize) -> Field {
        let mut f = Field::zeros(width, height);
        for y in 0..height {
            for x in 0..width {
                f.set(x, y, x as f32 / width as f32);
            }
        }
        f
    }

    fn horizontal_bar(width: usize, height: usize, y0: usize, y1: usize) -> Field {
        let mut f = Field::zeros(width, height);
        for y in y0..y1 {
            for x in 0..width {
                f.set(x, y, 1.0);
            }
        }
        f
    }

    #[test]
    fn flat_image_has_near_zero_hessian() {
        // Tail truncation leaves a small residual; it must stay small.
        let src = Field::from_vec(vec![0.7; 31 * 31], 31, 31).unwrap();
        for h in [hessian_exact(&src, 1.5), hessian_separable(&src, 1.5)] {
            let cx = 15 * 31 + 15;
            assert!(h.dxx.as_slice()[cx].abs() < 0.01);
            assert!(h.dxy.as_slice()[cx].abs() < 0.01);
            assert!(h.dyy.as_slice()[cx].abs() < 0.01);
        }
    }

    #[test]
    fn linear_ramp_has_near_zero_second_derivative_inside() {
        let src = vertical_edge_ramp(41, 21);
        let h = hessian_exact(&src, 1.0);
        // Interior point far from the borders.
        assert!(h.dxx.at(20, 10).abs() < 0.01);
        assert!(h.dyy.at(20, 10).abs() < 0.01);
    }

    #[test]
    fn bright_bar_curves_down_across_its_axis() {
        let src = horizontal_bar(41, 41, 19, 22);
        for h in [hessian_exact(&src, 1.5), hessian_separable(&src, 1.5)] {
            // Strong negative curvature across the bar at its center, an
            // order of magnitude above the truncation residual along it.
            assert!(h.dyy.at(20, 20) < -0.1);
            assert!(h.dxx.at(20, 20).abs() < 0.05);
        }
    }

    #[test]
    fn strategies_agree_on_interior_structure() {
        let src = horizontal_bar(41, 41, 19, 22);
        let exact = hessian_exact(&src, 1.5);
        let sep = hessian_separable(&src, 1.5);
        // Loose tolerance: the strategies are documented approximations of
        // the same operator, not bit-identical.
        let a = exact.dyy.at(20, 20);
        let b = sep.dyy.at(20, 20);
        assert!((a - b).abs() < 0.15 * a.abs().max(b.abs()).max(1e-3));
    }

    #[test]
    fn blur_preserves_mass_of_an_interior_blob() {
        let src = horizontal_bar(21, 21, 10, 11);
        let blurred = gaussian_blur(&src, 1.0);
        let sum_src: f32 = src.as_slice().iter().sum();
        let sum_blur: f32 = blurred.as_slice().iter().sum();
        assert!((sum_src - sum_blur).abs() / sum_src < 0.05);
    }
}
