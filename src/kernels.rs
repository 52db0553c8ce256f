//! Gaussian-derivative kernel construction.
//!
//! Two kernel families back the two Hessian strategies: analytic 2D
//! second-derivative kernels for the exact path, and sampled 1D Gaussian
//! derivatives (orders 0..2) for the separable path. Both use a window of
//! radius `round(3 * sigma)`.

use std::f32::consts::PI;

/// Largest number of taps a GPU kernel uniform can hold.
pub(crate) const MAX_KERNEL_TAPS: usize = 64;

/// Largest sigma whose `2 * round(3 * sigma) + 1` taps fit the GPU uniform.
pub const MAX_GPU_SIGMA: f32 = 10.0;

/// Kernel window radius for a given scale. Non-positive sigma degenerates to
/// a single-tap window.
pub(crate) fn kernel_radius(sigma: f32) -> usize {
    let r = (3.0 * sigma).round();
    if r > 0.0 {
        r as usize
    } else {
        0
    }
}

/// Square 2D second-derivative kernels for one scale.
pub(crate) struct HessianKernels {
    /// Window side length (`2 * radius + 1`).
    pub size: usize,
    /// d2/dx2 kernel, row-major.
    pub xx: Vec<f32>,
    /// Mixed d2/dxdy kernel, row-major.
    pub xy: Vec<f32>,
    /// d2/dy2 kernel (transpose of `xx`), row-major.
    pub yy: Vec<f32>,
}

/// Builds the analytic 2D Hessian kernels at scale `sigma`.
///
/// `Kxx(x, y) = 1/(2*pi*sigma^4) * (x^2/sigma^2 - 1) * exp(-(x^2+y^2)/(2*sigma^2))`
/// `Kxy(x, y) = 1/(2*pi*sigma^6) * x*y * exp(-(x^2+y^2)/(2*sigma^2))`
/// `Kyy` is `Kxx` transposed.
pub(crate) fn hessian_kernels(sigma: f32) -> HessianKernels {
    let radius = kernel_radius(sigma) as isize;
    let size = (2 * radius + 1) as usize;
    let s2 = sigma * sigma;
    let norm_xx = 1.0 / (2.0 * PI * s2 * s2);
    let norm_xy = 1.0 / (2.0 * PI * s2 * s2 * s2);

    let mut xx = vec![0.0f32; size * size];
    let mut xy = vec![0.0f32; size * size];
    for y in -radius..=radius {
        for x in -radius..=radius {
            let fx = x as f32;
            let fy = y as f32;
            let gauss = (-(fx * fx + fy * fy) / (2.0 * s2)).exp();
            let row = (y + radius) as usize;
            let col = (x + radius) as usize;
            xx[row * size + col] = norm_xx * (fx * fx / s2 - 1.0) * gauss;
            xy[row * size + col] = norm_xy * fx * fy * gauss;
        }
    }

    let mut yy = vec![0.0f32; size * size];
    for row in 0..size {
        for col in 0..size {
            yy[row * size + col] = xx[col * size + row];
        }
    }

    HessianKernels { size, xx, xy, yy }
}

/// Samples a 1D Gaussian or one of its first two derivatives at scale
/// `sigma`, over radius `round(3 * sigma)`.
///
/// The order-0 kernel is renormalized to unit sum so plain smoothing
/// preserves the mean; the derivative kernels keep the analytic
/// `1/sqrt(2*pi*sigma^2)` prefactor.
pub(crate) fn gaussian_1d(sigma: f32, order: u8) -> Vec<f32> {
    let radius = kernel_radius(sigma) as isize;
    let s2 = sigma * sigma;
    let norm = 1.0 / (2.0 * PI * s2).sqrt();

    let mut kernel = Vec::with_capacity((2 * radius + 1) as usize);
    for i in -radius..=radius {
        let x = i as f32;
        let gauss = (-(x * x) / (2.0 * s2)).exp();
        let value = match order {
            0 => gauss * norm,
            1 => (-x / s2) * gauss * norm,
            _ => (x * x / (s2 * s2) - 1.0 / s2) * gauss * norm,
        };
        kernel.push(value);
    }

    if order == 0 {
        let sum: f32 = kernel.iter().sum();
        if sum > 1e-10 {
            for v in kernel.iter_mut() {
                *v /= sum;
            }
        }
    }
    kernel
}

#[cfg(test)]
mod tests {
    use super::{gaussian_1d, hessian_kernels, kernel_radius, MAX_KERNEL_TAPS, MAX_GPU_SIGMA};

    #[test]
    fn radius_follows_three_sigma() {
        assert_eq!(kernel_radius(1.0), 3);
        assert_eq!(kernel_radius(1.5), 5);
        assert_eq!(kernel_radius(0.0), 0);
        assert_eq!(kernel_radius(-1.0), 0);
    }

    #[test]
    fn max_gpu_sigma_fits_the_uniform() {
        assert!(2 * kernel_radius(MAX_GPU_SIGMA) + 1 <= MAX_KERNEL_TAPS);
    }

    #[test]
    fn smoothing_kernel_sums_to_one() {
        for &sigma in &[0.5f32, 1.0, 2.5] {
            let k = gaussian_1d(sigma, 0);
            let sum: f32 = k.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "sigma {sigma}: sum {sum}");
        }
    }

    #[test]
    fn derivative_kernels_have_near_zero_mean() {
        // The window truncates the tails, so the sums are small, not exact.
        for order in [1u8, 2] {
            let k = gaussian_1d(1.5, order);
            let sum: f32 = k.iter().sum();
            assert!(sum.abs() < 5e-3, "order {order}: sum {sum}");
        }
    }

    #[test]
    fn first_derivative_is_odd() {
        let k = gaussian_1d(2.0, 1);
        let n = k.len();
        for i in 0..n / 2 {
            assert!((k[i] + k[n - 1 - i]).abs() < 1e-6);
        }
        assert!(k[n / 2].abs() < 1e-7);
    }

    #[test]
    fn hessian_kernels_are_transposes() {
        let k = hessian_kernels(1.0);
        for row in 0..k.size {
            for col in 0..k.size {
                let xx = k.xx[row * k.size + col];
                let yy = k.yy[col * k.size + row];
                assert!((xx - yy).abs() < 1e-7);
            }
        }
    }

    #[test]
    fn mixed_kernel_sign_quadrants() {
        let k = hessian_kernels(1.0);
        let r = (k.size - 1) / 2;
        // Positive in the (+,+) and (-,-) quadrants, negative otherwise.
        assert!(k.xy[(r + 1) * k.size + (r + 1)] > 0.0);
        assert!(k.xy[(r - 1) * k.size + (r - 1)] > 0.0);
        assert!(k.xy[(r + 1) * k.size + (r - 1)] < 0.0);
        assert!(k.xy[(r - 1) * k.size + (r + 1)] < 0.0);
    }
}
