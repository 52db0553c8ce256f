//! Scalar convolution kernels backing the Hessian strategies.
//!
//! The exact 2D path performs a true convolution (kernel flipped) with
//! reflect-101 borders, matching the reference filter semantics. The 1D
//! passes mirror the GPU convolution shader instead: tap-by-tap correlation
//! with clamp-to-edge sampling, applied horizontally then vertically.

use crate::image::Field;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Reflect-101 boundary index (`-1 -> 1`, `n -> n - 2`).
#[inline]
fn reflect101(idx: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let last = (len - 1) as isize;
    let mut i = idx;
    while i < 0 || i > last {
        if i < 0 {
            i = -i;
        }
        if i > last {
            i = 2 * last - i;
        }
    }
    i as usize
}

/// Clamp-to-edge boundary index.
#[inline]
fn clamp_edge(idx: isize, len: usize) -> usize {
    idx.clamp(0, (len - 1) as isize) as usize
}

fn convolve2d_row(
    src: &Field,
    kernel: &[f32],
    size: usize,
    y: usize,
    out_row: &mut [f32],
) {
    let width = src.width();
    let height = src.height();
    let radius = (size / 2) as isize;
    let data = src.as_slice();

    for (x, out) in out_row.iter_mut().enumerate() {
        let mut acc = 0.0f32;
        for dv in -radius..=radius {
            let sy = reflect101(y as isize - dv, height);
            let krow = (radius + dv) as usize * size;
            let srow = sy * width;
            for du in -radius..=radius {
                let sx = reflect101(x as isize - du, width);
                acc += kernel[krow + (radius + du) as usize] * data[srow + sx];
            }
        }
        *out = acc;
    }
}

/// Full 2D convolution (kernel flipped relative to correlation) with
/// reflect-101 borders. `kernel` is a row-major `size x size` window.
pub(crate) fn convolve2d(src: &Field, kernel: &[f32], size: usize) -> Field {
    let width = src.width();
    let mut out = Field::zeros(width, src.height());

    #[cfg(feature = "rayon")]
    out.as_mut_slice()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| convolve2d_row(src, kernel, size, y, row));

    #[cfg(not(feature = "rayon"))]
    out.as_mut_slice()
        .chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| convolve2d_row(src, kernel, size, y, row));

    out
}

/// Horizontal 1D pass, GPU-shader semantics: correlation with clamp borders.
pub(crate) fn convolve_rows(src: &Field, kernel: &[f32]) -> Field {
    let width = src.width();
    let height = src.height();
    let half = (kernel.len() / 2) as isize;
    let data = src.as_slice();
    let mut out = Field::zeros(width, height);

    for y in 0..height {
        let srow = y * width;
        for x in 0..width {
            let mut acc = 0.0f32;
            for (i, &k) in kernel.iter().enumerate() {
                let sx = clamp_edge(x as isize + i as isize - half, width);
                acc += k * data[srow + sx];
            }
            out.set(x, y, acc);
        }
    }
    out
}

/// Vertical 1D pass, GPU-shader semantics: correlation with clamp borders.
pub(crate) fn convolve_cols(src: &Field, kernel: &[f32]) -> Field {
    let width = src.width();
    let height = src.height();
    let half = (kernel.len() / 2) as isize;
    let data = src.as_slice();
    let mut out = Field::zeros(width, height);

    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0f32;
            for (i, &k) in kernel.iter().enumerate() {
                let sy = clamp_edge(y as isize + i as isize - half, height);
                acc += k * data[sy * width + x];
            }
            out.set(x, y, acc);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{convolve2d, convolve_cols, convolve_rows, reflect101};
    use crate::image::Field;

    #[test]
    fn reflect101_bounces_off_both_ends() {
        assert_eq!(reflect101(-1, 5), 1);
        assert_eq!(reflect101(-2, 5), 2);
        assert_eq!(reflect101(5, 5), 3);
        assert_eq!(reflect101(6, 5), 2);
        assert_eq!(reflect101(-3, 2), 1);
        assert_eq!(reflect101(0, 1), 0);
    }

    #[test]
    fn identity_kernel_is_a_copy() {
        let src = Field::from_vec((0..12).map(|v| v as f32).collect(), 4, 3).unwrap();
        let out = convolve2d(&src, &[0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0], 3);
        assert_eq!(out.as_slice(), src.as_slice());
    }

    #[test]
    fn convolution_flips_an_asymmetric_kernel() {
        // Kernel weighted entirely on its right tap picks the LEFT neighbor
        // under convolution semantics.
        let src = Field::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0], 3, 3).unwrap();
        let kernel = [0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        let out = convolve2d(&src, &kernel, 3);
        assert_eq!(out.at(1, 1), src.at(0, 1));
    }

    #[test]
    fn separable_passes_are_correlations_with_clamped_edges() {
        let src = Field::from_vec(vec![1.0, 2.0, 3.0], 3, 1).unwrap();
        // Right-tap correlation picks the RIGHT neighbor, clamped at the end.
        let out = convolve_rows(&src, &[0.0, 0.0, 1.0]);
        assert_eq!(out.as_slice(), &[2.0, 3.0, 3.0]);

        let src = Field::from_vec(vec![1.0, 2.0, 3.0], 1, 3).unwrap();
        let out = convolve_cols(&src, &[1.0, 0.0, 0.0]);
        assert_eq!(out.as_slice(), &[1.0, 1.0, 2.0]);
    }

    #[test]
    fn box_smoothing_preserves_a_constant_plane() {
        let src = Field::from_vec(vec![0.5; 25], 5, 5).unwrap();
        let k = [1.0 / 3.0; 3];
        let out = convolve_cols(&convolve_rows(&src, &k), &k);
        for &v in out.as_slice() {
            assert!((v - 0.5).abs() < 1e-6);
        }
    }
}
