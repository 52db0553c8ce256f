//! Contrast-limited adaptive histogram equalization.
//!
//! The image is partitioned into a grid of tiles; each tile gets a clipped,
//! redistributed histogram and an equalization lookup table. Output pixels
//! blend the four surrounding tile tables bilinearly, which removes the
//! blocking a per-tile remap would produce.

use crate::image::GrayImage;

/// Tile-based equalizer with a mutable clip limit.
///
/// The clip limit is expressed as a multiple of the uniform bin height, as
/// in the common CLAHE formulation; the adaptive-contrast loop nudges it
/// upward between iterations.
#[derive(Clone, Debug)]
pub struct Clahe {
    /// Histogram clip limit as a multiple of the average bin count.
    pub clip_limit: f32,
    /// Tile grid as (columns, rows).
    pub grid: (usize, usize),
}

impl Default for Clahe {
    fn default() -> Self {
        Self {
            clip_limit: 2.0,
            grid: (6, 6),
        }
    }
}

struct TileTables {
    tiles_x: usize,
    tiles_y: usize,
    luts: Vec<[u8; 256]>,
}

impl Clahe {
    /// Equalizes one 8-bit image.
    pub fn apply(&self, image: &GrayImage) -> GrayImage {
        if image.is_empty() {
            return image.clone();
        }

        let width = image.width();
        let height = image.height();
        let tables = self.build_tables(image);

        let tile_w = width as f32 / tables.tiles_x as f32;
        let tile_h = height as f32 / tables.tiles_y as f32;

        let mut out = GrayImage::zeros(width, height);
        let src = image.data();
        let dst = out.data_mut();
        for y in 0..height {
            let (ty0, ty1, wy) = blend_coords(y, tile_h, tables.tiles_y);
            for x in 0..width {
                let (tx0, tx1, wx) = blend_coords(x, tile_w, tables.tiles_x);
                let v = src[y * width + x] as usize;

                let top = lerp(
                    tables.lut(tx0, ty0)[v] as f32,
                    tables.lut(tx1, ty0)[v] as f32,
                    wx,
                );
                let bottom = lerp(
                    tables.lut(tx0, ty1)[v] as f32,
                    tables.lut(tx1, ty1)[v] as f32,
                    wx,
                );
                dst[y * width + x] = lerp(top, bottom, wy).round().clamp(0.0, 255.0) as u8;
            }
        }
        out
    }

    fn build_tables(&self, image: &GrayImage) -> TileTables {
        let width = image.width();
        let height = image.height();
        let tiles_x = self.grid.0.clamp(1, width);
        let tiles_y = self.grid.1.clamp(1, height);
        let src = image.data();

        let mut luts = Vec::with_capacity(tiles_x * tiles_y);
        for ty in 0..tiles_y {
            let y0 = ty * height / tiles_y;
            let y1 = (ty + 1) * height / tiles_y;
            for tx in 0..tiles_x {
                let x0 = tx * width / tiles_x;
                let x1 = (tx + 1) * width / tiles_x;

                let mut hist = [0u32; 256];
                for y in y0..y1 {
                    let base = y * width;
                    for x in x0..x1 {
                        hist[src[base + x] as usize] += 1;
                    }
                }

                let area = ((x1 - x0) * (y1 - y0)) as u32;
                clip_histogram(&mut hist, self.clip_limit, area);
                luts.push(equalization_lut(&hist, area));
            }
        }

        TileTables {
            tiles_x,
            tiles_y,
            luts,
        }
    }
}

impl TileTables {
    #[inline]
    fn lut(&self, tx: usize, ty: usize) -> &[u8; 256] {
        &self.luts[ty * self.tiles_x + tx]
    }
}

/// Clips each bin at `clip_limit` times the uniform bin height and spreads
/// the removed counts evenly over all bins.
fn clip_histogram(hist: &mut [u32; 256], clip_limit: f32, area: u32) {
    let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }

    let bonus = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, bin) in hist.iter_mut().enumerate() {
        *bin += bonus + u32::from(i < remainder);
    }
}

/// Cumulative-distribution lookup table scaled to the 8-bit range.
fn equalization_lut(hist: &[u32; 256], area: u32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    let scale = 255.0 / area.max(1) as f32;
    let mut cumulative = 0u32;
    for (i, &count) in hist.iter().enumerate() {
        cumulative += count;
        lut[i] = (cumulative as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Blend coordinates for one axis: the two neighboring tile indices and the
/// interpolation weight toward the second one. Positions beyond the first
/// and last tile centers clamp to weight 0.
#[inline]
fn blend_coords(pos: usize, tile_size: f32, tiles: usize) -> (usize, usize, f32) {
    let centered = (pos as f32 + 0.5) / tile_size - 0.5;
    if centered <= 0.0 {
        return (0, 0, 0.0);
    }
    let t0 = centered.floor() as usize;
    if t0 + 1 >= tiles {
        return (tiles - 1, tiles - 1, 0.0);
    }
    (t0, t0 + 1, centered - t0 as f32)
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::{blend_coords, clip_histogram, Clahe};
    use crate::image::GrayImage;

    #[test]
    fn clipping_conserves_total_count() {
        let mut hist = [0u32; 256];
        hist[10] = 900;
        hist[200] = 124;
        clip_histogram(&mut hist, 2.0, 1024);
        let total: u32 = hist.iter().sum();
        assert_eq!(total, 1024);
        // The spike is limited to the scaled clip height plus redistribution.
        assert!(hist[10] < 900);
    }

    #[test]
    fn blend_weights_clamp_at_the_borders() {
        let (t0, t1, w) = blend_coords(0, 8.0, 6);
        assert_eq!((t0, t1), (0, 0));
        assert_eq!(w, 0.0);
        let (t0, t1, _) = blend_coords(47, 8.0, 6);
        assert_eq!((t0, t1), (5, 5));
    }

    #[test]
    fn blend_weights_interpolate_between_tile_centers() {
        // Tile size 8: centers at 3.5, 11.5, ... Position 7 sits midway.
        let (t0, t1, w) = blend_coords(7, 8.0, 6);
        assert_eq!((t0, t1), (0, 1));
        assert!((w - 0.4375).abs() < 1e-6);
    }

    #[test]
    fn output_dimensions_match_input() {
        let img = GrayImage::new((0..=255).cycle().take(40 * 30).collect(), 40, 30).unwrap();
        let out = Clahe::default().apply(&img);
        assert_eq!(out.width(), 40);
        assert_eq!(out.height(), 30);
    }

    #[test]
    fn equalization_stretches_a_narrow_histogram() {
        // 48x48 gradient squeezed into 100..=131.
        let mut data = Vec::with_capacity(48 * 48);
        for y in 0..48 {
            for x in 0..48 {
                data.push(100 + ((x + y) / 3) as u8);
            }
        }
        let img = GrayImage::new(data, 48, 48).unwrap();
        let out = Clahe::default().apply(&img);
        let min = *out.data().iter().min().unwrap();
        let max = *out.data().iter().max().unwrap();
        assert!(max - min > 131 - 100);
    }

    #[test]
    fn tiny_images_do_not_panic() {
        let img = GrayImage::new(vec![1, 2, 3, 4], 2, 2).unwrap();
        let out = Clahe::default().apply(&img);
        assert_eq!(out.width(), 2);
    }
}
