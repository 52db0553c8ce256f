//! Image containers shared by every pipeline stage.
//!
//! `ImageView` is a borrowed 2D view into a 1D buffer with an explicit
//! stride; a stride larger than the width represents padded rows (GPU
//! readbacks align rows to 256 bytes). `Field` is the owned `f32` plane all
//! per-pixel math runs on, `GrayImage` the owned 8-bit boundary type, and
//! `Frame` the multi-channel input handed in by the capture side.

use crate::util::{NirveinError, NirveinResult};

#[cfg(feature = "image-io")]
pub mod io;

/// Luma weights used for every color-to-gray conversion in the pipeline.
pub(crate) const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

/// Borrowed 2D view with an explicit stride.
#[derive(Copy, Clone)]
pub struct ImageView<'a, T> {
    data: &'a [T],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a, T> ImageView<'a, T> {
    /// Creates a contiguous view with `stride == width`.
    pub fn from_slice(data: &'a [T], width: usize, height: usize) -> NirveinResult<Self> {
        Self::new(data, width, height, width)
    }

    /// Creates a view with an explicit stride.
    pub fn new(data: &'a [T], width: usize, height: usize, stride: usize) -> NirveinResult<Self> {
        let needed = required_len(width, height, stride)?;
        if data.len() < needed {
            return Err(NirveinError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the stride in elements between row starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the element at `(x, y)` if it is within bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<&'a T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.stride + x)
    }

    /// Returns a contiguous slice for row `y` with length `width`.
    pub fn row(&self, y: usize) -> Option<&'a [T]> {
        if y >= self.height {
            return None;
        }
        let start = y * self.stride;
        self.data.get(start..start + self.width)
    }

    /// Returns a zero-copy ROI view into the same backing buffer.
    pub fn roi(
        &self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> NirveinResult<ImageView<'a, T>> {
        let oob = NirveinError::RoiOutOfBounds {
            x,
            y,
            width,
            height,
            img_width: self.width,
            img_height: self.height,
        };
        if width == 0 || height == 0 {
            return Err(NirveinError::InvalidDimensions { width, height });
        }
        if x + width > self.width || y + height > self.height {
            return Err(oob);
        }
        ImageView::new(&self.data[y * self.stride + x..], width, height, self.stride)
    }
}

fn required_len(width: usize, height: usize, stride: usize) -> NirveinResult<usize> {
    if width == 0 || height == 0 {
        return Err(NirveinError::InvalidDimensions { width, height });
    }
    if stride < width {
        return Err(NirveinError::InvalidStride { width, stride });
    }
    (height - 1)
        .checked_mul(stride)
        .and_then(|v| v.checked_add(width))
        .ok_or(NirveinError::InvalidDimensions { width, height })
}

/// Owned contiguous `f32` plane, the working domain of the filter stages.
///
/// Intensity planes are normalized to `0..1`; derivative and eigenvalue
/// planes are signed and unbounded.
#[derive(Clone, Debug)]
pub struct Field {
    data: Vec<f32>,
    width: usize,
    height: usize,
}

impl Field {
    /// Creates a zero-filled plane.
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            data: vec![0.0; width * height],
            width,
            height,
        }
    }

    /// Wraps an existing buffer; the length must match exactly.
    pub fn from_vec(data: Vec<f32>, width: usize, height: usize) -> NirveinResult<Self> {
        let needed = width
            .checked_mul(height)
            .ok_or(NirveinError::InvalidDimensions { width, height })?;
        if data.len() != needed {
            return Err(NirveinError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Returns the plane width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the plane height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// True when the plane holds no pixels.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the backing slice in row-major order.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Returns the mutable backing slice in row-major order.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Returns the sample at `(x, y)`; panics out of bounds.
    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    /// Sets the sample at `(x, y)`; panics out of bounds.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    /// Returns a borrowed view of the plane.
    pub fn view(&self) -> ImageView<'_, f32> {
        ImageView {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.width,
        }
    }

    /// Quantizes to 8 bits with clamping: `clamp(v, 0, 1) * 255`.
    pub fn to_gray(&self) -> GrayImage {
        let data = self
            .data
            .iter()
            .map(|&v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect();
        GrayImage {
            data,
            width: self.width,
            height: self.height,
        }
    }
}

/// Owned contiguous 8-bit grayscale image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl GrayImage {
    /// Creates an image from a buffer; the length must match exactly.
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> NirveinResult<Self> {
        let needed = width
            .checked_mul(height)
            .ok_or(NirveinError::InvalidDimensions { width, height })?;
        if data.len() != needed {
            return Err(NirveinError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Creates a zero-filled (black) image.
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            data: vec![0; width * height],
            width,
            height,
        }
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// True when the image holds no pixels.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the backing slice in row-major order.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the mutable backing slice in row-major order.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Returns a borrowed view of the image.
    pub fn view(&self) -> ImageView<'_, u8> {
        ImageView {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.width,
        }
    }

    /// Converts to a normalized `0..1` plane.
    pub fn to_field(&self) -> Field {
        let data = self.data.iter().map(|&v| v as f32 / 255.0).collect();
        Field {
            data,
            width: self.width,
            height: self.height,
        }
    }
}

/// Owned 8-bit input frame with 1, 3 (RGB) or 4 (RGBA) interleaved channels.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: usize,
    height: usize,
    channels: usize,
}

impl Frame {
    /// Creates a frame from interleaved channel data.
    pub fn new(data: Vec<u8>, width: usize, height: usize, channels: usize) -> NirveinResult<Self> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(NirveinError::UnsupportedChannels { channels });
        }
        let needed = width
            .checked_mul(height)
            .and_then(|v| v.checked_mul(channels))
            .ok_or(NirveinError::InvalidDimensions { width, height })?;
        if needed == 0 {
            return Err(NirveinError::InvalidDimensions { width, height });
        }
        if data.len() != needed {
            return Err(NirveinError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
        })
    }

    /// Wraps a grayscale image as a single-channel frame.
    pub fn from_gray(image: GrayImage) -> Self {
        Self {
            width: image.width,
            height: image.height,
            channels: 1,
            data: image.data,
        }
    }

    /// Returns the frame width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the frame height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the interleaved channel count (1, 3 or 4).
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Returns the interleaved backing slice.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Collapses the frame to 8-bit luma.
    pub fn to_gray(&self) -> GrayImage {
        match self.channels {
            1 => GrayImage {
                data: self.data.clone(),
                width: self.width,
                height: self.height,
            },
            _ => {
                let mut data = Vec::with_capacity(self.width * self.height);
                for px in self.data.chunks_exact(self.channels) {
                    let luma = LUMA_WEIGHTS[0] * px[0] as f32
                        + LUMA_WEIGHTS[1] * px[1] as f32
                        + LUMA_WEIGHTS[2] * px[2] as f32;
                    data.push(luma.round().clamp(0.0, 255.0) as u8);
                }
                GrayImage {
                    data,
                    width: self.width,
                    height: self.height,
                }
            }
        }
    }

    /// Expands the frame to tightly packed RGBA bytes (alpha 255).
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.width * self.height * 4);
        match self.channels {
            1 => {
                for &v in &self.data {
                    out.extend_from_slice(&[v, v, v, 255]);
                }
            }
            3 => {
                for px in self.data.chunks_exact(3) {
                    out.extend_from_slice(&[px[0], px[1], px[2], 255]);
                }
            }
            _ => out.extend_from_slice(&self.data),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{Field, Frame, GrayImage, ImageView};
    use crate::util::NirveinError;

    #[test]
    fn view_rejects_short_buffers_and_bad_strides() {
        let data = [0u8; 10];
        assert!(matches!(
            ImageView::from_slice(&data, 4, 4),
            Err(NirveinError::BufferTooSmall { needed: 16, .. })
        ));
        assert!(matches!(
            ImageView::new(&data, 4, 2, 3),
            Err(NirveinError::InvalidStride { .. })
        ));
    }

    #[test]
    fn strided_view_rows_skip_padding() {
        let data: Vec<u8> = (0..12).collect();
        let view = ImageView::new(&data, 3, 2, 6).unwrap();
        assert_eq!(view.row(0).unwrap(), &[0, 1, 2]);
        assert_eq!(view.row(1).unwrap(), &[6, 7, 8]);
        assert_eq!(view.get(2, 1), Some(&8));
        assert_eq!(view.get(3, 0), None);
    }

    #[test]
    fn roi_is_zero_copy_with_parent_stride() {
        let data: Vec<u8> = (0..16).collect();
        let view = ImageView::from_slice(&data, 4, 4).unwrap();
        let roi = view.roi(1, 1, 2, 2).unwrap();
        assert_eq!(roi.row(0).unwrap(), &[5, 6]);
        assert_eq!(roi.row(1).unwrap(), &[9, 10]);
        assert!(view.roi(3, 3, 2, 2).is_err());
    }

    #[test]
    fn field_quantization_clamps() {
        let field = Field::from_vec(vec![-0.5, 0.0, 0.5, 2.0], 2, 2).unwrap();
        assert_eq!(field.to_gray().data(), &[0, 0, 128, 255]);
    }

    #[test]
    fn frame_rejects_odd_channel_counts() {
        assert!(matches!(
            Frame::new(vec![0; 8], 2, 2, 2),
            Err(NirveinError::UnsupportedChannels { channels: 2 })
        ));
    }

    #[test]
    fn rgb_luma_uses_standard_weights() {
        let frame = Frame::new(vec![255, 0, 0, 0, 255, 0], 2, 1, 3).unwrap();
        let gray = frame.to_gray();
        assert_eq!(gray.data(), &[76, 150]);
    }

    #[test]
    fn gray_roundtrip_through_field() {
        let gray = GrayImage::new(vec![0, 51, 102, 255], 2, 2).unwrap();
        assert_eq!(gray.to_field().to_gray(), gray);
    }
}
