//! Error types for nirvein.

use thiserror::Error;

/// Result alias for nirvein operations.
pub type NirveinResult<T> = std::result::Result<T, NirveinError>;

/// Errors that can occur when running the vessel-enhancement pipeline.
#[derive(Debug, Error)]
pub enum NirveinError {
    /// Image dimensions are zero or overflow the addressable range.
    #[error("invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// A backing buffer is smaller than the dimensions require.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// Row stride is smaller than the image width.
    #[error("invalid stride {stride} for width {width}")]
    InvalidStride { width: usize, stride: usize },
    /// A region of interest does not fit inside the image.
    #[error("roi {width}x{height} at ({x}, {y}) outside image {img_width}x{img_height}")]
    RoiOutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        img_width: usize,
        img_height: usize,
    },
    /// Frame channel count is not 1, 3 or 4.
    #[error("unsupported channel count: {channels}")]
    UnsupportedChannels { channels: usize },
    /// Scale sweep bounds are inverted.
    #[error("sigma_start {start} must not exceed sigma_end {end}")]
    SigmaRange { start: f32, end: f32 },
    /// Scale sweep step is not positive.
    #[error("sigma_step must be positive, got {step}")]
    SigmaStep { step: f32 },
    /// Requested sigma exceeds the GPU kernel budget.
    #[error("sigma {sigma} exceeds the supported maximum {max}")]
    SigmaTooLarge { sigma: f32, max: f32 },
    /// Auto background-suppression estimation ran over an empty eigenvalue pool.
    #[error("cannot estimate background suppression: empty eigenvalue pool")]
    EmptyEigenPool,
    /// GPU backend initialization or execution failure.
    #[error("gpu backend failure: {reason}")]
    Gpu { reason: String },
    /// Image decoding or encoding failure.
    #[cfg(feature = "image-io")]
    #[error("image i/o failure: {reason}")]
    ImageIo { reason: String },
}
