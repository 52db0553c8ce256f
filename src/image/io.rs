//! Convenience helpers for loading and saving images via the `image` crate.
//!
//! Available when the `image-io` feature is enabled.

use crate::image::{Frame, GrayImage};
use crate::util::{NirveinError, NirveinResult};
use std::path::Path;

/// Loads an image from disk as an RGB frame.
pub fn load_frame<P: AsRef<Path>>(path: P) -> NirveinResult<Frame> {
    let img = image::open(path)
        .map_err(|err| NirveinError::ImageIo {
            reason: err.to_string(),
        })?
        .to_rgb8();
    let (width, height) = img.dimensions();
    Frame::new(img.into_raw(), width as usize, height as usize, 3)
}

/// Loads an image from disk collapsed to 8-bit grayscale.
pub fn load_gray_image<P: AsRef<Path>>(path: P) -> NirveinResult<GrayImage> {
    let img = image::open(path)
        .map_err(|err| NirveinError::ImageIo {
            reason: err.to_string(),
        })?
        .to_luma8();
    let (width, height) = img.dimensions();
    GrayImage::new(img.into_raw(), width as usize, height as usize)
}

/// Saves a grayscale image to disk; the format follows the file extension.
pub fn save_gray_image<P: AsRef<Path>>(path: P, img: &GrayImage) -> NirveinResult<()> {
    image::save_buffer(
        path,
        img.data(),
        img.width() as u32,
        img.height() as u32,
        image::ColorType::L8,
    )
    .map_err(|err| NirveinError::ImageIo {
        reason: err.to_string(),
    })
}
