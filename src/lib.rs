//! Nirvein enhances tubular structures in near-infrared camera frames with
//! a Hessian-eigenvalue (Frangi) vesselness filter.
//!
//! The crate provides the scalar CPU engine (exact 2D Gaussian-derivative
//! kernels, full multiscale sweep with automatic background-suppression
//! estimation) and, behind the `gpu` feature, a single-scale real-time
//! compute pipeline with resolution reduction. Thresholded segmentation and
//! a bottom-centered vessel-density gate turn the scores into an approval
//! decision for an injection-guidance device.

pub mod approval;
pub mod eigen;
pub mod hessian;
pub mod image;
mod kernels;
pub mod multiscale;
pub mod pipeline;
pub mod preprocess;
pub mod segment;
mod trace;
pub mod util;
pub mod vesselness;

#[cfg(feature = "gpu")]
pub mod gpu;

#[cfg(feature = "image-io")]
pub use image::io;

pub use approval::{Approval, ApprovalRegion};
pub use eigen::{eigen_at, eigen_decompose, EigenField};
pub use hessian::{gaussian_blur, hessian_exact, hessian_separable, HessianField};
pub use image::{Field, Frame, GrayImage, ImageView};
pub use kernels::MAX_GPU_SIGMA;
pub use multiscale::{frangi_multiscale, AutoC, MultiScaleParams, MultiScaleResult, ScaleSweep};
pub use pipeline::{
    clamp_downscale_factor, downscaled_dims, DisplayStage, FrameParams, FrangiProcessor,
    GlobalContrast, ProcessOutput,
};
pub use preprocess::{apply_global_contrast, contrast_metric, AdaptiveContrast, Clahe};
pub use segment::{threshold_mask, SegmentationMask};
pub use util::{NirveinError, NirveinResult};
pub use vesselness::{vesselness_at, VesselnessParams};
