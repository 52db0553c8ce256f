//! Offscreen texture pool reused across frames.
//!
//! All intermediate targets are 4-channel float textures (signed
//! derivatives and sub-unit scores survive quantization-free). The pool is
//! keyed by `(width, height, downscale_factor)`; buffers are re-created only
//! when the key changes and reused in place otherwise.

use crate::pipeline::downscaled_dims;

pub(crate) struct Target {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

pub(crate) fn float_target(device: &wgpu::Device, label: &str, width: usize, height: usize) -> Target {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: width as u32,
            height: height as u32,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba32Float,
        usage: wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Target { texture, view }
}

/// Bytes per padded readback row for a float texture of width `width`.
pub(crate) fn padded_bytes_per_row(width: usize) -> usize {
    let unpadded = width * 16;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;
    unpadded.div_ceil(align) * align
}

pub(crate) struct FramePool {
    key: (usize, usize, u32),
    pub width: usize,
    pub height: usize,
    pub down_width: usize,
    pub down_height: usize,

    /// 8-bit upload target for the raw frame.
    pub input: Target,
    /// Full-resolution preprocessed frame (global contrast).
    pub preprocessed: Target,
    /// Downscaled color frame, the overlay background.
    pub downscaled: Target,
    pub gray: Target,
    pub inverted: Target,
    /// Intermediate between the two passes of each separable convolution.
    pub conv_tmp: Target,
    pub dxx: Target,
    pub dyy: Target,
    pub dxy: Target,
    pub hessian: Target,
    pub eigen: Target,
    pub vesselness: Target,
    pub segmentation: Target,
    pub overlay_down: Target,
    pub overlay_full: Target,

    /// Shared readback staging buffer, sized for the largest (full-res)
    /// target.
    pub readback: wgpu::Buffer,
}

impl FramePool {
    pub(crate) fn key_of(width: usize, height: usize, factor: f32) -> (usize, usize, u32) {
        (width, height, factor.to_bits())
    }

    pub(crate) fn matches(&self, width: usize, height: usize, factor: f32) -> bool {
        self.key == Self::key_of(width, height, factor)
    }

    pub(crate) fn new(device: &wgpu::Device, width: usize, height: usize, factor: f32) -> Self {
        let (down_width, down_height) = downscaled_dims(width, height, factor);

        let input = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("input"),
            size: wgpu::Extent3d {
                width: width as u32,
                height: height as u32,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let input = Target {
            view: input.create_view(&wgpu::TextureViewDescriptor::default()),
            texture: input,
        };

        let readback_size = (padded_bytes_per_row(width) * height) as u64;
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback"),
            size: readback_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Self {
            key: Self::key_of(width, height, factor),
            width,
            height,
            down_width,
            down_height,
            preprocessed: float_target(device, "preprocessed", width, height),
            downscaled: float_target(device, "downscaled", down_width, down_height),
            gray: float_target(device, "gray", down_width, down_height),
            inverted: float_target(device, "inverted", down_width, down_height),
            conv_tmp: float_target(device, "conv_tmp", down_width, down_height),
            dxx: float_target(device, "dxx", down_width, down_height),
            dyy: float_target(device, "dyy", down_width, down_height),
            dxy: float_target(device, "dxy", down_width, down_height),
            hessian: float_target(device, "hessian", down_width, down_height),
            eigen: float_target(device, "eigen", down_width, down_height),
            vesselness: float_target(device, "vesselness", down_width, down_height),
            segmentation: float_target(device, "segmentation", down_width, down_height),
            overlay_down: float_target(device, "overlay_down", down_width, down_height),
            overlay_full: float_target(device, "overlay_full", width, height),
            input,
            readback,
        }
    }
}
