//! Pass sequencing, uniform plumbing and synchronous readback.

use crate::approval::Approval;
use crate::image::{Field, Frame, GrayImage};
use crate::kernels::{gaussian_1d, MAX_GPU_SIGMA, MAX_KERNEL_TAPS};
use crate::pipeline::{clamp_downscale_factor, DisplayStage, FrameParams, ProcessOutput};
use crate::segment::threshold_mask;
use crate::trace::{trace_event, trace_span};
use crate::util::{NirveinError, NirveinResult};

use super::device::GpuContext;
use super::pool::{padded_bytes_per_row, FramePool, Target};
use super::shaders;

use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ContrastParams {
    brightness: f32,
    contrast: f32,
    _pad: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ConvParams {
    kernel: [[f32; 4]; 16],
    size: u32,
    dir: u32,
    _pad: [u32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ScaleNormParams {
    sigma_sq: f32,
    _pad: [f32; 3],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct VesselnessGpuParams {
    two_beta_sq: f32,
    two_c_sq: f32,
    dark_ridges: u32,
    _pad: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct SegmentationParams {
    threshold: f32,
    _pad: [f32; 3],
}

impl ConvParams {
    fn pack(kernel: &[f32], dir: u32) -> Self {
        let mut packed = [[0.0f32; 4]; 16];
        for (i, &v) in kernel.iter().take(MAX_KERNEL_TAPS).enumerate() {
            packed[i / 4][i % 4] = v;
        }
        Self {
            kernel: packed,
            size: kernel.len().min(MAX_KERNEL_TAPS) as u32,
            dir,
            _pad: [0; 2],
        }
    }
}

struct Passes {
    contrast: wgpu::ComputePipeline,
    resample: wgpu::ComputePipeline,
    grayscale: wgpu::ComputePipeline,
    invert: wgpu::ComputePipeline,
    convolve: wgpu::ComputePipeline,
    scale_norm: wgpu::ComputePipeline,
    eigenvalues: wgpu::ComputePipeline,
    vesselness: wgpu::ComputePipeline,
    segmentation: wgpu::ComputePipeline,
    overlay: wgpu::ComputePipeline,
}

/// Single-scale GPU pipeline with a pooled set of offscreen targets.
///
/// Owns mutable per-frame state (the texture pool); not safe to share
/// between threads mid-call.
pub struct GpuPipeline {
    ctx: GpuContext,
    layout: wgpu::BindGroupLayout,
    passes: Passes,
    dummy: Target,
    contrast_ubo: wgpu::Buffer,
    conv_ubos: [wgpu::Buffer; 6],
    scale_ubo: wgpu::Buffer,
    vessel_ubo: wgpu::Buffer,
    segment_ubo: wgpu::Buffer,
    pool: Option<FramePool>,
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn uniform_buffer(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl GpuPipeline {
    /// Acquires a device and compiles every pass pipeline.
    pub fn new() -> NirveinResult<Self> {
        let ctx = GpuContext::new()?;
        let device = &ctx.device;

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pass_layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                texture_entry(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::Rgba32Float,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pass_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let make = |label: &str, source: &str| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: "main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            })
        };

        let passes = Passes {
            contrast: make("contrast", shaders::CONTRAST),
            resample: make("resample", shaders::RESAMPLE),
            grayscale: make("grayscale", shaders::GRAYSCALE),
            invert: make("invert", shaders::INVERT),
            convolve: make("convolve_1d", shaders::CONVOLVE_1D),
            scale_norm: make("scale_norm", shaders::SCALE_NORM),
            eigenvalues: make("eigenvalues", shaders::EIGENVALUES),
            vesselness: make("vesselness", shaders::VESSELNESS),
            segmentation: make("segmentation", shaders::SEGMENTATION),
            overlay: make("overlay", shaders::OVERLAY),
        };

        let dummy = super::pool::float_target(device, "dummy", 1, 1);

        let conv_size = std::mem::size_of::<ConvParams>() as u64;
        let conv_ubos = [
            uniform_buffer(device, "conv0", conv_size),
            uniform_buffer(device, "conv1", conv_size),
            uniform_buffer(device, "conv2", conv_size),
            uniform_buffer(device, "conv3", conv_size),
            uniform_buffer(device, "conv4", conv_size),
            uniform_buffer(device, "conv5", conv_size),
        ];

        Ok(Self {
            layout,
            passes,
            dummy,
            contrast_ubo: uniform_buffer(device, "contrast", 16),
            conv_ubos,
            scale_ubo: uniform_buffer(device, "scale_norm", 16),
            vessel_ubo: uniform_buffer(device, "vesselness", 16),
            segment_ubo: uniform_buffer(device, "segmentation", 16),
            pool: None,
            ctx,
        })
    }

    fn bind(
        &self,
        a: &wgpu::TextureView,
        b: Option<&wgpu::TextureView>,
        c: Option<&wgpu::TextureView>,
        out: &wgpu::TextureView,
        ubo: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(a),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(b.unwrap_or(&self.dummy.view)),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(c.unwrap_or(&self.dummy.view)),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(out),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: ubo.as_entire_binding(),
                },
            ],
        })
    }

    fn dispatch(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pipeline: &wgpu::ComputePipeline,
        bind_group: &wgpu::BindGroup,
        width: usize,
        height: usize,
    ) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(width.div_ceil(8) as u32, height.div_ceil(8) as u32, 1);
    }

    /// Runs the single-scale pipeline for one frame.
    pub(crate) fn process(
        &mut self,
        frame: &Frame,
        params: &FrameParams,
    ) -> NirveinResult<ProcessOutput> {
        if params.sigma > MAX_GPU_SIGMA {
            return Err(NirveinError::SigmaTooLarge {
                sigma: params.sigma,
                max: MAX_GPU_SIGMA,
            });
        }

        let width = frame.width();
        let height = frame.height();
        let factor = clamp_downscale_factor(params.downscale_factor);
        let _span = trace_span!("gpu_process", width = width, height = height).entered();

        if !self
            .pool
            .as_ref()
            .is_some_and(|pool| pool.matches(width, height, factor))
        {
            self.pool = Some(FramePool::new(&self.ctx.device, width, height, factor));
            trace_event!("gpu_pool_recreated", width = width, height = height);
        }
        let pool = self.pool.as_ref().expect("pool was just ensured");
        let (dw, dh) = (pool.down_width, pool.down_height);

        // Upload the frame and this frame's uniforms; writes land before
        // the encoded passes execute.
        self.ctx.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &pool.input.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &frame.to_rgba(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width as u32),
                rows_per_image: Some(height as u32),
            },
            wgpu::Extent3d {
                width: width as u32,
                height: height as u32,
                depth_or_array_layers: 1,
            },
        );

        let queue = &self.ctx.queue;
        if let Some(gc) = params.global_contrast {
            queue.write_buffer(
                &self.contrast_ubo,
                0,
                bytemuck::bytes_of(&ContrastParams {
                    brightness: gc.brightness,
                    contrast: gc.contrast,
                    _pad: [0.0; 2],
                }),
            );
        }
        let g = gaussian_1d(params.sigma, 0);
        let dg = gaussian_1d(params.sigma, 1);
        let d2g = gaussian_1d(params.sigma, 2);
        let conv_setups: [(&[f32], u32); 6] = [
            (&d2g, 0),
            (&g, 1),
            (&g, 0),
            (&d2g, 1),
            (&dg, 0),
            (&dg, 1),
        ];
        for (ubo, (kernel, dir)) in self.conv_ubos.iter().zip(conv_setups) {
            queue.write_buffer(ubo, 0, bytemuck::bytes_of(&ConvParams::pack(kernel, dir)));
        }
        queue.write_buffer(
            &self.scale_ubo,
            0,
            bytemuck::bytes_of(&ScaleNormParams {
                sigma_sq: params.sigma * params.sigma,
                _pad: [0.0; 3],
            }),
        );
        queue.write_buffer(
            &self.vessel_ubo,
            0,
            bytemuck::bytes_of(&VesselnessGpuParams {
                two_beta_sq: 2.0 * params.beta * params.beta,
                two_c_sq: 2.0 * params.c * params.c,
                dark_ridges: u32::from(!params.invert),
                _pad: 0,
            }),
        );
        queue.write_buffer(
            &self.segment_ubo,
            0,
            bytemuck::bytes_of(&SegmentationParams {
                threshold: params.segmentation_threshold,
                _pad: [0.0; 3],
            }),
        );

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame"),
            });

        let preprocessed = if params.global_contrast.is_some() {
            let bg = self.bind(
                &pool.input.view,
                None,
                None,
                &pool.preprocessed.view,
                &self.contrast_ubo,
            );
            self.dispatch(&mut encoder, &self.passes.contrast, &bg, width, height);
            &pool.preprocessed.view
        } else {
            &pool.input.view
        };

        let bg = self.bind(preprocessed, None, None, &pool.downscaled.view, &self.contrast_ubo);
        self.dispatch(&mut encoder, &self.passes.resample, &bg, dw, dh);

        let bg = self.bind(&pool.downscaled.view, None, None, &pool.gray.view, &self.contrast_ubo);
        self.dispatch(&mut encoder, &self.passes.grayscale, &bg, dw, dh);

        let working = if params.invert {
            let bg = self.bind(&pool.gray.view, None, None, &pool.inverted.view, &self.contrast_ubo);
            self.dispatch(&mut encoder, &self.passes.invert, &bg, dw, dh);
            &pool.inverted.view
        } else {
            &pool.gray.view
        };

        // Dxx, Dyy and Dxy each need a horizontal then a vertical tap pass;
        // one shared intermediate is safe because the pairs run in order.
        let derivative_targets = [&pool.dxx, &pool.dyy, &pool.dxy];
        for (pair, target) in derivative_targets.iter().enumerate() {
            let first = &self.conv_ubos[pair * 2];
            let second = &self.conv_ubos[pair * 2 + 1];
            let bg = self.bind(working, None, None, &pool.conv_tmp.view, first);
            self.dispatch(&mut encoder, &self.passes.convolve, &bg, dw, dh);
            let bg = self.bind(&pool.conv_tmp.view, None, None, &target.view, second);
            self.dispatch(&mut encoder, &self.passes.convolve, &bg, dw, dh);
        }

        let bg = self.bind(
            &pool.dxx.view,
            Some(&pool.dyy.view),
            Some(&pool.dxy.view),
            &pool.hessian.view,
            &self.scale_ubo,
        );
        self.dispatch(&mut encoder, &self.passes.scale_norm, &bg, dw, dh);

        let bg = self.bind(&pool.hessian.view, None, None, &pool.eigen.view, &self.scale_ubo);
        self.dispatch(&mut encoder, &self.passes.eigenvalues, &bg, dw, dh);

        let bg = self.bind(&pool.eigen.view, None, None, &pool.vesselness.view, &self.vessel_ubo);
        self.dispatch(&mut encoder, &self.passes.vesselness, &bg, dw, dh);

        let bg = self.bind(
            &pool.vesselness.view,
            None,
            None,
            &pool.segmentation.view,
            &self.segment_ubo,
        );
        self.dispatch(&mut encoder, &self.passes.segmentation, &bg, dw, dh);

        let bg = self.bind(
            &pool.downscaled.view,
            Some(&pool.segmentation.view),
            None,
            &pool.overlay_down.view,
            &self.segment_ubo,
        );
        self.dispatch(&mut encoder, &self.passes.overlay, &bg, dw, dh);

        let bg = self.bind(
            &pool.overlay_down.view,
            None,
            None,
            &pool.overlay_full.view,
            &self.segment_ubo,
        );
        self.dispatch(&mut encoder, &self.passes.resample, &bg, width, height);

        self.ctx.queue.submit(Some(encoder.finish()));

        let (stage_target, out_w, out_h) = match params.stage {
            DisplayStage::Grayscale => (&pool.gray, dw, dh),
            DisplayStage::Inverted if params.invert => (&pool.inverted, dw, dh),
            DisplayStage::Inverted => (&pool.gray, dw, dh),
            DisplayStage::Hessian => (&pool.hessian, dw, dh),
            DisplayStage::Eigenvalues => (&pool.eigen, dw, dh),
            DisplayStage::Vesselness => (&pool.vesselness, dw, dh),
            DisplayStage::Segmentation => (&pool.segmentation, dw, dh),
            DisplayStage::Overlay => (&pool.overlay_full, width, height),
        };

        let plane = self.read_channel(stage_target, out_w, out_h);
        let image = match params.stage {
            // Debug stages keep the reference rendering gain.
            DisplayStage::Hessian | DisplayStage::Eigenvalues => {
                let mut field = Field::zeros(out_w, out_h);
                for (dst, v) in field.as_mut_slice().iter_mut().zip(&plane) {
                    *dst = (v.abs() * 10.0).min(1.0);
                }
                field.to_gray()
            }
            _ => match Field::from_vec(plane, out_w, out_h) {
                Ok(field) => field.to_gray(),
                Err(_) => GrayImage::zeros(out_w, out_h),
            },
        };

        let approval = params.approval.map(|region| {
            let seg = self.read_channel(&pool.segmentation, dw, dh);
            match Field::from_vec(seg, dw, dh) {
                Ok(field) => {
                    let mask = threshold_mask(&field, 0.5);
                    region.scaled(factor).evaluate(&mask)
                }
                Err(_) => Approval {
                    ratio: 0.0,
                    approved: false,
                },
            }
        });

        Ok(ProcessOutput {
            image,
            processed_size: (dw, dh),
            approval,
        })
    }

    /// Synchronously downloads channel 0 of a float target. A failed map
    /// degrades to an all-zero plane for this frame.
    fn read_channel(&self, target: &Target, width: usize, height: usize) -> Vec<f32> {
        let pool = self.pool.as_ref().expect("readback requires a pool");
        let padded = padded_bytes_per_row(width);

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &pool.readback,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded as u32),
                    rows_per_image: Some(height as u32),
                },
            },
            wgpu::Extent3d {
                width: width as u32,
                height: height as u32,
                depth_or_array_layers: 1,
            },
        );
        self.ctx.queue.submit(Some(encoder.finish()));

        let slice = pool.readback.slice(0..(padded * height) as u64);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.ctx.device.poll(wgpu::Maintain::Wait);

        let mut plane = vec![0.0f32; width * height];
        match rx.recv() {
            Ok(Ok(())) => {
                {
                    let mapped = slice.get_mapped_range();
                    for y in 0..height {
                        let row = &mapped[y * padded..y * padded + width * 16];
                        let texels: &[f32] = bytemuck::cast_slice(row);
                        for x in 0..width {
                            plane[y * width + x] = texels[x * 4];
                        }
                    }
                }
                pool.readback.unmap();
            }
            _ => {
                trace_event!("gpu_readback_failed");
            }
        }
        plane
    }
}
