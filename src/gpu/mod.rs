//! GPU backend: the single-scale real-time pipeline as wgpu compute passes.
//!
//! The CPU implementation remains the authoritative reference; the GPU
//! path trades the multiscale sweep and auto background estimation for
//! throughput, running one scale at a reduced resolution over a pool of
//! float textures that is reused across frames. The only blocking point is
//! the synchronous readback of the requested artifact.

mod device;
mod pipeline;
mod pool;
mod shaders;

pub use device::gpu_available;
pub use pipeline::GpuPipeline;
