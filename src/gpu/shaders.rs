//! WGSL sources for the compute passes.
//!
//! Every shader shares one bind group layout: up to three sampled input
//! textures (bindings 0..2), one rgba32float storage output (binding 3) and
//! one uniform block (binding 4). Shaders declare only the bindings they
//! read. Sampling is done with `textureLoad` and explicit clamped
//! coordinates, so no filterable-float feature is required.

/// Global brightness/contrast around 0.5 in the normalized domain.
pub(crate) const CONTRAST: &str = r#"
@group(0) @binding(0) var src: texture_2d<f32>;
@group(0) @binding(3) var dst: texture_storage_2d<rgba32float, write>;

struct Params {
    brightness: f32,
    contrast: f32,
    _pad0: f32,
    _pad1: f32,
}
@group(0) @binding(4) var<uniform> params: Params;

@compute @workgroup_size(8, 8, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = textureDimensions(dst);
    if (gid.x >= dims.x || gid.y >= dims.y) {
        return;
    }
    let color = textureLoad(src, vec2<i32>(gid.xy), 0);
    let centered = (color.rgb - vec3<f32>(0.5)) * params.contrast;
    let shifted = centered + vec3<f32>(0.5 + params.brightness / 255.0);
    let result = clamp(shifted, vec3<f32>(0.0), vec3<f32>(1.0));
    textureStore(dst, vec2<i32>(gid.xy), vec4<f32>(result, 1.0));
}
"#;

/// Bilinear resampling between arbitrary resolutions (used for the
/// downscale before the heavy stages and the overlay upscale after them).
pub(crate) const RESAMPLE: &str = r#"
@group(0) @binding(0) var src: texture_2d<f32>;
@group(0) @binding(3) var dst: texture_storage_2d<rgba32float, write>;

@compute @workgroup_size(8, 8, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dst_dims = textureDimensions(dst);
    if (gid.x >= dst_dims.x || gid.y >= dst_dims.y) {
        return;
    }
    let src_dims = vec2<i32>(textureDimensions(src));
    let scale = vec2<f32>(src_dims) / vec2<f32>(dst_dims);
    let pos = (vec2<f32>(gid.xy) + vec2<f32>(0.5)) * scale - vec2<f32>(0.5);
    let base = floor(pos);
    let frac = pos - base;

    let limit = src_dims - vec2<i32>(1);
    let p00 = clamp(vec2<i32>(base), vec2<i32>(0), limit);
    let p11 = clamp(vec2<i32>(base) + vec2<i32>(1), vec2<i32>(0), limit);

    let c00 = textureLoad(src, p00, 0);
    let c10 = textureLoad(src, vec2<i32>(p11.x, p00.y), 0);
    let c01 = textureLoad(src, vec2<i32>(p00.x, p11.y), 0);
    let c11 = textureLoad(src, p11, 0);

    let top = mix(c00, c10, frac.x);
    let bottom = mix(c01, c11, frac.x);
    textureStore(dst, vec2<i32>(gid.xy), mix(top, bottom, frac.y));
}
"#;

/// Luma conversion.
pub(crate) const GRAYSCALE: &str = r#"
@group(0) @binding(0) var src: texture_2d<f32>;
@group(0) @binding(3) var dst: texture_storage_2d<rgba32float, write>;

@compute @workgroup_size(8, 8, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = textureDimensions(dst);
    if (gid.x >= dims.x || gid.y >= dims.y) {
        return;
    }
    let color = textureLoad(src, vec2<i32>(gid.xy), 0);
    let gray = dot(color.rgb, vec3<f32>(0.299, 0.587, 0.114));
    textureStore(dst, vec2<i32>(gid.xy), vec4<f32>(gray, gray, gray, 1.0));
}
"#;

/// Intensity inversion.
pub(crate) const INVERT: &str = r#"
@group(0) @binding(0) var src: texture_2d<f32>;
@group(0) @binding(3) var dst: texture_storage_2d<rgba32float, write>;

@compute @workgroup_size(8, 8, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = textureDimensions(dst);
    if (gid.x >= dims.x || gid.y >= dims.y) {
        return;
    }
    let v = 1.0 - textureLoad(src, vec2<i32>(gid.xy), 0).x;
    textureStore(dst, vec2<i32>(gid.xy), vec4<f32>(v, v, v, 1.0));
}
"#;

/// One 1D convolution tap pass (horizontal or vertical), clamp-to-edge.
/// The kernel rides in a uniform of 16 vec4s (64 taps).
pub(crate) const CONVOLVE_1D: &str = r#"
@group(0) @binding(0) var src: texture_2d<f32>;
@group(0) @binding(3) var dst: texture_storage_2d<rgba32float, write>;

struct Params {
    kernel: array<vec4<f32>, 16>,
    size: u32,
    dir: u32,
    _pad0: u32,
    _pad1: u32,
}
@group(0) @binding(4) var<uniform> params: Params;

@compute @workgroup_size(8, 8, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = vec2<i32>(textureDimensions(dst));
    if (i32(gid.x) >= dims.x || i32(gid.y) >= dims.y) {
        return;
    }
    let half = i32(params.size) / 2;
    var acc = 0.0;
    for (var i = 0; i < i32(params.size); i = i + 1) {
        var coord = vec2<i32>(gid.xy);
        let offset = i - half;
        if (params.dir == 0u) {
            coord.x = clamp(coord.x + offset, 0, dims.x - 1);
        } else {
            coord.y = clamp(coord.y + offset, 0, dims.y - 1);
        }
        let k = params.kernel[i / 4][i % 4];
        acc = acc + k * textureLoad(src, coord, 0).x;
    }
    textureStore(dst, vec2<i32>(gid.xy), vec4<f32>(acc, 0.0, 0.0, 1.0));
}
"#;

/// Scale normalization: packs `(Dxx, Dxy, Dyy) * sigma^2` into one texture.
pub(crate) const SCALE_NORM: &str = r#"
@group(0) @binding(0) var dxx_tex: texture_2d<f32>;
@group(0) @binding(1) var dyy_tex: texture_2d<f32>;
@group(0) @binding(2) var dxy_tex: texture_2d<f32>;
@group(0) @binding(3) var dst: texture_storage_2d<rgba32float, write>;

struct Params {
    sigma_sq: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
}
@group(0) @binding(4) var<uniform> params: Params;

@compute @workgroup_size(8, 8, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = textureDimensions(dst);
    if (gid.x >= dims.x || gid.y >= dims.y) {
        return;
    }
    let c = vec2<i32>(gid.xy);
    let dxx = textureLoad(dxx_tex, c, 0).x * params.sigma_sq;
    let dyy = textureLoad(dyy_tex, c, 0).x * params.sigma_sq;
    let dxy = textureLoad(dxy_tex, c, 0).x * params.sigma_sq;
    textureStore(dst, c, vec4<f32>(dxx, dxy, dyy, 1.0));
}
"#;

/// Closed-form 2x2 symmetric eigenvalues, magnitude-sorted.
pub(crate) const EIGENVALUES: &str = r#"
@group(0) @binding(0) var src: texture_2d<f32>;
@group(0) @binding(3) var dst: texture_storage_2d<rgba32float, write>;

@compute @workgroup_size(8, 8, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = textureDimensions(dst);
    if (gid.x >= dims.x || gid.y >= dims.y) {
        return;
    }
    let c = vec2<i32>(gid.xy);
    let hessian = textureLoad(src, c, 0).xyz;
    let dxx = hessian.x;
    let dxy = hessian.y;
    let dyy = hessian.z;

    let trace = dxx + dyy;
    let diff = dxx - dyy;
    let tmp = sqrt(max(diff * diff + 4.0 * dxy * dxy, 0.0));

    var l1 = 0.5 * (trace - tmp);
    var l2 = 0.5 * (trace + tmp);
    if (abs(l1) > abs(l2)) {
        let t = l1;
        l1 = l2;
        l2 = t;
    }
    textureStore(dst, c, vec4<f32>(l1, l2, 0.0, 1.0));
}
"#;

/// Polarity-gated two-term Frangi score.
pub(crate) const VESSELNESS: &str = r#"
@group(0) @binding(0) var src: texture_2d<f32>;
@group(0) @binding(3) var dst: texture_storage_2d<rgba32float, write>;

struct Params {
    two_beta_sq: f32,
    two_c_sq: f32,
    dark_ridges: u32,
    _pad0: u32,
}
@group(0) @binding(4) var<uniform> params: Params;

@compute @workgroup_size(8, 8, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = textureDimensions(dst);
    if (gid.x >= dims.x || gid.y >= dims.y) {
        return;
    }
    let c = vec2<i32>(gid.xy);
    let eig = textureLoad(src, c, 0).xy;
    let l1 = eig.x;
    let l2 = eig.y;

    var v = 0.0;
    let active = select(l2 < 0.0, l2 > 0.0, params.dark_ridges == 1u);
    if (active) {
        let eps = select(-1e-10, 1e-10, params.dark_ridges == 1u);
        let l2_safe = select(l2, eps, abs(l2) < 1e-10);
        let rb = l1 / l2_safe;
        let rb2 = rb * rb;
        let s2 = l1 * l1 + l2_safe * l2_safe;
        let shape = exp(-rb2 / params.two_beta_sq);
        let structure = 1.0 - exp(-s2 / params.two_c_sq);
        v = shape * structure;
    }
    textureStore(dst, c, vec4<f32>(v, v, v, 1.0));
}
"#;

/// Inclusive binary threshold.
pub(crate) const SEGMENTATION: &str = r#"
@group(0) @binding(0) var src: texture_2d<f32>;
@group(0) @binding(3) var dst: texture_storage_2d<rgba32float, write>;

struct Params {
    threshold: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
}
@group(0) @binding(4) var<uniform> params: Params;

@compute @workgroup_size(8, 8, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = textureDimensions(dst);
    if (gid.x >= dims.x || gid.y >= dims.y) {
        return;
    }
    let c = vec2<i32>(gid.xy);
    let v = textureLoad(src, c, 0).x;
    let s = select(0.0, 1.0, v >= params.threshold);
    textureStore(dst, c, vec4<f32>(s, s, s, 1.0));
}
"#;

/// Mask composited over the luma of the preprocessed frame.
pub(crate) const OVERLAY: &str = r#"
@group(0) @binding(0) var original: texture_2d<f32>;
@group(0) @binding(1) var segmented: texture_2d<f32>;
@group(0) @binding(3) var dst: texture_storage_2d<rgba32float, write>;

@compute @workgroup_size(8, 8, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = textureDimensions(dst);
    if (gid.x >= dims.x || gid.y >= dims.y) {
        return;
    }
    let c = vec2<i32>(gid.xy);
    let gray = dot(textureLoad(original, c, 0).rgb, vec3<f32>(0.299, 0.587, 0.114));
    let mask = textureLoad(segmented, c, 0).x;
    let v = clamp(gray + 0.5 * mask, 0.0, 1.0);
    textureStore(dst, c, vec4<f32>(v, v, v, 1.0));
}
"#;
