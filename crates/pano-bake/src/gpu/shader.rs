//! WGSL sources and the uniform blocks they read.
//!
//! Each pass is its own module: [`COMMON_SHADER_SOURCE`] followed by the
//! pass-specific source. The math mirrors `weights`, `color` and `cpu` so both
//! backends produce the same panorama.

use bytemuck::{Pod, Zeroable};
use glam::Mat3;
use pano_config::{BakeOptions, OutputEncoding};

use crate::weights::PhotoProjection;

/// Fullscreen triangle, equirectangular direction mapping and a safe smoothstep.
pub const COMMON_SHADER_SOURCE: &str = r#"
const PI: f32 = 3.14159265358979;
const TAU: f32 = 6.28318530717959;
const HALF_PI: f32 = 1.57079632679490;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_fullscreen(@builtin(vertex_index) idx: u32) -> VertexOutput {
    var out: VertexOutput;
    let uv = vec2<f32>(f32((idx << 1u) & 2u), f32(idx & 2u));
    out.position = vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(uv.x, 1.0 - uv.y);
    return out;
}

// Hard threshold when the edges coincide.
fn step_fade(edge0: f32, edge1: f32, x: f32) -> f32 {
    if (edge1 <= edge0) {
        return select(0.0, 1.0, x > edge0);
    }
    let t = clamp((x - edge0) / (edge1 - edge0), 0.0, 1.0);
    return t * t * (3.0 - 2.0 * t);
}

fn safe_pow(x: f32, y: f32) -> f32 {
    if (x <= 0.0) {
        return select(0.0, 1.0, y == 0.0);
    }
    return pow(x, y);
}

// `frag` is the fragment position, i.e. the texel center in pixels.
fn texel_direction(frag: vec2<f32>, size: vec2<f32>) -> vec3<f32> {
    let u = frag.x / size.x;
    let v = 1.0 - frag.y / size.y;
    let lon = u * TAU - PI;
    let lat = v * PI - HALF_PI;
    return vec3<f32>(cos(lat) * cos(lon), sin(lat), cos(lat) * sin(lon));
}
"#;

pub const ACCUMULATE_SHADER_SOURCE: &str = r#"
const BAND_FADE: f32 = 0.15;
const LOW_PASS_LEVEL: f32 = 2.0;

struct AccumParams {
    cam_from_world: mat3x3<f32>,
    // xyz: optical axis, w: horizon priority
    forward: vec4<f32>,
    // tan_half_x, tan_half_y, fov_overscan, seam_width
    lens: vec4<f32>,
    // gamma, center_bias, angle_power, uv_bleed
    shape: vec4<f32>,
    // theta_min, theta_max, priority_max_boost, priority_power
    band: vec4<f32>,
    // width, height, min_weight, unused
    target_size: vec4<f32>,
};

struct AccumOutput {
    @location(0) color: vec4<f32>,
    @location(1) weight: vec4<f32>,
};

@group(0) @binding(0) var<uniform> params: AccumParams;
@group(1) @binding(0) var photo_texture: texture_2d<f32>;
@group(1) @binding(1) var photo_sampler: sampler;

fn fov_fade(n: f32, tan_half: f32, overscan: f32) -> f32 {
    return 1.0 - step_fade(tan_half, tan_half * (1.0 + overscan), abs(n));
}

fn center_axis(r: f32, bias: f32) -> f32 {
    return safe_pow(max(cos(clamp(abs(r), 0.0, 1.0) * HALF_PI), 0.0), bias);
}

@fragment
fn fs_accumulate(in: VertexOutput) -> AccumOutput {
    let d = texel_direction(in.position.xy, params.target_size.xy);
    let cam = params.cam_from_world * d;
    let denom = -cam.z;
    if (denom <= 0.0) {
        discard;
    }
    let n = cam.xy / denom;
    let tan_half = params.lens.xy;

    let w_fov = fov_fade(n.x, tan_half.x, params.lens.z) * fov_fade(n.y, tan_half.y, params.lens.z);
    let uv_raw = vec2<f32>(0.5) + n / (2.0 * tan_half);
    let outside = max(max(max(-uv_raw.x, uv_raw.x - 1.0), max(-uv_raw.y, uv_raw.y - 1.0)), 0.0);
    let footprint = w_fov * (1.0 - step_fade(0.0, params.shape.w, outside));
    if (footprint <= 0.0) {
        discard;
    }

    let uv = clamp(uv_raw, vec2<f32>(0.0), vec2<f32>(1.0));
    let edge = clamp(min(uv, vec2<f32>(1.0) - uv) / params.lens.w, vec2<f32>(0.0), vec2<f32>(1.0));
    let base = edge.x * edge.y * footprint;

    let cos_theta = clamp(denom / length(cam), 0.0, 1.0);
    let fade_start = max(params.band.y - BAND_FADE, params.band.x);
    let w_band = 1.0 - step_fade(fade_start, params.band.y + BAND_FADE, acos(cos_theta));
    let w_select = center_axis(n.x / tan_half.x, params.shape.y)
        * center_axis(n.y / tan_half.y, params.shape.y)
        * safe_pow(cos_theta, params.shape.z)
        * w_band;
    let affinity = max(dot(params.forward.xyz, d), 0.0);
    let boost = 1.0 + params.forward.w * params.band.z * safe_pow(affinity, params.band.w);

    let low_raw = safe_pow(max(cos((1.0 - clamp(base, 0.0, 1.0)) * HALF_PI), 0.0), params.shape.x);
    let high_raw = low_raw * low_raw * low_raw * low_raw;

    // Texture row 0 is the top of the photo.
    let tex_uv = vec2<f32>(uv.x, 1.0 - uv.y);
    let full = textureSampleLevel(photo_texture, photo_sampler, tex_uv, 0.0).rgb;
    let low = textureSampleLevel(photo_texture, photo_sampler, tex_uv, LOW_PASS_LEVEL).rgb;

    let w_low = low_raw * w_select * boost;
    let w_high = high_raw * w_select * boost;

    var out: AccumOutput;
    out.color = vec4<f32>(low * w_low + (full - low) * w_high, 0.0);
    let w = max(max(low_raw, high_raw) * w_select, params.target_size.z) * boost;
    out.weight = vec4<f32>(w, 0.0, 0.0, 0.0);
    return out;
}
"#;

pub const NORMALIZE_SHADER_SOURCE: &str = r#"
struct NormalizeParams {
    empty_color: vec4<f32>,
    // epsilon, dither, srgb, unused
    flags: vec4<f32>,
};

@group(0) @binding(0) var<uniform> params: NormalizeParams;
@group(1) @binding(0) var color_sum: texture_2d<f32>;
@group(1) @binding(1) var weight_sum: texture_2d<f32>;

fn linear_to_srgb(c: vec3<f32>) -> vec3<f32> {
    let x = max(c, vec3<f32>(0.0));
    let low = x * 12.92;
    let high = 1.055 * pow(x, vec3<f32>(1.0 / 2.4)) - 0.055;
    return select(high, low, x <= vec3<f32>(0.0031308));
}

fn pcg(v: u32) -> u32 {
    let state = v * 747796405u + 2891336453u;
    let word = ((state >> ((state >> 28u) + 4u)) ^ state) * 277803737u;
    return (word >> 22u) ^ word;
}

fn dither_noise(p: vec2<u32>) -> f32 {
    return f32(pcg(p.x + pcg(p.y))) / 4294967295.0 - 0.5;
}

@fragment
fn fs_normalize(in: VertexOutput) -> @location(0) vec4<f32> {
    let p = vec2<i32>(in.position.xy);
    let sum = textureLoad(color_sum, p, 0).rgb;
    let w = textureLoad(weight_sum, p, 0).r;
    let epsilon = params.flags.x;
    if (w <= epsilon) {
        return params.empty_color;
    }
    let lin = sum / max(w, epsilon);
    if (params.flags.z > 0.5) {
        var encoded = linear_to_srgb(lin);
        if (params.flags.y > 0.5) {
            encoded = encoded + vec3<f32>(dither_noise(vec2<u32>(p)) / 255.0);
        }
        return vec4<f32>(clamp(encoded, vec3<f32>(0.0), vec3<f32>(1.0)), 1.0);
    }
    return vec4<f32>(lin, 1.0);
}
"#;

pub const DEGHOST_SHADER_SOURCE: &str = r#"
const LUMA: vec3<f32> = vec3<f32>(0.2126, 0.7152, 0.0722);

struct GhostParams {
    // threshold, blend, unused, unused
    settings: vec4<f32>,
};

@group(0) @binding(0) var<uniform> params: GhostParams;
@group(1) @binding(0) var src_texture: texture_2d<f32>;

@fragment
fn fs_deghost(in: VertexOutput) -> @location(0) vec4<f32> {
    let size = vec2<i32>(textureDimensions(src_texture));
    let p = vec2<i32>(in.position.xy);
    let center = textureLoad(src_texture, p, 0);

    var samples: array<vec3<f32>, 9>;
    var lum: array<f32, 9>;
    var k = 0;
    for (var dy = -1; dy <= 1; dy++) {
        for (var dx = -1; dx <= 1; dx++) {
            let sx = ((p.x + dx) % size.x + size.x) % size.x;
            let sy = clamp(p.y + dy, 0, size.y - 1);
            let s = textureLoad(src_texture, vec2<i32>(sx, sy), 0).rgb;
            samples[k] = s;
            lum[k] = dot(s, LUMA);
            k++;
        }
    }

    for (var i = 1; i < 9; i++) {
        var j = i;
        loop {
            if (j == 0 || lum[j] >= lum[j - 1]) {
                break;
            }
            let l = lum[j];
            lum[j] = lum[j - 1];
            lum[j - 1] = l;
            let s = samples[j];
            samples[j] = samples[j - 1];
            samples[j - 1] = s;
            j--;
        }
    }

    let median = samples[4];
    let diff = length(median - center.rgb);
    let t = step_fade(params.settings.x, 2.0 * params.settings.x, diff);
    let rgb = center.rgb + (median - center.rgb) * (params.settings.y * t);
    return vec4<f32>(rgb, center.a);
}
"#;

pub const ROTATE_SHADER_SOURCE: &str = r#"
struct RotateParams {
    source_from_output: mat3x3<f32>,
};

@group(0) @binding(0) var<uniform> params: RotateParams;
@group(1) @binding(0) var src_texture: texture_2d<f32>;

fn load_wrapped(x: i32, y: i32, size: vec2<i32>) -> vec4<f32> {
    let sx = (x % size.x + size.x) % size.x;
    let sy = clamp(y, 0, size.y - 1);
    return textureLoad(src_texture, vec2<i32>(sx, sy), 0);
}

@fragment
fn fs_rotate(in: VertexOutput) -> @location(0) vec4<f32> {
    let size = vec2<i32>(textureDimensions(src_texture));
    let fsize = vec2<f32>(size);
    let d = params.source_from_output * texel_direction(in.position.xy, fsize);
    let lon = atan2(d.z, d.x);
    let lat = asin(clamp(d.y, -1.0, 1.0));
    let u = fract((lon + PI) / TAU);
    let v = clamp((lat + HALF_PI) / PI, 0.0, 1.0);

    let f = vec2<f32>(u * fsize.x - 0.5, (1.0 - v) * fsize.y - 0.5);
    let base = floor(f);
    let t = f - base;
    let x0 = i32(base.x);
    let y0 = i32(base.y);
    let a = load_wrapped(x0, y0, size);
    let b = load_wrapped(x0 + 1, y0, size);
    let c = load_wrapped(x0, y0 + 1, size);
    let e = load_wrapped(x0 + 1, y0 + 1, size);
    let top = a + (b - a) * t.x;
    let bottom = c + (e - c) * t.x;
    return top + (bottom - top) * t.y;
}
"#;

/// Prefix `source` with the shared vertex stage and helpers.
pub fn pass_source(source: &str) -> String {
    format!("{COMMON_SHADER_SOURCE}\n{source}")
}

fn mat3_columns(m: Mat3) -> [[f32; 4]; 3] {
    let c = m.to_cols_array_2d();
    [
        [c[0][0], c[0][1], c[0][2], 0.0],
        [c[1][0], c[1][1], c[1][2], 0.0],
        [c[2][0], c[2][1], c[2][2], 0.0],
    ]
}

/// Per-photo uniform block of the accumulation pass.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct AccumParams {
    pub cam_from_world: [[f32; 4]; 3],
    pub forward: [f32; 4],
    pub lens: [f32; 4],
    pub shape: [f32; 4],
    pub band: [f32; 4],
    pub target_size: [f32; 4],
}

impl AccumParams {
    pub fn new(projection: &PhotoProjection, options: &BakeOptions) -> Self {
        let f = projection.forward;
        Self {
            cam_from_world: mat3_columns(projection.cam_from_world),
            forward: [f.x, f.y, f.z, projection.priority],
            lens: [
                projection.tan_half_x,
                projection.tan_half_y,
                options.fov_overscan,
                options.seam_width,
            ],
            shape: [
                options.gamma,
                options.center_bias,
                options.angle_power,
                options.uv_bleed,
            ],
            band: [
                options.theta_min,
                options.theta_max,
                options.priority_max_boost,
                options.priority_power,
            ],
            target_size: [
                options.width as f32,
                options.height as f32,
                options.min_weight,
                0.0,
            ],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct NormalizeParams {
    pub empty_color: [f32; 4],
    pub flags: [f32; 4],
}

impl NormalizeParams {
    pub fn new(options: &BakeOptions) -> Self {
        let srgb = options.encoding == OutputEncoding::Srgb8;
        Self {
            empty_color: options.empty_color,
            flags: [
                options.epsilon,
                if options.dither { 1.0 } else { 0.0 },
                if srgb { 1.0 } else { 0.0 },
                0.0,
            ],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GhostParams {
    pub settings: [f32; 4],
}

impl GhostParams {
    pub fn new(options: &BakeOptions) -> Self {
        Self {
            settings: [options.ghost_threshold, options.ghost_blend, 0.0, 0.0],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct RotateParams {
    pub source_from_output: [[f32; 4]; 3],
}

impl RotateParams {
    pub fn new(source_from_output: Mat3) -> Self {
        Self {
            source_from_output: mat3_columns(source_from_output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};
    use pano_capture::FieldOfView;

    #[test]
    fn test_uniform_sizes_match_wgsl_layout() {
        assert_eq!(std::mem::size_of::<AccumParams>(), 128);
        assert_eq!(std::mem::size_of::<NormalizeParams>(), 32);
        assert_eq!(std::mem::size_of::<GhostParams>(), 16);
        assert_eq!(std::mem::size_of::<RotateParams>(), 48);
    }

    #[test]
    fn test_matrix_columns_are_padded() {
        let m = Mat3::from_rotation_y(0.5);
        let cols = mat3_columns(m);
        assert_eq!(cols[0][3], 0.0);
        let col1 = Vec3::new(cols[1][0], cols[1][1], cols[1][2]);
        assert!((col1 - m.y_axis).length() < 1e-6);
    }

    #[test]
    fn test_accum_params_carry_priority() {
        let options = BakeOptions::default();
        let fov = FieldOfView::from_degrees(60.0, 45.0);
        let proj = PhotoProjection::new(Quat::IDENTITY, fov, &options);
        let params = AccumParams::new(&proj, &options);
        assert_eq!(params.forward, [0.0, 0.0, -1.0, 1.0]);
        assert_eq!(params.target_size[0], 4096.0);
    }

    #[test]
    fn test_pass_sources_include_vertex_stage() {
        for source in [
            ACCUMULATE_SHADER_SOURCE,
            NORMALIZE_SHADER_SOURCE,
            DEGHOST_SHADER_SOURCE,
            ROTATE_SHADER_SOURCE,
        ] {
            let full = pass_source(source);
            assert!(full.contains("fn vs_fullscreen"));
            assert!(full.contains("@fragment"));
        }
    }
}
