//! Per-texel blend weights.
//!
//! Every factor is a pure function so the CPU compositor, the WGSL shader and
//! the tests agree on one definition. All factors lie in `[0, 1]` except the
//! priority boost, which is `>= 1`.

use std::f32::consts::FRAC_PI_2;

use glam::{Mat3, Quat, Vec3};
use pano_capture::FieldOfView;
use pano_config::BakeOptions;
use pano_grid::FORWARD;

/// Half-width of the band cutoff fade, radians.
pub const BAND_FADE: f32 = 0.15;

/// Hermite step that degenerates to a hard threshold when `edge1 <= edge0`.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x > edge0 { 1.0 } else { 0.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// 1 inside the FOV on one axis, fading to 0 over `overscan` past the edge.
///
/// `n` is the tangent-plane coordinate, `tan_half` the half-FOV tangent.
pub fn fov_fade(n: f32, tan_half: f32, overscan: f32) -> f32 {
    1.0 - smoothstep(tan_half, tan_half * (1.0 + overscan), n.abs())
}

/// 1 inside `[0, 1]^2`, fading to 0 within `bleed` outside it.
pub fn outside_fade(u: f32, v: f32, bleed: f32) -> f32 {
    let outside = (-u).max(u - 1.0).max(-v).max(v - 1.0).max(0.0);
    1.0 - smoothstep(0.0, bleed, outside)
}

/// Linear ramp over `feather` from each image edge. Expects clamped coordinates.
pub fn edge_feather(u: f32, v: f32, feather: f32) -> f32 {
    let eu = (u.min(1.0 - u) / feather).clamp(0.0, 1.0);
    let ev = (v.min(1.0 - v) / feather).clamp(0.0, 1.0);
    eu * ev
}

/// Per-axis `cos(r * pi / 2)^bias` where `r` is the distance from the image
/// center as a fraction of the half extent.
pub fn center_falloff(ru: f32, rv: f32, bias: f32) -> f32 {
    let axis = |r: f32| {
        let r = r.abs().clamp(0.0, 1.0);
        (r * FRAC_PI_2).cos().max(0.0).powf(bias)
    };
    axis(ru) * axis(rv)
}

pub fn incidence_weight(cos_theta: f32, power: f32) -> f32 {
    cos_theta.clamp(0.0, 1.0).powf(power)
}

/// 1 below the band, fading to 0 across `theta_max +- BAND_FADE`. The fade
/// never starts before `theta_min`.
pub fn band_cutoff(theta: f32, theta_min: f32, theta_max: f32) -> f32 {
    let start = (theta_max - BAND_FADE).max(theta_min);
    1.0 - smoothstep(start, theta_max + BAND_FADE, theta)
}

/// Low and high frequency blend curves derived from the base weight.
///
/// The high curve is the fourth power of the low one, so detail hands over
/// between photos over a much narrower seam than tone does.
pub fn blend_curves(base: f32, gamma: f32) -> (f32, f32) {
    let low = ((1.0 - base.clamp(0.0, 1.0)) * FRAC_PI_2)
        .cos()
        .max(0.0)
        .powf(gamma);
    (low, low.powi(4))
}

pub fn priority_boost(affinity: f32, priority: f32, max_boost: f32, power: f32) -> f32 {
    1.0 + priority * max_boost * affinity.max(0.0).powf(power)
}

/// World-to-camera projection of one photo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotoProjection {
    pub cam_from_world: Mat3,
    pub forward: Vec3,
    pub tan_half_x: f32,
    pub tan_half_y: f32,
    /// 1 for horizon photos, 0 otherwise.
    pub priority: f32,
}

impl PhotoProjection {
    pub fn new(orientation: Quat, fov: FieldOfView, options: &BakeOptions) -> Self {
        let orientation = orientation.normalize();
        let forward = orientation * FORWARD;
        let (tan_half_x, tan_half_y) = fov.tan_half();
        Self {
            cam_from_world: Mat3::from_quat(orientation).transpose(),
            forward,
            tan_half_x,
            tan_half_y,
            priority: if forward.y.abs() < options.horizontal_y_threshold {
                1.0
            } else {
                0.0
            },
        }
    }
}

/// Everything the accumulation pass needs at one texel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexelWeights {
    /// Clamped image coordinates, `v` measured from the bottom edge.
    pub u: f32,
    pub v: f32,
    /// Weight applied to the low-frequency color.
    pub low: f32,
    /// Weight applied to the high-frequency residual.
    pub high: f32,
    /// Contribution to the weight sum. At least `min_weight * boost`.
    pub accum: f32,
}

/// Weights of a photo at world direction `d`, or `None` outside its footprint.
pub fn texel_weights(
    d: Vec3,
    proj: &PhotoProjection,
    options: &BakeOptions,
) -> Option<TexelWeights> {
    let cam = proj.cam_from_world * d;
    let denom = -cam.z;
    if denom <= 0.0 {
        return None;
    }
    let nx = cam.x / denom;
    let ny = cam.y / denom;

    let w_fov = fov_fade(nx, proj.tan_half_x, options.fov_overscan)
        * fov_fade(ny, proj.tan_half_y, options.fov_overscan);
    let u = 0.5 + nx / (2.0 * proj.tan_half_x);
    let v = 0.5 + ny / (2.0 * proj.tan_half_y);
    let footprint = w_fov * outside_fade(u, v, options.uv_bleed);
    if footprint <= 0.0 {
        return None;
    }

    let u = u.clamp(0.0, 1.0);
    let v = v.clamp(0.0, 1.0);
    let base = edge_feather(u, v, options.seam_width) * footprint;

    let cos_theta = (denom / cam.length()).clamp(0.0, 1.0);
    let select = center_falloff(nx / proj.tan_half_x, ny / proj.tan_half_y, options.center_bias)
        * incidence_weight(cos_theta, options.angle_power)
        * band_cutoff(cos_theta.acos(), options.theta_min, options.theta_max);
    let boost = priority_boost(
        proj.forward.dot(d),
        proj.priority,
        options.priority_max_boost,
        options.priority_power,
    );

    let (low, high) = blend_curves(base, options.gamma);
    Some(TexelWeights {
        u,
        v,
        low: low * select * boost,
        high: high * select * boost,
        accum: (low.max(high) * select).max(options.min_weight) * boost,
    })
}
