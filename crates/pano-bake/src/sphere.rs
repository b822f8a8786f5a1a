//! Equirectangular texel <-> unit direction mapping.
//!
//! Longitude runs `-pi..pi` left to right, latitude `+pi/2` at row 0 down to
//! `-pi/2` at the bottom row. The world frame is y-up with the seed photo
//! looking down -z.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use glam::{Mat3, Vec3};

/// Direction through the center of texel `(x, y)`.
pub fn texel_direction(x: u32, y: u32, width: u32, height: u32) -> Vec3 {
    let u = (x as f32 + 0.5) / width as f32;
    let v = 1.0 - (y as f32 + 0.5) / height as f32;
    uv_to_direction(u, v)
}

/// `u` in `[0, 1)` maps to longitude, `v` in `[0, 1]` to latitude, bottom up.
pub fn uv_to_direction(u: f32, v: f32) -> Vec3 {
    let lon = u * TAU - PI;
    let lat = v * PI - FRAC_PI_2;
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();
    Vec3::new(cos_lat * cos_lon, sin_lat, cos_lat * sin_lon)
}

/// Inverse of [`uv_to_direction`]. `u` wraps into `[0, 1)`, `v` is clamped.
pub fn direction_to_uv(d: Vec3) -> (f32, f32) {
    let lon = d.z.atan2(d.x);
    let lat = d.y.clamp(-1.0, 1.0).asin();
    let u = ((lon + PI) / TAU).rem_euclid(1.0);
    let v = ((lat + FRAC_PI_2) / PI).clamp(0.0, 1.0);
    (u, v)
}

/// Orientation correction `Rz(roll) * Rx(pitch) * Ry(yaw)`, angles in degrees.
///
/// The corrected panorama shows at direction `d` what the uncorrected one
/// shows at `R^T d`, so a positive yaw shifts content toward lower longitude.
pub fn correction_rotation(yaw_deg: f32, pitch_deg: f32, roll_deg: f32) -> Mat3 {
    Mat3::from_rotation_z(roll_deg.to_radians())
        * Mat3::from_rotation_x(pitch_deg.to_radians())
        * Mat3::from_rotation_y(yaw_deg.to_radians())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longitude_axes() {
        // u = 0.5 is longitude 0, which is +x.
        let d = uv_to_direction(0.5, 0.5);
        assert!((d - Vec3::X).length() < 1e-6);
        let d = uv_to_direction(0.25, 0.5);
        assert!((d - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn test_top_row_is_up() {
        let d = texel_direction(10, 0, 64, 32);
        assert!(d.y > 0.99);
        let d = texel_direction(10, 31, 64, 32);
        assert!(d.y < -0.99);
    }

    #[test]
    fn test_directions_are_unit() {
        for (x, y) in [(0, 0), (17, 5), (63, 31), (32, 16)] {
            let d = texel_direction(x, y, 64, 32);
            assert!((d.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_uv_round_trip_interior() {
        for (u, v) in [(0.1, 0.2), (0.5, 0.5), (0.9, 0.75), (0.33, 0.6)] {
            let (u2, v2) = direction_to_uv(uv_to_direction(u, v));
            assert!((u - u2).abs() < 1e-5, "u {u} -> {u2}");
            assert!((v - v2).abs() < 1e-5, "v {v} -> {v2}");
        }
    }

    #[test]
    fn test_yaw_correction_shifts_longitude() {
        let r = correction_rotation(90.0, 0.0, 0.0);
        let d = uv_to_direction(0.3, 0.5);
        let (u, v) = direction_to_uv(r.transpose() * d);
        assert!((u - 0.55).abs() < 1e-5);
        assert!((v - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_correction_applies_yaw_then_pitch_then_roll() {
        let (yaw, pitch, roll) = (70.0_f32, 25.0_f32, -40.0_f32);
        let r = correction_rotation(yaw, pitch, roll);
        let reordered = Mat3::from_rotation_y(yaw.to_radians())
            * Mat3::from_rotation_x(pitch.to_radians())
            * Mat3::from_rotation_z(roll.to_radians());
        let mut order_matters = false;
        for (u, v) in [(0.1, 0.3), (0.45, 0.5), (0.8, 0.9), (0.62, 0.15)] {
            let d = uv_to_direction(u, v);
            let yawed = Mat3::from_rotation_y(yaw.to_radians()) * d;
            let pitched = Mat3::from_rotation_x(pitch.to_radians()) * yawed;
            let rolled = Mat3::from_rotation_z(roll.to_radians()) * pitched;
            assert!((r * d - rolled).length() < 1e-5, "({u}, {v})");
            order_matters |= (reordered * d - rolled).length() > 1e-2;
        }
        assert!(order_matters);
    }

    #[test]
    fn test_pitch_correction_moves_pole_to_horizon() {
        // Pitching up 90 degrees: straight ahead along +z now shows the old
        // zenith, and the new zenith shows what was at -z.
        let r = correction_rotation(0.0, 90.0, 0.0);
        let source = r.transpose() * uv_to_direction(0.75, 0.5);
        assert!((source - Vec3::Y).length() < 1e-5, "{source}");
        let source = r.transpose() * Vec3::Y;
        assert!((source - Vec3::NEG_Z).length() < 1e-5, "{source}");
    }

    #[test]
    fn test_roll_correction_turns_zenith_sideways() {
        let r = correction_rotation(0.0, 0.0, 90.0);
        let source = r.transpose() * Vec3::Y;
        assert!((source - Vec3::X).length() < 1e-5, "{source}");
        // The roll axis itself is unaffected.
        let source = r.transpose() * Vec3::Z;
        assert!((source - Vec3::Z).length() < 1e-5, "{source}");
    }
}
