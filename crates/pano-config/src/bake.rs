//! Tunable parameters for one equirectangular bake.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Pixel encoding of the baked panorama.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutputEncoding {
    /// Display-encoded sRGB, dithered and quantized to 8 bits per channel.
    #[default]
    Srgb8,
    /// Normalized linear light without dithering or clamping. Accumulated at
    /// half-float precision on the GPU, read back as `f32`.
    LinearHdr,
}

/// Parameters consumed by the compositor. Immutable for the duration of a bake.
///
/// Angles named `*_deg` are in degrees; `theta_min` and `theta_max` are in
/// radians and measured from a photo's optical axis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BakeOptions {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels. Equirectangular output is normally `width / 2`.
    pub height: u32,
    /// Incidence angle below which the band cutoff never fades.
    pub theta_min: f32,
    /// Incidence angle around which the band cutoff fades to zero.
    pub theta_max: f32,
    /// Edge feather width in normalized image coordinates.
    pub seam_width: f32,
    /// Exponent shaping the low-frequency blend curve.
    pub gamma: f32,
    /// Exponent of the per-axis `cos(r * pi / 2)` center falloff.
    pub center_bias: f32,
    /// Exponent of the angle-of-incidence weight.
    pub angle_power: f32,
    /// Magnitude of the forward-affinity boost for horizon photos.
    pub priority_max_boost: f32,
    /// Exponent applied to the forward affinity before boosting.
    pub priority_power: f32,
    /// Photos whose forward vector has `|y|` below this are horizon photos.
    pub horizontal_y_threshold: f32,
    /// Relative margin past the FOV edge over which a photo fades out.
    pub fov_overscan: f32,
    /// How far outside `[0, 1]` image coordinates may bleed before fading out.
    pub uv_bleed: f32,
    /// Luminance distance from the local median at which deghosting starts.
    pub ghost_threshold: f32,
    /// Maximum blend toward the local median.
    pub ghost_blend: f32,
    /// Add sub-LSB noise before 8-bit quantization.
    pub dither: bool,
    /// Output pixel encoding.
    pub encoding: OutputEncoding,
    /// Value for texels that no photo reaches.
    pub empty_color: [f32; 4],
    /// Weight sums at or below this are treated as empty.
    pub epsilon: f32,
    /// Minimum weight recorded inside a photo footprint.
    pub min_weight: f32,
    /// Final orientation correction, degrees.
    pub yaw_deg: f32,
    pub pitch_deg: f32,
    pub roll_deg: f32,
}

impl Default for BakeOptions {
    fn default() -> Self {
        Self {
            width: 4096,
            height: 2048,
            theta_min: 5.0_f32.to_radians(),
            theta_max: 65.0_f32.to_radians(),
            seam_width: 0.06,
            gamma: 1.5,
            center_bias: 1.1,
            angle_power: 0.5,
            priority_max_boost: 70.0,
            priority_power: 60.0,
            horizontal_y_threshold: 0.25,
            fov_overscan: 0.01,
            uv_bleed: 0.03,
            ghost_threshold: 0.05,
            ghost_blend: 0.5,
            dither: true,
            encoding: OutputEncoding::Srgb8,
            empty_color: [0.0, 0.0, 0.0, 0.0],
            epsilon: 1e-6,
            min_weight: 1e-4,
            yaw_deg: 0.0,
            pitch_deg: 0.0,
            roll_deg: 0.0,
        }
    }
}

impl BakeOptions {
    /// Same options at a different output size, keeping the 2:1 aspect.
    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self.height = (width / 2).max(1);
        self
    }

    /// True when any orientation correction is requested.
    pub fn has_rotation(&self) -> bool {
        self.yaw_deg != 0.0 || self.pitch_deg != 0.0 || self.roll_deg != 0.0
    }

    /// Reject values the compositor cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid {
                field: "width/height",
                reason: format!("output size {}x{} is empty", self.width, self.height),
            });
        }
        let finite = [
            ("theta_min", self.theta_min),
            ("theta_max", self.theta_max),
            ("seam_width", self.seam_width),
            ("gamma", self.gamma),
            ("center_bias", self.center_bias),
            ("angle_power", self.angle_power),
            ("priority_max_boost", self.priority_max_boost),
            ("priority_power", self.priority_power),
            ("horizontal_y_threshold", self.horizontal_y_threshold),
            ("fov_overscan", self.fov_overscan),
            ("uv_bleed", self.uv_bleed),
            ("ghost_threshold", self.ghost_threshold),
            ("ghost_blend", self.ghost_blend),
            ("epsilon", self.epsilon),
            ("min_weight", self.min_weight),
            ("yaw_deg", self.yaw_deg),
            ("pitch_deg", self.pitch_deg),
            ("roll_deg", self.roll_deg),
        ];
        for (field, value) in finite {
            if !value.is_finite() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{value} is not finite"),
                });
            }
        }
        if self.seam_width <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "seam_width",
                reason: "feather width must be positive".to_string(),
            });
        }
        if self.theta_min < 0.0 || self.theta_min >= self.theta_max {
            return Err(ConfigError::Invalid {
                field: "theta_min/theta_max",
                reason: format!(
                    "band [{:.3}, {:.3}] rad is empty or negative",
                    self.theta_min, self.theta_max
                ),
            });
        }
        if self.fov_overscan < 0.0 || self.uv_bleed < 0.0 {
            return Err(ConfigError::Invalid {
                field: "fov_overscan/uv_bleed",
                reason: "margins cannot be negative".to_string(),
            });
        }
        if self.epsilon <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "epsilon",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_valid() {
        let options = BakeOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.width, 2 * options.height);
        assert!(!options.has_rotation());
    }

    #[test]
    fn test_with_width_keeps_aspect() {
        let options = BakeOptions::default().with_width(512);
        assert_eq!((options.width, options.height), (512, 256));
    }

    #[test]
    fn test_zero_size_rejected() {
        let options = BakeOptions {
            width: 0,
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ConfigError::Invalid { field: "width/height", .. })
        ));
    }

    #[test]
    fn test_inverted_band_rejected() {
        let options = BakeOptions {
            theta_min: 1.0,
            theta_max: 0.5,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_nan_rejected() {
        let options = BakeOptions {
            gamma: f32::NAN,
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ConfigError::Invalid { field: "gamma", .. })
        ));
    }

    #[test]
    fn test_zero_feather_rejected() {
        let options = BakeOptions {
            seam_width: 0.0,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }
}
