//! Fragment-level shadow test shared by every device.
//!
//! The GPU programs in [`crate::render::shaders`] express the same steps in
//! WGSL; the software device calls into this module directly.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::config::{ShadowConfig, ShadowMode};
use crate::encoding::decode_depth;
use crate::transform::BIAS_MATRIX;

/// Read access to an encoded depth target.
pub trait DepthSampler {
    /// Returns the (filtered) encoded color at texture coordinate `uv`.
    fn sample(&self, uv: Vec2) -> Vec4;
}

/// Parameters of the camera-pass shadow test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSettings {
    pub mode: ShadowMode,
    pub acne_bias: f32,
    /// Distance between neighbouring texels in texture space.
    pub texel_size: f32,
}

impl ShadowSettings {
    pub fn from_config(config: &ShadowConfig) -> Self {
        Self {
            mode: config.mode,
            acne_bias: config.acne_bias,
            texel_size: 1.0 / config.resolution.max(1) as f32,
        }
    }
}

/// Position of `local` in light texture space: `uv` in `xy`, depth in `z`.
pub fn shadow_coord(light_projection: Mat4, light_model_view: Mat4, local: Vec3) -> Vec3 {
    let shadow_pos = BIAS_MATRIX * light_projection * light_model_view * local.extend(1.0);
    shadow_pos.truncate() / shadow_pos.w
}

/// Depth comparison with acne compensation. Equal depths count as lit.
pub fn is_lit(fragment_depth: f32, reference_depth: f32, acne_bias: f32) -> bool {
    fragment_depth - acne_bias < reference_depth
}

/// Fraction of the kernel's samples that see the light, in `[0, 1]`.
pub fn visibility<S: DepthSampler + ?Sized>(
    sampler: &S,
    coord: Vec3,
    settings: &ShadowSettings,
) -> f32 {
    let radius = settings.mode.kernel_radius();
    let mut lit = 0u32;
    for x in -radius..=radius {
        for y in -radius..=radius {
            let offset = Vec2::new(x as f32, y as f32) * settings.texel_size;
            let reference = decode_depth(sampler.sample(coord.truncate() + offset));
            if is_lit(coord.z, reference, settings.acne_bias) {
                lit += 1;
            }
        }
    }
    lit as f32 / settings.mode.sample_count() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::encode_depth;

    /// Depth map with one constant depth inside a rectangle and far elsewhere.
    struct Blocker {
        min: Vec2,
        max: Vec2,
        depth: f32,
    }

    impl DepthSampler for Blocker {
        fn sample(&self, uv: Vec2) -> Vec4 {
            if uv.cmpge(self.min).all() && uv.cmple(self.max).all() {
                encode_depth(self.depth)
            } else {
                encode_depth(1.0)
            }
        }
    }

    fn settings(mode: ShadowMode) -> ShadowSettings {
        ShadowSettings {
            mode,
            acne_bias: 0.007,
            texel_size: 1.0 / 1024.0,
        }
    }

    #[test]
    fn surface_at_its_own_depth_is_lit() {
        for depth in [0.0, 0.25, 0.5, 0.999] {
            assert!(is_lit(depth, depth, 0.007));
        }
        // Without the bias an equal depth would fail the strict comparison.
        assert!(!is_lit(0.5, 0.5, 0.0));
    }

    #[test]
    fn hard_shadow_reads_back_own_surface_as_lit() {
        let surface = Blocker {
            min: Vec2::ZERO,
            max: Vec2::ONE,
            depth: 0.42,
        };
        let coord = Vec3::new(0.5, 0.5, 0.42);
        assert_eq!(visibility(&surface, coord, &settings(ShadowMode::Hard)), 1.0);
    }

    #[test]
    fn covered_receiver_is_fully_shadowed() {
        let blocker = Blocker {
            min: Vec2::splat(0.25),
            max: Vec2::splat(0.75),
            depth: 0.3,
        };
        let coord = Vec3::new(0.5, 0.5, 0.6);
        assert_eq!(visibility(&blocker, coord, &settings(ShadowMode::Pcf)), 0.0);
        assert_eq!(visibility(&blocker, coord, &settings(ShadowMode::Hard)), 0.0);
    }

    #[test]
    fn open_receiver_is_fully_lit() {
        let blocker = Blocker {
            min: Vec2::splat(0.25),
            max: Vec2::splat(0.75),
            depth: 0.3,
        };
        let coord = Vec3::new(0.1, 0.1, 0.6);
        assert_eq!(visibility(&blocker, coord, &settings(ShadowMode::Pcf)), 1.0);
    }

    #[test]
    fn pcf_softens_the_edge() {
        let texel = 1.0 / 1024.0;
        let blocker = Blocker {
            min: Vec2::new(0.5, 0.0),
            max: Vec2::ONE,
            depth: 0.3,
        };
        // One column of the 3x3 kernel falls left of the blocker edge.
        let coord = Vec3::new(0.5 + texel * 0.5, 0.5, 0.6);
        let amount = visibility(&blocker, coord, &settings(ShadowMode::Pcf));
        assert!((amount - 3.0 / 9.0).abs() < 1e-6, "{amount}");
    }

    #[test]
    fn shadow_coord_applies_bias() {
        let coord = shadow_coord(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::new(-1.0, 1.0, 0.0));
        assert_eq!(coord, Vec3::new(0.0, 1.0, 0.5));
    }
}
