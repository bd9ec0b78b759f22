use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use log::info;

use crate::config::ShadowConfig;
use crate::mesh::MeshSource;
use crate::render::{PassTarget, SoftwareDevice};
use crate::scene::Scene;

/// Fixed timestep used when rendering without a window.
pub const HEADLESS_FRAME_TIME: f32 = 1.0 / 60.0;

/// Frame-to-frame time measurement for the interactive loop.
#[derive(Debug)]
pub struct FrameClock {
    last: Option<Instant>,
}

impl FrameClock {
    /// Longest step reported, so a stalled window doesn't jump the animation.
    pub const MAX_STEP: f32 = 0.25;

    pub fn new() -> Self {
        Self { last: None }
    }

    /// Seconds since the previous tick; zero on the first one.
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> f32 {
        let dt = self
            .last
            .map(|last| now.saturating_duration_since(last).as_secs_f32())
            .unwrap_or(0.0);
        self.last = Some(now);
        dt.min(Self::MAX_STEP)
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders `frames` frames on the CPU rasterizer.
pub fn render_headless(
    meshes: &dyn MeshSource,
    config: ShadowConfig,
    frames: u32,
) -> Result<(SoftwareDevice, Scene)> {
    config.validate().context("invalid headless configuration")?;
    let (width, height) = config.viewport;
    let mut device = SoftwareDevice::new(width, height);
    let mut scene =
        Scene::new(&mut device, meshes, config).context("failed to build shadow scene")?;
    for _ in 0..frames {
        scene.run_frame(&mut device, HEADLESS_FRAME_TIME);
    }
    info!(
        "Rendered {frames} frame(s), {} fragments",
        device.fragments_written()
    );
    Ok((device, scene))
}

/// Writes the software device's screen as a PNG, top row first.
pub fn write_snapshot(device: &SoftwareDevice, path: &Path) -> Result<()> {
    let (width, height, pixels) = device
        .read_target(PassTarget::Screen)
        .ok_or_else(|| anyhow!("screen buffer is unavailable"))?;
    let image = image::RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| anyhow!("screen buffer does not match {width}x{height}"))?;
    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("failed to write snapshot {}", path.display()))?;
    Ok(())
}

/// Prints the startup summary shown by both front ends.
pub fn print_summary(meshes: &dyn MeshSource, config: &ShadowConfig) {
    let occluder = meshes.occluder();
    println!(
        "Loaded occluder mesh `{}` with {} vertices ({} triangles)",
        occluder.name(),
        occluder.vertex_count(),
        occluder.triangle_count()
    );
    println!(
        "Shadow map: {res}x{res} ({}, {} filtering)",
        config.mode,
        config.filter,
        res = config.resolution
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::BuiltinMeshSource;
    use std::time::Duration;

    #[test]
    fn clock_reports_elapsed_time_capped() {
        let mut clock = FrameClock::new();
        let start = Instant::now();
        assert_eq!(clock.tick_at(start), 0.0);
        let dt = clock.tick_at(start + Duration::from_millis(20));
        assert!((dt - 0.02).abs() < 1e-6);
        assert_eq!(clock.tick_at(start + Duration::from_secs(5)), FrameClock::MAX_STEP);
    }

    #[test]
    fn oversized_viewport_fails_before_allocating() {
        let config = ShadowConfig {
            viewport: (u32::MAX, u32::MAX),
            ..ShadowConfig::default()
        };
        let err = render_headless(&BuiltinMeshSource::default(), config, 1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::ShadowError>(),
            Some(crate::ShadowError::TargetCreation { .. })
        ));
    }

    #[test]
    fn snapshot_is_a_png_of_the_viewport() {
        let config = ShadowConfig {
            resolution: 64,
            viewport: (40, 30),
            ..ShadowConfig::default()
        };
        let (device, scene) = render_headless(&BuiltinMeshSource::default(), config, 2).unwrap();
        assert_eq!(scene.frame_count(), 2);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        write_snapshot(&device, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        let image = image::open(&path).unwrap();
        assert_eq!((image.width(), image.height()), (40, 30));
    }
}
