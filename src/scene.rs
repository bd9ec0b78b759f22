use glam::Mat4;
use log::{debug, info};

use crate::config::ShadowConfig;
use crate::error::ShadowError;
use crate::input::{InputQueue, Orientation, OrientationMapper};
use crate::mesh::MeshSource;
use crate::render::{CameraPass, DrawItem, LightPass, MeshId, RenderDevice, TargetId};
use crate::transform::TransformPipeline;

/// Runtime state of the shadow-mapping demo: geometry handles, both passes
/// and the per-frame transform and input state.
///
/// Everything that can fail happens in [`Scene::new`]; [`Scene::run_frame`]
/// has no error path.
#[derive(Debug)]
pub struct Scene {
    config: ShadowConfig,
    transforms: TransformPipeline,
    mapper: OrientationMapper,
    input: InputQueue,
    light_pass: LightPass,
    camera_pass: CameraPass,
    floor: MeshId,
    occluder: MeshId,
    occluder_triangles: usize,
    frames: u64,
}

impl Scene {
    /// Validates `config`, uploads the geometry and builds both passes.
    pub fn new<D: RenderDevice + ?Sized>(
        device: &mut D,
        meshes: &dyn MeshSource,
        config: ShadowConfig,
    ) -> Result<Self, ShadowError> {
        config.validate()?;

        let floor_mesh = meshes.floor();
        let occluder_mesh = meshes.occluder();
        let floor = device.upload_mesh(&floor_mesh)?;
        let occluder = device.upload_mesh(&occluder_mesh)?;
        info!(
            "Uploaded floor ({} triangles) and occluder `{}` ({} triangles)",
            floor_mesh.triangle_count(),
            occluder_mesh.name(),
            occluder_mesh.triangle_count()
        );

        let light_pass = LightPass::new(device, config.resolution)?;
        let camera_pass = CameraPass::new(device, &config)?;
        info!(
            "Shadow map {res}x{res} ({}, {} filtering)",
            config.mode,
            config.filter,
            res = config.resolution
        );

        let initial = Orientation::new(config.viewer.initial_pitch, config.viewer.initial_yaw);
        Ok(Self {
            transforms: TransformPipeline::new(&config),
            mapper: OrientationMapper::new(initial, config.viewer.drag_divisor),
            input: InputQueue::new(),
            light_pass,
            camera_pass,
            floor,
            occluder,
            occluder_triangles: occluder_mesh.triangle_count(),
            frames: 0,
            config,
        })
    }

    /// Handle for pushing pointer and touch events from event callbacks.
    pub fn input(&self) -> InputQueue {
        self.input.clone()
    }

    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    pub fn transforms(&self) -> &TransformPipeline {
        &self.transforms
    }

    pub fn orientation(&self) -> Orientation {
        self.mapper.orientation()
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    pub fn occluder_triangles(&self) -> usize {
        self.occluder_triangles
    }

    /// The light pass target holding the encoded depth map.
    pub fn shadow_map(&self) -> TargetId {
        self.light_pass.target()
    }

    /// Updates the viewer's aspect ratio after a window resize.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.viewport = (width, height);
        self.transforms.set_aspect(width as f32 / height as f32);
    }

    /// Reallocates the depth target and rebuilds the camera program, whose
    /// PCF texel size depends on the resolution.
    ///
    /// On failure the previous target and program stay in use.
    pub fn set_shadow_resolution<D: RenderDevice + ?Sized>(
        &mut self,
        device: &mut D,
        resolution: u32,
    ) -> Result<(), ShadowError> {
        if resolution == self.light_pass.resolution() {
            return Ok(());
        }
        let config = ShadowConfig {
            resolution,
            ..self.config.clone()
        };
        config.validate()?;
        let camera_pass = CameraPass::new(device, &config)?;
        if let Err(err) = self.light_pass.resize(device, resolution) {
            camera_pass.release(device);
            return Err(err);
        }
        std::mem::replace(&mut self.camera_pass, camera_pass).release(device);
        self.config = config;
        info!("Shadow map resolution set to {resolution}");
        Ok(())
    }

    /// Draw list shared by both passes: the floor, then the occluder.
    pub fn draw_items(&self) -> [DrawItem; 2] {
        [
            DrawItem {
                mesh: self.floor,
                model: Mat4::IDENTITY,
                color: self.config.floor_color,
            },
            DrawItem {
                mesh: self.occluder,
                model: self.transforms.occluder_model(),
                color: self.config.occluder_color,
            },
        ]
    }

    /// Advances one frame: drains input, updates transforms, then renders the
    /// light pass followed by the camera pass.
    pub fn run_frame<D: RenderDevice + ?Sized>(&mut self, device: &mut D, dt: f32) {
        let orientation = self.mapper.drain(&self.input);
        self.transforms.advance(orientation, dt);

        let items = self.draw_items();
        let light = *self.transforms.light();
        let viewer = *self.transforms.viewer();

        self.light_pass.render(device, &light, &items);
        self.camera_pass
            .render(device, &viewer, &light, self.light_pass.target(), &items);
        device.finish_frame();

        self.frames += 1;
        if self.frames % 600 == 0 {
            debug!(
                "frame {} pitch={:.3} yaw={:.3} angle={:.3}",
                self.frames,
                orientation.pitch,
                orientation.yaw,
                self.transforms.occluder_angle()
            );
        }
    }
}
