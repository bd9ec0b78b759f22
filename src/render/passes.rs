use glam::{Mat4, Vec3, Vec4};
use log::{debug, info};

use super::{shaders, DrawUniforms, MeshId, PassTarget, ProgramId, RenderDevice, TargetId};
use crate::config::{ShadowConfig, TextureFilter};
use crate::encoding::FAR_DEPTH_COLOR;
use crate::error::ShadowError;
use crate::shadow::ShadowSettings;
use crate::transform::TransformSet;

/// One object drawn by both passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    pub mesh: MeshId,
    pub model: Mat4,
    pub color: Vec3,
}

/// Renders encoded light-space depth into an off-screen square target.
#[derive(Debug)]
pub struct LightPass {
    program: ProgramId,
    target: TargetId,
    resolution: u32,
}

impl LightPass {
    pub fn new<D: RenderDevice + ?Sized>(
        device: &mut D,
        resolution: u32,
    ) -> Result<Self, ShadowError> {
        let program = device.create_program(&shaders::light_program())?;
        let target = device.create_target(resolution, resolution)?;
        info!("Created {resolution}x{resolution} shadow map target");
        Ok(Self {
            program,
            target,
            resolution,
        })
    }

    pub fn target(&self) -> TargetId {
        self.target
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Swaps in a new target of a different size, keeping the program.
    ///
    /// The old target is only released once the new one exists.
    pub fn resize<D: RenderDevice + ?Sized>(
        &mut self,
        device: &mut D,
        resolution: u32,
    ) -> Result<(), ShadowError> {
        if resolution == self.resolution {
            return Ok(());
        }
        let target = device.create_target(resolution, resolution)?;
        device.destroy_target(self.target);
        debug!(
            "Shadow map resized from {} to {resolution}",
            self.resolution
        );
        self.target = target;
        self.resolution = resolution;
        Ok(())
    }

    /// Clears the target to the far depth and draws every item from the light.
    pub fn render<D: RenderDevice + ?Sized>(
        &self,
        device: &mut D,
        light: &TransformSet,
        items: &[DrawItem],
    ) {
        device.begin_pass(PassTarget::Offscreen(self.target), FAR_DEPTH_COLOR);
        for item in items {
            let light_model_view = light.view * item.model;
            let uniforms = DrawUniforms {
                projection: light.projection,
                model_view: light_model_view,
                light_projection: light.projection,
                light_model_view,
                color: item.color,
            };
            device.draw_indexed(self.program, item.mesh, &uniforms);
        }
        device.end_pass();
    }
}

/// Renders the visible scene with shadows looked up in the light pass target.
#[derive(Debug)]
pub struct CameraPass {
    program: ProgramId,
    settings: ShadowSettings,
    filter: TextureFilter,
    clear: Vec4,
}

impl CameraPass {
    pub fn new<D: RenderDevice + ?Sized>(
        device: &mut D,
        config: &ShadowConfig,
    ) -> Result<Self, ShadowError> {
        let settings = ShadowSettings::from_config(config);
        let program = device.create_program(&shaders::camera_program(&settings))?;
        Ok(Self {
            program,
            settings,
            filter: config.filter,
            clear: config.clear_color.extend(1.0),
        })
    }

    pub fn settings(&self) -> &ShadowSettings {
        &self.settings
    }

    pub fn filter(&self) -> TextureFilter {
        self.filter
    }

    /// Frees the pass's program on `device`.
    pub fn release<D: RenderDevice + ?Sized>(self, device: &mut D) {
        device.destroy_program(self.program);
    }

    /// Draws `items` to the screen. Both the viewer and the light see each
    /// item through the same model matrix.
    pub fn render<D: RenderDevice + ?Sized>(
        &self,
        device: &mut D,
        viewer: &TransformSet,
        light: &TransformSet,
        shadow_map: TargetId,
        items: &[DrawItem],
    ) {
        device.bind_shadow_texture(shadow_map, self.filter);
        device.begin_pass(PassTarget::Screen, self.clear);
        for item in items {
            let uniforms = DrawUniforms {
                projection: viewer.projection,
                model_view: viewer.view * item.model,
                light_projection: light.projection,
                light_model_view: light.view * item.model,
                color: item.color,
            };
            device.draw_indexed(self.program, item.mesh, &uniforms);
        }
        device.end_pass();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;

    /// Device that only records what it is asked to do.
    #[derive(Default)]
    struct RecordingDevice {
        calls: Vec<String>,
        uniforms: Vec<DrawUniforms>,
        programs: usize,
        targets: usize,
    }

    impl RenderDevice for RecordingDevice {
        fn create_program(
            &mut self,
            desc: &super::super::ProgramDesc,
        ) -> Result<ProgramId, ShadowError> {
            self.calls.push(format!("program {}", desc.label));
            self.programs += 1;
            Ok(ProgramId(self.programs - 1))
        }

        fn destroy_program(&mut self, program: ProgramId) {
            self.calls.push(format!("destroy program {}", program.0));
        }

        fn upload_mesh(&mut self, _mesh: &Mesh) -> Result<MeshId, ShadowError> {
            Ok(MeshId(0))
        }

        fn create_target(&mut self, width: u32, height: u32) -> Result<TargetId, ShadowError> {
            super::super::check_target_size(width, height, 2048)?;
            self.calls.push(format!("target {width}x{height}"));
            self.targets += 1;
            Ok(TargetId(self.targets - 1))
        }

        fn destroy_target(&mut self, target: TargetId) {
            self.calls.push(format!("destroy {}", target.0));
        }

        fn max_target_size(&self) -> u32 {
            2048
        }

        fn begin_pass(&mut self, target: PassTarget, clear: Vec4) {
            self.calls.push(format!("begin {target:?} {clear}"));
        }

        fn draw_indexed(&mut self, program: ProgramId, mesh: MeshId, uniforms: &DrawUniforms) {
            self.calls.push(format!("draw {} {}", program.0, mesh.0));
            self.uniforms.push(*uniforms);
        }

        fn end_pass(&mut self) {
            self.calls.push("end".to_string());
        }

        fn bind_shadow_texture(&mut self, target: TargetId, filter: TextureFilter) {
            self.calls.push(format!("bind {} {filter}", target.0));
        }
    }

    fn items() -> [DrawItem; 2] {
        [
            DrawItem {
                mesh: MeshId(0),
                model: Mat4::IDENTITY,
                color: Vec3::splat(0.6),
            },
            DrawItem {
                mesh: MeshId(1),
                model: Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0)),
                color: Vec3::new(0.36, 0.66, 0.8),
            },
        ]
    }

    fn transforms(z: f32) -> TransformSet {
        TransformSet {
            model: Mat4::IDENTITY,
            view: Mat4::from_translation(Vec3::new(0.0, 0.0, z)),
            projection: Mat4::from_scale(Vec3::splat(0.5)),
        }
    }

    #[test]
    fn light_pass_clears_to_far_and_draws_everything() {
        let mut device = RecordingDevice::default();
        let pass = LightPass::new(&mut device, 256).unwrap();
        device.calls.clear();

        let light = transforms(-5.0);
        pass.render(&mut device, &light, &items());
        assert_eq!(device.calls.len(), 4);
        assert!(device.calls[0].starts_with("begin Offscreen"));
        assert!(device.calls[0].ends_with("[0, 0, 0, 1]"));
        assert_eq!(device.calls[3], "end");

        let occluder = &device.uniforms[1];
        assert_eq!(occluder.projection, light.projection);
        assert_eq!(occluder.model_view, light.view * items()[1].model);
    }

    #[test]
    fn camera_pass_binds_shadow_map_before_drawing() {
        let mut device = RecordingDevice::default();
        let config = ShadowConfig::default();
        let light_pass = LightPass::new(&mut device, 256).unwrap();
        let camera_pass = CameraPass::new(&mut device, &config).unwrap();
        device.calls.clear();

        let viewer = transforms(-45.0);
        let light = transforms(-5.0);
        camera_pass.render(&mut device, &viewer, &light, light_pass.target(), &items());
        assert_eq!(device.calls[0], "bind 0 nearest");
        assert_eq!(
            device.calls[1],
            format!("begin Screen {}", Vec4::new(0.98, 0.98, 0.98, 1.0))
        );

        for (uniforms, item) in device.uniforms.iter().zip(items()) {
            assert_eq!(uniforms.model_view, viewer.view * item.model);
            assert_eq!(uniforms.light_model_view, light.view * item.model);
            assert_eq!(uniforms.color, item.color);
        }
    }

    #[test]
    fn released_camera_pass_frees_its_program() {
        let mut device = RecordingDevice::default();
        let pass = CameraPass::new(&mut device, &ShadowConfig::default()).unwrap();
        pass.release(&mut device);
        assert_eq!(device.calls.last().map(String::as_str), Some("destroy program 0"));
    }

    #[test]
    fn resize_keeps_old_target_when_creation_fails() {
        let mut device = RecordingDevice::default();
        let mut pass = LightPass::new(&mut device, 256).unwrap();
        let before = pass.target();

        assert!(pass.resize(&mut device, 4096).is_err());
        assert_eq!(pass.target(), before);
        assert_eq!(pass.resolution(), 256);

        pass.resize(&mut device, 512).unwrap();
        assert_ne!(pass.target(), before);
        assert!(device.calls.contains(&format!("destroy {}", before.0)));
    }
}
