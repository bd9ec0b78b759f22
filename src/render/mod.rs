//! Rendering device abstraction and the two shadow-mapping passes.

pub mod native;
pub mod passes;
pub mod shaders;
pub mod software;

use glam::{Mat4, Vec3, Vec4};

use crate::config::TextureFilter;
use crate::error::ShadowError;
use crate::mesh::Mesh;
use crate::shadow::ShadowSettings;

pub use native::WgpuDevice;
pub use passes::{CameraPass, DrawItem, LightPass};
pub use software::SoftwareDevice;

/// Largest target side the software device accepts, and the largest viewport
/// a configuration may request.
pub const DEFAULT_MAX_TARGET_SIZE: u32 = 8192;

/// Handle to a compiled and linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub(crate) usize);

/// Handle to mesh buffers uploaded to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(pub(crate) usize);

/// Handle to an off-screen color + depth target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(pub(crate) usize);

/// Where a pass draws to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTarget {
    /// The presentable frame (window surface or software frame buffer).
    Screen,
    Offscreen(TargetId),
}

/// What a program computes per fragment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgramKind {
    /// Writes the encoded light-space depth of every fragment.
    Light,
    /// Writes the base color attenuated by shadow visibility.
    Camera(ShadowSettings),
}

/// Source and entry points of a program.
#[derive(Debug, Clone)]
pub struct ProgramDesc {
    pub label: String,
    pub kind: ProgramKind,
    /// WGSL module containing both stages.
    pub source: String,
    pub vertex_entry: &'static str,
    pub fragment_entry: &'static str,
}

/// Per-draw uniforms shared by both programs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawUniforms {
    pub projection: Mat4,
    pub model_view: Mat4,
    pub light_projection: Mat4,
    pub light_model_view: Mat4,
    pub color: Vec3,
}

/// Minimal device surface the shadow passes are written against.
///
/// Setup calls may fail; everything issued inside a frame is infallible.
pub trait RenderDevice {
    /// Compiles and links a program.
    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, ShadowError>;

    /// Releases a program created by [`RenderDevice::create_program`].
    fn destroy_program(&mut self, program: ProgramId);

    /// Uploads an already validated mesh.
    fn upload_mesh(&mut self, mesh: &Mesh) -> Result<MeshId, ShadowError>;

    /// Creates an RGBA8 color target with a matching depth attachment.
    fn create_target(&mut self, width: u32, height: u32) -> Result<TargetId, ShadowError>;

    /// Releases a target created by [`RenderDevice::create_target`].
    fn destroy_target(&mut self, target: TargetId);

    /// Largest side length accepted by [`RenderDevice::create_target`].
    fn max_target_size(&self) -> u32;

    /// Binds `target` and clears its color to `clear` and its depth to 1.
    fn begin_pass(&mut self, target: PassTarget, clear: Vec4);

    fn draw_indexed(&mut self, program: ProgramId, mesh: MeshId, uniforms: &DrawUniforms);

    /// Finishes the bound pass; its results are visible to later passes.
    fn end_pass(&mut self);

    /// Makes `target`'s color attachment the depth texture camera programs sample.
    fn bind_shadow_texture(&mut self, target: TargetId, filter: TextureFilter);

    /// Presents the frame, if the device has anything to present.
    fn finish_frame(&mut self) {}
}

/// Stores `value` in the first free slot, growing `slots` if none is free.
pub(crate) fn insert_slot<T>(slots: &mut Vec<Option<T>>, value: T) -> usize {
    if let Some(index) = slots.iter().position(Option::is_none) {
        slots[index] = Some(value);
        return index;
    }
    slots.push(Some(value));
    slots.len() - 1
}

pub(crate) fn check_target_size(width: u32, height: u32, max: u32) -> Result<(), ShadowError> {
    if width == 0 || height == 0 {
        return Err(ShadowError::target(width, height, "target has zero area"));
    }
    if width > max || height > max {
        return Err(ShadowError::target(
            width,
            height,
            format!("device supports at most {max}x{max}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_size_bounds() {
        assert!(check_target_size(1024, 1024, 2048).is_ok());
        assert!(matches!(
            check_target_size(0, 16, 2048),
            Err(ShadowError::TargetCreation { width: 0, .. })
        ));
        assert!(check_target_size(4096, 4096, 2048).is_err());
    }

    #[test]
    fn freed_slots_are_reused_first() {
        let mut slots = Vec::new();
        assert_eq!(insert_slot(&mut slots, 'a'), 0);
        assert_eq!(insert_slot(&mut slots, 'b'), 1);
        slots[0] = None;
        assert_eq!(insert_slot(&mut slots, 'c'), 0);
        assert_eq!(insert_slot(&mut slots, 'd'), 2);
        assert_eq!(slots, vec![Some('c'), Some('b'), Some('d')]);
    }
}
