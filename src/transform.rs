//! Model/view/projection bookkeeping for the light and the viewer.
//!
//! All projections follow GL clip conventions (`z` in `[-w, w]`); devices
//! with a `[0, 1]` depth range remap clip space themselves.

use glam::{Mat4, Vec3, Vec4};

use crate::config::{LightRig, RotationCadence, ShadowConfig, ViewerRig};
use crate::input::Orientation;

/// Maps clip-space `[-1, 1]` to texture-space `[0, 1]` on x, y and z.
pub const BIAS_MATRIX: Mat4 = Mat4::from_cols(
    Vec4::new(0.5, 0.0, 0.0, 0.0),
    Vec4::new(0.0, 0.5, 0.0, 0.0),
    Vec4::new(0.0, 0.0, 0.5, 0.0),
    Vec4::new(0.5, 0.5, 0.5, 1.0),
);

/// Model, view and projection of one logical camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformSet {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
}

impl TransformSet {
    pub fn model_view(&self) -> Mat4 {
        self.view * self.model
    }

    pub fn model_view_projection(&self) -> Mat4 {
        self.projection * self.view * self.model
    }
}

impl Default for TransformSet {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }
}

/// Orthographic projection of the directional light.
pub fn light_projection(rig: &LightRig) -> Mat4 {
    let b = rig.bounds;
    Mat4::orthographic_rh_gl(b.left, b.right, b.bottom, b.top, b.near, b.far)
}

/// Fixed look-at of the directional light.
pub fn light_view(rig: &LightRig) -> Mat4 {
    Mat4::look_at_rh(rig.eye, rig.target, rig.up)
}

/// Position of the orbiting viewer for the given orientation.
///
/// The viewer starts `distance` units down +Z, is tilted by `-pitch` around X
/// and then swung by `yaw` around Y.
pub fn viewer_eye(rig: &ViewerRig, orientation: Orientation) -> Vec3 {
    let placement = Mat4::from_rotation_y(orientation.yaw)
        * Mat4::from_rotation_x(-orientation.pitch)
        * Mat4::from_translation(Vec3::new(0.0, 0.0, rig.distance));
    placement.w_axis.truncate()
}

pub fn viewer_view(rig: &ViewerRig, orientation: Orientation) -> Mat4 {
    Mat4::look_at_rh(viewer_eye(rig, orientation), Vec3::ZERO, Vec3::Y)
}

pub fn viewer_projection(rig: &ViewerRig, aspect: f32) -> Mat4 {
    Mat4::perspective_rh_gl(rig.fov_y, aspect.max(0.01), rig.near, rig.far)
}

/// Model matrix of the rotating occluder: spin around Y, then offset.
pub fn occluder_model(angle: f32, offset: Vec3) -> Mat4 {
    Mat4::from_rotation_y(angle) * Mat4::from_translation(offset)
}

/// Keeps the light and viewer transforms current from frame to frame.
#[derive(Debug, Clone)]
pub struct TransformPipeline {
    light_rig: LightRig,
    viewer_rig: ViewerRig,
    light: TransformSet,
    viewer: TransformSet,
    light_revision: u64,
    aspect: f32,
    occluder_angle: f32,
    occluder_offset: Vec3,
    rotation_step: f32,
    cadence: RotationCadence,
}

impl TransformPipeline {
    pub fn new(config: &ShadowConfig) -> Self {
        let (width, height) = config.viewport;
        let aspect = width as f32 / height.max(1) as f32;
        let orientation = Orientation::new(config.viewer.initial_pitch, config.viewer.initial_yaw);
        let light = TransformSet {
            model: Mat4::IDENTITY,
            view: light_view(&config.light),
            projection: light_projection(&config.light),
        };
        let viewer = TransformSet {
            model: Mat4::IDENTITY,
            view: viewer_view(&config.viewer, orientation),
            projection: viewer_projection(&config.viewer, aspect),
        };
        Self {
            light_rig: config.light,
            viewer_rig: config.viewer,
            light,
            viewer,
            light_revision: 0,
            aspect,
            occluder_angle: 0.0,
            occluder_offset: config.occluder_offset,
            rotation_step: config.rotation_step,
            cadence: config.cadence,
        }
    }

    /// Light transforms; the model slot is left as identity.
    pub fn light(&self) -> &TransformSet {
        &self.light
    }

    /// Viewer transforms; the model slot is left as identity.
    pub fn viewer(&self) -> &TransformSet {
        &self.viewer
    }

    /// Incremented every time the light matrices are rebuilt.
    pub fn light_revision(&self) -> u64 {
        self.light_revision
    }

    pub fn occluder_angle(&self) -> f32 {
        self.occluder_angle
    }

    pub fn occluder_model(&self) -> Mat4 {
        occluder_model(self.occluder_angle, self.occluder_offset)
    }

    /// Replaces the light rig, rebuilding its matrices only if it changed.
    pub fn set_light_rig(&mut self, rig: LightRig) {
        if rig == self.light_rig {
            return;
        }
        self.light_rig = rig;
        self.light.view = light_view(&rig);
        self.light.projection = light_projection(&rig);
        self.light_revision += 1;
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect == self.aspect {
            return;
        }
        self.aspect = aspect;
        self.viewer.projection = viewer_projection(&self.viewer_rig, aspect);
    }

    /// Per-frame update: advances the occluder and re-aims the viewer.
    pub fn advance(&mut self, orientation: Orientation, dt: f32) {
        let step = match self.cadence {
            RotationCadence::PerFrame => self.rotation_step,
            RotationCadence::PerSecond { reference_fps } => {
                self.rotation_step * reference_fps * dt.max(0.0)
            }
        };
        self.occluder_angle += step;
        self.viewer.view = viewer_view(&self.viewer_rig, orientation);
    }
}
