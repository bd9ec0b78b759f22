//! Two-pass shadow mapping.
//!
//! A light pass renders the scene from a directional light into an RGBA8
//! target, packing each fragment's depth into the four color channels. A
//! camera pass then renders the scene from an orbiting viewer and compares
//! every fragment's light-space depth against that map, either with a single
//! lookup (hard shadows) or a 3x3 percentage-closer filter.
//!
//! The passes are written against [`render::RenderDevice`], implemented by a
//! wgpu device for interactive use and by a CPU rasterizer for headless
//! snapshots and tests.

pub mod app;
pub mod config;
pub mod encoding;
pub mod error;
pub mod input;
pub mod mesh;
pub mod obj;
pub mod render;
pub mod scene;
pub mod shadow;
pub mod transform;

pub use config::{RotationCadence, ShadowConfig, ShadowMode, TextureFilter};
pub use encoding::{decode_depth, encode_depth};
pub use error::ShadowError;
pub use input::{InputEvent, InputQueue, Orientation, OrientationMapper};
pub use mesh::{BuiltinMeshSource, Mesh, MeshSource, ObjMeshSource};
pub use obj::load_obj_from_str;
pub use render::{RenderDevice, SoftwareDevice, WgpuDevice};
pub use scene::Scene;
pub use transform::TransformPipeline;
