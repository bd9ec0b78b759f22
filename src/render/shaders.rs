//! WGSL programs of the light and camera passes.
//!
//! Matrices are built with GL clip conventions; both vertex stages remap clip
//! `z` into the `[0, w]` range a WebGPU rasterizer expects, which keeps
//! `frag_coord.z` equal to the GL window depth.

use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{Binding, Handle, Module, ShaderStage, Type, TypeInner};

use super::{ProgramDesc, ProgramKind};
use crate::error::ShadowError;
use crate::shadow::ShadowSettings;

pub const LIGHT_VERTEX_ENTRY: &str = "vs_light";
pub const LIGHT_FRAGMENT_ENTRY: &str = "fs_light";
pub const CAMERA_VERTEX_ENTRY: &str = "vs_camera";
pub const CAMERA_FRAGMENT_ENTRY: &str = "fs_camera";

const COMMON: &str = r#"
struct DrawUniforms {
    projection: mat4x4<f32>,
    model_view: mat4x4<f32>,
    light_projection: mat4x4<f32>,
    light_model_view: mat4x4<f32>,
    color: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> draw: DrawUniforms;

fn to_device_clip(clip: vec4<f32>) -> vec4<f32> {
    return vec4<f32>(clip.xy, 0.5 * (clip.z + clip.w), clip.w);
}
"#;

const LIGHT: &str = r#"
fn encode_float(depth: f32) -> vec4<f32> {
    if (depth >= 1.0) {
        return vec4<f32>(0.0, 0.0, 0.0, 1.0);
    }
    let bit_shift = vec4<f32>(256.0 * 256.0 * 256.0, 256.0 * 256.0, 256.0, 1.0);
    let bit_mask = vec4<f32>(0.0, 1.0 / 256.0, 1.0 / 256.0, 1.0 / 256.0);
    var comp = fract(max(depth, 0.0) * bit_shift);
    comp -= comp.xxyz * bit_mask;
    return comp;
}

@vertex
fn vs_light(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return to_device_clip(draw.projection * draw.model_view * vec4<f32>(position, 1.0));
}

@fragment
fn fs_light(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    return encode_float(frag_coord.z);
}
"#;

const CAMERA: &str = r#"
@group(1) @binding(0)
var depth_color_texture: texture_2d<f32>;
@group(1) @binding(1)
var depth_color_sampler: sampler;

struct CameraVaryings {
    @builtin(position) position: vec4<f32>,
    @location(0) shadow_pos: vec4<f32>,
}

fn decode_float(color: vec4<f32>) -> f32 {
    let bit_shift = vec4<f32>(1.0 / (256.0 * 256.0 * 256.0), 1.0 / (256.0 * 256.0), 1.0 / 256.0, 1.0);
    return dot(color, bit_shift);
}

@vertex
fn vs_camera(@location(0) position: vec3<f32>) -> CameraVaryings {
    // Clip space [-1, 1] to texture space [0, 1].
    let tex_unit_converter = mat4x4<f32>(
        vec4<f32>(0.5, 0.0, 0.0, 0.0),
        vec4<f32>(0.0, 0.5, 0.0, 0.0),
        vec4<f32>(0.0, 0.0, 0.5, 0.0),
        vec4<f32>(0.5, 0.5, 0.5, 1.0),
    );
    let local = vec4<f32>(position, 1.0);
    var out: CameraVaryings;
    out.position = to_device_clip(draw.projection * draw.model_view * local);
    out.shadow_pos = tex_unit_converter * draw.light_projection * draw.light_model_view * local;
    return out;
}

@fragment
fn fs_camera(varyings: CameraVaryings) -> @location(0) vec4<f32> {
    var fragment_depth = varyings.shadow_pos.xyz / varyings.shadow_pos.w;
    fragment_depth.z -= ACNE_BIAS;

    // Texture rows run top-down while light clip y runs bottom-up.
    let uv = vec2<f32>(fragment_depth.x, 1.0 - fragment_depth.y);
    var amount_in_light = 0.0;
    for (var x = -KERNEL_RADIUS; x <= KERNEL_RADIUS; x++) {
        for (var y = -KERNEL_RADIUS; y <= KERNEL_RADIUS; y++) {
            let offset = vec2<f32>(f32(x), f32(y)) * TEXEL_SIZE;
            let texel = textureSampleLevel(depth_color_texture, depth_color_sampler, uv + offset, 0.0);
            if (fragment_depth.z < decode_float(texel)) {
                amount_in_light += 1.0;
            }
        }
    }
    amount_in_light /= f32(SAMPLE_COUNT);

    return vec4<f32>(amount_in_light * draw.color.rgb, 1.0);
}
"#;

/// Program that renders encoded depth from the light's point of view.
pub fn light_program() -> ProgramDesc {
    ProgramDesc {
        label: "light-depth".to_string(),
        kind: ProgramKind::Light,
        source: format!("{COMMON}{LIGHT}"),
        vertex_entry: LIGHT_VERTEX_ENTRY,
        fragment_entry: LIGHT_FRAGMENT_ENTRY,
    }
}

/// Program that shades the visible scene with hard or PCF shadows.
pub fn camera_program(settings: &ShadowSettings) -> ProgramDesc {
    let constants = format!(
        "const ACNE_BIAS: f32 = {:?};\nconst TEXEL_SIZE: f32 = {:?};\nconst KERNEL_RADIUS: i32 = {};\nconst SAMPLE_COUNT: u32 = {}u;\n",
        settings.acne_bias,
        settings.texel_size,
        settings.mode.kernel_radius(),
        settings.mode.sample_count(),
    );
    ProgramDesc {
        label: format!("camera-{}", settings.mode),
        kind: ProgramKind::Camera(*settings),
        source: format!("{constants}{COMMON}{CAMERA}"),
        vertex_entry: CAMERA_VERTEX_ENTRY,
        fragment_entry: CAMERA_FRAGMENT_ENTRY,
    }
}

/// Parses and validates `desc`, then checks that its two stages fit together.
///
/// Parse and validation failures are compile errors; missing entry points or
/// mismatched stage interfaces are link errors.
pub fn check_program(desc: &ProgramDesc) -> Result<Module, ShadowError> {
    let compile_error = |log: String| ShadowError::ShaderCompile {
        program: desc.label.clone(),
        log,
    };
    let module = naga::front::wgsl::parse_str(&desc.source)
        .map_err(|err| compile_error(err.emit_to_string(&desc.source)))?;
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|err| compile_error(err.emit_to_string(&desc.source)))?;

    let link_error = |log: String| ShadowError::ShaderLink {
        program: desc.label.clone(),
        log,
    };
    let find = |name: &str, stage: ShaderStage| {
        module
            .entry_points
            .iter()
            .find(|entry| entry.name == name && entry.stage == stage)
            .ok_or_else(|| link_error(format!("missing {stage:?} entry point `{name}`")))
    };
    let vertex = find(desc.vertex_entry, ShaderStage::Vertex)?;
    let fragment = find(desc.fragment_entry, ShaderStage::Fragment)?;

    let attributes: Vec<u32> = vertex
        .function
        .arguments
        .iter()
        .flat_map(|arg| locations(&module, arg.ty, arg.binding.as_ref()))
        .collect();
    if !attributes.contains(&0) {
        return Err(link_error(format!(
            "`{}` does not read a position at location 0",
            desc.vertex_entry
        )));
    }

    let outputs: Vec<u32> = vertex
        .function
        .result
        .as_ref()
        .map(|result| locations(&module, result.ty, result.binding.as_ref()))
        .unwrap_or_default();
    for input in fragment
        .function
        .arguments
        .iter()
        .flat_map(|arg| locations(&module, arg.ty, arg.binding.as_ref()))
    {
        if !outputs.contains(&input) {
            return Err(link_error(format!(
                "`{}` reads location {input} which `{}` never writes",
                desc.fragment_entry, desc.vertex_entry
            )));
        }
    }
    Ok(module)
}

/// User-defined IO locations carried by a binding or by a struct's members.
fn locations(module: &Module, ty: Handle<Type>, binding: Option<&Binding>) -> Vec<u32> {
    match binding {
        Some(Binding::Location { location, .. }) => vec![*location],
        Some(_) => Vec::new(),
        None => match &module.types[ty].inner {
            TypeInner::Struct { members, .. } => members
                .iter()
                .filter_map(|member| match member.binding {
                    Some(Binding::Location { location, .. }) => Some(location),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        },
    }
}
