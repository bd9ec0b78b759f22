//! CPU rasterizer implementing [`RenderDevice`].
//!
//! Used for headless snapshots and tests. Programs are compiled and linked
//! with `naga` so a broken program fails here exactly as it would on a GPU,
//! while the per-fragment work runs through [`crate::shadow`] and
//! [`crate::encoding`]. Rows are stored bottom-up, GL style.

use glam::{Mat4, Vec2, Vec3, Vec4};
use log::{debug, warn};

use super::{
    check_target_size, insert_slot, shaders, DrawUniforms, DEFAULT_MAX_TARGET_SIZE, MeshId, PassTarget, ProgramDesc, ProgramId,
    ProgramKind, RenderDevice, TargetId,
};
use crate::config::TextureFilter;
use crate::encoding::{color_to_unorm, decode_depth_unorm, encode_depth, unorm_to_color};
use crate::error::ShadowError;
use crate::mesh::Mesh;
use crate::shadow::{visibility, DepthSampler, ShadowSettings};
use crate::transform::BIAS_MATRIX;

/// RGBA8 color plus float depth, bottom row first.
#[derive(Debug, Clone)]
struct Framebuffer {
    width: u32,
    height: u32,
    color: Vec<[u8; 4]>,
    depth: Vec<f32>,
}

impl Framebuffer {
    fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            color: vec![[0, 0, 0, 255]; len],
            depth: vec![1.0; len],
        }
    }

    fn clear(&mut self, color: Vec4) {
        let texel = color_to_unorm(color);
        self.color.fill(texel);
        self.depth.fill(1.0);
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn texel(&self, x: i64, y: i64) -> [u8; 4] {
        // Clamp-to-edge addressing.
        let x = x.clamp(0, self.width as i64 - 1) as u32;
        let y = y.clamp(0, self.height as i64 - 1) as u32;
        self.color[self.index(x, y)]
    }
}

/// Texture lookups into an off-screen target's color attachment.
struct TargetSampler<'a> {
    buffer: &'a Framebuffer,
    filter: TextureFilter,
}

impl DepthSampler for TargetSampler<'_> {
    fn sample(&self, uv: Vec2) -> Vec4 {
        let size = Vec2::new(self.buffer.width as f32, self.buffer.height as f32);
        match self.filter {
            TextureFilter::Nearest => {
                let texel = (uv * size).floor();
                unorm_to_color(self.buffer.texel(texel.x as i64, texel.y as i64))
            }
            TextureFilter::Linear => {
                let position = uv * size - Vec2::splat(0.5);
                let base = position.floor();
                let t = position - base;
                let (x, y) = (base.x as i64, base.y as i64);
                let fetch = |dx: i64, dy: i64| unorm_to_color(self.buffer.texel(x + dx, y + dy));
                let bottom = fetch(0, 0).lerp(fetch(1, 0), t.x);
                let top = fetch(0, 1).lerp(fetch(1, 1), t.x);
                bottom.lerp(top, t.y)
            }
        }
    }
}

enum FragmentShader<'a> {
    Light,
    Camera {
        settings: ShadowSettings,
        color: Vec3,
        shadow_map: Option<TargetSampler<'a>>,
    },
}

impl FragmentShader<'_> {
    fn shade(&self, depth: f32, shadow_pos: Vec4) -> Vec4 {
        match self {
            FragmentShader::Light => encode_depth(depth),
            FragmentShader::Camera {
                settings,
                color,
                shadow_map,
            } => {
                let amount_in_light = match shadow_map {
                    Some(sampler) => {
                        visibility(sampler, shadow_pos.truncate() / shadow_pos.w, settings)
                    }
                    None => 1.0,
                };
                (*color * amount_in_light).extend(1.0)
            }
        }
    }
}

/// Post-transform vertex: clip position and the interpolated shadow position.
#[derive(Debug, Clone, Copy)]
struct ClipVertex {
    clip: Vec4,
    shadow_pos: Vec4,
}

impl ClipVertex {
    fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            clip: self.clip.lerp(other.clip, t),
            shadow_pos: self.shadow_pos.lerp(other.shadow_pos, t),
        }
    }
}

/// Window-space vertex ready for scan conversion.
#[derive(Debug, Clone, Copy)]
struct WindowVertex {
    position: Vec2,
    depth: f32,
    inv_w: f32,
    shadow_pos_over_w: Vec4,
}

/// Sutherland-Hodgman against one clip plane; keeps `distance(clip) >= 0`.
fn clip_polygon(polygon: &[ClipVertex], distance: impl Fn(Vec4) -> f32) -> Vec<ClipVertex> {
    let mut clipped = Vec::with_capacity(polygon.len() + 2);
    for (i, &current) in polygon.iter().enumerate() {
        let next = polygon[(i + 1) % polygon.len()];
        let (d_current, d_next) = (distance(current.clip), distance(next.clip));
        if d_current >= 0.0 {
            clipped.push(current);
        }
        if (d_current >= 0.0) != (d_next >= 0.0) {
            clipped.push(current.lerp(next, d_current / (d_current - d_next)));
        }
    }
    clipped
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

fn to_window(vertex: &ClipVertex, width: u32, height: u32) -> WindowVertex {
    let inv_w = 1.0 / vertex.clip.w;
    let ndc = vertex.clip.truncate() * inv_w;
    WindowVertex {
        position: Vec2::new(
            (ndc.x * 0.5 + 0.5) * width as f32,
            (ndc.y * 0.5 + 0.5) * height as f32,
        ),
        depth: ndc.z * 0.5 + 0.5,
        inv_w,
        shadow_pos_over_w: vertex.shadow_pos * inv_w,
    }
}

/// Clips, projects and fills one triangle. Returns the fragments written.
fn draw_triangle(target: &mut Framebuffer, shader: &FragmentShader, triangle: [ClipVertex; 3]) -> usize {
    let near = clip_polygon(&triangle, |clip| clip.z + clip.w);
    let polygon = clip_polygon(&near, |clip| clip.w - clip.z);
    if polygon.len() < 3 || polygon.iter().any(|vertex| vertex.clip.w <= f32::EPSILON) {
        return 0;
    }
    let window: Vec<WindowVertex> = polygon
        .iter()
        .map(|vertex| to_window(vertex, target.width, target.height))
        .collect();
    (1..window.len() - 1)
        .map(|i| fill_triangle(target, shader, [window[0], window[i], window[i + 1]]))
        .sum()
}

/// Scan-converts at pixel centers with a `Less` depth test and no culling.
fn fill_triangle(target: &mut Framebuffer, shader: &FragmentShader, v: [WindowVertex; 3]) -> usize {
    let area = edge(v[0].position, v[1].position, v[2].position);
    if area.abs() <= f32::EPSILON {
        return 0;
    }
    let min = v[0].position.min(v[1].position).min(v[2].position);
    let max = v[0].position.max(v[1].position).max(v[2].position);
    let x_start = min.x.floor().max(0.0) as u32;
    let y_start = min.y.floor().max(0.0) as u32;
    let x_end = max.x.ceil().clamp(0.0, target.width as f32) as u32;
    let y_end = max.y.ceil().clamp(0.0, target.height as f32) as u32;

    let mut written = 0;
    for y in y_start..y_end {
        for x in x_start..x_end {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let b = Vec3::new(
                edge(v[1].position, v[2].position, p),
                edge(v[2].position, v[0].position, p),
                edge(v[0].position, v[1].position, p),
            ) / area;
            if b.min_element() < 0.0 {
                continue;
            }
            let depth = b.x * v[0].depth + b.y * v[1].depth + b.z * v[2].depth;
            let index = target.index(x, y);
            if !(0.0..=1.0).contains(&depth) || depth >= target.depth[index] {
                continue;
            }
            let inv_w = b.x * v[0].inv_w + b.y * v[1].inv_w + b.z * v[2].inv_w;
            let shadow_pos = (v[0].shadow_pos_over_w * b.x
                + v[1].shadow_pos_over_w * b.y
                + v[2].shadow_pos_over_w * b.z)
                / inv_w;
            target.depth[index] = depth;
            target.color[index] = color_to_unorm(shader.shade(depth, shadow_pos));
            written += 1;
        }
    }
    written
}

fn draw_mesh(
    target: &mut Framebuffer,
    shader: &FragmentShader,
    mesh: &Mesh,
    uniforms: &DrawUniforms,
) -> usize {
    let model_view_projection = uniforms.projection * uniforms.model_view;
    let shadow_matrix = match shader {
        FragmentShader::Light => Mat4::ZERO,
        FragmentShader::Camera { .. } => {
            BIAS_MATRIX * uniforms.light_projection * uniforms.light_model_view
        }
    };
    let vertex = |position: Vec3| {
        let local = position.extend(1.0);
        ClipVertex {
            clip: model_view_projection * local,
            shadow_pos: shadow_matrix * local,
        }
    };
    mesh.triangles()
        .map(|[a, b, c]| draw_triangle(target, shader, [vertex(a), vertex(b), vertex(c)]))
        .sum()
}

fn shadow_sampler(
    targets: &[Option<Framebuffer>],
    binding: Option<(TargetId, TextureFilter)>,
) -> Option<TargetSampler<'_>> {
    let (target, filter) = binding?;
    let buffer = targets.get(target.0)?.as_ref()?;
    Some(TargetSampler { buffer, filter })
}

fn fragment_shader(
    kind: ProgramKind,
    color: Vec3,
    targets: &[Option<Framebuffer>],
    binding: Option<(TargetId, TextureFilter)>,
) -> FragmentShader<'_> {
    match kind {
        ProgramKind::Light => FragmentShader::Light,
        ProgramKind::Camera(settings) => FragmentShader::Camera {
            settings,
            color,
            shadow_map: shadow_sampler(targets, binding),
        },
    }
}

/// Software rasterizer with a fixed-size screen frame buffer.
#[derive(Debug)]
pub struct SoftwareDevice {
    screen: Framebuffer,
    targets: Vec<Option<Framebuffer>>,
    programs: Vec<Option<ProgramKind>>,
    meshes: Vec<Mesh>,
    pass: Option<PassTarget>,
    shadow_texture: Option<(TargetId, TextureFilter)>,
    max_target_size: u32,
    fragments: usize,
    frames: u64,
}

impl SoftwareDevice {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            screen: Framebuffer::new(width.max(1), height.max(1)),
            targets: Vec::new(),
            programs: Vec::new(),
            meshes: Vec::new(),
            pass: None,
            shadow_texture: None,
            max_target_size: DEFAULT_MAX_TARGET_SIZE,
            fragments: 0,
            frames: 0,
        }
    }

    pub fn with_max_target_size(mut self, max: u32) -> Self {
        self.max_target_size = max;
        self
    }

    /// Reallocates the screen frame buffer; its contents are lost.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.screen = Framebuffer::new(width.max(1), height.max(1));
    }

    /// Frames completed through [`RenderDevice::finish_frame`].
    pub fn frames_presented(&self) -> u64 {
        self.frames
    }

    /// Programs created and not yet destroyed.
    pub fn live_programs(&self) -> usize {
        self.programs.iter().flatten().count()
    }

    /// Fragments that passed the depth test since the device was created.
    pub fn fragments_written(&self) -> usize {
        self.fragments
    }

    fn buffer(&self, target: PassTarget) -> Option<&Framebuffer> {
        match target {
            PassTarget::Screen => Some(&self.screen),
            PassTarget::Offscreen(id) => self.targets.get(id.0)?.as_ref(),
        }
    }

    /// Reads one texel; `y` counts up from the bottom row.
    pub fn read_pixel(&self, target: PassTarget, x: u32, y: u32) -> Option<[u8; 4]> {
        let buffer = self.buffer(target)?;
        (x < buffer.width && y < buffer.height).then(|| buffer.color[buffer.index(x, y)])
    }

    /// Decodes the light depth stored at one texel of an off-screen target.
    pub fn read_depth(&self, target: TargetId, x: u32, y: u32) -> Option<f32> {
        self.read_pixel(PassTarget::Offscreen(target), x, y)
            .map(decode_depth_unorm)
    }

    /// Width, height and tightly packed RGBA8 rows, top row first.
    pub fn read_target(&self, target: PassTarget) -> Option<(u32, u32, Vec<u8>)> {
        let buffer = self.buffer(target)?;
        let mut pixels = Vec::with_capacity(buffer.color.len() * 4);
        for row in buffer.color.chunks(buffer.width as usize).rev() {
            pixels.extend(row.iter().flatten());
        }
        Some((buffer.width, buffer.height, pixels))
    }
}

impl RenderDevice for SoftwareDevice {
    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, ShadowError> {
        shaders::check_program(desc)?;
        debug!("Linked program {}", desc.label);
        Ok(ProgramId(insert_slot(&mut self.programs, desc.kind)))
    }

    fn destroy_program(&mut self, program: ProgramId) {
        if let Some(slot) = self.programs.get_mut(program.0) {
            *slot = None;
        }
    }

    fn upload_mesh(&mut self, mesh: &Mesh) -> Result<MeshId, ShadowError> {
        self.meshes.push(mesh.clone());
        Ok(MeshId(self.meshes.len() - 1))
    }

    fn create_target(&mut self, width: u32, height: u32) -> Result<TargetId, ShadowError> {
        check_target_size(width, height, self.max_target_size)?;
        let buffer = Framebuffer::new(width, height);
        Ok(TargetId(insert_slot(&mut self.targets, buffer)))
    }

    fn destroy_target(&mut self, target: TargetId) {
        if let Some(slot) = self.targets.get_mut(target.0) {
            *slot = None;
        }
        if matches!(self.shadow_texture, Some((bound, _)) if bound == target) {
            self.shadow_texture = None;
        }
    }

    fn max_target_size(&self) -> u32 {
        self.max_target_size
    }

    fn begin_pass(&mut self, target: PassTarget, clear: Vec4) {
        if let Some(open) = self.pass {
            warn!("begin_pass({target:?}) while {open:?} is still open");
        }
        let buffer = match target {
            PassTarget::Screen => Some(&mut self.screen),
            PassTarget::Offscreen(id) => self.targets.get_mut(id.0).and_then(Option::as_mut),
        };
        match buffer {
            Some(buffer) => {
                buffer.clear(clear);
                self.pass = Some(target);
            }
            None => {
                warn!("begin_pass on unknown target {target:?}");
                self.pass = None;
            }
        }
    }

    fn draw_indexed(&mut self, program: ProgramId, mesh: MeshId, uniforms: &DrawUniforms) {
        let Some(pass) = self.pass else {
            warn!("draw_indexed called outside of a pass");
            return;
        };
        let kind = self.programs.get(program.0).copied().flatten();
        let (Some(kind), Some(mesh)) = (kind, self.meshes.get(mesh.0)) else {
            warn!("draw_indexed with unknown program {program:?} or mesh {mesh:?}");
            return;
        };
        let binding = self.shadow_texture;

        let written = match pass {
            PassTarget::Screen => {
                let shader = fragment_shader(kind, uniforms.color, &self.targets, binding);
                draw_mesh(&mut self.screen, &shader, mesh, uniforms)
            }
            PassTarget::Offscreen(id) => {
                // Taken out while drawing so a target can never sample itself.
                let Some(mut buffer) = self.targets.get_mut(id.0).and_then(Option::take) else {
                    return;
                };
                let shader = fragment_shader(kind, uniforms.color, &self.targets, binding);
                let written = draw_mesh(&mut buffer, &shader, mesh, uniforms);
                self.targets[id.0] = Some(buffer);
                written
            }
        };
        self.fragments += written;
    }

    fn end_pass(&mut self) {
        if self.pass.take().is_none() {
            warn!("end_pass without a matching begin_pass");
        }
    }

    fn bind_shadow_texture(&mut self, target: TargetId, filter: TextureFilter) {
        self.shadow_texture = Some((target, filter));
    }

    fn finish_frame(&mut self) {
        self.frames += 1;
    }
}
