use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use log::{debug, error, info, warn};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use super::{
    check_target_size, insert_slot, DrawUniforms, MeshId, PassTarget, ProgramDesc, ProgramId, ProgramKind,
    RenderDevice, TargetId,
};
use crate::config::TextureFilter;
use crate::error::ShadowError;
use crate::mesh::Mesh;

/// Color format of off-screen targets; depth is packed into its four channels.
const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// GPU device backed by wgpu that renders into a window surface.
pub struct WgpuDevice {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    depth: DepthBuffer,
    draw_layout: wgpu::BindGroupLayout,
    shadow_layout: wgpu::BindGroupLayout,
    programs: Vec<Option<GpuProgram>>,
    draw_slots: FramePool<DrawSlot>,
    meshes: Vec<MeshBuffers>,
    targets: Vec<Option<RenderTarget>>,
    shadow_binding: Option<ShadowBinding>,
    pass: Option<PendingPass>,
    frame: Option<wgpu::SurfaceTexture>,
}

impl WgpuDevice {
    /// Initializes the device for the provided window.
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;
        info!("Using adapter {}", adapter.get_info().name);

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("shadow-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: Default::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .context("failed to create GPU device")?;

        // Colors are written as computed, without an sRGB encode on store.
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| !format.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no supported formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height, "screen-depth");

        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("draw-bind-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<GpuDrawUniforms>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let shadow_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shadow-bind-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        info!(
            "Surface configured at {}x{} ({:?})",
            size.width, size.height, surface_format
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            depth,
            draw_layout,
            shadow_layout,
            programs: Vec::new(),
            draw_slots: FramePool::default(),
            meshes: Vec::new(),
            targets: Vec::new(),
            shadow_binding: None,
            pass: None,
            frame: None,
        })
    }

    /// Returns the identifier of the window owned by the device.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Resizes the swap chain and screen depth buffer.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(
            &self.device,
            new_size.width,
            new_size.height,
            "screen-depth",
        );
    }

    fn handle_surface_error(&mut self, err: wgpu::SurfaceError) {
        match err {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                debug!("Surface {err}; reconfiguring");
                self.resize(self.size);
            }
            wgpu::SurfaceError::OutOfMemory => error!("Surface out of memory; skipping frame"),
            other => warn!("Skipping frame: {other}"),
        }
    }

    fn create_pipeline(
        &self,
        desc: &ProgramDesc,
        module: &wgpu::ShaderModule,
    ) -> wgpu::RenderPipeline {
        let (bind_group_layouts, format): (Vec<&wgpu::BindGroupLayout>, _) = match desc.kind {
            ProgramKind::Light => (vec![&self.draw_layout], TARGET_FORMAT),
            ProgramKind::Camera(_) => (
                vec![&self.draw_layout, &self.shadow_layout],
                self.config.format,
            ),
        };
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{}-layout", desc.label)),
                bind_group_layouts: &bind_group_layouts,
                push_constant_ranges: &[],
            });

        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&desc.label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some(desc.vertex_entry),
                    compilation_options: Default::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: (3 * std::mem::size_of::<f32>()) as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: 0,
                            shader_location: 0,
                        }],
                    }],
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DepthBuffer::FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: Some(desc.fragment_entry),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
                cache: None,
            })
    }

    fn encode_pass(&self, pass: PendingPass, color_view: &wgpu::TextureView, depth_view: &wgpu::TextureView) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("shadow-encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(match pass.target {
                    PassTarget::Screen => "camera-pass",
                    PassTarget::Offscreen(_) => "light-pass",
                }),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: pass.clear.x as f64,
                            g: pass.clear.y as f64,
                            b: pass.clear.z as f64,
                            a: pass.clear.w as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for draw in &pass.draws {
                let program = self.programs.get(draw.program.0).and_then(Option::as_ref);
                let (Some(program), Some(mesh), Some(slot)) = (
                    program,
                    self.meshes.get(draw.mesh.0),
                    self.draw_slots.get(draw.slot),
                ) else {
                    warn!("Skipping draw with unknown program or mesh");
                    continue;
                };
                if program.samples_shadow_map {
                    let Some(binding) = self.shadow_binding.as_ref() else {
                        warn!("Skipping camera draw: no shadow texture bound");
                        continue;
                    };
                    render_pass.set_bind_group(1, &binding.bind_group, &[]);
                }
                render_pass.set_pipeline(&program.pipeline);
                render_pass.set_bind_group(0, &slot.bind_group, &[]);
                render_pass.set_vertex_buffer(0, mesh.vertex.slice(..));
                render_pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl RenderDevice for WgpuDevice {
    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, ShadowError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&desc.label),
                source: wgpu::ShaderSource::Wgsl(desc.source.as_str().into()),
            });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(ShadowError::ShaderCompile {
                program: desc.label.clone(),
                log: err.to_string(),
            });
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self.create_pipeline(desc, &module);
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(ShadowError::ShaderLink {
                program: desc.label.clone(),
                log: err.to_string(),
            });
        }

        debug!("Linked program {}", desc.label);
        let program = GpuProgram {
            pipeline,
            samples_shadow_map: matches!(desc.kind, ProgramKind::Camera(_)),
        };
        Ok(ProgramId(insert_slot(&mut self.programs, program)))
    }

    fn destroy_program(&mut self, program: ProgramId) {
        if let Some(slot) = self.programs.get_mut(program.0) {
            *slot = None;
        }
    }

    fn upload_mesh(&mut self, mesh: &Mesh) -> Result<MeshId, ShadowError> {
        self.meshes.push(MeshBuffers::from_mesh(&self.device, mesh));
        Ok(MeshId(self.meshes.len() - 1))
    }

    fn create_target(&mut self, width: u32, height: u32) -> Result<TargetId, ShadowError> {
        check_target_size(width, height, self.max_target_size())?;
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let target = RenderTarget::create(&self.device, width, height);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        if let Some(err) = validation.or(out_of_memory) {
            return Err(ShadowError::target(width, height, err.to_string()));
        }

        Ok(TargetId(insert_slot(&mut self.targets, target)))
    }

    fn destroy_target(&mut self, target: TargetId) {
        if let Some(slot) = self.targets.get_mut(target.0) {
            *slot = None;
        }
        if matches!(&self.shadow_binding, Some(binding) if binding.target == target) {
            self.shadow_binding = None;
        }
    }

    fn max_target_size(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    fn begin_pass(&mut self, target: PassTarget, clear: Vec4) {
        if let Some(open) = self.pass.as_ref() {
            warn!("begin_pass({target:?}) while {:?} is still open", open.target);
        }
        self.pass = Some(PendingPass {
            target,
            clear,
            draws: Vec::new(),
        });
    }

    fn draw_indexed(&mut self, program: ProgramId, mesh: MeshId, uniforms: &DrawUniforms) {
        let Some(pass) = self.pass.as_mut() else {
            warn!("draw_indexed called outside of a pass");
            return;
        };
        let (slot, draw_slot) = self
            .draw_slots
            .acquire(|| DrawSlot::create(&self.device, &self.draw_layout));
        self.queue.write_buffer(
            &draw_slot.buffer,
            0,
            bytemuck::bytes_of(&GpuDrawUniforms::from(uniforms)),
        );
        pass.draws.push(PendingDraw {
            program,
            mesh,
            slot,
        });
    }

    fn end_pass(&mut self) {
        let Some(pass) = self.pass.take() else {
            warn!("end_pass without a matching begin_pass");
            return;
        };

        if pass.target == PassTarget::Screen && self.frame.is_none() {
            match self.surface.get_current_texture() {
                Ok(frame) => self.frame = Some(frame),
                Err(err) => {
                    self.handle_surface_error(err);
                    return;
                }
            }
        }

        match pass.target {
            PassTarget::Offscreen(id) => {
                let Some(target) = self.targets.get(id.0).and_then(Option::as_ref) else {
                    warn!("end_pass on unknown target {id:?}");
                    return;
                };
                self.encode_pass(pass, &target.color_view, &target.depth.view);
            }
            PassTarget::Screen => {
                let Some(frame) = self.frame.as_ref() else {
                    return;
                };
                let view = frame
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                self.encode_pass(pass, &view, &self.depth.view);
            }
        }
    }

    fn bind_shadow_texture(&mut self, target: TargetId, filter: TextureFilter) {
        if matches!(&self.shadow_binding, Some(binding) if binding.target == target && binding.filter == filter)
        {
            return;
        }
        let Some(render_target) = self.targets.get(target.0).and_then(Option::as_ref) else {
            warn!("bind_shadow_texture on unknown target {target:?}");
            return;
        };
        let filter_mode = match filter {
            TextureFilter::Nearest => wgpu::FilterMode::Nearest,
            TextureFilter::Linear => wgpu::FilterMode::Linear,
        };
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter_mode,
            min_filter: filter_mode,
            ..Default::default()
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadow-bind-group"),
            layout: &self.shadow_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&render_target.color_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });
        self.shadow_binding = Some(ShadowBinding {
            target,
            filter,
            bind_group,
        });
    }

    fn finish_frame(&mut self) {
        self.draw_slots.reset();
        if let Some(frame) = self.frame.take() {
            self.window.pre_present_notify();
            frame.present();
        }
    }
}

struct GpuProgram {
    pipeline: wgpu::RenderPipeline,
    samples_shadow_map: bool,
}

struct ShadowBinding {
    target: TargetId,
    filter: TextureFilter,
    bind_group: wgpu::BindGroup,
}

struct PendingPass {
    target: PassTarget,
    clear: Vec4,
    draws: Vec<PendingDraw>,
}

struct PendingDraw {
    program: ProgramId,
    mesh: MeshId,
    slot: usize,
}

/// Resources handed out in draw order and recycled every frame.
struct FramePool<T> {
    items: Vec<T>,
    next: usize,
}

impl<T> Default for FramePool<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next: 0,
        }
    }
}

impl<T> FramePool<T> {
    /// Next unused item of this frame, creating one when the pool runs dry.
    fn acquire(&mut self, create: impl FnOnce() -> T) -> (usize, &T) {
        let index = self.next;
        self.next += 1;
        if index == self.items.len() {
            self.items.push(create());
        }
        (index, &self.items[index])
    }

    fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    fn reset(&mut self) {
        self.next = 0;
    }
}

/// Long-lived uniform buffer and bind group for one draw of a frame.
struct DrawSlot {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl DrawSlot {
    fn create(device: &wgpu::Device, layout: &wgpu::BindGroupLayout) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("draw-uniform"),
            size: std::mem::size_of::<GpuDrawUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("draw-bind-group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self { buffer, bind_group }
    }
}

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    fn from_mesh(device: &wgpu::Device, mesh: &Mesh) -> Self {
        let positions: Vec<[f32; 3]> = mesh.positions().iter().map(|p| p.to_array()).collect();
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{}-vertices", mesh.name())),
            contents: bytemuck::cast_slice(&positions),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{}-indices", mesh.name())),
            contents: bytemuck::cast_slice(mesh.indices()),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: mesh.indices().len() as u32,
        }
    }
}

/// Off-screen color attachment that later passes sample, plus its depth.
struct RenderTarget {
    _color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth: DepthBuffer,
}

impl RenderTarget {
    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("shadow-map-color"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _color: color,
            color_view,
            depth: DepthBuffer::create(device, width, height, "shadow-map-depth"),
        }
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32, label: &str) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct GpuDrawUniforms {
    projection: [[f32; 4]; 4],
    model_view: [[f32; 4]; 4],
    light_projection: [[f32; 4]; 4],
    light_model_view: [[f32; 4]; 4],
    color: [f32; 4],
}

impl From<&DrawUniforms> for GpuDrawUniforms {
    fn from(uniforms: &DrawUniforms) -> Self {
        Self {
            projection: uniforms.projection.to_cols_array_2d(),
            model_view: uniforms.model_view.to_cols_array_2d(),
            light_projection: uniforms.light_projection.to_cols_array_2d(),
            light_model_view: uniforms.light_model_view.to_cols_array_2d(),
            color: uniforms.color.extend(1.0).to_array(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};

    #[test]
    fn uniform_layout_matches_wgsl_struct() {
        // Four mat4x4<f32> plus one vec4<f32>.
        assert_eq!(std::mem::size_of::<GpuDrawUniforms>(), 4 * 64 + 16);
    }

    #[test]
    fn frame_pool_recycles_items_across_frames() {
        let mut pool = FramePool::default();
        let mut created = 0usize;
        for _ in 0..3 {
            for expected in 0..4 {
                let (index, &item) = pool.acquire(|| {
                    created += 1;
                    created * 10
                });
                assert_eq!(index, expected);
                assert_eq!(item, (expected + 1) * 10);
            }
            pool.reset();
        }
        assert_eq!(created, 4);
        assert_eq!(pool.get(3), Some(&40));
        assert_eq!(pool.get(4), None);
    }

    #[test]
    fn uniforms_are_column_major() {
        let uniforms = DrawUniforms {
            projection: Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
            model_view: Mat4::IDENTITY,
            light_projection: Mat4::IDENTITY,
            light_model_view: Mat4::IDENTITY,
            color: Vec3::new(0.36, 0.66, 0.8),
        };
        let gpu = GpuDrawUniforms::from(&uniforms);
        assert_eq!(gpu.projection[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(gpu.color, [0.36, 0.66, 0.8, 1.0]);
    }
}
