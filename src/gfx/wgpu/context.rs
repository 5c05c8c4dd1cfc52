//! wgpu 上下文
//!
//! 在 `WgpuBackend` 之上实现 `GpuContext`：
//! - 每个程序对应一条渲染管线，顶点属性各占一个顶点缓冲槽
//! - 矩阵 uniform 每个程序各有一块 uniform 缓冲，纹理未绑定时使用 1x1 白色纹理
//! - `begin_frame` 获取交换链图像并清屏，每次绘制单独提交，`end_frame` 呈现

use std::collections::HashMap;

use tracing::{debug, info, warn};
use wgpu::util::DeviceExt;
use winit::event_loop::EventLoop;
use winit::window::Window;

use crate::core::config::Config;
use crate::core::error::{GraphicsError, Result};
use crate::core::math::Matrix4;
use crate::gfx::context::{
    check_texture_data, AttributeBinding, BindingState, BufferHandle, GpuContext, HandleAllocator,
    ProgramHandle, TextureHandle,
};
use crate::gfx::wgpu::backend::WgpuBackend;
use crate::renderer::shader::{CompiledShader, ProgramInterface, ResourceKind, ResourceSlot};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const MATRIX_BYTES: u64 = std::mem::size_of::<[[f32; 4]; 4]>() as u64;

struct GpuBuffer {
    buffer: wgpu::Buffer,
    bytes: u64,
}

struct GpuTexture {
    // 纹理本体需要与视图同生命周期
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct GpuProgram {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    interface: ProgramInterface,
    uniforms: HashMap<u32, wgpu::Buffer>,
    sampler: wgpu::Sampler,
}

struct ActiveFrame {
    surface_texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

/// wgpu 上下文
pub struct WgpuContext {
    gfx: WgpuBackend,
    handles: HandleAllocator,
    buffers: HashMap<BufferHandle, GpuBuffer>,
    textures: HashMap<TextureHandle, GpuTexture>,
    programs: HashMap<ProgramHandle, GpuProgram>,
    default_texture: GpuTexture,
    depth_view: wgpu::TextureView,
    binding: BindingState,
    frame: Option<ActiveFrame>,
}

impl WgpuContext {
    /// 创建窗口、设备和默认资源
    pub fn new(event_loop: &EventLoop<()>, config: &Config) -> Result<Self> {
        let gfx = WgpuBackend::new(event_loop, config)?;
        let (width, height) = gfx.surface_size();

        let default_texture = upload_texture(&gfx, "default white", 1, 1, &[255, 255, 255, 255]);
        let depth_view = create_depth_view(&gfx.device, width, height);

        Ok(Self {
            gfx,
            handles: HandleAllocator::default(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            programs: HashMap::new(),
            default_texture,
            depth_view,
            binding: BindingState::default(),
            frame: None,
        })
    }

    pub fn window(&self) -> &Window {
        self.gfx.window()
    }

    fn build_program(
        &self,
        vertex: &CompiledShader,
        fragment: &CompiledShader,
        interface: &ProgramInterface,
    ) -> Result<GpuProgram> {
        let device = &self.gfx.device;

        let vs_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Vertex Shader"),
            source: wgpu::ShaderSource::Wgsl(vertex.source().into()),
        });
        let fs_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Fragment Shader"),
            source: wgpu::ShaderSource::Wgsl(fragment.source().into()),
        });

        let layout_entries: Vec<wgpu::BindGroupLayoutEntry> =
            interface.resources.iter().map(layout_entry).collect();
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Program Bind Group Layout"),
            entries: &layout_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Program Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        // 每个属性一个顶点缓冲槽，紧密排列
        let attributes: Vec<[wgpu::VertexAttribute; 1]> = interface
            .attributes
            .iter()
            .map(|slot| {
                Ok([wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: slot.location,
                    format: vertex_format(slot.components)?,
                }])
            })
            .collect::<Result<_>>()?;
        let vertex_buffers: Vec<wgpu::VertexBufferLayout> = interface
            .attributes
            .iter()
            .zip(&attributes)
            .map(|(slot, attribute)| wgpu::VertexBufferLayout {
                array_stride: u64::from(slot.components) * 4,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: attribute,
            })
            .collect();

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Mesh Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vs_module,
                entry_point: vertex.entry_point()?,
                buffers: &vertex_buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: &fs_module,
                entry_point: fragment.entry_point()?,
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.gfx.surface_config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let uniforms = interface
            .resources
            .iter()
            .filter(|r| r.kind == ResourceKind::MatrixUniform)
            .map(|r| {
                let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(r.name.as_str()),
                    size: MATRIX_BYTES,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                (r.binding, buffer)
            })
            .collect();

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Diffuse Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(GpuProgram {
            pipeline,
            bind_group_layout,
            interface: interface.clone(),
            uniforms,
            sampler,
        })
    }

    fn create_bind_group(&self, program: &GpuProgram) -> Result<wgpu::BindGroup> {
        let mut entries = Vec::with_capacity(program.interface.resources.len());

        for slot in &program.interface.resources {
            let resource = match slot.kind {
                ResourceKind::MatrixUniform => program
                    .uniforms
                    .get(&slot.binding)
                    .ok_or_else(|| {
                        GraphicsError::InvalidBinding(format!("uniform `{}` has no buffer", slot.name))
                    })?
                    .as_entire_binding(),
                ResourceKind::Texture2d => {
                    let texture = self
                        .binding
                        .texture(slot.binding)
                        .and_then(|handle| self.textures.get(&handle))
                        .unwrap_or(&self.default_texture);
                    wgpu::BindingResource::TextureView(&texture.view)
                }
                ResourceKind::Sampler => wgpu::BindingResource::Sampler(&program.sampler),
            };
            entries.push(wgpu::BindGroupEntry {
                binding: slot.binding,
                resource,
            });
        }

        Ok(self.gfx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw Bind Group"),
            layout: &program.bind_group_layout,
            entries: &entries,
        }))
    }
}

impl GpuContext for WgpuContext {
    fn backend_name(&self) -> &str {
        "wgpu"
    }

    fn create_buffer(&mut self, label: &str, data: &[f32]) -> Result<BufferHandle> {
        let buffer = self.gfx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(data),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let handle = BufferHandle(self.handles.next());
        self.buffers.insert(
            handle,
            GpuBuffer {
                buffer,
                bytes: std::mem::size_of_val(data) as u64,
            },
        );
        debug!("Created vertex buffer `{}` ({} floats)", label, data.len());
        Ok(handle)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(gpu) = self.buffers.remove(&buffer) {
            gpu.buffer.destroy();
        }
        self.binding.forget_buffer(buffer);
    }

    fn create_program(
        &mut self,
        vertex: &CompiledShader,
        fragment: &CompiledShader,
        interface: &ProgramInterface,
    ) -> Result<ProgramHandle> {
        // 管线创建的校验错误在错误作用域里捕获
        self.gfx.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let built = self.build_program(vertex, fragment, interface);
        let gpu_error = pollster::block_on(self.gfx.device.pop_error_scope());

        if let Some(error) = gpu_error {
            return Err(GraphicsError::LinkFailure(error.to_string()).into());
        }
        let program = built?;

        let handle = ProgramHandle(self.handles.next());
        self.programs.insert(handle, program);
        info!("Created render pipeline {:?}", handle);
        Ok(handle)
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
        self.binding.forget_program(program);
    }

    fn create_texture(&mut self, label: &str, width: u32, height: u32, rgba: &[u8]) -> Result<TextureHandle> {
        check_texture_data(width, height, rgba)?;
        let max = self.gfx.device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(GraphicsError::ResourceCreation(format!(
                "texture of {}x{} exceeds the device limit of {}",
                width, height, max
            ))
            .into());
        }

        let texture = upload_texture(&self.gfx, label, width, height, rgba);
        let handle = TextureHandle(self.handles.next());
        self.textures.insert(handle, texture);
        Ok(handle)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
        self.binding.forget_texture(texture);
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 || self.gfx.surface_size() == (width, height) {
            return;
        }
        self.gfx.reconfigure_surface(width, height);
        self.depth_view = create_depth_view(&self.gfx.device, width, height);
    }

    fn begin_frame(&mut self, clear_color: [f32; 4]) -> Result<bool> {
        let surface_texture = match self.gfx.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                warn!("Surface lost or outdated, reconfiguring");
                self.gfx.restore_surface();
                return Ok(false);
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("Timed out acquiring the next surface image");
                return Ok(false);
            }
            Err(e) => {
                return Err(GraphicsError::Surface(format!("Failed to acquire next image: {}", e)).into())
            }
        };

        self.binding.begin_frame()?;
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let [r, g, b, a] = clear_color.map(f64::from);
        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Clear Encoder") });
        {
            let _clear_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.gfx.queue.submit(std::iter::once(encoder.finish()));

        self.frame = Some(ActiveFrame { surface_texture, view });
        Ok(true)
    }

    fn end_frame(&mut self) -> Result<()> {
        self.binding.end_frame()?;
        let frame = self
            .frame
            .take()
            .ok_or_else(|| GraphicsError::CommandExecution("no surface image to present".to_string()))?;
        frame.surface_texture.present();
        Ok(())
    }

    fn use_program(&mut self, program: ProgramHandle) -> Result<()> {
        if !self.programs.contains_key(&program) {
            return Err(GraphicsError::InvalidBinding(format!("program {:?} does not exist", program)).into());
        }
        self.binding.use_program(program);
        Ok(())
    }

    fn bind_attribute(&mut self, binding: AttributeBinding) -> Result<()> {
        if !self.buffers.contains_key(&binding.buffer) {
            return Err(GraphicsError::InvalidBinding(format!("buffer {:?} does not exist", binding.buffer)).into());
        }
        if binding.effective_stride() != u64::from(binding.components) * 4 {
            return Err(GraphicsError::InvalidBinding(format!(
                "attribute at location {} must be tightly packed",
                binding.location
            ))
            .into());
        }
        self.binding.bind_attribute(binding)
    }

    fn bind_texture(&mut self, location: u32, texture: TextureHandle) -> Result<()> {
        if !self.textures.contains_key(&texture) {
            return Err(GraphicsError::InvalidBinding(format!("texture {:?} does not exist", texture)).into());
        }
        self.binding.bind_texture(location, texture);
        Ok(())
    }

    fn set_matrix_uniform(&mut self, location: u32, matrix: &Matrix4) -> Result<()> {
        let program = self
            .binding
            .program()
            .and_then(|handle| self.programs.get(&handle))
            .ok_or_else(|| GraphicsError::InvalidBinding("uniform set with no program in use".to_string()))?;

        let buffer = program.uniforms.get(&location).ok_or_else(|| {
            GraphicsError::InvalidBinding(format!("no matrix uniform at location {}", location))
        })?;

        // nalgebra 列主序，与 WGSL mat4x4 布局一致
        self.gfx
            .queue
            .write_buffer(buffer, 0, bytemuck::cast_slice(matrix.as_slice()));
        Ok(())
    }

    fn draw_triangles(&mut self, first: u32, count: u32) -> Result<()> {
        let buffers = &self.buffers;
        let programs = &self.programs;
        let handle = self.binding.validate_draw(
            first,
            count,
            |p| programs.get(&p).map(|gpu| &gpu.interface),
            |b| buffers.get(&b).map(|gpu| gpu.bytes),
        )?;

        let frame = self
            .frame
            .as_ref()
            .ok_or_else(|| GraphicsError::CommandExecution("no surface image acquired".to_string()))?;
        let program = programs
            .get(&handle)
            .ok_or_else(|| GraphicsError::InvalidBinding(format!("program {:?} does not exist", handle)))?;

        let bind_group = self.create_bind_group(program)?;

        // validate_draw 已保证每个属性都有绑定
        let mut vertex_buffers = Vec::with_capacity(program.interface.attributes.len());
        for slot in &program.interface.attributes {
            let binding = self.binding.attribute(slot.location).ok_or_else(|| {
                GraphicsError::InvalidBinding(format!("attribute `{}` is not bound", slot.name))
            })?;
            let gpu = buffers.get(&binding.buffer).ok_or_else(|| {
                GraphicsError::InvalidBinding(format!("attribute `{}` is bound to a destroyed buffer", slot.name))
            })?;
            vertex_buffers.push((&gpu.buffer, u64::from(binding.offset)));
        }

        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Draw Encoder") });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Mesh Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let (width, height) = self.gfx.surface_size();
            pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            for (slot, &(buffer, offset)) in vertex_buffers.iter().enumerate() {
                pass.set_vertex_buffer(slot as u32, buffer.slice(offset..));
            }
            pass.draw(first..first + count, 0..1);
        }
        self.gfx.queue.submit(std::iter::once(encoder.finish()));

        Ok(())
    }

    fn unbind(&mut self) {
        self.binding.clear();
    }
}

fn vertex_format(components: u32) -> Result<wgpu::VertexFormat> {
    match components {
        1 => Ok(wgpu::VertexFormat::Float32),
        2 => Ok(wgpu::VertexFormat::Float32x2),
        3 => Ok(wgpu::VertexFormat::Float32x3),
        4 => Ok(wgpu::VertexFormat::Float32x4),
        n => Err(GraphicsError::LinkFailure(format!("unsupported attribute width {}", n)).into()),
    }
}

fn layout_entry(slot: &ResourceSlot) -> wgpu::BindGroupLayoutEntry {
    let mut visibility = wgpu::ShaderStages::NONE;
    if slot.vertex_visible {
        visibility |= wgpu::ShaderStages::VERTEX;
    }
    if slot.fragment_visible {
        visibility |= wgpu::ShaderStages::FRAGMENT;
    }

    let ty = match slot.kind {
        ResourceKind::MatrixUniform => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(MATRIX_BYTES),
        },
        ResourceKind::Texture2d => wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        ResourceKind::Sampler => wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
    };

    wgpu::BindGroupLayoutEntry {
        binding: slot.binding,
        visibility,
        ty,
        count: None,
    }
}

fn upload_texture(gfx: &WgpuBackend, label: &str, width: u32, height: u32, rgba: &[u8]) -> GpuTexture {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = gfx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    gfx.queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        rgba,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture {
        _texture: texture,
        view,
    }
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(kind: ResourceKind, vertex_visible: bool, fragment_visible: bool) -> ResourceSlot {
        ResourceSlot {
            name: "r".to_string(),
            binding: 3,
            kind,
            vertex_visible,
            fragment_visible,
        }
    }

    #[test]
    fn test_vertex_format_by_width() {
        assert_eq!(vertex_format(2).unwrap(), wgpu::VertexFormat::Float32x2);
        assert_eq!(vertex_format(3).unwrap(), wgpu::VertexFormat::Float32x3);
        assert!(vertex_format(5).is_err());
    }

    #[test]
    fn test_layout_entry_visibility() {
        let entry = layout_entry(&slot(ResourceKind::MatrixUniform, true, false));
        assert_eq!(entry.binding, 3);
        assert_eq!(entry.visibility, wgpu::ShaderStages::VERTEX);

        let entry = layout_entry(&slot(ResourceKind::Sampler, true, true));
        assert_eq!(entry.visibility, wgpu::ShaderStages::VERTEX_FRAGMENT);
    }
}
