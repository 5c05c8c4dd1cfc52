//! 无窗口 GPU 上下文
//!
//! 在 CPU 上记录所有资源和绘制调用，不访问任何图形设备。
//! 用于单元测试和 `--headless` 运行模式，校验规则与 wgpu 后端一致。

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::core::error::{GraphicsError, Result};
use crate::core::math::Matrix4;
use crate::gfx::context::{
    check_texture_data, AttributeBinding, BindingState, BufferHandle, GpuContext, HandleAllocator,
    ProgramHandle, TextureHandle,
};
use crate::renderer::shader::{CompiledShader, ProgramInterface, ResourceKind};

/// 一次被记录的绘制调用
#[derive(Debug, Clone)]
pub struct DrawCall {
    /// 绘制发生在第几帧（从 0 开始）
    pub frame: u64,
    pub program: ProgramHandle,
    pub first: u32,
    pub count: u32,
    pub viewport: (u32, u32),
    /// 绘制时各矩阵 uniform 的值，按绑定位置索引
    pub matrices: HashMap<u32, Matrix4>,
    pub textures: HashMap<u32, TextureHandle>,
}

impl DrawCall {
    pub fn matrix(&self, location: u32) -> Option<&Matrix4> {
        self.matrices.get(&location)
    }
}

/// 纹理尺寸记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TextureRecord {
    width: u32,
    height: u32,
}

/// 无窗口上下文
#[derive(Debug, Default)]
pub struct HeadlessContext {
    handles: HandleAllocator,
    buffers: HashMap<BufferHandle, Vec<f32>>,
    programs: HashMap<ProgramHandle, ProgramInterface>,
    textures: HashMap<TextureHandle, TextureRecord>,
    binding: BindingState,
    matrices: HashMap<u32, Matrix4>,
    viewport: (u32, u32),
    clear_color: [f32; 4],
    frames_completed: u64,
    draws: Vec<DrawCall>,
}

impl HeadlessContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_program_count(&self) -> usize {
        self.programs.len()
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    /// 读取缓冲区内容
    pub fn buffer_data(&self, buffer: BufferHandle) -> Option<&[f32]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    pub fn texture_size(&self, texture: TextureHandle) -> Option<(u32, u32)> {
        self.textures.get(&texture).map(|t| (t.width, t.height))
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn frames_completed(&self) -> u64 {
        self.frames_completed
    }

    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    pub fn last_draw(&self) -> Option<&DrawCall> {
        self.draws.last()
    }
}

impl GpuContext for HeadlessContext {
    fn backend_name(&self) -> &str {
        "headless"
    }

    fn create_buffer(&mut self, label: &str, data: &[f32]) -> Result<BufferHandle> {
        let handle = BufferHandle(self.handles.next());
        self.buffers.insert(handle, data.to_vec());
        trace!("Created buffer `{}` ({} floats)", label, data.len());
        Ok(handle)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
        self.binding.forget_buffer(buffer);
    }

    fn create_program(
        &mut self,
        _vertex: &CompiledShader,
        _fragment: &CompiledShader,
        interface: &ProgramInterface,
    ) -> Result<ProgramHandle> {
        let handle = ProgramHandle(self.handles.next());
        self.programs.insert(handle, interface.clone());
        Ok(handle)
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
        self.binding.forget_program(program);
    }

    fn create_texture(&mut self, label: &str, width: u32, height: u32, rgba: &[u8]) -> Result<TextureHandle> {
        check_texture_data(width, height, rgba)?;
        let handle = TextureHandle(self.handles.next());
        self.textures.insert(handle, TextureRecord { width, height });
        trace!("Created texture `{}` ({}x{})", label, width, height);
        Ok(handle)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
        self.binding.forget_texture(texture);
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    fn begin_frame(&mut self, clear_color: [f32; 4]) -> Result<bool> {
        self.binding.begin_frame()?;
        self.clear_color = clear_color;
        Ok(true)
    }

    fn end_frame(&mut self) -> Result<()> {
        self.binding.end_frame()?;
        self.frames_completed += 1;
        Ok(())
    }

    fn use_program(&mut self, program: ProgramHandle) -> Result<()> {
        if !self.programs.contains_key(&program) {
            return Err(GraphicsError::InvalidBinding(format!("program {:?} does not exist", program)).into());
        }
        if self.binding.program() != Some(program) {
            self.matrices.clear();
        }
        self.binding.use_program(program);
        Ok(())
    }

    fn bind_attribute(&mut self, binding: AttributeBinding) -> Result<()> {
        if !self.buffers.contains_key(&binding.buffer) {
            return Err(GraphicsError::InvalidBinding(format!(
                "buffer {:?} does not exist",
                binding.buffer
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
            .ok_or_else(|| GraphicsError::InvalidBinding("uniform set with no program in use".to_string()))?;

        let declared = self
            .programs
            .get(&program)
            .and_then(|iface| iface.resource_at(location))
            .map(|slot| slot.kind == ResourceKind::MatrixUniform)
            .unwrap_or(false);

        if !declared {
            return Err(GraphicsError::InvalidBinding(format!(
                "no matrix uniform at location {}",
                location
            ))
            .into());
        }

        self.matrices.insert(location, *matrix);
        Ok(())
    }

    fn draw_triangles(&mut self, first: u32, count: u32) -> Result<()> {
        let buffers = &self.buffers;
        let programs = &self.programs;
        let program = self.binding.validate_draw(
            first,
            count,
            |p| programs.get(&p),
            |b| buffers.get(&b).map(|data| data.len() as u64 * 4),
        )?;

        let textures: HashMap<u32, TextureHandle> = programs
            .get(&program)
            .map(|iface| {
                iface
                    .resources
                    .iter()
                    .filter(|r| r.kind == ResourceKind::Texture2d)
                    .filter_map(|r| self.binding.texture(r.binding).map(|t| (r.binding, t)))
                    .collect()
            })
            .unwrap_or_default();

        debug!(
            frame = self.frames_completed,
            first, count, "Recorded headless draw"
        );

        self.draws.push(DrawCall {
            frame: self.frames_completed,
            program,
            first,
            count,
            viewport: self.viewport,
            matrices: self.matrices.clone(),
            textures,
        });
        Ok(())
    }

    fn unbind(&mut self) {
        self.binding.clear();
        self.matrices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::SpinRenderError;
    use crate::renderer::shader::ShaderProgram;

    const VERTEX: &str = include_str!("../renderer/shaders/mesh.vert.wgsl");
    const FRAGMENT: &str = include_str!("../renderer/shaders/mesh.frag.wgsl");

    fn bind_triangle(ctx: &mut HeadlessContext, program: &ShaderProgram) {
        let positions = ctx.create_buffer("positions", &[0.0; 9]).unwrap();
        let normals = ctx.create_buffer("normals", &[0.0; 9]).unwrap();
        let texcoords = ctx.create_buffer("texcoords", &[0.0; 6]).unwrap();

        ctx.use_program(program.handle()).unwrap();
        ctx.bind_attribute(AttributeBinding::packed(0, positions, 3)).unwrap();
        ctx.bind_attribute(AttributeBinding::packed(1, normals, 3)).unwrap();
        ctx.bind_attribute(AttributeBinding::packed(2, texcoords, 2)).unwrap();
    }

    #[test]
    fn test_draw_is_recorded() {
        let mut ctx = HeadlessContext::new();
        let program = ShaderProgram::build(&mut ctx, VERTEX, FRAGMENT).unwrap();

        ctx.set_viewport(640, 480);
        assert!(ctx.begin_frame([0.0, 0.0, 0.0, 1.0]).unwrap());
        bind_triangle(&mut ctx, &program);
        ctx.set_matrix_uniform(0, &Matrix4::identity()).unwrap();
        ctx.draw_triangles(0, 3).unwrap();
        ctx.end_frame().unwrap();

        let draw = ctx.last_draw().unwrap();
        assert_eq!(draw.count, 3);
        assert_eq!(draw.viewport, (640, 480));
        assert_eq!(draw.matrix(0), Some(&Matrix4::identity()));
        assert_eq!(ctx.frames_completed(), 1);
    }

    #[test]
    fn test_draw_outside_frame_fails() {
        let mut ctx = HeadlessContext::new();
        let program = ShaderProgram::build(&mut ctx, VERTEX, FRAGMENT).unwrap();
        bind_triangle(&mut ctx, &program);

        assert!(matches!(
            ctx.draw_triangles(0, 3),
            Err(SpinRenderError::Graphics(GraphicsError::InvalidBinding(_)))
        ));
    }

    #[test]
    fn test_draw_past_buffer_end_fails() {
        let mut ctx = HeadlessContext::new();
        let program = ShaderProgram::build(&mut ctx, VERTEX, FRAGMENT).unwrap();

        ctx.begin_frame([0.0; 4]).unwrap();
        bind_triangle(&mut ctx, &program);
        assert!(ctx.draw_triangles(0, 6).is_err());
    }

    #[test]
    fn test_draw_after_unbind_fails() {
        let mut ctx = HeadlessContext::new();
        let program = ShaderProgram::build(&mut ctx, VERTEX, FRAGMENT).unwrap();

        ctx.begin_frame([0.0; 4]).unwrap();
        bind_triangle(&mut ctx, &program);
        ctx.unbind();
        assert!(ctx.draw_triangles(0, 3).is_err());
    }

    #[test]
    fn test_unknown_uniform_location_fails() {
        let mut ctx = HeadlessContext::new();
        let program = ShaderProgram::build(&mut ctx, VERTEX, FRAGMENT).unwrap();
        ctx.use_program(program.handle()).unwrap();

        // 绑定 1 是纹理，不是矩阵
        assert!(ctx.set_matrix_uniform(1, &Matrix4::identity()).is_err());
        assert!(ctx.set_matrix_uniform(9, &Matrix4::identity()).is_err());
    }

    #[test]
    fn test_texture_size_is_checked() {
        let mut ctx = HeadlessContext::new();
        assert!(ctx.create_texture("bad", 2, 2, &[0; 4]).is_err());

        let texture = ctx.create_texture("white", 1, 1, &[255; 4]).unwrap();
        assert_eq!(ctx.texture_size(texture), Some((1, 1)));
        ctx.destroy_texture(texture);
        assert_eq!(ctx.live_texture_count(), 0);
    }
}
