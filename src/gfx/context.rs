//! GPU 上下文的统一抽象接口
//!
//! 渲染核心只通过 `GpuContext` 与图形 API 交互，这样同一套渲染逻辑
//! 既能跑在 wgpu 窗口后端上，也能跑在无窗口的 `HeadlessContext` 上。
//!
//! 绑定状态是显式的：每个上下文持有一个 `BindingState`，
//! 记录当前程序、属性和纹理绑定，并在绘制前统一校验。

use std::collections::BTreeMap;
use std::fmt;

use crate::core::error::{GraphicsError, Result};
use crate::core::math::Matrix4;
use crate::renderer::shader::{CompiledShader, ProgramInterface};

/// 着色器阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// 缓冲区句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub(crate) u32);

/// 着色器程序句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub(crate) u32);

/// 纹理句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub(crate) u32);

/// 单调递增的句柄分配器
#[derive(Debug, Default)]
pub(crate) struct HandleAllocator {
    next: u32,
}

impl HandleAllocator {
    pub(crate) fn next(&mut self) -> u32 {
        self.next += 1;
        self.next
    }
}

/// 一个顶点属性的绑定
///
/// `stride` 和 `offset` 以字节为单位；`stride == 0` 表示紧密排列。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeBinding {
    pub location: u32,
    pub buffer: BufferHandle,
    pub components: u32,
    pub stride: u32,
    pub offset: u32,
}

impl AttributeBinding {
    /// 紧密排列的 f32 属性
    pub fn packed(location: u32, buffer: BufferHandle, components: u32) -> Self {
        Self {
            location,
            buffer,
            components,
            stride: components * 4,
            offset: 0,
        }
    }

    /// 实际步长（字节）
    pub fn effective_stride(&self) -> u64 {
        if self.stride == 0 {
            u64::from(self.components) * 4
        } else {
            u64::from(self.stride)
        }
    }

    /// 绘制 `first..first+count` 顶点所需的最小缓冲区字节数
    pub fn required_bytes(&self, first: u32, count: u32) -> u64 {
        if count == 0 {
            return 0;
        }
        let last = u64::from(first) + u64::from(count) - 1;
        u64::from(self.offset) + last * self.effective_stride() + u64::from(self.components) * 4
    }
}

/// 显式绑定状态
#[derive(Debug, Default)]
pub struct BindingState {
    in_frame: bool,
    program: Option<ProgramHandle>,
    attributes: BTreeMap<u32, AttributeBinding>,
    textures: BTreeMap<u32, TextureHandle>,
}

impl BindingState {
    pub fn begin_frame(&mut self) -> Result<()> {
        if self.in_frame {
            return Err(GraphicsError::CommandExecution("frame already in progress".to_string()).into());
        }
        self.in_frame = true;
        Ok(())
    }

    pub fn end_frame(&mut self) -> Result<()> {
        if !self.in_frame {
            return Err(GraphicsError::CommandExecution("no frame in progress".to_string()).into());
        }
        self.in_frame = false;
        Ok(())
    }

    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    pub fn use_program(&mut self, program: ProgramHandle) {
        self.program = Some(program);
    }

    pub fn program(&self) -> Option<ProgramHandle> {
        self.program
    }

    pub fn bind_attribute(&mut self, binding: AttributeBinding) -> Result<()> {
        if !(1..=4).contains(&binding.components) {
            return Err(GraphicsError::InvalidBinding(format!(
                "attribute at location {} has {} components",
                binding.location, binding.components
            ))
            .into());
        }
        self.attributes.insert(binding.location, binding);
        Ok(())
    }

    pub fn attribute(&self, location: u32) -> Option<&AttributeBinding> {
        self.attributes.get(&location)
    }

    pub fn bind_texture(&mut self, location: u32, texture: TextureHandle) {
        self.textures.insert(location, texture);
    }

    pub fn texture(&self, location: u32) -> Option<TextureHandle> {
        self.textures.get(&location).copied()
    }

    /// 清除程序与所有绑定，帧状态保持不变
    pub fn clear(&mut self) {
        self.program = None;
        self.attributes.clear();
        self.textures.clear();
    }

    /// 资源被销毁时同步移除对应的绑定
    pub fn forget_program(&mut self, program: ProgramHandle) {
        if self.program == Some(program) {
            self.program = None;
        }
    }

    pub fn forget_buffer(&mut self, buffer: BufferHandle) {
        self.attributes.retain(|_, b| b.buffer != buffer);
    }

    pub fn forget_texture(&mut self, texture: TextureHandle) {
        self.textures.retain(|_, t| *t != texture);
    }

    /// 绘制前校验
    ///
    /// 要求处于帧内、已使用程序、程序声明的每个属性都已绑定，
    /// 且绑定的缓冲区足够覆盖本次绘制。`interface_of` 返回程序接口，
    /// `buffer_bytes` 返回缓冲区字节数。
    pub fn validate_draw<'a>(
        &self,
        first: u32,
        count: u32,
        interface_of: impl Fn(ProgramHandle) -> Option<&'a ProgramInterface>,
        buffer_bytes: impl Fn(BufferHandle) -> Option<u64>,
    ) -> Result<ProgramHandle> {
        if !self.in_frame {
            return Err(GraphicsError::InvalidBinding("draw issued outside of a frame".to_string()).into());
        }

        let program = self
            .program
            .ok_or_else(|| GraphicsError::InvalidBinding("draw issued with no program in use".to_string()))?;

        let interface = interface_of(program).ok_or_else(|| {
            GraphicsError::InvalidBinding(format!("program {:?} does not exist", program))
        })?;

        for slot in &interface.attributes {
            let binding = self.attributes.get(&slot.location).ok_or_else(|| {
                GraphicsError::InvalidBinding(format!(
                    "attribute `{}` (location {}) is not bound",
                    slot.name, slot.location
                ))
            })?;

            if binding.components != slot.components {
                return Err(GraphicsError::InvalidBinding(format!(
                    "attribute `{}` expects {} components, bound with {}",
                    slot.name, slot.components, binding.components
                ))
                .into());
            }

            let available = buffer_bytes(binding.buffer).ok_or_else(|| {
                GraphicsError::InvalidBinding(format!(
                    "attribute `{}` is bound to a destroyed buffer",
                    slot.name
                ))
            })?;

            let required = binding.required_bytes(first, count);
            if available < required {
                return Err(GraphicsError::InvalidBinding(format!(
                    "buffer for `{}` holds {} bytes, draw needs {}",
                    slot.name, available, required
                ))
                .into());
            }
        }

        Ok(program)
    }
}

/// GPU 上下文
///
/// 所有方法都在渲染线程上同步调用。
pub trait GpuContext {
    /// 后端名称，用于日志
    fn backend_name(&self) -> &str;

    /// 创建静态 f32 顶点缓冲区并一次性上传数据
    fn create_buffer(&mut self, label: &str, data: &[f32]) -> Result<BufferHandle>;

    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// 从两个已编译阶段创建 GPU 程序，GPU 侧拒绝时返回错误
    fn create_program(
        &mut self,
        vertex: &CompiledShader,
        fragment: &CompiledShader,
        interface: &ProgramInterface,
    ) -> Result<ProgramHandle>;

    fn destroy_program(&mut self, program: ProgramHandle);

    /// 创建 RGBA8 纹理，`rgba.len()` 必须等于 `width * height * 4`
    fn create_texture(&mut self, label: &str, width: u32, height: u32, rgba: &[u8]) -> Result<TextureHandle>;

    fn destroy_texture(&mut self, texture: TextureHandle);

    fn set_viewport(&mut self, width: u32, height: u32);

    /// 开始一帧并清屏
    ///
    /// 返回 `false` 表示本帧被跳过（例如表面需要重建），此时不要调用 `end_frame`。
    fn begin_frame(&mut self, clear_color: [f32; 4]) -> Result<bool>;

    fn end_frame(&mut self) -> Result<()>;

    fn use_program(&mut self, program: ProgramHandle) -> Result<()>;

    fn bind_attribute(&mut self, binding: AttributeBinding) -> Result<()>;

    fn bind_texture(&mut self, location: u32, texture: TextureHandle) -> Result<()>;

    /// 上传 4x4 矩阵 uniform（列主序）
    fn set_matrix_uniform(&mut self, location: u32, matrix: &Matrix4) -> Result<()>;

    fn draw_triangles(&mut self, first: u32, count: u32) -> Result<()>;

    /// 解除程序与所有绑定
    fn unbind(&mut self);
}

/// 校验纹理数据长度
pub(crate) fn check_texture_data(width: u32, height: u32, rgba: &[u8]) -> Result<()> {
    let expected = u64::from(width) * u64::from(height) * 4;
    if width == 0 || height == 0 || rgba.len() as u64 != expected {
        return Err(GraphicsError::ResourceCreation(format!(
            "texture of {}x{} needs {} bytes, got {}",
            width,
            height,
            expected,
            rgba.len()
        ))
        .into());
    }
    Ok(())
}
