//! 图形后端模块
//!
//! 本模块定义渲染核心使用的 GPU 接口，并提供两个实现：
//! - wgpu：带窗口的跨平台后端（Vulkan、Metal、DX12、OpenGL）
//! - headless：无窗口的记录型后端，用于测试和离屏运行
//!
//! 两个后端都实现了统一的 `GpuContext` trait，
//! 渲染核心不需要知道自己运行在哪一个上面。

pub mod context;
pub mod headless;
pub mod wgpu;

pub use context::{AttributeBinding, BindingState, BufferHandle, GpuContext, ProgramHandle, ShaderStage, TextureHandle};
pub use headless::HeadlessContext;
pub use self::wgpu::{WgpuBackend, WgpuContext};
