//! wgpu 图形后端实现
//!
//! wgpu 可以在 Vulkan、Metal、DirectX 12、OpenGL 等多种 API 上运行，
//! 具体使用哪一个由配置中的 `graphics.api` 决定。
//!
//! # 模块结构
//!
//! - `backend` - WgpuBackend 结构（窗口、设备初始化和表面管理）
//! - `context` - WgpuContext 结构（`GpuContext` 的实现）

mod backend;
mod context;

pub use backend::WgpuBackend;
pub use context::WgpuContext;
