//! 渲染器模块
//!
//! 与具体图形 API 无关的渲染核心，所有 GPU 访问都经过 `GpuContext`。
//!
//! # 模块组织
//!
//! - `buffers`：三个并行顶点缓冲区的上传与绑定
//! - `shader`：WGSL 编译、链接校验与接口反射
//! - `frame`：生命周期驱动的帧渲染器（MVP 计算 + 绘制）
//! - `schedule`：连续 / 按需两种帧调度

pub mod buffers;
pub mod shader;
pub mod frame;
pub mod schedule;

pub use buffers::{AttributeLocations, GpuBufferSet};
pub use shader::{CompiledShader, ProgramInterface, ShaderProgram};
pub use frame::{FrameOutcome, FrameRenderer, RendererState};
pub use schedule::FrameScheduler;
