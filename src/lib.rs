//! SpinRender - 旋转模型渲染器
//!
//! 读取三角形 OBJ 模型，展开成并行顶点数组一次性上传 GPU，
//! 然后用固定相机和绕 Y 轴旋转的模型矩阵逐帧绘制。
//!
//! # 模块结构
//!
//! - `core`: 核心功能模块（数学、日志、配置、资源、错误处理）
//! - `geometry`: OBJ 解析与几何展开
//! - `component`: 固定相机与旋转状态
//! - `renderer`: 缓冲区、着色器程序、帧渲染器与帧调度
//! - `gfx`: GPU 接口抽象及 wgpu / headless 两个实现
//!
//! # 使用示例
//!
//! ```no_run
//! use spin_render::core::{SceneAssets, SceneConfig};
//! use spin_render::gfx::HeadlessContext;
//! use spin_render::renderer::FrameRenderer;
//!
//! let scene = SceneConfig::default();
//! let assets = SceneAssets::load(&scene)?;
//!
//! let mut renderer = FrameRenderer::new(HeadlessContext::new(), &scene);
//! renderer.on_context_created(&assets)?;
//! renderer.on_viewport_resized(800, 600);
//! renderer.on_frame()?;
//! # Ok::<(), spin_render::core::SpinRenderError>(())
//! ```

pub mod core;
pub mod geometry;
pub mod component;
pub mod renderer;
pub mod gfx;
