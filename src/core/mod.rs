//! 核心功能模块
//!
//! 本模块提供了渲染器的基础功能，包括数学库、日志系统、配置管理、资源读取和错误处理。
//! 这些模块独立于具体的图形 API。
//!
//! # 模块组织
//!
//! - `math`：基于 nalgebra 的矩阵辅助函数（look-at、视锥体、绕 Y 旋转）
//! - `log`：日志系统，基于 tracing
//! - `config`：渲染器配置（窗口、图形 API、渲染模式、日志、无窗口模式）
//! - `scene`：场景配置（模型、纹理、着色器、相机、动画）
//! - `assets`：启动时一次性读入的模型、纹理和着色器
//! - `error`：错误处理，定义统一的错误类型

pub mod math;
pub mod log;
pub mod config;
pub mod scene;
pub mod assets;
pub mod error;

// 重新导出常用类型，方便使用
pub use math::{Matrix4, Vector3};
pub use error::{Result, SpinRenderError};
pub use config::Config;
pub use scene::SceneConfig;
pub use assets::SceneAssets;
