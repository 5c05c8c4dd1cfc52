//! 组件模块
//!
//! 渲染器使用的两个场景组件：固定相机和模型旋转状态。

mod camera;
mod spin;

pub use camera::FixedCamera;
pub use spin::Spin;
