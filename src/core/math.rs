//! 数学库模块
//!
//! 基于 `nalgebra` 提供渲染所需的类型别名和矩阵辅助函数。
//!
//! # 约定
//!
//! - 右手坐标系，相机默认看向 -Z
//! - 矩阵为列主序，与 WGSL 的 `mat4x4<f32>` 内存布局一致
//! - 投影矩阵输出的裁剪空间深度范围为 [0, 1]（wgpu / D3D / Metal 约定）

pub use nalgebra::{Matrix4 as Mat4, Point3, Vector3 as Vec3};

// 类型别名，使用更简洁的名称
pub type Vector3 = Vec3<f32>;
pub type Matrix4 = Mat4<f32>;

/// 数学常量
pub mod constants {
    /// 角度转弧度的系数
    pub const DEG_TO_RAD: f32 = std::f32::consts::PI / 180.0;

    /// 浮点数比较的 epsilon
    pub const EPSILON: f32 = 1e-6;
}

/// 数学工具函数
pub mod utils {
    use super::*;

    /// 角度转弧度
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// 检查两个浮点数是否近似相等
    pub fn approx_eq(a: f32, b: f32, epsilon: f32) -> bool {
        (a - b).abs() < epsilon
    }

    /// 逐元素比较两个矩阵
    pub fn matrix_approx_eq(a: &Matrix4, b: &Matrix4, epsilon: f32) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| approx_eq(*x, *y, epsilon))
    }
}

/// 矩阵辅助函数
pub mod matrix {
    use super::*;

    /// 创建绕 Y 轴旋转的矩阵（角度制）
    ///
    /// 调用方负责把角度保持在较小范围内，f32 的大角度会丢失精度。
    pub fn rotation_y_degrees(degrees: f32) -> Matrix4 {
        Matrix4::from_axis_angle(&Vector3::y_axis(), utils::deg_to_rad(degrees))
    }

    /// 创建 Look-At 视图矩阵
    pub fn look_at(eye: &Vector3, target: &Vector3, up: &Vector3) -> Matrix4 {
        Matrix4::look_at_rh(&Point3::from(*eye), &Point3::from(*target), up)
    }

    /// 创建透视视锥体投影矩阵
    ///
    /// 由近平面上的 left/right/bottom/top 与 near/far 距离定义。
    /// `z = -near` 映射到深度 0，`z = -far` 映射到深度 1。
    #[rustfmt::skip]
    pub fn frustum(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Matrix4 {
        let width = right - left;
        let height = top - bottom;
        let depth = near - far;

        Matrix4::new(
            2.0 * near / width, 0.0, (right + left) / width, 0.0,
            0.0, 2.0 * near / height, (top + bottom) / height, 0.0,
            0.0, 0.0, far / depth, near * far / depth,
            0.0, 0.0, -1.0, 0.0,
        )
    }

    /// 以宽高比构造对称视锥体：x ∈ [-aspect, aspect]，y ∈ [-1, 1]
    pub fn symmetric_frustum(aspect: f32, near: f32, far: f32) -> Matrix4 {
        frustum(-aspect, aspect, -1.0, 1.0, near, far)
    }
}
