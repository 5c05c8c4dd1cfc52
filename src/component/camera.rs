//! 固定相机组件
//!
//! 相机位置、目标和上方向是渲染器常量，不随模型数据变化。
//! 投影的宽高比只来自当前视口尺寸。

use crate::core::math::{matrix, Matrix4, Vector3};
use crate::core::scene::CameraConfig;

/// 固定相机
#[derive(Debug, Clone, PartialEq)]
pub struct FixedCamera {
    eye: Vector3,
    target: Vector3,
    up: Vector3,
    near_z: f32,
    far_z: f32,
    /// 视图矩阵在构造时计算一次
    view_matrix: Matrix4,
}

impl FixedCamera {
    pub fn new(eye: Vector3, target: Vector3, up: Vector3, near_z: f32, far_z: f32) -> Self {
        Self {
            eye,
            target,
            up,
            near_z,
            far_z,
            view_matrix: matrix::look_at(&eye, &target, &up),
        }
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        Self::new(config.eye(), config.target(), config.up(), config.near, config.far)
    }

    pub fn eye(&self) -> Vector3 {
        self.eye
    }

    pub fn target(&self) -> Vector3 {
        self.target
    }

    pub fn up(&self) -> Vector3 {
        self.up
    }

    pub fn near_z(&self) -> f32 {
        self.near_z
    }

    pub fn far_z(&self) -> f32 {
        self.far_z
    }

    pub fn view_matrix(&self) -> Matrix4 {
        self.view_matrix
    }

    /// 以视口尺寸构造投影矩阵
    ///
    /// 调用方保证 `height > 0`。
    pub fn projection_for_viewport(&self, width: u32, height: u32) -> Matrix4 {
        let aspect = width as f32 / height as f32;
        matrix::symmetric_frustum(aspect, self.near_z, self.far_z)
    }
}

impl Default for FixedCamera {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::math::{constants::EPSILON, utils::matrix_approx_eq};

    #[test]
    fn test_default_camera() {
        let camera = FixedCamera::default();
        assert_eq!(camera.eye(), Vector3::new(0.0, 0.0, 1.5));
        assert_eq!(camera.target(), Vector3::zeros());
        assert_eq!(camera.near_z(), 1.0);
        assert_eq!(camera.far_z(), 10.0);

        // 原点在相机前方 1.5 处
        let origin = camera.view_matrix().transform_point(&nalgebra::Point3::origin());
        assert!((origin.z + 1.5).abs() < EPSILON);
    }

    #[test]
    fn test_projection_follows_viewport() {
        let camera = FixedCamera::default();
        let wide = camera.projection_for_viewport(1600, 800);
        let square = camera.projection_for_viewport(500, 500);

        // x 缩放 = near / aspect
        assert!((wide[(0, 0)] - 0.5).abs() < EPSILON);
        assert!((square[(0, 0)] - 1.0).abs() < EPSILON);
        assert!(matrix_approx_eq(
            &camera.projection_for_viewport(800, 400),
            &wide,
            EPSILON
        ));
    }
}
