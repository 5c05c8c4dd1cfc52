//! 旋转状态组件

use crate::core::math::{matrix, Matrix4};

/// 模型绕 +Y 轴的旋转角度（度）
///
/// 每绘制一帧前进一次。角度在 [0, 360) 内回绕，长时间运行也不会丢失精度。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spin {
    angle: f32,
    step: f32,
}

impl Spin {
    pub fn new(step: f32) -> Self {
        Self { angle: 0.0, step }
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    /// 当前角度下的模型矩阵
    pub fn model_matrix(&self) -> Matrix4 {
        matrix::rotation_y_degrees(self.angle)
    }

    pub fn advance(&mut self) {
        self.angle = (self.angle + self.step).rem_euclid(360.0);
    }

    pub fn reset(&mut self) {
        self.angle = 0.0;
    }
}

impl Default for Spin {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::math::{constants::EPSILON, utils::matrix_approx_eq};

    #[test]
    fn test_initial_model_matrix_is_identity() {
        let spin = Spin::default();
        assert_eq!(spin.angle(), 0.0);
        assert!(matrix_approx_eq(&spin.model_matrix(), &Matrix4::identity(), EPSILON));
    }

    #[test]
    fn test_advance_wraps_full_turns() {
        let mut spin = Spin::new(1.0);
        for _ in 0..725 {
            spin.advance();
        }
        assert_eq!(spin.angle(), 5.0);
        assert!(matrix_approx_eq(
            &spin.model_matrix(),
            &matrix::rotation_y_degrees(5.0),
            1e-5
        ));

        spin.reset();
        assert_eq!(spin.angle(), 0.0);
    }

    #[test]
    fn test_negative_step_wraps_below_zero() {
        let mut spin = Spin::new(-90.0);
        spin.advance();
        assert_eq!(spin.angle(), 270.0);
    }

    #[test]
    fn test_rotation_keeps_moving_after_many_frames() {
        // 2^24 之后 f32 的 `x + 1.0 == x`，累加不回绕会让模型停住
        let mut spin = Spin::new(1.0);
        let frames: u64 = (1 << 24) + 2;
        for _ in 0..frames {
            spin.advance();
        }
        assert_eq!(spin.angle(), (frames % 360) as f32);

        let before = spin.model_matrix();
        spin.advance();
        assert_eq!(spin.angle(), ((frames + 1) % 360) as f32);
        assert!(!matrix_approx_eq(&before, &spin.model_matrix(), EPSILON));
    }
}
