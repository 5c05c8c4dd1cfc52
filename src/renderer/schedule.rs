//! 帧调度
//!
//! 宿主的激活 / 暂停只决定是否继续调度帧，不会打断正在绘制的帧。
//! 连续模式下激活期间每次循环都绘制；按需模式只在有重绘请求时绘制。

use crate::core::config::RenderMode;

#[derive(Debug, Clone)]
pub struct FrameScheduler {
    mode: RenderMode,
    active: bool,
    redraw_requested: bool,
}

impl FrameScheduler {
    /// 新建调度器，初始为暂停状态
    pub fn new(mode: RenderMode) -> Self {
        Self {
            mode,
            active: false,
            redraw_requested: false,
        }
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// 恢复调度，并补一次重绘
    pub fn activate(&mut self) {
        self.active = true;
        self.redraw_requested = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// 请求一次重绘（视口变化、窗口暴露等）
    pub fn request_redraw(&mut self) {
        self.redraw_requested = true;
    }

    /// 宿主是否应当持续驱动事件循环
    pub fn wants_continuous_redraw(&self) -> bool {
        self.active && self.mode == RenderMode::Continuous
    }

    /// 现在是否应该绘制一帧，调用会消耗掉挂起的重绘请求
    pub fn should_draw(&mut self) -> bool {
        if !self.active {
            return false;
        }
        let requested = std::mem::take(&mut self.redraw_requested);
        match self.mode {
            RenderMode::Continuous => true,
            RenderMode::OnDemand => requested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_scheduler_never_draws() {
        let mut scheduler = FrameScheduler::new(RenderMode::Continuous);
        scheduler.request_redraw();
        assert!(!scheduler.should_draw());
        assert!(!scheduler.wants_continuous_redraw());
    }

    #[test]
    fn test_continuous_mode_draws_every_time() {
        let mut scheduler = FrameScheduler::new(RenderMode::Continuous);
        scheduler.activate();
        assert!(scheduler.wants_continuous_redraw());
        for _ in 0..3 {
            assert!(scheduler.should_draw());
        }

        scheduler.deactivate();
        assert!(!scheduler.should_draw());
    }

    #[test]
    fn test_on_demand_mode_draws_once_per_request() {
        let mut scheduler = FrameScheduler::new(RenderMode::OnDemand);
        scheduler.activate();
        assert!(!scheduler.wants_continuous_redraw());

        // 激活本身带一次重绘
        assert!(scheduler.should_draw());
        assert!(!scheduler.should_draw());

        scheduler.request_redraw();
        assert!(scheduler.should_draw());
        assert!(!scheduler.should_draw());
    }
}
