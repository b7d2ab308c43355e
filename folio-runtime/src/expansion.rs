//! # Expansion 模块
//!
//! 眼睛点击后的全屏展开层。
//!
//! 状态：`Idle → Expanding → Expanded → Collapsing → Idle`。
//! 过渡由一个 0..1 的弹簧进度驱动，弹簧静止即视为动画完成；
//! 超过 [`SETTLE_TIMEOUT`] 仍未静止时直接落到终点。

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::{Rect, Size, Vec2};
use crate::scheduler::{FrameDriven, LoopControl};
use crate::spring::{Spring, SpringValue};

/// 单次过渡的最长时长
pub const SETTLE_TIMEOUT: Duration = Duration::from_millis(1500);

/// 展开层状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayState {
    Idle,
    Expanding,
    Expanded,
    Collapsing,
}

impl OverlayState {
    pub fn name(&self) -> &'static str {
        match self {
            OverlayState::Idle => "idle",
            OverlayState::Expanding => "expanding",
            OverlayState::Expanded => "expanded",
            OverlayState::Collapsing => "collapsing",
        }
    }
}

/// 键盘输入
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Escape,
    Other(String),
}

/// 展开层变换
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverlayTransform {
    /// 相对视口中心的平移
    pub offset: Vec2,
    pub scale: f32,
    /// 角度
    pub rotate: f32,
    /// 圆角（百分比）
    pub radius: f32,
    pub opacity: f32,
}

impl OverlayTransform {
    pub const FULL: Self = Self {
        offset: Vec2::zero(),
        scale: 1.0,
        rotate: 0.0,
        radius: 0.0,
        opacity: 1.0,
    };

    /// 以眼睛为起点的初始变换
    pub fn from_eye(eye: &Rect, viewport: Size) -> Self {
        let base = viewport.width * 0.8;
        Self {
            offset: eye.center() - viewport.center(),
            scale: if base > 0.0 { eye.width / base } else { 0.0 },
            rotate: -15.0,
            radius: 50.0,
            opacity: 0.0,
        }
    }

    fn lerp(&self, other: &Self, t: f32) -> Self {
        let mix = |a: f32, b: f32| a + (b - a) * t;
        Self {
            offset: self.offset.lerp(other.offset, t),
            scale: mix(self.scale, other.scale),
            rotate: mix(self.rotate, other.rotate),
            radius: mix(self.radius, other.radius),
            opacity: mix(self.opacity, other.opacity).clamp(0.0, 1.0),
        }
    }
}

/// 展开层
#[derive(Debug, Clone)]
pub struct ExpansionOverlay {
    state: OverlayState,
    progress: SpringValue,
    origin: OverlayTransform,
    /// 当前过渡已经持续的时间
    elapsed: Duration,
}

impl ExpansionOverlay {
    pub fn new() -> Self {
        Self {
            state: OverlayState::Idle,
            progress: SpringValue::new(Spring::EXPANSION, 0.0),
            origin: OverlayTransform::FULL,
            elapsed: Duration::ZERO,
        }
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == OverlayState::Idle
    }

    /// 从眼睛位置展开；仅在 Idle 时有效
    pub fn open(&mut self, eye: &Rect, viewport: Size) -> bool {
        if self.state != OverlayState::Idle {
            return false;
        }
        self.origin = OverlayTransform::from_eye(eye, viewport);
        self.progress.jump(0.0);
        self.progress.set_target(1.0);
        self.transition(OverlayState::Expanding);
        true
    }

    /// 收起；Expanding 中途也可以收起
    pub fn close(&mut self) -> bool {
        match self.state {
            OverlayState::Expanding | OverlayState::Expanded => {
                self.progress.set_target(0.0);
                self.transition(OverlayState::Collapsing);
                true
            }
            _ => false,
        }
    }

    pub fn key_pressed(&mut self, key: &Key) -> bool {
        *key == Key::Escape && self.close()
    }

    /// 推进一帧，状态变化时返回新状态
    pub fn frame(&mut self, dt: Duration) -> Option<OverlayState> {
        if self.state == OverlayState::Idle {
            return None;
        }
        self.progress.step(dt);
        self.elapsed += dt;
        if !self.progress.is_at_rest() {
            if self.elapsed < SETTLE_TIMEOUT {
                return None;
            }
            debug!(state = self.state.name(), "弹簧未静止，强制完成过渡");
            self.progress.jump(self.progress.target());
        }
        let next = match self.state {
            OverlayState::Expanding => OverlayState::Expanded,
            OverlayState::Collapsing => OverlayState::Idle,
            _ => return None,
        };
        self.transition(next);
        Some(next)
    }

    /// 当前变换
    pub fn transform(&self) -> OverlayTransform {
        self.origin.lerp(&OverlayTransform::FULL, self.progress.value())
    }

    fn transition(&mut self, next: OverlayState) {
        debug!(from = self.state.name(), to = next.name(), "展开层状态切换");
        self.state = next;
        self.elapsed = Duration::ZERO;
    }
}

impl Default for ExpansionOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDriven for ExpansionOverlay {
    fn on_frame(&mut self, _now: Duration, dt: Duration) -> LoopControl {
        self.frame(dt);
        LoopControl::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle(overlay: &mut ExpansionOverlay) -> Vec<OverlayState> {
        let mut states = Vec::new();
        for _ in 0..600 {
            if let Some(state) = overlay.frame(Duration::from_millis(16)) {
                states.push(state);
            }
        }
        states
    }

    #[test]
    fn test_initial_transform() {
        let eye = Rect::new(590.0, 390.0, 20.0, 20.0);
        let t = OverlayTransform::from_eye(&eye, Size::new(1000.0, 600.0));
        assert_eq!(t.offset, Vec2::new(100.0, 100.0));
        assert!((t.scale - 0.025).abs() < 1e-6);
        assert_eq!(t.rotate, -15.0);
    }

    #[test]
    fn test_open_and_close_cycle() {
        let mut overlay = ExpansionOverlay::new();
        let eye = Rect::new(100.0, 100.0, 40.0, 40.0);
        assert!(overlay.open(&eye, Size::new(1280.0, 800.0)));
        assert!(!overlay.open(&eye, Size::new(1280.0, 800.0)));
        assert_eq!(overlay.state(), OverlayState::Expanding);

        assert_eq!(settle(&mut overlay), vec![OverlayState::Expanded]);
        let full = overlay.transform();
        assert!(full.offset.length() < 1e-4);
        assert!((full.scale - 1.0).abs() < 1e-5);
        assert!((full.opacity - 1.0).abs() < 1e-5);

        assert!(overlay.key_pressed(&Key::Escape));
        assert_eq!(overlay.state(), OverlayState::Collapsing);
        assert_eq!(settle(&mut overlay), vec![OverlayState::Idle]);
    }

    #[test]
    fn test_settle_timeout_forces_completion() {
        let mut overlay = ExpansionOverlay::new();
        overlay.open(&Rect::new(0.0, 0.0, 10.0, 10.0), Size::new(800.0, 600.0));
        // 单帧超过超时时长
        assert_eq!(
            overlay.frame(SETTLE_TIMEOUT + Duration::from_millis(1)),
            Some(OverlayState::Expanded)
        );
        assert!((overlay.transform().opacity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_other_keys_ignored() {
        let mut overlay = ExpansionOverlay::new();
        assert!(!overlay.key_pressed(&Key::Escape));
        overlay.open(&Rect::new(0.0, 0.0, 10.0, 10.0), Size::new(800.0, 600.0));
        assert!(!overlay.key_pressed(&Key::Other("Enter".into())));
        assert_eq!(overlay.state(), OverlayState::Expanding);
    }
}
