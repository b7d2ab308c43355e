//! # Eye 模块
//!
//! 页面上的两只装饰眼睛。
//!
//! - 圆点眼（`Dot`）：瞳孔在圆内跟随指针，点击眨眼
//! - 三角眼（`Triangle`）：瞳孔在矩形内跟随指针；全局点击眨眼，
//!   点击眼睛本身先眨眼，150ms 后从眼睛位置展开全屏层
//!
//! 眼睑优先级：眨眼 > hover 眯眼 > 正常。hover 状态来自 [`HoverBus`] 订阅。

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::expansion::{ExpansionOverlay, Key, OverlayState, OverlayTransform};
use crate::geometry::{Rect, Size, Vec2};
use crate::hover::{HoverBus, HoverSubscription};
use crate::pointer::{PointerTracker, TrackerConfig};
use crate::scheduler::{FrameDriven, LoopControl};

/// 眨眼时长，也是点击眼睛到开始展开的延迟
pub const BLINK_DURATION: Duration = Duration::from_millis(150);

/// 眼睛种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EyeKind {
    Dot,
    Triangle,
}

impl EyeKind {
    pub fn tracker_config(&self) -> TrackerConfig {
        match self {
            EyeKind::Dot => TrackerConfig::dot_eye(),
            EyeKind::Triangle => TrackerConfig::triangle_eye(),
        }
    }
}

/// 眼睑状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Eyelid {
    Open,
    Squint,
    Blink,
}

impl Eyelid {
    /// 眼睑开合量
    ///
    /// 圆点眼为容器高度百分比，三角眼为椭圆纵半径。
    pub fn openness(&self, kind: EyeKind) -> f32 {
        match (kind, self) {
            (EyeKind::Dot, Eyelid::Open) => 70.0,
            (EyeKind::Dot, Eyelid::Squint) => 15.0,
            (EyeKind::Dot, Eyelid::Blink) => 10.0,
            (EyeKind::Triangle, Eyelid::Open) => 15.0,
            (EyeKind::Triangle, Eyelid::Squint) => 5.0,
            (EyeKind::Triangle, Eyelid::Blink) => 2.0,
        }
    }
}

/// 眼睛控制器
pub struct EyeController {
    kind: EyeKind,
    tracker: PointerTracker,
    squinting: Rc<Cell<bool>>,
    _hover: HoverSubscription,
    blink_until: Option<Duration>,
    overlay: ExpansionOverlay,
    /// 点击眼睛后，展开开始的时刻
    pending_open: Option<Duration>,
    viewport: Size,
    now: Duration,
}

impl EyeController {
    pub fn new(kind: EyeKind, hover: &HoverBus) -> Self {
        Self::with_tracker(kind, kind.tracker_config(), hover)
    }

    pub fn with_tracker(kind: EyeKind, config: TrackerConfig, hover: &HoverBus) -> Self {
        let squinting = Rc::new(Cell::new(hover.is_hovered()));
        let flag = squinting.clone();
        let subscription = hover.subscribe(move |hovered| flag.set(hovered));
        Self {
            kind,
            tracker: PointerTracker::new(config),
            squinting,
            _hover: subscription,
            blink_until: None,
            overlay: ExpansionOverlay::new(),
            pending_open: None,
            viewport: Size::default(),
            now: Duration::ZERO,
        }
    }

    pub fn kind(&self) -> EyeKind {
        self.kind
    }

    pub fn tracker(&self) -> &PointerTracker {
        &self.tracker
    }

    pub fn pupil_offset(&self) -> Vec2 {
        self.tracker.current()
    }

    pub fn overlay_state(&self) -> OverlayState {
        self.overlay.state()
    }

    pub fn overlay_transform(&self) -> OverlayTransform {
        self.overlay.transform()
    }

    /// 展开动画进行中（含点击后的等待）
    pub fn is_animating(&self) -> bool {
        self.pending_open.is_some() || !self.overlay.is_idle()
    }

    pub fn eyelid(&self) -> Eyelid {
        if self.blink_until.is_some_and(|until| self.now < until) {
            Eyelid::Blink
        } else if self.squinting.get() {
            Eyelid::Squint
        } else {
            Eyelid::Open
        }
    }

    /// 布局变化后刷新锚点
    pub fn anchor_changed(&mut self, rect: Rect) -> bool {
        self.tracker.refresh_anchor(rect)
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
    }

    pub fn pointer_moved(&mut self, position: Vec2) {
        self.tracker.pointer_moved(position);
    }

    fn blink(&mut self, now: Duration) {
        if self.blink_until.is_some_and(|until| now < until) {
            return;
        }
        self.blink_until = Some(now + BLINK_DURATION);
    }

    /// 页面任意位置点击
    pub fn global_click(&mut self, now: Duration) {
        if self.kind != EyeKind::Triangle || self.is_animating() {
            return;
        }
        self.blink(now);
    }

    /// 点击眼睛本身；返回是否开始展开
    pub fn eye_clicked(&mut self, now: Duration) -> bool {
        match self.kind {
            EyeKind::Dot => {
                self.blink(now);
                false
            }
            EyeKind::Triangle => {
                if self.is_animating() {
                    return false;
                }
                self.blink(now);
                self.tracker.suspend();
                self.pending_open = Some(now + BLINK_DURATION);
                debug!("眼睛被点击，准备展开");
                true
            }
        }
    }

    pub fn key_pressed(&mut self, key: &Key) -> bool {
        self.overlay.key_pressed(key)
    }

    /// 点击展开层背景或关闭按钮；返回是否开始收起
    pub fn backdrop_clicked(&mut self) -> bool {
        self.overlay.close()
    }

    /// 推进一帧，展开层状态变化时返回新状态
    pub fn frame(&mut self, now: Duration, dt: Duration) -> Option<OverlayState> {
        self.now = now;
        if self.blink_until.is_some_and(|until| now >= until) {
            self.blink_until = None;
        }

        let mut changed = None;
        if let Some(at) = self.pending_open {
            if now >= at {
                self.pending_open = None;
                let eye = self.tracker.anchor().unwrap_or_default();
                if self.overlay.open(&eye, self.viewport) {
                    changed = Some(OverlayState::Expanding);
                }
            }
        }

        if let Some(state) = self.overlay.frame(dt) {
            if state == OverlayState::Idle {
                self.tracker.resume();
            }
            changed = Some(state);
        }

        self.tracker.frame(dt);
        changed
    }
}

impl FrameDriven for EyeController {
    fn on_frame(&mut self, now: Duration, dt: Duration) -> LoopControl {
        self.frame(now, dt);
        LoopControl::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_eyelid_priority() {
        let bus = HoverBus::new();
        let writer = bus.attach_writer().unwrap();
        let mut eye = EyeController::new(EyeKind::Triangle, &bus);
        assert_eq!(eye.eyelid(), Eyelid::Open);

        writer.publish(true);
        assert_eq!(eye.eyelid(), Eyelid::Squint);

        eye.global_click(ms(0));
        eye.frame(ms(10), ms(10));
        assert_eq!(eye.eyelid(), Eyelid::Blink);
        assert_eq!(eye.eyelid().openness(EyeKind::Triangle), 2.0);

        eye.frame(ms(160), ms(150));
        assert_eq!(eye.eyelid(), Eyelid::Squint);

        writer.publish(false);
        assert_eq!(eye.eyelid(), Eyelid::Open);
    }

    #[test]
    fn test_eye_click_opens_overlay_after_blink() {
        let bus = HoverBus::new();
        let mut eye = EyeController::new(EyeKind::Triangle, &bus);
        eye.anchor_changed(Rect::new(600.0, 300.0, 40.0, 36.0));
        eye.set_viewport(Size::new(1280.0, 800.0));

        assert!(eye.eye_clicked(ms(0)));
        assert!(eye.tracker().is_suspended());
        // 动画期间再次点击无效
        assert!(!eye.eye_clicked(ms(50)));

        assert_eq!(eye.frame(ms(100), ms(16)), None);
        assert_eq!(eye.frame(ms(150), ms(16)), Some(OverlayState::Expanding));

        let mut now = ms(150);
        let mut states = Vec::new();
        for _ in 0..300 {
            now += ms(16);
            if let Some(state) = eye.frame(now, ms(16)) {
                states.push(state);
            }
        }
        assert_eq!(states, vec![OverlayState::Expanded]);

        // 展开期间全局点击不眨眼
        eye.global_click(now);
        assert_ne!(eye.eyelid(), Eyelid::Blink);

        assert!(eye.key_pressed(&Key::Escape));
        for _ in 0..300 {
            now += ms(16);
            eye.frame(now, ms(16));
        }
        assert_eq!(eye.overlay_state(), OverlayState::Idle);
        assert!(!eye.tracker().is_suspended());
        assert!(!eye.is_animating());
    }

    #[test]
    fn test_backdrop_click_closes_overlay() {
        let bus = HoverBus::new();
        let mut eye = EyeController::new(EyeKind::Triangle, &bus);
        eye.anchor_changed(Rect::new(600.0, 300.0, 40.0, 36.0));
        eye.set_viewport(Size::new(1280.0, 800.0));

        // 展开之前点击背景无效
        assert!(!eye.backdrop_clicked());

        eye.eye_clicked(ms(0));
        let mut now = ms(0);
        for _ in 0..200 {
            now += ms(16);
            eye.frame(now, ms(16));
        }
        assert_eq!(eye.overlay_state(), OverlayState::Expanded);

        assert!(eye.backdrop_clicked());
        assert_eq!(eye.overlay_state(), OverlayState::Collapsing);
        for _ in 0..300 {
            now += ms(16);
            eye.frame(now, ms(16));
        }
        assert_eq!(eye.overlay_state(), OverlayState::Idle);
        assert!(!eye.tracker().is_suspended());
    }

    #[test]
    fn test_dot_eye_click_only_blinks() {
        let bus = HoverBus::new();
        let mut eye = EyeController::new(EyeKind::Dot, &bus);
        assert!(!eye.eye_clicked(ms(0)));
        eye.frame(ms(1), ms(1));
        assert_eq!(eye.eyelid(), Eyelid::Blink);
        assert_eq!(eye.eyelid().openness(EyeKind::Dot), 10.0);
        assert_eq!(eye.overlay_state(), OverlayState::Idle);
    }

    #[test]
    fn test_unsubscribes_on_drop() {
        let bus = HoverBus::new();
        let eye = EyeController::new(EyeKind::Dot, &bus);
        assert_eq!(bus.subscriber_count(), 1);
        drop(eye);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
