//! # Scroll 模块
//!
//! 与滚动相关的计算：
//!
//! - [`SmoothScroll`]：平滑滚动位置（lerp 跟随 + 带缓动的 scroll-to）
//! - [`scroll_progress`] / [`map_range`]：视差进度
//! - [`ScrollSpy`]：导航栏当前区块
//! - [`NavbarChrome`]：导航栏背景模糊与不透明度
//! - [`Throttle`]：首次立即执行、期间最后一次延后执行的节流

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::clock::frame_factor;
use crate::easing::EasingFunction;
use crate::error::{MotionResult, check_unit_factor};
use crate::geometry::Rect;
use crate::scheduler::{FrameDriven, LoopControl};

/// 每参考帧跟随比例
pub const SCROLL_LERP: f32 = 0.1;
/// 距离低于该值时吸附
pub const SCROLL_SNAP: f32 = 0.1;
/// 最后一次输入后保持“滚动中”的时长
pub const SCROLLING_WINDOW: Duration = Duration::from_millis(150);
/// 跳转到区块时预留给导航栏的偏移
pub const SCROLL_TO_OFFSET: f32 = -80.0;
pub const SCROLL_TO_DURATION: Duration = Duration::from_millis(1200);

/// 滚动方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
    #[default]
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ScrollAnimation {
    from: f32,
    to: f32,
    started_at: Duration,
    duration: Duration,
    easing: EasingFunction,
}

/// 平滑滚动
#[derive(Debug, Clone)]
pub struct SmoothScroll {
    current: f32,
    target: f32,
    max_scroll: f32,
    velocity: f32,
    direction: ScrollDirection,
    last_input: Option<Duration>,
    animation: Option<ScrollAnimation>,
    locked: bool,
    lerp: f32,
    now: Duration,
}

impl SmoothScroll {
    pub fn new(max_scroll: f32) -> Self {
        Self {
            current: 0.0,
            target: 0.0,
            max_scroll: max_scroll.max(0.0),
            velocity: 0.0,
            direction: ScrollDirection::Idle,
            last_input: None,
            animation: None,
            locked: false,
            lerp: SCROLL_LERP,
            now: Duration::ZERO,
        }
    }

    /// 自定义跟随比例
    pub fn with_lerp(mut self, lerp: f32) -> MotionResult<Self> {
        check_unit_factor("scroll.lerp", lerp)?;
        self.lerp = lerp;
        Ok(self)
    }

    pub fn position(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    /// 每秒像素
    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn direction(&self) -> ScrollDirection {
        self.direction
    }

    pub fn is_scrolling(&self) -> bool {
        self.animation.is_some()
            || self
                .last_input
                .is_some_and(|at| self.now.saturating_sub(at) < SCROLLING_WINDOW)
    }

    pub fn set_max_scroll(&mut self, max_scroll: f32) {
        self.max_scroll = max_scroll.max(0.0);
        self.target = self.target.clamp(0.0, self.max_scroll);
        self.current = self.current.clamp(0.0, self.max_scroll);
    }

    /// 锁定滚动（展开层打开时）
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// 滚轮输入
    pub fn wheel(&mut self, delta: f32, now: Duration) {
        if self.locked {
            return;
        }
        self.animation = None;
        self.target = (self.target + delta).clamp(0.0, self.max_scroll);
        self.last_input = Some(now);
    }

    /// 原生滚动（拖动滚动条等），立即同步
    pub fn jump(&mut self, position: f32, now: Duration) {
        if self.locked {
            return;
        }
        self.animation = None;
        let position = position.clamp(0.0, self.max_scroll);
        self.target = position;
        self.current = position;
        self.last_input = Some(now);
    }

    /// 带缓动滚动到某个位置（已计入导航栏偏移）
    pub fn scroll_to(&mut self, position: f32, now: Duration) {
        if self.locked {
            return;
        }
        let to = (position + SCROLL_TO_OFFSET).clamp(0.0, self.max_scroll);
        debug!(from = self.current, to, "滚动到目标位置");
        self.animation = Some(ScrollAnimation {
            from: self.current,
            to,
            started_at: now,
            duration: SCROLL_TO_DURATION,
            easing: EasingFunction::EaseOutQuad,
        });
        self.target = to;
        self.last_input = Some(now);
    }

    /// 推进一帧，返回位置是否改变
    pub fn frame(&mut self, now: Duration, dt: Duration) -> bool {
        self.now = now;
        let before = self.current;

        if let Some(anim) = self.animation {
            let elapsed = now.saturating_sub(anim.started_at);
            let t = elapsed.as_secs_f32() / anim.duration.as_secs_f32();
            self.current = anim.from + (anim.to - anim.from) * anim.easing.apply(t);
            if elapsed >= anim.duration {
                self.current = anim.to;
                self.animation = None;
            }
        } else {
            let diff = self.target - self.current;
            if diff.abs() < SCROLL_SNAP {
                self.current = self.target;
            } else {
                self.current += diff * frame_factor(self.lerp, dt);
            }
        }

        let moved = self.current - before;
        self.velocity = if dt.is_zero() {
            0.0
        } else {
            moved / dt.as_secs_f32()
        };
        self.direction = if moved > 0.0 {
            ScrollDirection::Down
        } else if moved < 0.0 {
            ScrollDirection::Up
        } else {
            ScrollDirection::Idle
        };
        moved != 0.0
    }
}

impl FrameDriven for SmoothScroll {
    fn on_frame(&mut self, now: Duration, dt: Duration) -> LoopControl {
        self.frame(now, dt);
        LoopControl::Continue
    }
}

/// 区块穿过视口的进度
///
/// `rect` 为视口坐标。区块顶部刚进入视口底部时为 0，底部离开视口顶部时为 1。
pub fn scroll_progress(rect: &Rect, viewport_height: f32) -> f32 {
    let span = viewport_height + rect.height;
    if span <= 0.0 {
        return 0.0;
    }
    ((viewport_height - rect.y) / span).clamp(0.0, 1.0)
}

/// 把 `value` 从输入区间线性映射到输出区间，超出部分截断
pub fn map_range(value: f32, input: (f32, f32), output: (f32, f32)) -> f32 {
    let (in_start, in_end) = input;
    let (out_start, out_end) = output;
    if (in_end - in_start).abs() < f32::EPSILON {
        return if value < in_start { out_start } else { out_end };
    }
    let t = ((value - in_start) / (in_end - in_start)).clamp(0.0, 1.0);
    out_start + (out_end - out_start) * t
}

/// 项目区块的视差：上移 50px，前 30% 进度内淡入
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Parallax {
    pub offset_y: f32,
    pub opacity: f32,
}

impl Parallax {
    pub fn from_progress(progress: f32) -> Self {
        Self {
            offset_y: map_range(progress, (0.0, 1.0), (0.0, -50.0)),
            opacity: map_range(progress, (0.0, 0.3), (0.0, 1.0)),
        }
    }
}

/// 导航栏导航项对应的区块
#[derive(Debug, Clone, PartialEq)]
pub struct SpySection {
    pub id: String,
    /// 文档坐标
    pub top: f32,
    pub height: f32,
}

/// 导航栏当前区块判定
#[derive(Debug, Clone)]
pub struct ScrollSpy {
    sections: Vec<SpySection>,
    navbar_height: Option<f32>,
    default_section: String,
    active: String,
}

impl ScrollSpy {
    /// 测不到导航栏高度时的回退值
    pub const FALLBACK_NAVBAR_HEIGHT: f32 = 80.0;
    /// 判定线在导航栏下方多少像素
    pub const DETECTION_MARGIN: f32 = 100.0;
    /// 距底部多少像素以内视为到底
    pub const BOTTOM_TOLERANCE: f32 = 5.0;

    pub fn new(sections: Vec<SpySection>, default_section: &str) -> Self {
        Self {
            sections,
            navbar_height: None,
            default_section: default_section.to_string(),
            active: default_section.to_string(),
        }
    }

    pub fn set_navbar_height(&mut self, height: Option<f32>) {
        self.navbar_height = height.filter(|h| *h > 0.0);
    }

    pub fn active(&self) -> &str {
        &self.active
    }

    pub fn detection_offset(&self) -> f32 {
        self.navbar_height.unwrap_or(Self::FALLBACK_NAVBAR_HEIGHT) + Self::DETECTION_MARGIN
    }

    /// 根据滚动位置重新判定，变化时返回新的区块 id
    pub fn update(&mut self, scroll_y: f32, viewport_height: f32, document_height: f32) -> Option<&str> {
        let offset = self.detection_offset();
        let at_bottom = (viewport_height + scroll_y - document_height).abs() < Self::BOTTOM_TOLERANCE;
        let last = self.sections.len().saturating_sub(1);

        let current = self
            .sections
            .iter()
            .enumerate()
            .find(|(i, s)| {
                let bottom = s.top + s.height;
                (scroll_y >= s.top - offset && scroll_y < bottom - offset) || (at_bottom && *i == last)
            })
            .map_or(self.default_section.as_str(), |(_, s)| s.id.as_str())
            .to_string();

        if current == self.active {
            return None;
        }
        debug!(from = %self.active, to = %current, "当前区块变化");
        self.active = current;
        Some(self.active.as_str())
    }
}

/// 导航栏外观
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NavbarChrome {
    pub scrolled: bool,
    /// 背景模糊半径（px）
    pub blur: f32,
    pub background_opacity: f32,
}

impl NavbarChrome {
    pub const SCROLLED_AFTER: f32 = 50.0;
    const RAMP: f32 = 200.0;
    const MAX_BLUR: f32 = 10.0;
    const MAX_OPACITY: f32 = 0.8;

    pub fn from_scroll(scroll_y: f32) -> Self {
        let y = scroll_y.max(0.0);
        Self {
            scrolled: y > Self::SCROLLED_AFTER,
            blur: (y / Self::RAMP * Self::MAX_BLUR).min(Self::MAX_BLUR),
            background_opacity: (y / Self::RAMP * Self::MAX_OPACITY).min(Self::MAX_OPACITY),
        }
    }
}

/// 节流
///
/// 空闲时调用立即执行；节流窗口内的调用合并为窗口结束时的一次尾调用。
#[derive(Debug, Clone)]
pub struct Throttle {
    limit: Duration,
    last_ran: Option<Duration>,
    trailing: bool,
}

impl Throttle {
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            last_ran: None,
            trailing: false,
        }
    }

    /// 发起一次调用，返回是否应立即执行
    pub fn call(&mut self, now: Duration) -> bool {
        match self.last_ran {
            Some(last) if now.saturating_sub(last) < self.limit => {
                self.trailing = true;
                false
            }
            _ => {
                self.last_ran = Some(now);
                self.trailing = false;
                true
            }
        }
    }

    /// 尾调用是否到期；到期时返回 true 并清除
    pub fn poll(&mut self, now: Duration) -> bool {
        let Some(last) = self.last_ran else {
            return false;
        };
        if self.trailing && now.saturating_sub(last) >= self.limit {
            self.trailing = false;
            self.last_ran = Some(now);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::REFERENCE_FRAME;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_wheel_lerp_and_snap() {
        let mut scroll = SmoothScroll::new(5000.0);
        scroll.wheel(100.0, ms(0));
        assert!(scroll.frame(REFERENCE_FRAME, REFERENCE_FRAME));
        assert!((scroll.position() - 10.0).abs() < 0.01);
        assert_eq!(scroll.direction(), ScrollDirection::Down);
        assert!(scroll.is_scrolling());

        let mut now = REFERENCE_FRAME;
        for _ in 0..200 {
            now += REFERENCE_FRAME;
            scroll.frame(now, REFERENCE_FRAME);
        }
        assert_eq!(scroll.position(), 100.0);
        assert!(!scroll.is_scrolling());
        assert_eq!(scroll.direction(), ScrollDirection::Idle);
    }

    #[test]
    fn test_wheel_clamped_and_locked() {
        let mut scroll = SmoothScroll::new(300.0);
        scroll.wheel(-50.0, ms(0));
        assert_eq!(scroll.target(), 0.0);
        scroll.wheel(1000.0, ms(0));
        assert_eq!(scroll.target(), 300.0);

        scroll.set_locked(true);
        scroll.wheel(-100.0, ms(10));
        assert_eq!(scroll.target(), 300.0);
    }

    #[test]
    fn test_custom_lerp() {
        assert!(SmoothScroll::new(100.0).with_lerp(0.0).is_err());
        let mut fast = SmoothScroll::new(1000.0).with_lerp(1.0).unwrap();
        fast.wheel(200.0, Duration::ZERO);
        fast.frame(REFERENCE_FRAME, REFERENCE_FRAME);
        assert!((fast.position() - 200.0).abs() < 1e-3);
    }

    #[test]
    fn test_scroll_to_applies_offset() {
        let mut scroll = SmoothScroll::new(5000.0);
        scroll.scroll_to(1080.0, ms(0));
        scroll.frame(ms(600), ms(600));
        assert!(scroll.position() > 500.0 && scroll.position() < 1000.0);
        scroll.frame(ms(1200), ms(600));
        assert_eq!(scroll.position(), 1000.0);
        assert!(!scroll.is_scrolling());
    }

    #[test]
    fn test_scroll_progress() {
        // 刚进入底部
        assert_eq!(scroll_progress(&Rect::new(0.0, 800.0, 100.0, 400.0), 800.0), 0.0);
        // 完全离开顶部
        assert_eq!(scroll_progress(&Rect::new(0.0, -400.0, 100.0, 400.0), 800.0), 1.0);
        // 中间
        assert_eq!(scroll_progress(&Rect::new(0.0, 200.0, 100.0, 400.0), 800.0), 0.5);
    }

    #[test]
    fn test_parallax() {
        let start = Parallax::from_progress(0.0);
        assert_eq!(start.opacity, 0.0);
        let p = Parallax::from_progress(0.5);
        assert_eq!(p.offset_y, -25.0);
        assert_eq!(p.opacity, 1.0);
    }

    fn sections() -> Vec<SpySection> {
        ["home", "about", "projects", "contact"]
            .iter()
            .enumerate()
            .map(|(i, id)| SpySection {
                id: id.to_string(),
                top: i as f32 * 1000.0,
                height: 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_scroll_spy() {
        let mut spy = ScrollSpy::new(sections(), "home");
        assert_eq!(spy.detection_offset(), 180.0);

        assert_eq!(spy.update(0.0, 800.0, 4000.0), None);
        // 判定线越过 about 顶部
        assert_eq!(spy.update(820.0, 800.0, 4000.0), Some("about"));
        assert_eq!(spy.update(900.0, 800.0, 4000.0), None);
        // 到底时强制最后一个区块
        assert_eq!(spy.update(3198.0, 800.0, 4000.0), Some("contact"));

        spy.set_navbar_height(Some(64.0));
        assert_eq!(spy.detection_offset(), 164.0);
    }

    #[test]
    fn test_navbar_chrome() {
        let top = NavbarChrome::from_scroll(0.0);
        assert!(!top.scrolled);
        assert_eq!(top.blur, 0.0);

        let mid = NavbarChrome::from_scroll(100.0);
        assert!(mid.scrolled);
        assert_eq!(mid.blur, 5.0);
        assert!((mid.background_opacity - 0.4).abs() < 1e-6);

        let far = NavbarChrome::from_scroll(1000.0);
        assert_eq!(far.blur, 10.0);
        assert_eq!(far.background_opacity, 0.8);
    }

    #[test]
    fn test_throttle_leading_and_trailing() {
        let mut throttle = Throttle::new(ms(100));
        assert!(throttle.call(ms(0)));
        assert!(!throttle.call(ms(30)));
        assert!(!throttle.call(ms(60)));
        assert!(!throttle.poll(ms(99)));
        assert!(throttle.poll(ms(100)));
        assert!(!throttle.poll(ms(150)));
        // 窗口已过，立即执行
        assert!(throttle.call(ms(250)));
    }
}
