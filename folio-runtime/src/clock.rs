//! # Clock 模块
//!
//! 单调时钟抽象。所有动画都只通过 `Clock::now()` 读取时间，
//! 进度永远由经过的时间计算，而不是累加帧数。

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

/// 单调时钟
///
/// 返回值是相对于时钟原点的经过时长，保证单调不减。
pub trait Clock {
    fn now(&self) -> Duration;
}

/// 手动推进的时钟（测试与 headless 回放）
///
/// clone 出来的句柄共享同一时间值。
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// 向前推进
    pub fn advance(&self, delta: Duration) {
        self.now.set(self.now.get() + delta);
    }

    /// 推进到指定时刻；早于当前时刻时保持不动
    pub fn advance_to(&self, at: Duration) {
        if at > self.now.get() {
            self.now.set(at);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// 60Hz 参考帧间隔，用于把“每帧系数”换算成与帧率无关的形式
pub const REFERENCE_FRAME: Duration = Duration::from_micros(16_667);

/// 把按 60Hz 标定的每帧插值系数换算到任意帧间隔
///
/// `1 - (1 - factor)^(dt / 16.667ms)`
pub fn frame_factor(factor: f32, dt: Duration) -> f32 {
    if dt.is_zero() {
        return 0.0;
    }
    let frames = dt.as_secs_f32() / REFERENCE_FRAME.as_secs_f32();
    1.0 - (1.0 - factor.clamp(0.0, 1.0)).powf(frames)
}
