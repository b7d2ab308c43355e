//! # Pointer 模块
//!
//! 指针跟随：装饰元素（眼睛瞳孔）朝指针方向偏移，偏移受形状约束，
//! 逐帧平滑逼近目标。
//!
//! 锚点中心被缓存，只在布局变化（resize / scroll / 进入视口 / 挂载后的几次延时）时刷新，
//! 指针移动时不读取布局。

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::clock::frame_factor;
use crate::error::{MotionResult, check_positive, check_unit_factor};
use crate::geometry::{Rect, Vec2};

/// 挂载后额外刷新锚点的延时，等待字体与布局稳定
pub const ANCHOR_REFRESH_DELAYS: [Duration; 3] = [
    Duration::from_millis(100),
    Duration::from_millis(300),
    Duration::from_millis(600),
];

/// 进入视口多少比例后刷新锚点
pub const ANCHOR_VISIBILITY_THRESHOLD: f32 = 0.1;

/// 偏移约束形状，尺寸都以锚点尺寸的比例表示
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "shape")]
pub enum OffsetBound {
    /// 圆：半径 = `radius * 锚点宽度`
    Circle { radius: f32 },
    /// 椭圆
    Ellipse { rx: f32, ry: f32 },
    /// 矩形：各轴独立截断
    Box { half_width: f32, half_height: f32 },
}

impl OffsetBound {
    fn extents(&self, anchor: &Rect) -> (f32, f32) {
        match *self {
            OffsetBound::Circle { radius } => (radius * anchor.width, radius * anchor.width),
            OffsetBound::Ellipse { rx, ry } => (rx * anchor.width, ry * anchor.height),
            OffsetBound::Box {
                half_width,
                half_height,
            } => (half_width * anchor.width, half_height * anchor.height),
        }
    }

    /// 把偏移限制在形状内
    pub fn clamp(&self, offset: Vec2, anchor: &Rect) -> Vec2 {
        let (ex, ey) = self.extents(anchor);
        match self {
            OffsetBound::Box { .. } => Vec2::new(offset.x.clamp(-ex, ex), offset.y.clamp(-ey, ey)),
            OffsetBound::Circle { .. } | OffsetBound::Ellipse { .. } => {
                if ex <= 0.0 || ey <= 0.0 {
                    return Vec2::zero();
                }
                let nx = offset.x / ex;
                let ny = offset.y / ey;
                let norm = nx.hypot(ny);
                if norm > 1.0 {
                    Vec2::new(offset.x / norm, offset.y / norm)
                } else {
                    offset
                }
            }
        }
    }

    /// 偏移是否在形状内（含 1e-3 容差）
    pub fn contains(&self, offset: Vec2, anchor: &Rect) -> bool {
        let (ex, ey) = self.extents(anchor);
        match self {
            OffsetBound::Box { .. } => offset.x.abs() <= ex + 1e-3 && offset.y.abs() <= ey + 1e-3,
            OffsetBound::Circle { .. } | OffsetBound::Ellipse { .. } => {
                if ex <= 0.0 || ey <= 0.0 {
                    return offset.length() <= 1e-3;
                }
                (offset.x / ex).hypot(offset.y / ey) <= 1.0 + 1e-3
            }
        }
    }
}

/// 跟随参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// 指针相对锚点中心的位移乘以该系数作为目标偏移
    pub sensitivity: f32,
    pub bound: OffsetBound,
    /// 每个 60Hz 参考帧向目标靠近的比例
    pub smoothing: f32,
    /// 当前偏移与目标距离低于该值时不再输出
    pub rest_threshold: f32,
}

impl TrackerConfig {
    /// 圆点瞳孔
    pub fn dot_eye() -> Self {
        Self {
            sensitivity: 0.15,
            bound: OffsetBound::Circle { radius: 0.2 },
            smoothing: 0.15,
            rest_threshold: 0.01,
        }
    }

    /// 三角形眼睛
    pub fn triangle_eye() -> Self {
        Self {
            sensitivity: 0.1,
            bound: OffsetBound::Box {
                half_width: 0.15,
                half_height: 0.1,
            },
            smoothing: 0.2,
            rest_threshold: 0.01,
        }
    }

    pub fn validate(&self) -> MotionResult<()> {
        check_positive("tracker.sensitivity", self.sensitivity)?;
        check_unit_factor("tracker.smoothing", self.smoothing)?;
        check_positive("tracker.rest_threshold", self.rest_threshold)
    }
}

/// 指针跟随器
#[derive(Debug, Clone)]
pub struct PointerTracker {
    config: TrackerConfig,
    anchor: Option<Rect>,
    target: Vec2,
    current: Vec2,
    suspended: bool,
}

impl PointerTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            anchor: None,
            target: Vec2::zero(),
            current: Vec2::zero(),
            suspended: false,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn anchor(&self) -> Option<Rect> {
        self.anchor
    }

    pub fn current(&self) -> Vec2 {
        self.current
    }

    pub fn target(&self) -> Vec2 {
        self.target
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// 刷新缓存的锚点
    ///
    /// 宽或高为 0 的矩形（元素未布局、被隐藏）会被忽略，保留上一次的有效锚点。
    /// 返回是否采纳。
    pub fn refresh_anchor(&mut self, rect: Rect) -> bool {
        if rect.is_empty() {
            trace!(?rect, "忽略零尺寸锚点");
            return false;
        }
        self.anchor = Some(rect);
        self.target = self.config.bound.clamp(self.target, &rect);
        self.current = self.config.bound.clamp(self.current, &rect);
        true
    }

    /// 指针移动
    ///
    /// 没有锚点或暂停时忽略。
    pub fn pointer_moved(&mut self, position: Vec2) {
        if self.suspended {
            return;
        }
        let Some(anchor) = self.anchor else {
            return;
        };
        let delta = (position - anchor.center()) * self.config.sensitivity;
        self.target = self.config.bound.clamp(delta, &anchor);
    }

    /// 暂停跟随（展开动画期间）
    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn resume(&mut self) {
        self.suspended = false;
    }

    /// 推进一帧
    ///
    /// 当前偏移与目标的距离超过静止阈值时返回新的偏移，否则返回 None。
    pub fn frame(&mut self, dt: Duration) -> Option<Vec2> {
        let anchor = self.anchor?;
        if self.current.distance(self.target) <= self.config.rest_threshold {
            return None;
        }
        let factor = frame_factor(self.config.smoothing, dt);
        let next = self.current.lerp(self.target, factor);
        self.current = self.config.bound.clamp(next, &anchor);
        Some(self.current)
    }

    /// 是否已静止
    pub fn is_at_rest(&self) -> bool {
        self.current.distance(self.target) <= self.config.rest_threshold
    }
}
