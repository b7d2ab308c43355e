//! # Easing 模块
//!
//! 缓动函数库。所有函数输入 `t` 都会被限制在 [0, 1]，并满足 f(0)=0、f(1)=1。

use serde::{Deserialize, Serialize};

/// 缓动函数类型
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum EasingFunction {
    /// 线性
    Linear,
    /// 三次缓入缓出（两头慢中间快）
    #[default]
    EaseInOutCubic,
    /// 三次缓出缓入（两头快中间慢）
    EaseOutInCubic,
    /// 二次缓出，页面滚动的默认曲线
    EaseOutQuad,
    /// 三次缓出
    EaseOutCubic,
    /// CSS `cubic-bezier(x1, y1, x2, y2)`
    CubicBezier { x1: f32, y1: f32, x2: f32, y2: f32 },
}

impl EasingFunction {
    /// 进入动画常用的 `cubic-bezier(0.25, 0.46, 0.45, 0.94)`
    pub const ENTRANCE: Self = Self::CubicBezier {
        x1: 0.25,
        y1: 0.46,
        x2: 0.45,
        y2: 0.94,
    };

    /// 计算缓动值
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);

        match *self {
            EasingFunction::Linear => t,
            EasingFunction::EaseInOutCubic => ease_in_out_cubic(t),
            EasingFunction::EaseOutInCubic => {
                // 以中点对称翻转缓入缓出
                if t < 0.5 {
                    0.5 * ease_out_cubic(t * 2.0)
                } else {
                    0.5 + 0.5 * ease_in_cubic(t * 2.0 - 1.0)
                }
            }
            EasingFunction::EaseOutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            EasingFunction::EaseOutCubic => ease_out_cubic(t),
            EasingFunction::CubicBezier { x1, y1, x2, y2 } => {
                UnitBezier::new(x1, y1, x2, y2).solve(t)
            }
        }
    }
}

fn ease_in_cubic(t: f32) -> f32 {
    t * t * t
}

fn ease_out_cubic(t: f32) -> f32 {
    1.0 - (1.0 - t).powi(3)
}

pub(crate) fn ease_in_out_cubic(t: f32) -> f32 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// 起点 (0,0)、终点 (1,1) 的三次贝塞尔曲线
///
/// 给定 x 求 y：先用牛顿迭代解参数 s，失败时退回二分。
struct UnitBezier {
    ax: f32,
    bx: f32,
    cx: f32,
    ay: f32,
    by: f32,
    cy: f32,
}

impl UnitBezier {
    const EPSILON: f32 = 1e-6;

    fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        let x1 = x1.clamp(0.0, 1.0);
        let x2 = x2.clamp(0.0, 1.0);
        let cx = 3.0 * x1;
        let bx = 3.0 * (x2 - x1) - cx;
        let ax = 1.0 - cx - bx;
        let cy = 3.0 * y1;
        let by = 3.0 * (y2 - y1) - cy;
        let ay = 1.0 - cy - by;
        Self {
            ax,
            bx,
            cx,
            ay,
            by,
            cy,
        }
    }

    fn sample_x(&self, s: f32) -> f32 {
        ((self.ax * s + self.bx) * s + self.cx) * s
    }

    fn sample_y(&self, s: f32) -> f32 {
        ((self.ay * s + self.by) * s + self.cy) * s
    }

    fn sample_dx(&self, s: f32) -> f32 {
        (3.0 * self.ax * s + 2.0 * self.bx) * s + self.cx
    }

    fn solve_s(&self, x: f32) -> f32 {
        let mut s = x;
        for _ in 0..8 {
            let err = self.sample_x(s) - x;
            if err.abs() < Self::EPSILON {
                return s;
            }
            let d = self.sample_dx(s);
            if d.abs() < Self::EPSILON {
                break;
            }
            s -= err / d;
        }

        let (mut lo, mut hi) = (0.0_f32, 1.0_f32);
        s = x;
        for _ in 0..32 {
            let value = self.sample_x(s);
            if (value - x).abs() < Self::EPSILON {
                break;
            }
            if x > value {
                lo = s;
            } else {
                hi = s;
            }
            s = (lo + hi) / 2.0;
        }
        s
    }

    fn solve(&self, x: f32) -> f32 {
        if x <= 0.0 {
            return 0.0;
        }
        if x >= 1.0 {
            return 1.0;
        }
        self.sample_y(self.solve_s(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [EasingFunction; 6] = [
        EasingFunction::Linear,
        EasingFunction::EaseInOutCubic,
        EasingFunction::EaseOutInCubic,
        EasingFunction::EaseOutQuad,
        EasingFunction::EaseOutCubic,
        EasingFunction::ENTRANCE,
    ];

    #[test]
    fn test_endpoints() {
        for easing in ALL {
            assert!(easing.apply(0.0).abs() < 1e-5, "{easing:?}");
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-5, "{easing:?}");
        }
    }

    #[test]
    fn test_clamp() {
        let easing = EasingFunction::Linear;
        assert_eq!(easing.apply(-0.5), 0.0);
        assert_eq!(easing.apply(1.5), 1.0);
    }

    #[test]
    fn test_in_out_shapes() {
        // 缓入缓出：前段慢
        assert!(EasingFunction::EaseInOutCubic.apply(0.25) < 0.25);
        // 缓出缓入：前段快
        assert!(EasingFunction::EaseOutInCubic.apply(0.25) > 0.25);
        // 两者中点都是 0.5
        assert!((EasingFunction::EaseInOutCubic.apply(0.5) - 0.5).abs() < 1e-5);
        assert!((EasingFunction::EaseOutInCubic.apply(0.5) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_monotonic() {
        for easing in ALL {
            let mut prev = 0.0;
            for i in 0..=100 {
                let v = easing.apply(i as f32 / 100.0);
                assert!(v + 1e-4 >= prev, "{easing:?} 在 {i} 处回退");
                prev = v;
            }
        }
    }

    #[test]
    fn test_linear_bezier() {
        let easing = EasingFunction::CubicBezier {
            x1: 0.0,
            y1: 0.0,
            x2: 1.0,
            y2: 1.0,
        };
        assert!((easing.apply(0.3) - 0.3).abs() < 1e-3);
    }
}
