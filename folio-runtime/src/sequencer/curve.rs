//! 加载进度曲线

use serde::{Deserialize, Serialize};

use crate::easing::{EasingFunction, ease_in_out_cubic};
use crate::error::{MotionError, MotionResult};

/// 时间进度 → 加载进度的映射
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ProgressCurve {
    /// 直接使用缓动函数
    Eased { easing: EasingFunction },
    /// 两段式：`t < knee` 时用缓入缓出爬到 `plateau`，之后线性冲到 1
    Knee { knee: f32, plateau: f32 },
}

impl ProgressCurve {
    pub const CUBIC_IN_OUT: Self = Self::Eased {
        easing: EasingFunction::EaseInOutCubic,
    };

    /// 幕布变体使用的曲线：95% 的时间走到 90%，最后 5% 冲刺
    pub const CURTAIN_KNEE: Self = Self::Knee {
        knee: 0.95,
        plateau: 0.9,
    };

    /// 输入 `t ∈ [0, 1]`，输出 `[0, 1]`，单调不减
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match *self {
            ProgressCurve::Eased { easing } => easing.apply(t),
            ProgressCurve::Knee { knee, plateau } => {
                if t < knee {
                    plateau * ease_in_out_cubic(t / knee)
                } else {
                    plateau + (t - knee) / (1.0 - knee) * (1.0 - plateau)
                }
            }
        }
    }

    pub fn validate(&self) -> MotionResult<()> {
        match *self {
            ProgressCurve::Eased { .. } => Ok(()),
            ProgressCurve::Knee { knee, plateau } => {
                if !(knee > 0.0 && knee < 1.0) {
                    return Err(MotionError::factor("curve.knee", knee, "(0, 1)"));
                }
                if !(plateau > 0.0 && plateau <= 1.0) {
                    return Err(MotionError::factor("curve.plateau", plateau, "(0, 1]"));
                }
                Ok(())
            }
        }
    }
}

impl Default for ProgressCurve {
    fn default() -> Self {
        Self::CUBIC_IN_OUT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knee_shape() {
        let curve = ProgressCurve::CURTAIN_KNEE;
        assert_eq!(curve.apply(0.0), 0.0);
        assert!((curve.apply(0.95) - 0.9).abs() < 1e-5);
        assert!((curve.apply(1.0) - 1.0).abs() < 1e-5);
        // 前半段缓入缓出，中点恰好是 plateau 的一半
        assert!((curve.apply(0.475) - 0.45).abs() < 1e-4);
    }

    #[test]
    fn test_knee_monotonic() {
        let curve = ProgressCurve::CURTAIN_KNEE;
        let mut prev = 0.0;
        for i in 0..=1000 {
            let v = curve.apply(i as f32 / 1000.0);
            assert!(v + 1e-6 >= prev, "在 t={} 处回退", i as f32 / 1000.0);
            prev = v;
        }
    }

    #[test]
    fn test_validate() {
        assert!(ProgressCurve::CURTAIN_KNEE.validate().is_ok());
        assert!(
            ProgressCurve::Knee {
                knee: 1.0,
                plateau: 0.9
            }
            .validate()
            .is_err()
        );
    }
}
