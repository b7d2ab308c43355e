//! 加载界面的派生视觉量
//!
//! 只由进度、阶段和阶段内经过时间计算，不保存任何状态。

use std::time::Duration;

use serde::Serialize;

use super::LoadingPhase;
use crate::easing::EasingFunction;

/// 分段进度条的段数
pub const SEGMENT_COUNT: usize = 80;

/// 段展开时横向拉伸倍数
const SEGMENT_STRETCH: f32 = 8.0;
const SEGMENT_STRETCH_DURATION: Duration = Duration::from_millis(600);
const CURTAIN_SLIDE: Duration = Duration::from_millis(600);

const CURTAIN_EASING: EasingFunction = EasingFunction::CubicBezier {
    x1: 0.65,
    y1: 0.0,
    x2: 0.35,
    y2: 1.0,
};

/// 单段状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SegmentState {
    Initial,
    Past,
    Active,
    Expanding,
}

impl SegmentState {
    pub fn opacity(&self) -> f32 {
        match self {
            SegmentState::Initial => 0.2,
            SegmentState::Past => 0.7,
            SegmentState::Active | SegmentState::Expanding => 1.0,
        }
    }
}

/// 某一时刻的视觉快照
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoadingVisuals {
    pub progress: f32,
    /// 百分比文字，四舍五入
    pub percent_label: u32,
    /// 当前高亮段；100% 时等于 `SEGMENT_COUNT`（全部为 past）
    pub active_segment: usize,
    /// 眼睛瞳孔透明度，进度 20% 之后开始显现
    pub pupil_opacity: f32,
    /// 三角形描边进度 [0, 1]
    pub triangle_progress: f32,
    /// 经典变体里容器随进度轻微放大
    pub container_scale: f32,
    pub expanding: bool,
    pub auxiliary_faded: bool,
    /// 幕布纵向偏移（视口高度的比例）：1 为完全在下方，0 为完全覆盖
    pub curtain_offset: f32,
    phase: LoadingPhase,
    phase_elapsed: Duration,
}

impl LoadingVisuals {
    pub fn new(progress: f32, phase: LoadingPhase, phase_elapsed: Duration) -> Self {
        let progress = progress.clamp(0.0, 100.0);
        let curtain_offset = match phase {
            LoadingPhase::Curtain => {
                let t = phase_elapsed.as_secs_f32() / CURTAIN_SLIDE.as_secs_f32();
                1.0 - CURTAIN_EASING.apply(t)
            }
            LoadingPhase::Done => 0.0,
            _ => 1.0,
        };

        Self {
            progress,
            percent_label: progress.round() as u32,
            active_segment: ((progress / 100.0) * SEGMENT_COUNT as f32).floor() as usize,
            pupil_opacity: ((progress - 20.0) / 80.0).clamp(0.0, 1.0),
            triangle_progress: progress / 100.0,
            container_scale: 1.0 + progress / 100.0 * 0.05,
            expanding: phase >= LoadingPhase::Expanding,
            auxiliary_faded: phase >= LoadingPhase::Fading,
            curtain_offset,
            phase,
            phase_elapsed,
        }
    }

    pub fn segment_state(&self, index: usize) -> SegmentState {
        if self.expanding {
            SegmentState::Expanding
        } else if index == self.active_segment {
            SegmentState::Active
        } else if index < self.active_segment {
            SegmentState::Past
        } else {
            SegmentState::Initial
        }
    }

    /// 展开阶段单段的横向缩放，从中间向两侧依次拉伸
    pub fn segment_scale_x(&self, index: usize) -> f32 {
        if self.phase != LoadingPhase::Expanding {
            return if self.phase > LoadingPhase::Expanding {
                SEGMENT_STRETCH
            } else {
                1.0
            };
        }
        let delay = segment_expansion_delay(index);
        let local = self.phase_elapsed.saturating_sub(delay);
        let t = local.as_secs_f32() / SEGMENT_STRETCH_DURATION.as_secs_f32();
        1.0 + (SEGMENT_STRETCH - 1.0) * EasingFunction::ENTRANCE.apply(t)
    }
}

/// 首次出现时的错峰延迟
pub fn segment_appear_delay(index: usize) -> Duration {
    Duration::from_millis(index as u64 * 10)
}

/// 展开时的错峰延迟，离中心越远越晚
pub fn segment_expansion_delay(index: usize) -> Duration {
    let center = SEGMENT_COUNT / 2;
    Duration::from_millis(index.abs_diff(center) as u64 * 20)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_values() {
        let v = LoadingVisuals::new(60.4, LoadingPhase::Running, Duration::ZERO);
        assert_eq!(v.percent_label, 60);
        assert_eq!(v.active_segment, 48);
        assert!((v.pupil_opacity - 0.505).abs() < 1e-3);
        assert!((v.triangle_progress - 0.604).abs() < 1e-4);
        assert!(!v.expanding);
        assert_eq!(v.curtain_offset, 1.0);
    }

    #[test]
    fn test_segment_states() {
        let v = LoadingVisuals::new(50.0, LoadingPhase::Running, Duration::ZERO);
        assert_eq!(v.segment_state(39), SegmentState::Past);
        assert_eq!(v.segment_state(40), SegmentState::Active);
        assert_eq!(v.segment_state(41), SegmentState::Initial);

        let full = LoadingVisuals::new(100.0, LoadingPhase::Holding, Duration::ZERO);
        assert_eq!(full.active_segment, SEGMENT_COUNT);
        assert!((0..SEGMENT_COUNT).all(|i| full.segment_state(i) == SegmentState::Past));

        let exp = LoadingVisuals::new(100.0, LoadingPhase::Expanding, Duration::ZERO);
        assert_eq!(exp.segment_state(3), SegmentState::Expanding);
    }

    #[test]
    fn test_expansion_stagger() {
        assert_eq!(segment_expansion_delay(40), Duration::ZERO);
        assert_eq!(segment_expansion_delay(0), Duration::from_millis(800));
        assert_eq!(segment_appear_delay(79), Duration::from_millis(790));

        let v = LoadingVisuals::new(100.0, LoadingPhase::Expanding, Duration::from_millis(100));
        // 中间的段已经开始拉伸，边缘的还没有
        assert!(v.segment_scale_x(40) > 1.0);
        assert_eq!(v.segment_scale_x(0), 1.0);
    }

    #[test]
    fn test_curtain_slide() {
        let start = LoadingVisuals::new(100.0, LoadingPhase::Curtain, Duration::ZERO);
        let end = LoadingVisuals::new(100.0, LoadingPhase::Curtain, Duration::from_millis(600));
        assert!((start.curtain_offset - 1.0).abs() < 1e-5);
        assert!(end.curtain_offset.abs() < 1e-5);
    }
}
