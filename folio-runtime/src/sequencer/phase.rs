//! 加载阶段与退场计划

use std::time::Duration;

use serde::Serialize;

/// 加载阶段
///
/// 顺序即先后：`Running` 由帧驱动，其余阶段由单个定时器驱动。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadingPhase {
    /// 进度条推进中
    Running,
    /// 进度 100% 后停留
    Holding,
    /// 眼睛/容器展开
    Expanding,
    /// 辅助元素淡出
    Fading,
    /// 幕布拉开（含收尾停顿）
    Curtain,
    /// 结束，已通知完成
    Done,
}

impl LoadingPhase {
    pub fn name(&self) -> &'static str {
        match self {
            LoadingPhase::Running => "running",
            LoadingPhase::Holding => "holding",
            LoadingPhase::Expanding => "expanding",
            LoadingPhase::Fading => "fading",
            LoadingPhase::Curtain => "curtain",
            LoadingPhase::Done => "done",
        }
    }
}

impl std::fmt::Display for LoadingPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 阶段切换记录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseChange {
    pub from: LoadingPhase,
    pub to: LoadingPhase,
    /// 切换的理论时刻（不是观察到切换的那一帧）
    pub at: Duration,
}

/// 进度到 100% 之后依次经历的阶段
///
/// 零时长阶段会被剔除。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExitPlan {
    steps: Vec<(LoadingPhase, Duration)>,
}

impl ExitPlan {
    pub fn new(steps: impl IntoIterator<Item = (LoadingPhase, Duration)>) -> Self {
        Self {
            steps: steps
                .into_iter()
                .filter(|(phase, duration)| {
                    !duration.is_zero() && !matches!(phase, LoadingPhase::Running | LoadingPhase::Done)
                })
                .collect(),
        }
    }

    pub fn steps(&self) -> &[(LoadingPhase, Duration)] {
        &self.steps
    }

    pub fn get(&self, index: usize) -> Option<(LoadingPhase, Duration)> {
        self.steps.get(index).copied()
    }

    /// 退场总时长
    pub fn total(&self) -> Duration {
        self.steps.iter().map(|(_, d)| *d).sum()
    }
}
