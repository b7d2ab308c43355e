//! # Sequencer 模块
//!
//! 加载序列：进度条推进 → 停留 →（展开 → 淡出 → 幕布）→ 完成。
//!
//! ## 结构
//!
//! - [`LoadingSequence`]：纯状态机，只根据传入的时刻推进，便于单独测试
//! - [`LoadingScreen`]：挂到 [`Scheduler`] 上的驱动器。进度阶段逐帧推进，
//!   退场阶段每个阶段只挂一个定时器；任一时刻最多一个待执行回调
//!
//! 两种变体共用同一个状态机，区别只在 [`SequencerConfig`] 预设：
//!
//! | 变体 | 时长（快速） | 曲线 | 退场 |
//! |------|-------------|------|------|
//! | classic | 2000ms（1200ms） | 三次缓入缓出 | 停留 300ms（150ms） |
//! | curtain | 2500ms（2000ms） | 拐点曲线 | 150 + 200 + 400 + 600 + 100ms |

mod curve;
mod phase;
mod visuals;

pub use curve::ProgressCurve;
pub use phase::{ExitPlan, LoadingPhase, PhaseChange};
pub use visuals::{
    LoadingVisuals, SEGMENT_COUNT, SegmentState, segment_appear_delay, segment_expansion_delay,
};

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::device::DeviceProfile;
use crate::error::{MotionError, MotionResult};
use crate::scheduler::{FrameCallbackId, Scheduler, TimerId};

/// 加载界面变体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadingVariant {
    /// 进度条 + 轻微放大，无退场动画
    Classic,
    /// 分段进度条 + 眼睛 + 展开/淡出/幕布
    #[default]
    Curtain,
}

impl LoadingVariant {
    pub fn config(&self, device: &DeviceProfile) -> SequencerConfig {
        match self {
            LoadingVariant::Classic => SequencerConfig::classic(device),
            LoadingVariant::Curtain => SequencerConfig::curtain(device),
        }
    }
}

/// 加载序列配置
#[derive(Debug, Clone, PartialEq)]
pub struct SequencerConfig {
    /// 进度从 0 到 100 的时长
    pub duration: Duration,
    pub curve: ProgressCurve,
    pub hold: Duration,
    pub expand: Duration,
    pub fade: Duration,
    pub curtain: Duration,
    /// 幕布之后、通知完成之前的停顿
    pub settle: Duration,
}

impl SequencerConfig {
    pub fn classic(device: &DeviceProfile) -> Self {
        let fast = device.prefers_fast();
        Self {
            duration: Duration::from_millis(if fast { 1200 } else { 2000 }),
            curve: ProgressCurve::CUBIC_IN_OUT,
            hold: Duration::from_millis(if fast { 150 } else { 300 }),
            expand: Duration::ZERO,
            fade: Duration::ZERO,
            curtain: Duration::ZERO,
            settle: Duration::ZERO,
        }
    }

    pub fn curtain(device: &DeviceProfile) -> Self {
        Self {
            duration: Duration::from_millis(if device.prefers_fast() { 2000 } else { 2500 }),
            curve: ProgressCurve::CURTAIN_KNEE,
            hold: Duration::from_millis(150),
            expand: Duration::from_millis(200),
            fade: Duration::from_millis(400),
            curtain: Duration::from_millis(600),
            settle: Duration::from_millis(100),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn exit_plan(&self) -> ExitPlan {
        ExitPlan::new([
            (LoadingPhase::Holding, self.hold),
            (LoadingPhase::Expanding, self.expand),
            (LoadingPhase::Fading, self.fade),
            (LoadingPhase::Curtain, self.curtain + self.settle),
        ])
    }

    pub fn validate(&self) -> MotionResult<()> {
        if self.duration.is_zero() {
            return Err(MotionError::duration("loading.duration", "必须大于 0"));
        }
        self.curve.validate()
    }
}

/// 加载状态机
#[derive(Debug, Clone)]
pub struct LoadingSequence {
    config: SequencerConfig,
    plan: ExitPlan,
    started_at: Option<Duration>,
    /// 0 - 100，只增不减
    progress: f32,
    phase: LoadingPhase,
    exit_index: usize,
    phase_started_at: Duration,
}

impl LoadingSequence {
    pub fn new(config: SequencerConfig) -> Self {
        let plan = config.exit_plan();
        Self {
            config,
            plan,
            started_at: None,
            progress: 0.0,
            phase: LoadingPhase::Running,
            exit_index: 0,
            phase_started_at: Duration::ZERO,
        }
    }

    /// 记录起点；重复调用无效
    pub fn start(&mut self, now: Duration) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
            self.phase_started_at = now;
        }
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn phase(&self) -> LoadingPhase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        self.phase == LoadingPhase::Done
    }

    /// 当前退场阶段的结束时刻；进度阶段与完成后为 None
    pub fn phase_deadline(&self) -> Option<Duration> {
        match self.phase {
            LoadingPhase::Running | LoadingPhase::Done => None,
            _ => self
                .plan
                .get(self.exit_index)
                .map(|(_, length)| self.phase_started_at + length),
        }
    }

    pub fn visuals(&self, now: Duration) -> LoadingVisuals {
        LoadingVisuals::new(
            self.progress,
            self.phase,
            now.saturating_sub(self.phase_started_at),
        )
    }

    /// 推进到 `now`，返回期间发生的全部阶段切换
    ///
    /// 每个阶段的起点是上一阶段的理论结束时刻，掉帧或后台挂起后
    /// 一次调用可能连续跨过多个阶段。
    pub fn update(&mut self, now: Duration) -> Vec<PhaseChange> {
        let started = match self.started_at {
            Some(at) => at,
            None => {
                self.start(now);
                now
            }
        };
        let mut changes = Vec::new();

        if self.phase == LoadingPhase::Running {
            let elapsed = now.saturating_sub(started);
            let t = (elapsed.as_secs_f64() / self.config.duration.as_secs_f64()).min(1.0) as f32;
            self.progress = self.progress.max(self.config.curve.apply(t) * 100.0);

            if elapsed >= self.config.duration {
                self.progress = 100.0;
                self.enter_exit_step(0, started + self.config.duration, &mut changes);
            }
        }

        while let Some(deadline) = self.phase_deadline() {
            if now < deadline {
                break;
            }
            self.enter_exit_step(self.exit_index + 1, deadline, &mut changes);
        }

        changes
    }

    fn enter_exit_step(&mut self, index: usize, at: Duration, changes: &mut Vec<PhaseChange>) {
        let from = self.phase;
        let to = self
            .plan
            .get(index)
            .map_or(LoadingPhase::Done, |(phase, _)| phase);
        self.exit_index = index;
        self.phase = to;
        self.phase_started_at = at;
        debug!(from = %from, to = %to, at_ms = at.as_millis() as u64, "加载阶段切换");
        changes.push(PhaseChange { from, to, at });
    }
}

struct LoadingShared {
    scheduler: Scheduler,
    sequence: RefCell<LoadingSequence>,
    pending_frame: Cell<Option<FrameCallbackId>>,
    pending_timer: Cell<Option<TimerId>>,
    on_complete: RefCell<Option<Box<dyn FnOnce()>>>,
    on_phase: RefCell<Option<Box<dyn FnMut(PhaseChange)>>>,
    disposed: Cell<bool>,
}

impl LoadingShared {
    fn tick(shared: &Rc<Self>, now: Duration) {
        if shared.disposed.get() {
            return;
        }
        let (changes, done) = {
            let mut sequence = shared.sequence.borrow_mut();
            let changes = sequence.update(now);
            (changes, sequence.is_done())
        };

        if !changes.is_empty() {
            if let Ok(mut slot) = shared.on_phase.try_borrow_mut() {
                if let Some(listener) = slot.as_mut() {
                    for change in &changes {
                        listener(*change);
                    }
                }
            }
        }

        if done {
            let callback = shared.on_complete.borrow_mut().take();
            if let Some(callback) = callback {
                info!(at_ms = now.as_millis() as u64, "加载完成");
                callback();
            }
            return;
        }

        Self::schedule_next(shared);
    }

    /// 挂下一次回调，保证同一时刻最多一个
    fn schedule_next(shared: &Rc<Self>) {
        if shared.disposed.get()
            || shared.pending_frame.get().is_some()
            || shared.pending_timer.get().is_some()
        {
            return;
        }
        let (phase, deadline) = {
            let sequence = shared.sequence.borrow();
            (sequence.phase(), sequence.phase_deadline())
        };
        let weak = Rc::downgrade(shared);

        match (phase, deadline) {
            (LoadingPhase::Running, _) => {
                let id = shared.scheduler.request_frame(move |now| {
                    if let Some(shared) = weak.upgrade() {
                        shared.pending_frame.set(None);
                        Self::tick(&shared, now);
                    }
                });
                shared.pending_frame.set(Some(id));
            }
            (_, Some(deadline)) => {
                let delay = deadline.saturating_sub(shared.scheduler.now());
                let id = shared.scheduler.set_timeout(delay, move |now| {
                    if let Some(shared) = weak.upgrade() {
                        shared.pending_timer.set(None);
                        Self::tick(&shared, now);
                    }
                });
                shared.pending_timer.set(Some(id));
            }
            _ => {}
        }
    }

    fn cancel_pending(&self) {
        if let Some(id) = self.pending_frame.take() {
            self.scheduler.cancel_frame(id);
        }
        if let Some(id) = self.pending_timer.take() {
            self.scheduler.cancel_timeout(id);
        }
    }
}

/// 挂载中的加载界面
///
/// 完成回调恰好调用一次；提前 drop 则不再调用，也不会留下任何待执行回调。
pub struct LoadingScreen {
    shared: Rc<LoadingShared>,
}

impl LoadingScreen {
    pub fn mount(
        scheduler: &Scheduler,
        config: SequencerConfig,
        on_complete: impl FnOnce() + 'static,
    ) -> MotionResult<Self> {
        config.validate()?;
        let now = scheduler.now();
        let mut sequence = LoadingSequence::new(config);
        sequence.start(now);
        info!(
            duration_ms = sequence.config().duration.as_millis() as u64,
            exit_ms = sequence.config().exit_plan().total().as_millis() as u64,
            "加载界面挂载"
        );

        let shared = Rc::new(LoadingShared {
            scheduler: scheduler.clone(),
            sequence: RefCell::new(sequence),
            pending_frame: Cell::new(None),
            pending_timer: Cell::new(None),
            on_complete: RefCell::new(Some(Box::new(on_complete))),
            on_phase: RefCell::new(None),
            disposed: Cell::new(false),
        });
        LoadingShared::schedule_next(&shared);
        Ok(Self { shared })
    }

    /// 监听阶段切换
    pub fn on_phase_change(&self, listener: impl FnMut(PhaseChange) + 'static) {
        *self.shared.on_phase.borrow_mut() = Some(Box::new(listener));
    }

    pub fn progress(&self) -> f32 {
        self.shared.sequence.borrow().progress()
    }

    pub fn phase(&self) -> LoadingPhase {
        self.shared.sequence.borrow().phase()
    }

    pub fn is_complete(&self) -> bool {
        self.shared.sequence.borrow().is_done()
    }

    pub fn visuals(&self) -> LoadingVisuals {
        self.shared
            .sequence
            .borrow()
            .visuals(self.shared.scheduler.now())
    }

    /// 待执行回调数（0 或 1）
    pub fn pending_callbacks(&self) -> usize {
        usize::from(self.shared.pending_frame.get().is_some())
            + usize::from(self.shared.pending_timer.get().is_some())
    }
}

impl Drop for LoadingScreen {
    fn drop(&mut self) {
        self.shared.disposed.set(true);
        self.shared.cancel_pending();
        self.shared.on_complete.borrow_mut().take();
        if !self.is_complete() {
            debug!(phase = %self.phase(), "加载界面提前卸载");
        }
    }
}
