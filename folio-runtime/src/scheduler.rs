//! # Scheduler 模块
//!
//! 帧回调与定时器的统一调度器。
//!
//! ## 设计
//!
//! - 调度器是单线程句柄（`Rc` 共享），clone 即共享同一队列
//! - `run_frame()` 先执行到期的定时器，再执行本帧开始前注册的帧回调
//! - 回调执行期间新注册的回调留到下一帧
//! - 所有注册都返回 id，可随时取消；`FrameLoop` / `Timeout` 在 Drop 时自动取消
//!
//! 组件通过 [`FrameDriven`] + [`Mounted`] 挂载到调度器上，卸载即停止。

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::trace;

use crate::clock::Clock;

type Callback = Box<dyn FnOnce(Duration)>;

/// 帧回调 id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameCallbackId(u64);

/// 定时器 id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

struct SchedulerInner {
    clock: Box<dyn Clock>,
    frame_callbacks: RefCell<VecDeque<(FrameCallbackId, Callback)>>,
    /// 按 (到期时刻, id) 排序，同一时刻先注册先执行
    timers: RefCell<BTreeMap<(Duration, TimerId), Callback>>,
    next_id: Cell<u64>,
}

/// 调度器句柄
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now())
            .field("pending_frames", &self.pending_frames())
            .field("pending_timers", &self.pending_timers())
            .finish()
    }
}

impl Scheduler {
    pub fn new(clock: impl Clock + 'static) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                clock: Box::new(clock),
                frame_callbacks: RefCell::new(VecDeque::new()),
                timers: RefCell::new(BTreeMap::new()),
                next_id: Cell::new(1),
            }),
        }
    }

    /// 当前时刻
    pub fn now(&self) -> Duration {
        self.inner.clock.now()
    }

    fn allocate_id(&self) -> u64 {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        id
    }

    /// 注册下一帧回调
    pub fn request_frame(&self, callback: impl FnOnce(Duration) + 'static) -> FrameCallbackId {
        let id = FrameCallbackId(self.allocate_id());
        self.inner
            .frame_callbacks
            .borrow_mut()
            .push_back((id, Box::new(callback)));
        id
    }

    /// 取消帧回调；id 已执行或不存在时为空操作
    pub fn cancel_frame(&self, id: FrameCallbackId) {
        self.inner
            .frame_callbacks
            .borrow_mut()
            .retain(|(entry, _)| *entry != id);
    }

    /// 注册延时回调
    pub fn set_timeout(&self, delay: Duration, callback: impl FnOnce(Duration) + 'static) -> TimerId {
        let id = TimerId(self.allocate_id());
        let deadline = self.now() + delay;
        self.inner
            .timers
            .borrow_mut()
            .insert((deadline, id), Box::new(callback));
        id
    }

    /// 取消定时器；id 已执行或不存在时为空操作
    pub fn cancel_timeout(&self, id: TimerId) {
        self.inner
            .timers
            .borrow_mut()
            .retain(|(_, entry), _| *entry != id);
    }

    pub fn pending_frames(&self) -> usize {
        self.inner.frame_callbacks.borrow().len()
    }

    pub fn pending_timers(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    /// 是否还有任何待执行的工作
    pub fn is_idle(&self) -> bool {
        self.pending_frames() == 0 && self.pending_timers() == 0
    }

    /// 最近的定时器到期时刻
    pub fn next_timer_deadline(&self) -> Option<Duration> {
        self.inner
            .timers
            .borrow()
            .keys()
            .next()
            .map(|(deadline, _)| *deadline)
    }

    /// 执行一帧
    ///
    /// 返回执行的回调数量。回调在借用释放之后调用，因此可以在回调里
    /// 注册或取消其它回调。
    pub fn run_frame(&self) -> usize {
        let now = self.now();
        let batch_end = self.inner.next_id.get();
        let mut executed = 0;

        loop {
            let due = {
                let mut timers = self.inner.timers.borrow_mut();
                let key = match timers.keys().next() {
                    Some(&(deadline, id)) if deadline <= now && id.0 < batch_end => {
                        (deadline, id)
                    }
                    _ => break,
                };
                timers.remove(&key)
            };
            if let Some(callback) = due {
                callback(now);
                executed += 1;
            }
        }

        loop {
            let next = {
                let mut queue = self.inner.frame_callbacks.borrow_mut();
                match queue.front() {
                    Some((id, _)) if id.0 < batch_end => queue.pop_front(),
                    _ => None,
                }
            };
            match next {
                Some((_, callback)) => {
                    callback(now);
                    executed += 1;
                }
                None => break,
            }
        }

        if executed > 0 {
            trace!(now_ms = now.as_millis() as u64, executed, "帧执行完毕");
        }
        executed
    }
}

/// 帧循环控制
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Stop,
}

struct FrameLoopState {
    scheduler: Scheduler,
    pending: Cell<Option<FrameCallbackId>>,
    step: RefCell<Box<dyn FnMut(Duration) -> LoopControl>>,
    stopped: Cell<bool>,
}

impl FrameLoopState {
    fn schedule(state: &Rc<Self>) {
        if state.stopped.get() || state.pending.get().is_some() {
            return;
        }
        let weak: Weak<Self> = Rc::downgrade(state);
        let id = state.scheduler.request_frame(move |now| {
            let Some(state) = weak.upgrade() else {
                return;
            };
            state.pending.set(None);
            if state.stopped.get() {
                return;
            }
            let control = match state.step.try_borrow_mut() {
                Ok(mut step) => (&mut **step)(now),
                Err(_) => LoopControl::Continue,
            };
            match control {
                LoopControl::Continue => Self::schedule(&state),
                LoopControl::Stop => state.stopped.set(true),
            }
        });
        state.pending.set(Some(id));
    }
}

/// 逐帧循环
///
/// 每帧调用一次 step，返回 `Stop` 或被 drop 时停止并取消待执行的帧回调。
pub struct FrameLoop {
    state: Rc<FrameLoopState>,
}

impl FrameLoop {
    pub fn start(
        scheduler: &Scheduler,
        step: impl FnMut(Duration) -> LoopControl + 'static,
    ) -> Self {
        let state = Rc::new(FrameLoopState {
            scheduler: scheduler.clone(),
            pending: Cell::new(None),
            step: RefCell::new(Box::new(step)),
            stopped: Cell::new(false),
        });
        FrameLoopState::schedule(&state);
        Self { state }
    }

    pub fn is_running(&self) -> bool {
        !self.state.stopped.get()
    }

    /// 停止循环
    pub fn stop(&self) {
        self.state.stopped.set(true);
        if let Some(id) = self.state.pending.take() {
            self.state.scheduler.cancel_frame(id);
        }
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 一次性定时器句柄，drop 时取消
pub struct Timeout {
    scheduler: Scheduler,
    id: Option<TimerId>,
    fired: Rc<Cell<bool>>,
}

impl Timeout {
    pub fn after(
        scheduler: &Scheduler,
        delay: Duration,
        callback: impl FnOnce(Duration) + 'static,
    ) -> Self {
        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        let id = scheduler.set_timeout(delay, move |now| {
            flag.set(true);
            callback(now);
        });
        Self {
            scheduler: scheduler.clone(),
            id: Some(id),
            fired,
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired.get()
    }

    pub fn cancel(&mut self) {
        if let Some(id) = self.id.take() {
            if !self.fired.get() {
                self.scheduler.cancel_timeout(id);
            }
        }
    }
}

impl Drop for Timeout {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// 逐帧驱动的组件
pub trait FrameDriven {
    /// `now` 为当前帧时刻，`dt` 为距上一帧的间隔（首帧为 0）
    fn on_frame(&mut self, now: Duration, dt: Duration) -> LoopControl;
}

/// 挂载到调度器上的组件
///
/// 持有组件本身和它的帧循环。drop 即卸载：帧循环停止，不再有回调。
pub struct Mounted<T: FrameDriven + 'static> {
    component: Rc<RefCell<T>>,
    frame_loop: FrameLoop,
}

impl<T: FrameDriven + 'static> Mounted<T> {
    pub fn mount(scheduler: &Scheduler, component: T) -> Self {
        let component = Rc::new(RefCell::new(component));
        let weak = Rc::downgrade(&component);
        let mut last_frame: Option<Duration> = None;
        let frame_loop = FrameLoop::start(scheduler, move |now| {
            let Some(component) = weak.upgrade() else {
                return LoopControl::Stop;
            };
            let dt = last_frame.map_or(Duration::ZERO, |last| now.saturating_sub(last));
            last_frame = Some(now);
            let control = match component.try_borrow_mut() {
                Ok(mut inner) => inner.on_frame(now, dt),
                Err(_) => LoopControl::Continue,
            };
            control
        });
        Self {
            component,
            frame_loop,
        }
    }

    pub fn borrow(&self) -> std::cell::Ref<'_, T> {
        self.component.borrow()
    }

    pub fn borrow_mut(&self) -> std::cell::RefMut<'_, T> {
        self.component.borrow_mut()
    }

    pub fn is_running(&self) -> bool {
        self.frame_loop.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn setup() -> (ManualClock, Scheduler) {
        let clock = ManualClock::new();
        let scheduler = Scheduler::new(clock.clone());
        (clock, scheduler)
    }

    #[test]
    fn test_frame_callback_runs_once() {
        let (clock, scheduler) = setup();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        scheduler.request_frame(move |_| h.set(h.get() + 1));

        clock.advance(Duration::from_millis(16));
        assert_eq!(scheduler.run_frame(), 1);
        assert_eq!(scheduler.run_frame(), 0);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_cancel_frame() {
        let (_clock, scheduler) = setup();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let id = scheduler.request_frame(move |_| h.set(h.get() + 1));
        scheduler.cancel_frame(id);
        scheduler.run_frame();
        assert_eq!(hits.get(), 0);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_nested_request_runs_next_frame() {
        let (_clock, scheduler) = setup();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let s = scheduler.clone();
        scheduler.request_frame(move |_| {
            let h2 = h.clone();
            s.request_frame(move |_| h2.set(h2.get() + 1));
        });

        scheduler.run_frame();
        assert_eq!(hits.get(), 0);
        assert_eq!(scheduler.pending_frames(), 1);
        scheduler.run_frame();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_timer_order_and_deadline() {
        let (clock, scheduler) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));

        let l = log.clone();
        scheduler.set_timeout(Duration::from_millis(300), move |_| l.borrow_mut().push("late"));
        let l = log.clone();
        scheduler.set_timeout(Duration::from_millis(100), move |_| l.borrow_mut().push("early"));

        clock.advance(Duration::from_millis(99));
        scheduler.run_frame();
        assert!(log.borrow().is_empty());
        assert_eq!(scheduler.next_timer_deadline(), Some(Duration::from_millis(100)));

        clock.advance(Duration::from_millis(300));
        scheduler.run_frame();
        assert_eq!(*log.borrow(), vec!["early", "late"]);
    }

    #[test]
    fn test_zero_delay_timer_inside_callback_waits() {
        let (_clock, scheduler) = setup();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let s = scheduler.clone();
        scheduler.set_timeout(Duration::ZERO, move |_| {
            let h2 = h.clone();
            s.set_timeout(Duration::ZERO, move |_| h2.set(h2.get() + 1));
        });

        scheduler.run_frame();
        assert_eq!(hits.get(), 0);
        scheduler.run_frame();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_frame_loop_stops_on_drop() {
        let (clock, scheduler) = setup();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let frame_loop = FrameLoop::start(&scheduler, move |_| {
            h.set(h.get() + 1);
            LoopControl::Continue
        });

        for _ in 0..3 {
            clock.advance(Duration::from_millis(16));
            scheduler.run_frame();
        }
        assert_eq!(hits.get(), 3);
        assert!(frame_loop.is_running());

        drop(frame_loop);
        assert_eq!(scheduler.pending_frames(), 0);
        scheduler.run_frame();
        assert_eq!(hits.get(), 3);
    }

    #[test]
    fn test_frame_loop_stop_control() {
        let (_clock, scheduler) = setup();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let frame_loop = FrameLoop::start(&scheduler, move |_| {
            h.set(h.get() + 1);
            if h.get() >= 2 {
                LoopControl::Stop
            } else {
                LoopControl::Continue
            }
        });

        for _ in 0..5 {
            scheduler.run_frame();
        }
        assert_eq!(hits.get(), 2);
        assert!(!frame_loop.is_running());
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_timeout_cancel_on_drop() {
        let (clock, scheduler) = setup();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let timeout = Timeout::after(&scheduler, Duration::from_millis(50), move |_| {
            h.set(h.get() + 1)
        });
        drop(timeout);

        clock.advance(Duration::from_millis(100));
        scheduler.run_frame();
        assert_eq!(hits.get(), 0);
        assert!(scheduler.is_idle());
    }

    struct Counter {
        frames: u32,
        total: Duration,
    }

    impl FrameDriven for Counter {
        fn on_frame(&mut self, _now: Duration, dt: Duration) -> LoopControl {
            self.frames += 1;
            self.total += dt;
            LoopControl::Continue
        }
    }

    #[test]
    fn test_mounted_dt() {
        let (clock, scheduler) = setup();
        let mounted = Mounted::mount(
            &scheduler,
            Counter {
                frames: 0,
                total: Duration::ZERO,
            },
        );

        scheduler.run_frame();
        clock.advance(Duration::from_millis(16));
        scheduler.run_frame();
        clock.advance(Duration::from_millis(20));
        scheduler.run_frame();

        assert_eq!(mounted.borrow().frames, 3);
        assert_eq!(mounted.borrow().total, Duration::from_millis(36));

        drop(mounted);
        assert!(scheduler.is_idle());
    }
}
