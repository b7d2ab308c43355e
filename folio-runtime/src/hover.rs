//! # Hover 模块
//!
//! 全局“指针正悬停在可交互元素上”的布尔广播。
//!
//! - [`HoverBus`]：持有当前值，任意数量的订阅者；值变化时才通知，后写覆盖先写
//! - [`HoverListener`]：唯一写入者，把指针/触摸事件翻译成布尔值
//! - [`HoverSubscription`]：订阅句柄，drop 即退订

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{debug, trace};

use crate::device::DeviceProfile;
use crate::element::{ElementNode, ElementPath};
use crate::error::{MotionError, MotionResult};
use crate::scheduler::{FrameDriven, LoopControl};

/// 触摸设备上一次点按保持为 true 的时长
pub const TOUCH_PULSE: Duration = Duration::from_millis(300);

/// 可交互元素选择器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractiveSelector {
    /// 标签名
    Tag(&'static str),
    /// `[role="..."]`
    Role(&'static str),
    /// `.class`
    Class(&'static str),
    /// `input[type="..."]`
    InputType(&'static str),
    /// `tag[aria-hidden="true"]`
    AriaHidden(&'static str),
}

impl InteractiveSelector {
    pub fn matches(&self, node: &ElementNode) -> bool {
        match *self {
            InteractiveSelector::Tag(tag) => node.is_tag(tag),
            InteractiveSelector::Role(role) => node.has_role(role),
            InteractiveSelector::Class(class) => node.has_class(class),
            InteractiveSelector::InputType(kind) => {
                node.is_tag("input") && node.input_type.as_deref() == Some(kind)
            }
            InteractiveSelector::AriaHidden(tag) => node.is_tag(tag) && node.aria_hidden,
        }
    }
}

/// 默认的可交互选择器集合
///
/// 装饰性的 `aria-hidden` 图标（眼睛本身）也算在内。
pub const INTERACTIVE_SELECTORS: &[InteractiveSelector] = &[
    InteractiveSelector::Tag("button"),
    InteractiveSelector::Role("button"),
    InteractiveSelector::Tag("a"),
    InteractiveSelector::Class("btn"),
    InteractiveSelector::Class("button"),
    InteractiveSelector::InputType("button"),
    InteractiveSelector::InputType("submit"),
    InteractiveSelector::Class("interactive-card"),
    InteractiveSelector::AriaHidden("svg"),
    InteractiveSelector::AriaHidden("span"),
];

/// 目标自身或任一祖先命中选择器
pub fn is_interactive(path: &ElementPath) -> bool {
    path.closest(|node| INTERACTIVE_SELECTORS.iter().any(|s| s.matches(node)))
        .is_some()
}

type Subscriber = Rc<dyn Fn(bool)>;

struct HoverBusInner {
    hovered: Cell<bool>,
    subscribers: RefCell<Vec<(u64, Subscriber)>>,
    next_id: Cell<u64>,
    writer_attached: Cell<bool>,
}

/// Hover 广播
#[derive(Clone)]
pub struct HoverBus {
    inner: Rc<HoverBusInner>,
}

impl HoverBus {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(HoverBusInner {
                hovered: Cell::new(false),
                subscribers: RefCell::new(Vec::new()),
                next_id: Cell::new(1),
                writer_attached: Cell::new(false),
            }),
        }
    }

    pub fn is_hovered(&self) -> bool {
        self.inner.hovered.get()
    }

    /// 订阅变化；返回的句柄 drop 后不再收到通知
    pub fn subscribe(&self, listener: impl Fn(bool) + 'static) -> HoverSubscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .subscribers
            .borrow_mut()
            .push((id, Rc::new(listener)));
        HoverSubscription {
            bus: Rc::downgrade(&self.inner),
            id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// 占用写入权
    pub fn attach_writer(&self) -> MotionResult<HoverWriter> {
        if self.inner.writer_attached.replace(true) {
            return Err(MotionError::WriterAlreadyAttached);
        }
        Ok(HoverWriter { bus: self.clone() })
    }

    fn publish(&self, hovered: bool) {
        if self.inner.hovered.replace(hovered) == hovered {
            return;
        }
        trace!(hovered, "hover 状态变化");
        // 先复制订阅者列表，回调里可以安全地订阅/退订
        let subscribers: Vec<Subscriber> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in subscribers {
            listener(hovered);
        }
    }
}

impl Default for HoverBus {
    fn default() -> Self {
        Self::new()
    }
}

/// 订阅句柄
pub struct HoverSubscription {
    bus: Weak<HoverBusInner>,
    id: u64,
}

impl Drop for HoverSubscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.subscribers
                .borrow_mut()
                .retain(|(id, _)| *id != self.id);
        }
    }
}

/// 写入权，drop 后释放
pub struct HoverWriter {
    bus: HoverBus,
}

impl HoverWriter {
    pub fn publish(&self, hovered: bool) {
        self.bus.publish(hovered);
    }
}

impl Drop for HoverWriter {
    fn drop(&mut self) {
        self.bus.inner.writer_attached.set(false);
    }
}

/// 输入模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverMode {
    Pointer,
    /// 触屏：忽略 pointer over/out，点按产生短脉冲
    Touch,
}

/// 全局 hover 监听器
pub struct HoverListener {
    writer: HoverWriter,
    mode: HoverMode,
    pulse: Duration,
    pulse_until: Option<Duration>,
}

impl HoverListener {
    pub fn attach(bus: &HoverBus, device: &DeviceProfile) -> MotionResult<Self> {
        let mode = if device.touch_primary {
            HoverMode::Touch
        } else {
            HoverMode::Pointer
        };
        debug!(?mode, "hover 监听器挂载");
        Ok(Self {
            writer: bus.attach_writer()?,
            mode,
            pulse: TOUCH_PULSE,
            pulse_until: None,
        })
    }

    /// 自定义触摸脉冲时长
    pub fn with_pulse(mut self, pulse: Duration) -> Self {
        self.pulse = pulse;
        self
    }

    pub fn mode(&self) -> HoverMode {
        self.mode
    }

    pub fn pointer_over(&mut self, target: &ElementPath) {
        if self.mode == HoverMode::Touch {
            return;
        }
        if is_interactive(target) {
            self.writer.publish(true);
        }
    }

    /// 离开可交互元素；移向另一个可交互元素时保持 true
    pub fn pointer_out(&mut self, target: &ElementPath, related: Option<&ElementPath>) {
        if self.mode == HoverMode::Touch {
            return;
        }
        if !is_interactive(target) {
            return;
        }
        if related.is_some_and(is_interactive) {
            return;
        }
        self.writer.publish(false);
    }

    pub fn touch_start(&mut self, target: &ElementPath, now: Duration) {
        if self.mode != HoverMode::Touch || !is_interactive(target) {
            return;
        }
        self.writer.publish(true);
        self.pulse_until = Some(now + self.pulse);
    }

    /// 抬起后再保持一个脉冲时长
    pub fn touch_end(&mut self, now: Duration) {
        if self.mode != HoverMode::Touch || self.pulse_until.is_none() {
            return;
        }
        self.pulse_until = Some(now + self.pulse);
    }

    /// 结束到期的触摸脉冲
    pub fn tick(&mut self, now: Duration) {
        if let Some(until) = self.pulse_until {
            if now >= until {
                self.pulse_until = None;
                self.writer.publish(false);
            }
        }
    }
}

impl FrameDriven for HoverListener {
    fn on_frame(&mut self, now: Duration, _dt: Duration) -> LoopControl {
        self.tick(now);
        LoopControl::Continue
    }
}
