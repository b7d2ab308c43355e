//! # folio-runtime
//!
//! 个人站点动效协调层的纯逻辑核心。
//!
//! ## 设计原则
//!
//! - **时间注入**：所有时间都从 [`Clock`] 读取，测试与回放使用 [`ManualClock`]
//! - **统一调度**：帧回调与定时器都走 [`Scheduler`]，组件卸载即取消
//! - **与渲染无关**：只产出数值（进度、偏移、状态），渲染交给宿主
//! - **退化为空操作**：缺少锚点、零尺寸、宿主能力缺失都不会报错
//!
//! ## 模块
//!
//! - [`sequencer`]：加载序列
//! - [`pointer`] / [`eye`] / [`expansion`]：眼睛跟随、眨眼与展开层
//! - [`visibility`]：进入视口检测
//! - [`hover`]：全局 hover 广播
//! - [`cursor`] / [`scroll`] / [`background`]：光标、滚动与背景

pub mod background;
pub mod clock;
pub mod cursor;
pub mod device;
pub mod easing;
pub mod element;
pub mod error;
pub mod expansion;
pub mod eye;
pub mod geometry;
pub mod hover;
pub mod pointer;
pub mod scheduler;
pub mod scroll;
pub mod sequencer;
pub mod spring;
pub mod visibility;

pub use background::BackgroundField;
pub use clock::{Clock, ManualClock};
pub use cursor::CustomCursor;
pub use device::DeviceProfile;
pub use easing::EasingFunction;
pub use element::{ElementNode, ElementPath};
pub use error::{MotionError, MotionResult};
pub use expansion::{ExpansionOverlay, Key, OverlayState};
pub use eye::{EyeController, EyeKind, Eyelid};
pub use geometry::{Rect, Size, Vec2};
pub use hover::{HoverBus, HoverListener, HoverSubscription, is_interactive};
pub use pointer::{OffsetBound, PointerTracker, TrackerConfig};
pub use scheduler::{FrameDriven, FrameLoop, LoopControl, Mounted, Scheduler, Timeout};
pub use scroll::{NavbarChrome, ScrollSpy, SmoothScroll, Throttle};
pub use sequencer::{
    LoadingPhase, LoadingScreen, LoadingSequence, LoadingVariant, LoadingVisuals, PhaseChange,
    ProgressCurve, SequencerConfig,
};
pub use visibility::{
    IntersectionSource, ObservationId, ViewportIntersection, VisibilityFlag, VisibilityObserver,
    VisibilityOptions,
};
