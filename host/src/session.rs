//! # Session 模块
//!
//! 一次页面访问：把加载界面和主内容的所有动效组件挂到同一个调度器上，
//! 由宿主喂入输入事件并按固定帧率推进时钟。
//!
//! ## 流程
//!
//! 1. 挂载加载界面，进度跑完并走完退场阶段后通知完成
//! 2. 卸载加载界面，挂载主内容：两只眼睛、hover 监听、平滑滚动、
//!    导航栏区块判定、区块入场检测，以及按设备能力挂载的光标和 3D 背景
//! 3. 之后的输入逐个分发给对应组件
//!
//! 加载期间除 resize 外的输入都被忽略。

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use folio_runtime::background::BackgroundField;
use folio_runtime::cursor::{CursorAppearance, CustomCursor};
use folio_runtime::element::ElementPath;
use folio_runtime::expansion::{Key, OverlayState};
use folio_runtime::eye::{EyeController, EyeKind, Eyelid};
use folio_runtime::geometry::{Rect, Size, Vec2};
use folio_runtime::hover::{HoverBus, HoverListener, HoverSubscription};
use folio_runtime::pointer::{ANCHOR_REFRESH_DELAYS, ANCHOR_VISIBILITY_THRESHOLD};
use folio_runtime::scheduler::{Mounted, Scheduler, Timeout};
use folio_runtime::scroll::{
    NavbarChrome, Parallax, ScrollSpy, SmoothScroll, SpySection, Throttle, scroll_progress,
};
use folio_runtime::sequencer::{LoadingPhase, LoadingScreen, LoadingVisuals};
use folio_runtime::visibility::{
    IntersectionSource, ObservationId, ViewportIntersection, VisibilityObserver,
    VisibilityOptions,
};
use folio_runtime::device::DeviceProfile;
use folio_runtime::{Clock, ManualClock, MotionError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, ConfigError};

/// 导航栏判定的节流间隔
pub const SPY_THROTTLE: Duration = Duration::from_millis(100);

/// 默认高亮的区块
pub const HOME_SECTION: &str = "home";

/// 带视差和入场通知的项目区块
pub const PROJECTS_SECTION: &str = "projects";

/// 会话错误
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("动效参数无效: {0}")]
    Motion(#[from] MotionError),
}

/// 页面上的一个区块（文档坐标）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionLayout {
    pub id: String,
    pub top: f32,
    pub height: f32,
    /// 入场检测参数；为空时使用配置里的默认值
    #[serde(default)]
    pub visibility: Option<VisibilityOptions>,
}

impl SectionLayout {
    pub fn new(id: &str, top: f32, height: f32) -> Self {
        Self {
            id: id.to_string(),
            top,
            height,
            visibility: None,
        }
    }

    pub fn with_visibility(mut self, options: VisibilityOptions) -> Self {
        self.visibility = Some(options);
        self
    }

    pub fn rect(&self, width: f32) -> Rect {
        Rect::new(0.0, self.top, width, self.height)
    }
}

/// 页面布局（文档坐标）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub document_height: f32,
    pub sections: Vec<SectionLayout>,
    pub dot_eye: Rect,
    pub triangle_eye: Rect,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            document_height: 4180.0,
            sections: vec![
                SectionLayout::new(HOME_SECTION, 0.0, 680.0),
                SectionLayout::new("journey", 680.0, 1400.0)
                    .with_visibility(VisibilityOptions::once(0.1)),
                SectionLayout::new(PROJECTS_SECTION, 2080.0, 1200.0)
                    .with_visibility(VisibilityOptions::once(0.1)),
                SectionLayout::new("skills", 3280.0, 900.0)
                    .with_visibility(VisibilityOptions::once(0.2)),
            ],
            dot_eye: Rect::new(500.0, 300.0, 120.0, 80.0),
            triangle_eye: Rect::new(700.0, 300.0, 60.0, 52.0),
        }
    }
}

impl PageLayout {
    pub fn section(&self, id: &str) -> Option<&SectionLayout> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn max_scroll(&self, viewport_height: f32) -> f32 {
        (self.document_height - viewport_height).max(0.0)
    }

    /// 项目区块当前的视差；布局里没有项目区块时为空
    pub fn projects_parallax(&self, viewport: Size, scroll_y: f32) -> Option<Parallax> {
        let section = self.section(PROJECTS_SECTION)?;
        let rect = section.rect(viewport.width).translate(0.0, -scroll_y);
        Some(Parallax::from_progress(scroll_progress(&rect, viewport.height)))
    }

    fn spy_sections(&self) -> Vec<SpySection> {
        self.sections
            .iter()
            .map(|s| SpySection {
                id: s.id.clone(),
                top: s.top,
                height: s.height,
            })
            .collect()
    }
}

/// 宿主输入事件，坐标均为视口坐标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    PointerMove {
        x: f32,
        y: f32,
        #[serde(default)]
        target: ElementPath,
    },
    PointerOver {
        target: ElementPath,
    },
    PointerOut {
        target: ElementPath,
        #[serde(default)]
        related: Option<ElementPath>,
    },
    TouchStart {
        target: ElementPath,
    },
    TouchEnd,
    /// 页面任意位置点击
    Click,
    /// 点击某只眼睛
    EyeClick {
        eye: EyeKind,
    },
    Key {
        key: Key,
    },
    Wheel {
        delta: f32,
    },
    /// 原生滚动（拖动滚动条、键盘翻页），位置立即同步
    NativeScroll {
        y: f32,
    },
    /// 导航栏跳转
    ScrollTo {
        section: String,
    },
    Resize {
        width: f32,
        height: f32,
    },
}

/// 会话中发生的可观察事件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEvent {
    Phase {
        at_ms: u64,
        from: LoadingPhase,
        to: LoadingPhase,
    },
    Revealed {
        at_ms: u64,
    },
    Section {
        at_ms: u64,
        id: String,
        visible: bool,
    },
    ActiveSection {
        at_ms: u64,
        id: String,
    },
    Hover {
        at_ms: u64,
        hovered: bool,
    },
    Overlay {
        at_ms: u64,
        state: OverlayState,
    },
    Navbar {
        at_ms: u64,
        scrolled: bool,
    },
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEvent::Phase { at_ms, from, to } => write!(f, "{at_ms}ms phase {from} -> {to}"),
            SessionEvent::Revealed { at_ms } => write!(f, "{at_ms}ms revealed"),
            SessionEvent::Section { at_ms, id, visible } => {
                let state = if *visible { "visible" } else { "hidden" };
                write!(f, "{at_ms}ms section {id} {state}")
            }
            SessionEvent::ActiveSection { at_ms, id } => write!(f, "{at_ms}ms active {id}"),
            SessionEvent::Hover { at_ms, hovered } => {
                write!(f, "{at_ms}ms hover {}", if *hovered { "on" } else { "off" })
            }
            SessionEvent::Overlay { at_ms, state } => {
                write!(f, "{at_ms}ms overlay {}", state.name())
            }
            SessionEvent::Navbar { at_ms, scrolled } => {
                write!(f, "{at_ms}ms navbar {}", if *scrolled { "scrolled" } else { "top" })
            }
        }
    }
}

/// 会话阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Loading,
    Revealed,
}

/// 单只眼睛的状态
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EyeSnapshot {
    pub kind: EyeKind,
    pub eyelid: Eyelid,
    pub openness: f32,
    pub pupil: Vec2,
    pub overlay: OverlayState,
}

/// 某一时刻的会话状态
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub time_ms: u64,
    pub stage: Stage,
    pub loading: Option<LoadingVisuals>,
    pub scroll_y: f32,
    pub active_section: String,
    pub navbar: NavbarChrome,
    /// 导航栏简历下载链接
    pub resume_link: String,
    pub hovered: bool,
    pub eyes: Vec<EyeSnapshot>,
    pub cursor: Option<CursorAppearance>,
    pub background_rotation: Option<Vec2>,
    pub visible_sections: Vec<String>,
    pub projects_revealed: bool,
    pub projects_parallax: Option<Parallax>,
}

type Transcript = Rc<RefCell<Vec<SessionEvent>>>;

fn millis(at: Duration) -> u64 {
    at.as_millis() as u64
}

fn viewport_rect(viewport: Size, scroll_y: f32) -> Rect {
    Rect::new(0.0, scroll_y, viewport.width, viewport.height)
}

/// 主内容：加载完成后挂载的所有组件
struct MainContent {
    dot_eye: Mounted<EyeController>,
    triangle_eye: Mounted<EyeController>,
    cursor: Option<Mounted<CustomCursor>>,
    background: Option<Mounted<BackgroundField>>,
    hover: Mounted<HoverListener>,
    scroll: Mounted<SmoothScroll>,
    spy: ScrollSpy,
    throttle: Throttle,
    navbar_scrolled: bool,
    observer: VisibilityObserver,
    sections: Vec<(ObservationId, String)>,
    eye_observations: [ObservationId; 2],
    /// 挂载后的锚点刷新定时器
    _anchor_timers: Vec<Timeout>,
    _hover_log: HoverSubscription,
    last_scroll: f32,
    last_overlay: OverlayState,
    projects_revealed: Rc<Cell<bool>>,
    projects_parallax: Option<Parallax>,
}

impl MainContent {
    fn mount(session: &SiteSession) -> Result<Self, SessionError> {
        let config = &session.config;
        let layout = &session.layout;
        let scheduler = &session.scheduler;
        let viewport = session.viewport;

        let device = session.device;
        let hover = HoverListener::attach(&session.hover_bus, &device)?
            .with_pulse(config.touch_pulse());
        let hover = Mounted::mount(scheduler, hover);

        let transcript = session.transcript.clone();
        let clock = scheduler.clone();
        let hover_log = session.hover_bus.subscribe(move |hovered| {
            transcript.borrow_mut().push(SessionEvent::Hover {
                at_ms: millis(clock.now()),
                hovered,
            });
        });

        let mut dot = EyeController::with_tracker(EyeKind::Dot, config.tracker.dot, &session.hover_bus);
        dot.set_viewport(viewport);
        let mut triangle = EyeController::with_tracker(
            EyeKind::Triangle,
            config.tracker.triangle,
            &session.hover_bus,
        );
        triangle.set_viewport(viewport);

        let cursor = device
            .custom_cursor_enabled()
            .then(|| Mounted::mount(scheduler, CustomCursor::new()));
        let background = device
            .decorative_3d_enabled()
            .then(|| Mounted::mount(scheduler, BackgroundField::new()));

        let scroll = SmoothScroll::new(layout.max_scroll(viewport.height)).with_lerp(config.scroll.lerp)?;

        let mut spy = ScrollSpy::new(layout.spy_sections(), HOME_SECTION);
        spy.set_navbar_height(config.scroll.navbar_height);

        let source: Option<Box<dyn IntersectionSource>> = session
            .intersection_supported
            .then(|| {
                Box::new(ViewportIntersection::new(viewport_rect(viewport, 0.0)))
                    as Box<dyn IntersectionSource>
            });
        let mut observer = VisibilityObserver::from_capability(source);

        let projects_revealed = Rc::new(Cell::new(false));
        let mut sections = Vec::with_capacity(layout.sections.len());
        for section in &layout.sections {
            let options = section.visibility.unwrap_or(config.visibility);
            let rect = section.rect(viewport.width);
            let id = if section.id == PROJECTS_SECTION {
                // 项目区块入场时通知父级
                let flag = projects_revealed.clone();
                observer.observe_with(rect, options, move |visible| {
                    if visible {
                        info!("项目区块进入视口");
                        flag.set(true);
                    }
                })
            } else {
                observer.observe(rect, options)
            };
            sections.push((id, section.id.clone()));
        }

        let eye_options = VisibilityOptions {
            threshold: ANCHOR_VISIBILITY_THRESHOLD,
            once: false,
        };
        let eye_observations = [
            observer.observe(layout.dot_eye, eye_options),
            observer.observe(layout.triangle_eye, eye_options),
        ];

        let anchor_timers = ANCHOR_REFRESH_DELAYS
            .iter()
            .map(|delay| {
                let dirty = session.anchors_dirty.clone();
                Timeout::after(scheduler, *delay, move |_| dirty.set(true))
            })
            .collect();
        session.anchors_dirty.set(true);

        info!(
            cursor = cursor.is_some(),
            background = background.is_some(),
            sections = sections.len(),
            "主内容挂载"
        );

        Ok(Self {
            dot_eye: Mounted::mount(scheduler, dot),
            triangle_eye: Mounted::mount(scheduler, triangle),
            cursor,
            background,
            hover,
            scroll: Mounted::mount(scheduler, scroll),
            spy,
            throttle: Throttle::new(SPY_THROTTLE),
            navbar_scrolled: false,
            observer,
            sections,
            eye_observations,
            _anchor_timers: anchor_timers,
            _hover_log: hover_log,
            last_scroll: 0.0,
            last_overlay: OverlayState::Idle,
            projects_revealed,
            projects_parallax: layout.projects_parallax(viewport, 0.0),
        })
    }

    fn scroll_y(&self) -> f32 {
        self.scroll.borrow().position()
    }

    fn after_frame(&mut self, session: &SiteSession) {
        let now = session.scheduler.now();
        let at_ms = millis(now);
        let scroll_y = self.scroll_y();

        if scroll_y != self.last_scroll {
            self.last_scroll = scroll_y;
            self.projects_parallax = session.layout.projects_parallax(session.viewport, scroll_y);
            self.observer.set_viewport(viewport_rect(session.viewport, scroll_y));
            session.anchors_dirty.set(true);
            if self.throttle.call(now) {
                self.update_spy(session);
            }
        }
        if self.throttle.poll(now) {
            self.update_spy(session);
        }

        for change in self.observer.evaluate() {
            if self.eye_observations.contains(&change.id) {
                if change.visible {
                    session.anchors_dirty.set(true);
                }
                continue;
            }
            if let Some((_, id)) = self.sections.iter().find(|(oid, _)| *oid == change.id) {
                debug!(section = %id, visible = change.visible, "区块可见性变化");
                session.transcript.borrow_mut().push(SessionEvent::Section {
                    at_ms,
                    id: id.clone(),
                    visible: change.visible,
                });
            }
        }

        if session.anchors_dirty.replace(false) {
            self.refresh_anchors(&session.layout, scroll_y);
        }

        let overlay = self.triangle_eye.borrow().overlay_state();
        if overlay != self.last_overlay {
            self.last_overlay = overlay;
            self.scroll
                .borrow_mut()
                .set_locked(overlay != OverlayState::Idle);
            session
                .transcript
                .borrow_mut()
                .push(SessionEvent::Overlay { at_ms, state: overlay });
        }
    }

    fn refresh_anchors(&mut self, layout: &PageLayout, scroll_y: f32) {
        self.dot_eye
            .borrow_mut()
            .anchor_changed(layout.dot_eye.translate(0.0, -scroll_y));
        self.triangle_eye
            .borrow_mut()
            .anchor_changed(layout.triangle_eye.translate(0.0, -scroll_y));
    }

    fn update_spy(&mut self, session: &SiteSession) {
        let at_ms = millis(session.scheduler.now());
        let scroll_y = self.scroll_y();
        if let Some(id) = self.spy.update(
            scroll_y,
            session.viewport.height,
            session.layout.document_height,
        ) {
            session.transcript.borrow_mut().push(SessionEvent::ActiveSection {
                at_ms,
                id: id.to_string(),
            });
        }
        let scrolled = NavbarChrome::from_scroll(scroll_y).scrolled;
        if scrolled != self.navbar_scrolled {
            self.navbar_scrolled = scrolled;
            session
                .transcript
                .borrow_mut()
                .push(SessionEvent::Navbar { at_ms, scrolled });
        }
    }

    fn resize(&mut self, viewport: Size, layout: &PageLayout) {
        self.scroll
            .borrow_mut()
            .set_max_scroll(layout.max_scroll(viewport.height));
        self.dot_eye.borrow_mut().set_viewport(viewport);
        self.triangle_eye.borrow_mut().set_viewport(viewport);
        for (id, name) in &self.sections {
            if let Some(section) = layout.section(name) {
                self.observer.set_target(*id, section.rect(viewport.width));
            }
        }
        self.observer
            .set_viewport(viewport_rect(viewport, self.scroll_y()));
        self.projects_parallax = layout.projects_parallax(viewport, self.scroll_y());
    }

    /// 设备类别变化后按需挂载或卸载光标与 3D 背景
    fn apply_device(&mut self, device: DeviceProfile, scheduler: &Scheduler) {
        match (device.custom_cursor_enabled(), self.cursor.is_some()) {
            (true, false) => self.cursor = Some(Mounted::mount(scheduler, CustomCursor::new())),
            (false, true) => self.cursor = None,
            _ => {}
        }
        match (device.decorative_3d_enabled(), self.background.is_some()) {
            (true, false) => {
                self.background = Some(Mounted::mount(scheduler, BackgroundField::new()));
            }
            (false, true) => self.background = None,
            _ => {}
        }
    }

    fn dispatch(&mut self, event: HostEvent, now: Duration, session: &SiteSession) {
        match event {
            HostEvent::PointerMove { x, y, target } => {
                let position = Vec2::new(x, y);
                self.dot_eye.borrow_mut().pointer_moved(position);
                self.triangle_eye.borrow_mut().pointer_moved(position);
                if let Some(cursor) = &self.cursor {
                    cursor.borrow_mut().pointer_moved(position, &target);
                }
                if let Some(background) = &self.background {
                    background
                        .borrow_mut()
                        .pointer_moved(position, session.viewport);
                }
            }
            HostEvent::PointerOver { target } => self.hover.borrow_mut().pointer_over(&target),
            HostEvent::PointerOut { target, related } => self
                .hover
                .borrow_mut()
                .pointer_out(&target, related.as_ref()),
            HostEvent::TouchStart { target } => self.hover.borrow_mut().touch_start(&target, now),
            HostEvent::TouchEnd => self.hover.borrow_mut().touch_end(now),
            HostEvent::Click => {
                // 展开层打开时点击的是背景或关闭按钮
                let mut eye = self.triangle_eye.borrow_mut();
                if !eye.backdrop_clicked() {
                    eye.global_click(now);
                }
            }
            HostEvent::EyeClick { eye } => {
                let started = match eye {
                    EyeKind::Dot => self.dot_eye.borrow_mut().eye_clicked(now),
                    EyeKind::Triangle => self.triangle_eye.borrow_mut().eye_clicked(now),
                };
                debug!(?eye, started, "眼睛点击");
            }
            HostEvent::Key { key } => {
                self.triangle_eye.borrow_mut().key_pressed(&key);
            }
            HostEvent::Wheel { delta } => self.scroll.borrow_mut().wheel(delta, now),
            HostEvent::NativeScroll { y } => self.scroll.borrow_mut().jump(y, now),
            HostEvent::ScrollTo { section } => match session.layout.section(&section) {
                Some(target) => self.scroll.borrow_mut().scroll_to(target.top, now),
                None => warn!(section = %section, "跳转目标不存在"),
            },
            HostEvent::Resize { .. } => {}
        }
    }

    fn eye_snapshot(eye: &Mounted<EyeController>) -> EyeSnapshot {
        let eye = eye.borrow();
        EyeSnapshot {
            kind: eye.kind(),
            eyelid: eye.eyelid(),
            openness: eye.eyelid().openness(eye.kind()),
            pupil: eye.pupil_offset(),
            overlay: eye.overlay_state(),
        }
    }
}

/// 一次页面访问
pub struct SiteSession {
    config: AppConfig,
    layout: PageLayout,
    clock: ManualClock,
    scheduler: Scheduler,
    viewport: Size,
    /// 结合当前视口得到的设备能力
    device: DeviceProfile,
    hover_bus: HoverBus,
    loading: Option<LoadingScreen>,
    loading_done: Rc<Cell<bool>>,
    content: Option<MainContent>,
    transcript: Transcript,
    anchors_dirty: Rc<Cell<bool>>,
    intersection_supported: bool,
}

impl SiteSession {
    pub fn new(config: AppConfig, layout: PageLayout) -> Result<Self, SessionError> {
        config.validate()?;
        let clock = ManualClock::new();
        let scheduler = Scheduler::new(clock.clone());
        let transcript: Transcript = Rc::new(RefCell::new(Vec::new()));

        let loading_done = Rc::new(Cell::new(false));
        let done = loading_done.clone();
        let loading = LoadingScreen::mount(&scheduler, config.sequencer_config(), move || {
            done.set(true)
        })?;
        let log = transcript.clone();
        loading.on_phase_change(move |change| {
            log.borrow_mut().push(SessionEvent::Phase {
                at_ms: millis(change.at),
                from: change.from,
                to: change.to,
            });
        });

        let device = config.device_profile();
        info!(
            variant = ?config.loading.variant,
            mobile = device.mobile,
            frame_rate = config.frame_rate,
            "会话开始"
        );

        Ok(Self {
            viewport: config.viewport,
            device,
            config,
            layout,
            clock,
            scheduler,
            hover_bus: HoverBus::new(),
            loading: Some(loading),
            loading_done,
            content: None,
            transcript,
            anchors_dirty: Rc::new(Cell::new(false)),
            intersection_supported: true,
        })
    }

    /// 宿主是否支持相交检测；不支持时所有区块直接视为可见
    ///
    /// 只影响之后挂载的主内容。
    pub fn set_intersection_supported(&mut self, supported: bool) {
        self.intersection_supported = supported;
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn stage(&self) -> Stage {
        if self.content.is_some() {
            Stage::Revealed
        } else {
            Stage::Loading
        }
    }

    pub fn device(&self) -> DeviceProfile {
        self.device
    }

    pub fn hover_bus(&self) -> &HoverBus {
        &self.hover_bus
    }

    pub fn transcript(&self) -> Vec<SessionEvent> {
        self.transcript.borrow().clone()
    }

    /// 每行一个事件的文本形式
    pub fn transcript_lines(&self) -> String {
        self.transcript
            .borrow()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 按帧率推进到指定时刻
    ///
    /// 每个完整帧间隔执行一帧；剩余不足一帧的时间只推进时钟。
    pub fn advance_to(&mut self, at: Duration) -> Result<(), SessionError> {
        let interval = self.config.frame_interval();
        while self.clock.now() + interval <= at {
            self.clock.advance(interval);
            self.step()?;
        }
        self.clock.advance_to(at);
        Ok(())
    }

    /// 推进若干帧
    pub fn run_frames(&mut self, frames: usize) -> Result<(), SessionError> {
        let interval = self.config.frame_interval();
        for _ in 0..frames {
            self.clock.advance(interval);
            self.step()?;
        }
        Ok(())
    }

    fn step(&mut self) -> Result<(), SessionError> {
        self.scheduler.run_frame();
        if self.loading.is_some() && self.loading_done.get() {
            self.reveal()?;
        }
        if let Some(mut content) = self.content.take() {
            content.after_frame(self);
            self.content = Some(content);
        }
        Ok(())
    }

    fn reveal(&mut self) -> Result<(), SessionError> {
        let mut content = MainContent::mount(self)?;
        self.loading = None;
        let now = self.now();
        info!(at_ms = millis(now), "加载完成，显示主内容");
        self.transcript
            .borrow_mut()
            .push(SessionEvent::Revealed { at_ms: millis(now) });
        content.update_spy(self);
        self.content = Some(content);
        Ok(())
    }

    /// 在当前时刻分发一个输入事件
    pub fn dispatch(&mut self, event: HostEvent) {
        let now = self.now();
        if let HostEvent::Resize { width, height } = event {
            self.viewport = Size::new(width, height);
            let device = self.config.device.for_viewport(width);
            if device != self.device {
                info!(mobile = device.mobile, "设备类别变化");
                self.device = device;
            }
            if let Some(content) = self.content.as_mut() {
                content.resize(self.viewport, &self.layout);
                content.apply_device(device, &self.scheduler);
            }
            self.anchors_dirty.set(true);
            debug!(width, height, "视口尺寸变化");
            return;
        }
        match self.content.take() {
            Some(mut content) => {
                content.dispatch(event, now, self);
                self.content = Some(content);
            }
            None => debug!(?event, "加载中，忽略输入"),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let now = self.now();
        let loading = self.loading.as_ref().map(LoadingScreen::visuals);
        let Some(content) = &self.content else {
            return SessionSnapshot {
                time_ms: millis(now),
                stage: Stage::Loading,
                loading,
                scroll_y: 0.0,
                active_section: HOME_SECTION.to_string(),
                navbar: NavbarChrome::from_scroll(0.0),
                resume_link: self.config.resume_link(),
                hovered: self.hover_bus.is_hovered(),
                eyes: Vec::new(),
                cursor: None,
                background_rotation: None,
                visible_sections: Vec::new(),
                projects_revealed: false,
                projects_parallax: None,
            };
        };

        let scroll_y = content.scroll_y();
        SessionSnapshot {
            time_ms: millis(now),
            stage: Stage::Revealed,
            loading,
            scroll_y,
            active_section: content.spy.active().to_string(),
            navbar: NavbarChrome::from_scroll(scroll_y),
            resume_link: self.config.resume_link(),
            hovered: self.hover_bus.is_hovered(),
            eyes: vec![
                MainContent::eye_snapshot(&content.dot_eye),
                MainContent::eye_snapshot(&content.triangle_eye),
            ],
            cursor: content.cursor.as_ref().map(|c| c.borrow().appearance()),
            background_rotation: content.background.as_ref().map(|b| b.borrow().rotation()),
            visible_sections: content
                .sections
                .iter()
                .filter(|(id, _)| content.observer.is_visible(*id))
                .map(|(_, name)| name.clone())
                .collect(),
            projects_revealed: content.projects_revealed.get(),
            projects_parallax: content.projects_parallax,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_runtime::element::ElementNode;
    use folio_runtime::sequencer::LoadingVariant;

    fn classic_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.loading.variant = LoadingVariant::Classic;
        config
    }

    fn revealed_session(config: AppConfig) -> SiteSession {
        let mut session = SiteSession::new(config, PageLayout::default()).unwrap();
        session.advance_to(Duration::from_secs(3)).unwrap();
        assert_eq!(session.stage(), Stage::Revealed);
        session
    }

    #[test]
    fn test_input_ignored_while_loading() {
        let mut session = SiteSession::new(AppConfig::default(), PageLayout::default()).unwrap();
        session.dispatch(HostEvent::Wheel { delta: 500.0 });
        session.advance_to(Duration::from_millis(500)).unwrap();
        assert_eq!(session.stage(), Stage::Loading);
        let snapshot = session.snapshot();
        assert!(snapshot.loading.is_some());
        assert_eq!(snapshot.scroll_y, 0.0);
    }

    #[test]
    fn test_classic_reveal() {
        let session = revealed_session(classic_config());
        // 完成定时器在 2300ms 之后的第一帧触发
        let revealed = session
            .transcript()
            .iter()
            .find_map(|e| match e {
                SessionEvent::Revealed { at_ms } => Some(*at_ms),
                _ => None,
            })
            .unwrap();
        assert!((2300..2320).contains(&revealed));
        let snapshot = session.snapshot();
        assert!(snapshot.loading.is_none());
        assert_eq!(snapshot.eyes.len(), 2);
        assert!(snapshot.cursor.is_some());
        assert!(snapshot.background_rotation.is_some());
        assert_eq!(snapshot.active_section, HOME_SECTION);
        assert_eq!(snapshot.visible_sections, vec![HOME_SECTION.to_string()]);
        assert_eq!(snapshot.resume_link, "/resume.pdf");
        let parallax = snapshot.projects_parallax.unwrap();
        assert_eq!(parallax.offset_y, 0.0);
        assert_eq!(parallax.opacity, 0.0);
    }

    #[test]
    fn test_mobile_skips_cursor_and_background() {
        let mut config = classic_config();
        config.device.mobile = true;
        config.device.touch_primary = true;
        let session = revealed_session(config);
        let snapshot = session.snapshot();
        assert!(snapshot.cursor.is_none());
        assert!(snapshot.background_rotation.is_none());
    }

    #[test]
    fn test_hover_squints_both_eyes() {
        let mut session = revealed_session(classic_config());
        let link = ElementPath::leaf(ElementNode::new("a"));
        session.dispatch(HostEvent::PointerOver {
            target: link.clone(),
        });
        let snapshot = session.snapshot();
        assert!(snapshot.hovered);
        assert!(snapshot.eyes.iter().all(|e| e.eyelid == Eyelid::Squint));

        session.dispatch(HostEvent::PointerOut {
            target: link,
            related: None,
        });
        assert!(!session.snapshot().hovered);
    }

    #[test]
    fn test_without_intersection_support_all_sections_visible() {
        let mut session = SiteSession::new(classic_config(), PageLayout::default()).unwrap();
        session.set_intersection_supported(false);
        session.advance_to(Duration::from_secs(3)).unwrap();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.visible_sections.len(), 4);
        assert!(snapshot.projects_revealed);
    }

    #[test]
    fn test_unknown_scroll_target_ignored() {
        let mut session = revealed_session(classic_config());
        session.dispatch(HostEvent::ScrollTo {
            section: "nowhere".to_string(),
        });
        session.run_frames(10).unwrap();
        assert_eq!(session.snapshot().scroll_y, 0.0);
    }

    #[test]
    fn test_native_scroll_syncs_immediately() {
        let mut session = revealed_session(classic_config());
        session.dispatch(HostEvent::NativeScroll { y: 1200.0 });
        assert_eq!(session.snapshot().scroll_y, 1200.0);

        // 超出可滚动范围时截断
        session.dispatch(HostEvent::NativeScroll { y: 1.0e6 });
        let max = PageLayout::default().max_scroll(800.0);
        assert_eq!(session.snapshot().scroll_y, max);
    }

    #[test]
    fn test_reveal_keeps_loading_until_content_mounted() {
        let mut session = SiteSession::new(classic_config(), PageLayout::default()).unwrap();
        // 第二个写者会让主内容挂载失败
        let _writer = session.hover_bus().attach_writer().unwrap();
        assert!(session.advance_to(Duration::from_secs(3)).is_err());
        assert_eq!(session.stage(), Stage::Loading);
        assert!(session.loading.is_some());
        assert!(session.transcript().iter().all(|e| !matches!(e, SessionEvent::Revealed { .. })));
    }

    #[test]
    fn test_host_event_json() {
        let json = r#"[
            { "type": "pointer_move", "x": 10, "y": 20 },
            { "type": "pointer_over", "target": [ { "tag": "button" } ] },
            { "type": "eye_click", "eye": "triangle" },
            { "type": "key", "key": "escape" },
            { "type": "touch_end" },
            { "type": "native_scroll", "y": 300 }
        ]"#;
        let events: Vec<HostEvent> = serde_json::from_str(json).unwrap();
        assert_eq!(events.len(), 6);
        assert_eq!(events[5], HostEvent::NativeScroll { y: 300.0 });
        assert_eq!(
            events[2],
            HostEvent::EyeClick {
                eye: EyeKind::Triangle
            }
        );
        assert_eq!(events[3], HostEvent::Key { key: Key::Escape });
    }
}
