//! # Visibility 模块
//!
//! 视口可见性观察。每个被观察的区块持有一个 [`VisibilityFlag`]：
//! 相交比例达到阈值时为 true；`once` 模式下第一次为 true 后锁定，不再回落。
//!
//! 相交比例由 [`IntersectionSource`] 提供。宿主没有相交检测能力时使用
//! [`AlwaysVisible`]，所有区块直接视为可见，内容不会因为观察失败而一直隐藏。

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{MotionError, MotionResult};
use crate::geometry::Rect;

/// 相交比例来源
pub trait IntersectionSource {
    /// `target` 与根区域的相交面积比例；无法计算时返回 None（按可见处理）
    fn intersection_ratio(&self, target: &Rect) -> Option<f32>;

    /// 视口变化（滚动/resize）
    fn set_viewport(&mut self, _viewport: Rect) {}
}

impl<S: IntersectionSource + ?Sized> IntersectionSource for Box<S> {
    fn intersection_ratio(&self, target: &Rect) -> Option<f32> {
        (**self).intersection_ratio(target)
    }

    fn set_viewport(&mut self, viewport: Rect) {
        (**self).set_viewport(viewport)
    }
}

/// 以视口为根的几何相交
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportIntersection {
    viewport: Rect,
}

impl ViewportIntersection {
    pub fn new(viewport: Rect) -> Self {
        Self { viewport }
    }
}

impl IntersectionSource for ViewportIntersection {
    fn intersection_ratio(&self, target: &Rect) -> Option<f32> {
        let root = self.viewport;
        if target.is_empty() {
            // 零面积目标：位于根区域内即视为完全相交
            return Some(if root.contains(target.center()) { 1.0 } else { 0.0 });
        }
        let ratio = root
            .intersection(target)
            .map_or(0.0, |overlap| overlap.area() / target.area());
        Some(ratio.clamp(0.0, 1.0))
    }

    fn set_viewport(&mut self, viewport: Rect) {
        self.viewport = viewport;
    }
}

/// 没有相交检测能力时的降级实现
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysVisible;

impl IntersectionSource for AlwaysVisible {
    fn intersection_ratio(&self, _target: &Rect) -> Option<f32> {
        None
    }
}

/// 观察参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityOptions {
    /// 0 表示“有任何相交”即可
    pub threshold: f32,
    pub once: bool,
}

impl VisibilityOptions {
    pub fn once(threshold: f32) -> Self {
        Self {
            threshold,
            once: true,
        }
    }

    pub fn validate(&self) -> MotionResult<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(MotionError::InvalidThreshold {
                value: self.threshold,
            });
        }
        Ok(())
    }

    /// 比例是否满足阈值
    pub fn is_met(&self, ratio: f32) -> bool {
        if self.threshold <= 0.0 {
            ratio > 0.0
        } else {
            ratio >= self.threshold
        }
    }
}

impl Default for VisibilityOptions {
    fn default() -> Self {
        Self::once(0.1)
    }
}

/// 可见性标志
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VisibilityFlag {
    visible: bool,
    once: bool,
    latched: bool,
}

impl VisibilityFlag {
    pub fn new(once: bool) -> Self {
        Self {
            visible: false,
            once,
            latched: false,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// 应用一次相交结果，值变化时返回新值
    pub fn apply(&mut self, intersecting: bool) -> Option<bool> {
        if self.latched {
            return None;
        }
        let next = intersecting;
        if next && self.once {
            self.latched = true;
        }
        if next == self.visible {
            return None;
        }
        self.visible = next;
        Some(next)
    }
}

/// 观察 id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObservationId(u64);

/// 一次可见性变化
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityChange {
    pub id: ObservationId,
    pub visible: bool,
}

struct Observation {
    id: ObservationId,
    target: Rect,
    options: VisibilityOptions,
    flag: VisibilityFlag,
    listener: Option<Box<dyn FnMut(bool)>>,
}

/// 可见性观察器
pub struct VisibilityObserver<S: IntersectionSource = Box<dyn IntersectionSource>> {
    source: S,
    entries: Vec<Observation>,
    next_id: u64,
}

impl VisibilityObserver<Box<dyn IntersectionSource>> {
    /// 根据宿主能力选择相交来源，缺失时降级为全部可见
    pub fn from_capability(source: Option<Box<dyn IntersectionSource>>) -> Self {
        let source = source.unwrap_or_else(|| {
            warn!("宿主不支持相交检测，所有区块视为可见");
            Box::new(AlwaysVisible)
        });
        Self::new(source)
    }
}

impl<S: IntersectionSource> VisibilityObserver<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            entries: Vec::new(),
            next_id: 1,
        }
    }

    /// 开始观察；非法阈值会被截断到 [0, 1]
    pub fn observe(&mut self, target: Rect, options: VisibilityOptions) -> ObservationId {
        self.insert(target, options, None)
    }

    /// 开始观察并在变化时回调
    pub fn observe_with(
        &mut self,
        target: Rect,
        options: VisibilityOptions,
        listener: impl FnMut(bool) + 'static,
    ) -> ObservationId {
        self.insert(target, options, Some(Box::new(listener)))
    }

    fn insert(
        &mut self,
        target: Rect,
        mut options: VisibilityOptions,
        listener: Option<Box<dyn FnMut(bool)>>,
    ) -> ObservationId {
        if let Err(e) = options.validate() {
            warn!(error = %e, "可见性阈值已截断");
            options.threshold = options.threshold.clamp(0.0, 1.0);
        }
        let id = ObservationId(self.next_id);
        self.next_id += 1;
        self.entries.push(Observation {
            id,
            target,
            options,
            flag: VisibilityFlag::new(options.once),
            listener,
        });
        id
    }

    /// 更新被观察区块的位置
    pub fn set_target(&mut self, id: ObservationId, target: Rect) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            entry.target = target;
        }
    }

    pub fn set_viewport(&mut self, viewport: Rect) {
        self.source.set_viewport(viewport);
    }

    /// 停止全部观察
    pub fn disconnect(&mut self) {
        if !self.entries.is_empty() {
            debug!(count = self.entries.len(), "可见性观察器断开");
        }
        self.entries.clear();
    }

    pub fn observed_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_visible(&self, id: ObservationId) -> bool {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .is_some_and(|e| e.flag.is_visible())
    }

    /// 重新计算所有区块，返回发生的变化
    pub fn evaluate(&mut self) -> Vec<VisibilityChange> {
        let mut changes = Vec::new();
        for entry in &mut self.entries {
            let intersecting = match self.source.intersection_ratio(&entry.target) {
                Some(ratio) => entry.options.is_met(ratio),
                None => true,
            };
            if let Some(visible) = entry.flag.apply(intersecting) {
                if let Some(listener) = entry.listener.as_mut() {
                    listener(visible);
                }
                changes.push(VisibilityChange {
                    id: entry.id,
                    visible,
                });
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn viewport_at(scroll_y: f32) -> Rect {
        Rect::new(0.0, scroll_y, 1000.0, 800.0)
    }

    #[test]
    fn test_flag_once_latches() {
        let mut flag = VisibilityFlag::new(true);
        assert_eq!(flag.apply(false), None);
        assert_eq!(flag.apply(true), Some(true));
        assert_eq!(flag.apply(false), None);
        assert!(flag.is_visible());
    }

    #[test]
    fn test_flag_repeating() {
        let mut flag = VisibilityFlag::new(false);
        assert_eq!(flag.apply(true), Some(true));
        assert_eq!(flag.apply(true), None);
        assert_eq!(flag.apply(false), Some(false));
    }

    #[test]
    fn test_threshold_semantics() {
        let zero = VisibilityOptions::once(0.0);
        assert!(!zero.is_met(0.0));
        assert!(zero.is_met(0.001));

        let tenth = VisibilityOptions::once(0.1);
        assert!(!tenth.is_met(0.09));
        assert!(tenth.is_met(0.1));
    }

    #[test]
    fn test_observer_reveals_on_scroll() {
        let mut observer = VisibilityObserver::new(ViewportIntersection::new(viewport_at(0.0)));
        // 区块高 1000，位于 1500
        let section = Rect::new(0.0, 1500.0, 1000.0, 1000.0);
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let id = observer.observe_with(section, VisibilityOptions::once(0.2), move |_| {
            h.set(h.get() + 1)
        });

        assert!(observer.evaluate().is_empty());

        // 露出 100px = 10%，不足 20%
        observer.set_viewport(viewport_at(800.0));
        assert!(observer.evaluate().is_empty());

        // 露出 300px = 30%
        observer.set_viewport(viewport_at(1000.0));
        assert_eq!(observer.evaluate(), vec![VisibilityChange { id, visible: true }]);

        // 滚回顶部，once 不回落
        observer.set_viewport(viewport_at(0.0));
        assert!(observer.evaluate().is_empty());
        assert!(observer.is_visible(id));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_missing_capability_degrades_to_visible() {
        let mut observer = VisibilityObserver::from_capability(None);
        let id = observer.observe(Rect::new(0.0, 99_999.0, 10.0, 10.0), VisibilityOptions::default());
        let changes = observer.evaluate();
        assert_eq!(changes.len(), 1);
        assert!(observer.is_visible(id));
    }

    #[test]
    fn test_disconnect() {
        let mut observer = VisibilityObserver::new(ViewportIntersection::new(viewport_at(0.0)));
        let id = observer.observe(Rect::new(0.0, 0.0, 10.0, 10.0), VisibilityOptions::default());
        assert_eq!(observer.observed_count(), 1);
        observer.disconnect();
        assert_eq!(observer.observed_count(), 0);
        assert!(observer.evaluate().is_empty());
        assert!(!observer.is_visible(id));
    }

    #[test]
    fn test_zero_area_target() {
        let source = ViewportIntersection::new(viewport_at(0.0));
        assert_eq!(source.intersection_ratio(&Rect::new(10.0, 10.0, 0.0, 0.0)), Some(1.0));
        assert_eq!(source.intersection_ratio(&Rect::new(10.0, 900.0, 0.0, 0.0)), Some(0.0));
    }
}
