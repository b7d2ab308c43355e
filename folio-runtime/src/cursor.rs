//! # Cursor 模块
//!
//! 自定义光标：圆点 + 外环，弹簧跟随指针，悬停在可交互元素上时放大。
//! 移动端不启用。

use std::time::Duration;

use serde::Serialize;

use crate::element::ElementPath;
use crate::geometry::Vec2;
use crate::scheduler::{FrameDriven, LoopControl};
use crate::spring::{Spring, SpringValue};

/// 初始位置放在视口外，首次移动前不可见
const OFFSCREEN: f32 = -100.0;

/// 光标外观
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CursorAppearance {
    pub position: Vec2,
    pub dot_size: f32,
    pub dot_scale: f32,
    pub ring_scale: f32,
    pub opacity: f32,
}

/// 光标下的元素是否“可点击”
///
/// 与 hover 广播的选择器不同，这里只看链接/按钮、`.clickable` 和 `cursor: pointer`。
pub fn is_clickable(path: &ElementPath) -> bool {
    let Some(target) = path.target() else {
        return false;
    };
    target.is_tag("a")
        || target.is_tag("button")
        || target.has_class("clickable")
        || target.pointer_cursor
        || path.closest(|n| n.is_tag("a") || n.is_tag("button")).is_some()
}

/// 自定义光标
#[derive(Debug, Clone)]
pub struct CustomCursor {
    x: SpringValue,
    y: SpringValue,
    interactive: bool,
}

impl CustomCursor {
    pub fn new() -> Self {
        Self {
            x: SpringValue::new(Spring::CURSOR, OFFSCREEN),
            y: SpringValue::new(Spring::CURSOR, OFFSCREEN),
            interactive: false,
        }
    }

    pub fn pointer_moved(&mut self, position: Vec2, target: &ElementPath) {
        self.x.set_target(position.x);
        self.y.set_target(position.y);
        self.interactive = is_clickable(target);
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x.value(), self.y.value())
    }

    pub fn is_at_rest(&self) -> bool {
        self.x.is_at_rest() && self.y.is_at_rest()
    }

    pub fn appearance(&self) -> CursorAppearance {
        let (dot_size, dot_scale, ring_scale, opacity) = if self.interactive {
            (14.0, 1.2, 1.15, 0.85)
        } else {
            (10.0, 1.0, 1.0, 1.0)
        };
        CursorAppearance {
            position: self.position(),
            dot_size,
            dot_scale,
            ring_scale,
            opacity,
        }
    }
}

impl Default for CustomCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDriven for CustomCursor {
    fn on_frame(&mut self, _now: Duration, dt: Duration) -> LoopControl {
        self.x.step(dt);
        self.y.step(dt);
        LoopControl::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementNode;

    #[test]
    fn test_clickable_detection() {
        assert!(is_clickable(&ElementPath::leaf(ElementNode::new("a"))));
        assert!(is_clickable(
            &ElementPath::leaf(ElementNode::new("button")).child(ElementNode::new("span"))
        ));
        assert!(is_clickable(&ElementPath::leaf(
            ElementNode::new("div").with_pointer_cursor()
        )));
        assert!(!is_clickable(&ElementPath::leaf(
            ElementNode::new("div").with_class("interactive-card")
        )));
        assert!(!is_clickable(&ElementPath::default()));
    }

    #[test]
    fn test_follows_pointer() {
        let mut cursor = CustomCursor::new();
        assert_eq!(cursor.position(), Vec2::new(-100.0, -100.0));

        cursor.pointer_moved(
            Vec2::new(400.0, 300.0),
            &ElementPath::leaf(ElementNode::new("a")),
        );
        let mut now = Duration::ZERO;
        for _ in 0..120 {
            now += Duration::from_millis(16);
            cursor.on_frame(now, Duration::from_millis(16));
        }
        assert!(cursor.is_at_rest());
        assert_eq!(cursor.position(), Vec2::new(400.0, 300.0));

        let look = cursor.appearance();
        assert_eq!(look.dot_size, 14.0);
        assert_eq!(look.ring_scale, 1.15);
    }
}
