//! # Device 模块
//!
//! 设备能力描述。移动端与“减少动效”偏好会缩短加载时长、关闭 3D 背景与自定义光标；
//! 触屏为主的设备上 hover 语义改用触摸脉冲。

use serde::{Deserialize, Serialize};

/// 视口宽度小于该值视为移动端
pub const MOBILE_BREAKPOINT: f32 = 768.0;

/// 设备能力
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    /// 移动端
    pub mobile: bool,
    /// 用户开启了减少动效
    pub reduced_motion: bool,
    /// 主要输入方式是触摸
    pub touch_primary: bool,
}

impl DeviceProfile {
    pub const DESKTOP: Self = Self {
        mobile: false,
        reduced_motion: false,
        touch_primary: false,
    };

    /// 结合视口宽度得到实际设备能力
    ///
    /// 配置里已声明为移动端的保持不变；否则视口窄于断点时按移动端处理。
    pub fn for_viewport(&self, width: f32) -> Self {
        Self {
            mobile: self.mobile || width < MOBILE_BREAKPOINT,
            ..*self
        }
    }

    /// 使用更短的动画
    pub fn prefers_fast(&self) -> bool {
        self.mobile || self.reduced_motion
    }

    /// 3D 背景
    pub fn decorative_3d_enabled(&self) -> bool {
        !self.prefers_fast()
    }

    pub fn custom_cursor_enabled(&self) -> bool {
        !self.mobile && !self.touch_primary
    }
}
