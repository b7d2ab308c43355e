//! # Spring 模块
//!
//! 阻尼弹簧。自定义光标与展开层都用它做跟随/过渡。

use std::time::Duration;

/// 弹簧参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spring {
    pub stiffness: f32,
    pub damping: f32,
    pub mass: f32,
    /// 与目标的距离低于该值视为静止
    pub rest_delta: f32,
    /// 速度低于该值视为静止
    pub rest_speed: f32,
}

impl Spring {
    /// 光标跟随
    pub const CURSOR: Self = Self {
        stiffness: 300.0,
        damping: 25.0,
        mass: 0.8,
        rest_delta: 0.001,
        rest_speed: 0.01,
    };

    /// 眼睛展开层
    pub const EXPANSION: Self = Self {
        stiffness: 150.0,
        damping: 22.0,
        mass: 0.9,
        rest_delta: 0.001,
        rest_speed: 0.01,
    };
}

/// 单个弹簧驱动的数值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringValue {
    spring: Spring,
    value: f32,
    velocity: f32,
    target: f32,
}

impl SpringValue {
    /// 积分子步长
    const SUBSTEP: f32 = 0.001;

    pub fn new(spring: Spring, value: f32) -> Self {
        Self {
            spring,
            value,
            velocity: 0.0,
            target: value,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// 直接跳到某个值并清零速度
    pub fn jump(&mut self, value: f32) {
        self.value = value;
        self.target = value;
        self.velocity = 0.0;
    }

    pub fn is_at_rest(&self) -> bool {
        (self.target - self.value).abs() < self.spring.rest_delta
            && self.velocity.abs() < self.spring.rest_speed
    }

    /// 推进 dt，返回推进后的值
    ///
    /// 半隐式欧拉，按 1ms 子步积分；静止后吸附到目标。
    pub fn step(&mut self, dt: Duration) -> f32 {
        if self.is_at_rest() {
            self.value = self.target;
            self.velocity = 0.0;
            return self.value;
        }
        let mut remaining = dt.as_secs_f32().min(0.1);
        while remaining > 0.0 {
            let h = remaining.min(Self::SUBSTEP);
            let displacement = self.value - self.target;
            let force = -self.spring.stiffness * displacement - self.spring.damping * self.velocity;
            self.velocity += force / self.spring.mass * h;
            self.value += self.velocity * h;
            remaining -= h;
        }
        if self.is_at_rest() {
            self.value = self.target;
            self.velocity = 0.0;
        }
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle(value: &mut SpringValue) -> usize {
        for frame in 0..600 {
            value.step(Duration::from_millis(16));
            if value.is_at_rest() {
                return frame;
            }
        }
        600
    }

    #[test]
    fn test_settles_on_target() {
        let mut value = SpringValue::new(Spring::CURSOR, 0.0);
        value.set_target(100.0);
        assert!(settle(&mut value) < 600);
        assert_eq!(value.value(), 100.0);
    }

    #[test]
    fn test_expansion_settles() {
        let mut value = SpringValue::new(Spring::EXPANSION, 0.0);
        value.set_target(1.0);
        value.step(Duration::from_millis(16));
        assert!(value.value() > 0.0 && value.value() < 1.0);
        assert!(settle(&mut value) < 600);
        assert_eq!(value.value(), 1.0);
    }

    #[test]
    fn test_rest_is_stable() {
        let mut value = SpringValue::new(Spring::CURSOR, 5.0);
        assert!(value.is_at_rest());
        assert_eq!(value.step(Duration::from_millis(16)), 5.0);
    }
}
