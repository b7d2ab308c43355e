//! # Background 模块
//!
//! 装饰性的 3D 波浪网格。这里只计算网格顶点高度和整体旋转，
//! 渲染交给宿主。移动端或减少动效时不挂载。

use std::f32::consts::PI;
use std::time::Duration;

use serde::Serialize;

use crate::clock::{REFERENCE_FRAME, frame_factor};
use crate::geometry::{Size, Vec2};
use crate::scheduler::{FrameDriven, LoopControl};

/// 每参考帧的波浪相位增量
const TIME_STEP: f32 = 0.01;
/// 网格朝指针旋转的跟随比例
const ROTATION_EASE: f32 = 0.05;
/// 持续自转速度（弧度/参考帧）
const DRIFT: f32 = 0.0003;

/// 波浪高度
pub fn wave_height(x: f32, z: f32, time: f32) -> f32 {
    let distance = x.hypot(z) / 5.0;
    (distance + time).sin() * 1.5
}

/// 网格线方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridAxis {
    /// 沿 x 方向的线（z 固定）
    AlongX,
    /// 沿 z 方向的线（x 固定）
    AlongZ,
}

/// 网格参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveGrid {
    pub size: f32,
    pub divisions: usize,
    /// 每条线的采样段数
    pub resolution: usize,
}

impl Default for WaveGrid {
    fn default() -> Self {
        Self {
            size: 40.0,
            divisions: 30,
            resolution: 100,
        }
    }
}

impl WaveGrid {
    /// 第 `index` 条线在 `time` 时刻的顶点
    pub fn line(&self, axis: GridAxis, index: usize, time: f32) -> Vec<[f32; 3]> {
        let half = self.size / 2.0;
        let fixed = -half + index as f32 * (self.size / self.divisions as f32);
        (0..=self.resolution)
            .map(|j| {
                let along = -half + j as f32 * (self.size / self.resolution as f32);
                let (x, z) = match axis {
                    GridAxis::AlongX => (along, fixed),
                    GridAxis::AlongZ => (fixed, along),
                };
                [x, wave_height(x, z, time), z]
            })
            .collect()
    }

    pub fn line_count(&self) -> usize {
        (self.divisions + 1) * 2
    }
}

/// 背景状态
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BackgroundField {
    time: f32,
    /// 网格旋转：x 为俯仰，y 为偏航
    rotation: Vec2,
    particle_rotation: f32,
    /// 归一化指针位置 [-1, 1]，y 向上为正
    pointer: Vec2,
}

impl BackgroundField {
    pub fn new() -> Self {
        Self {
            time: 0.0,
            rotation: Vec2::new(PI / 6.0, 0.0),
            particle_rotation: 0.0,
            pointer: Vec2::zero(),
        }
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn rotation(&self) -> Vec2 {
        self.rotation
    }

    pub fn particle_rotation(&self) -> f32 {
        self.particle_rotation
    }

    pub fn pointer_moved(&mut self, position: Vec2, viewport: Size) {
        if viewport.width <= 0.0 || viewport.height <= 0.0 {
            return;
        }
        self.pointer = Vec2::new(
            position.x / viewport.width * 2.0 - 1.0,
            -(position.y / viewport.height) * 2.0 + 1.0,
        );
    }

    pub fn frame(&mut self, dt: Duration) {
        let frames = dt.as_secs_f32() / REFERENCE_FRAME.as_secs_f32();
        self.time += TIME_STEP * frames;
        self.particle_rotation += DRIFT * frames;

        let target = Vec2::new(self.pointer.y * 0.2, self.pointer.x * 0.3);
        let ease = frame_factor(ROTATION_EASE, dt);
        self.rotation = self.rotation.lerp(target, ease);
        self.rotation.y += DRIFT * frames;
    }
}

impl Default for BackgroundField {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDriven for BackgroundField {
    fn on_frame(&mut self, _now: Duration, dt: Duration) -> LoopControl {
        self.frame(dt);
        LoopControl::Continue
    }
}
