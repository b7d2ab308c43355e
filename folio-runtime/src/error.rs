//! # Error 模块
//!
//! 定义 folio-runtime 中使用的错误类型。
//!
//! 动效层本身没有运行期错误：缺失锚点、零尺寸容器等情况一律按空操作处理。
//! 这里只覆盖配置期能发现的问题。

use thiserror::Error;

/// 配置错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    /// 时长无效（为零或超出范围）
    #[error("时长 '{name}' 无效：{message}")]
    InvalidDuration { name: String, message: String },

    /// 系数超出允许区间
    #[error("系数 '{name}' 的值 {value} 超出范围 {range}")]
    InvalidFactor {
        name: String,
        value: f32,
        range: &'static str,
    },

    /// 可见性阈值超出 [0, 1]
    #[error("可见性阈值 {value} 必须在 0.0 - 1.0 之间")]
    InvalidThreshold { value: f32 },

    /// Hover 广播已经有写入者
    #[error("Hover 广播只允许一个写入者")]
    WriterAlreadyAttached,
}

impl MotionError {
    pub(crate) fn factor(name: &str, value: f32, range: &'static str) -> Self {
        Self::InvalidFactor {
            name: name.to_string(),
            value,
            range,
        }
    }

    pub(crate) fn duration(name: &str, message: impl Into<String>) -> Self {
        Self::InvalidDuration {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

/// Result 类型别名
pub type MotionResult<T> = Result<T, MotionError>;

/// 检查系数是否在 (0, 1] 内
pub(crate) fn check_unit_factor(name: &str, value: f32) -> MotionResult<()> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(MotionError::factor(name, value, "(0, 1]"))
    }
}

/// 检查系数是否为有限正数
pub(crate) fn check_positive(name: &str, value: f32) -> MotionResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(MotionError::factor(name, value, "(0, +inf)"))
    }
}
