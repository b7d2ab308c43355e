//! # folio-host
//!
//! folio-runtime 的 headless 宿主。
//!
//! ## 架构说明
//!
//! Host 层负责：
//! - 配置加载与校验
//! - 把输入事件分发给动效组件，并推进时钟
//! - 输入轨迹回放
//! - 贡献日历的网络请求与布局
//!
//! 动效的计算全部在 folio-runtime 中，这里只做接线。

pub mod config;
pub mod contributions;
pub mod session;
pub mod trace;

pub use config::{AppConfig, ConfigError};
pub use contributions::{ContributionCalendar, ContributionError, ContributionGrid};
pub use session::{HostEvent, PageLayout, SessionEvent, SessionSnapshot, SiteSession, Stage};
pub use trace::{InputTrace, SimulationReport, TraceError, simulate};
