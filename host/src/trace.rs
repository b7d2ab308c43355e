//! # Trace 模块
//!
//! 输入轨迹回放：从 JSON 读取带时间戳的输入事件，在手动时钟上按固定帧率重放，
//! 输出事件记录和最终状态。
//!
//! ```json
//! {
//!   "viewport": { "width": 1280, "height": 800 },
//!   "events": [
//!     { "at_ms": 3000, "event": { "type": "wheel", "delta": 600 } }
//!   ]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use folio_runtime::geometry::Size;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::AppConfig;
use crate::session::{HostEvent, PageLayout, SessionError, SessionEvent, SessionSnapshot, SiteSession};

/// 最后一个事件之后默认再跑的时长
pub const DEFAULT_TAIL: Duration = Duration::from_secs(2);

/// 轨迹错误
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("无法读取轨迹文件 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("轨迹解析失败: {0}")]
    Parse(#[from] serde_json::Error),

    /// 时间戳必须单调不减
    #[error("第 {index} 个事件的时间早于前一个事件")]
    Unordered { index: usize },

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// 带时间戳的输入事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedEvent {
    pub at_ms: u64,
    pub event: HostEvent,
}

/// 输入轨迹
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InputTrace {
    /// 覆盖配置里的视口
    #[serde(default)]
    pub viewport: Option<Size>,

    /// 覆盖配置里的帧率
    #[serde(default)]
    pub frame_rate: Option<u32>,

    /// 页面布局；为空时使用默认布局
    #[serde(default)]
    pub layout: Option<PageLayout>,

    /// 回放结束时刻；为空时为最后一个事件之后 [`DEFAULT_TAIL`]
    #[serde(default)]
    pub end_ms: Option<u64>,

    #[serde(default)]
    pub events: Vec<TimedEvent>,
}

impl InputTrace {
    pub fn parse(content: &str) -> Result<Self, TraceError> {
        let trace: Self = serde_json::from_str(content)?;
        trace.validate()?;
        Ok(trace)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, TraceError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| TraceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn validate(&self) -> Result<(), TraceError> {
        for (index, pair) in self.events.windows(2).enumerate() {
            if pair[1].at_ms < pair[0].at_ms {
                return Err(TraceError::Unordered { index: index + 1 });
            }
        }
        Ok(())
    }

    /// 回放结束时刻
    pub fn end(&self) -> Duration {
        match self.end_ms {
            Some(ms) => Duration::from_millis(ms),
            None => {
                let last = self.events.last().map_or(0, |e| e.at_ms);
                Duration::from_millis(last) + DEFAULT_TAIL
            }
        }
    }
}

/// 回放结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub events: Vec<SessionEvent>,
    pub final_state: SessionSnapshot,
}

impl SimulationReport {
    /// 每行一个事件的文本形式
    pub fn transcript(&self) -> String {
        self.events
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// 回放一条轨迹
pub fn simulate(config: &AppConfig, trace: &InputTrace) -> Result<SimulationReport, TraceError> {
    trace.validate()?;

    let mut config = config.clone();
    if let Some(viewport) = trace.viewport {
        config.viewport = viewport;
    }
    if let Some(frame_rate) = trace.frame_rate {
        config.frame_rate = frame_rate;
    }
    let layout = trace.layout.clone().unwrap_or_default();

    let mut session = SiteSession::new(config, layout)?;
    for timed in &trace.events {
        session.advance_to(Duration::from_millis(timed.at_ms))?;
        session.dispatch(timed.event.clone());
    }
    session.advance_to(trace.end())?;

    let report = SimulationReport {
        events: session.transcript(),
        final_state: session.snapshot(),
    };
    info!(
        input = trace.events.len(),
        output = report.events.len(),
        end_ms = report.final_state.time_ms,
        "回放完成"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trace() {
        let trace = InputTrace::parse(
            r#"{
                "frame_rate": 30,
                "events": [
                    { "at_ms": 100, "event": { "type": "click" } },
                    { "at_ms": 250, "event": { "type": "wheel", "delta": 120 } }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(trace.frame_rate, Some(30));
        assert_eq!(trace.events.len(), 2);
        assert_eq!(trace.events[1].event, HostEvent::Wheel { delta: 120.0 });
        assert_eq!(trace.end(), Duration::from_millis(2250));
    }

    #[test]
    fn test_unordered_trace_rejected() {
        let result = InputTrace::parse(
            r#"{ "events": [
                { "at_ms": 300, "event": { "type": "click" } },
                { "at_ms": 100, "event": { "type": "click" } }
            ] }"#,
        );
        assert!(matches!(result, Err(TraceError::Unordered { index: 1 })));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = InputTrace::load(dir.path().join("missing.json"));
        assert!(matches!(result, Err(TraceError::Io { .. })));
    }

    #[test]
    fn test_empty_trace_runs_loading_only() {
        let trace = InputTrace {
            end_ms: Some(1000),
            ..InputTrace::default()
        };
        let report = simulate(&AppConfig::default(), &trace).unwrap();
        assert_eq!(report.final_state.time_ms, 1000);
        assert!(report.final_state.loading.is_some());
        assert!(report.events.is_empty());
    }
}
