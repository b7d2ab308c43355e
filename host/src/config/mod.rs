//! # Config 模块
//!
//! 宿主配置，集中管理所有可调项。
//!
//! ## 配置优先级
//!
//! 1. 输入轨迹里的 `viewport` / `frame_rate`（最高，只影响本次回放）
//! 2. 配置文件 (folio.json，路径由 `--config` 指定)
//! 3. 默认值（最低）
//!
//! 访问令牌不写进配置文件，只记录环境变量名。

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use folio_runtime::device::DeviceProfile;
use folio_runtime::geometry::Size;
use folio_runtime::pointer::TrackerConfig;
use folio_runtime::scroll::SCROLL_LERP;
use folio_runtime::sequencer::{LoadingVariant, SequencerConfig};
use folio_runtime::visibility::VisibilityOptions;
use folio_runtime::{MotionError, SmoothScroll};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// 默认配置文件名
pub const DEFAULT_CONFIG_PATH: &str = "folio.json";

/// 静态资源目录
const PUBLIC_DIR: &str = "public";

/// 应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// 设备能力
    #[serde(default)]
    pub device: DeviceProfile,

    /// 回放时的视口尺寸
    #[serde(default)]
    pub viewport: Size,

    /// 回放帧率
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    /// 简历文件路径（导航栏下载按钮）
    #[serde(default = "default_resume_path")]
    pub resume_path: PathBuf,

    /// 加载界面
    #[serde(default)]
    pub loading: LoadingConfig,

    /// 眼睛跟随参数
    #[serde(default)]
    pub tracker: TrackerSettings,

    /// 区块入场检测
    #[serde(default)]
    pub visibility: VisibilityOptions,

    /// hover 广播
    #[serde(default)]
    pub hover: HoverConfig,

    /// 平滑滚动
    #[serde(default)]
    pub scroll: ScrollConfig,

    /// 贡献日历
    #[serde(default)]
    pub contributions: ContributionsConfig,
}

/// 加载界面配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadingConfig {
    #[serde(default)]
    pub variant: LoadingVariant,

    /// 覆盖进度时长（毫秒）；为空时按设备取预设值
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

/// 两只眼睛各自的跟随参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerSettings {
    #[serde(default = "TrackerConfig::dot_eye")]
    pub dot: TrackerConfig,

    #[serde(default = "TrackerConfig::triangle_eye")]
    pub triangle: TrackerConfig,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            dot: TrackerConfig::dot_eye(),
            triangle: TrackerConfig::triangle_eye(),
        }
    }
}

/// hover 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoverConfig {
    /// 触屏点按后保持 hover 的时长（毫秒）
    #[serde(default = "default_touch_pulse_ms")]
    pub touch_pulse_ms: u64,
}

impl Default for HoverConfig {
    fn default() -> Self {
        Self {
            touch_pulse_ms: default_touch_pulse_ms(),
        }
    }
}

/// 滚动配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollConfig {
    /// 每参考帧的跟随比例
    #[serde(default = "default_scroll_lerp")]
    pub lerp: f32,

    /// 导航栏高度；为空时使用回退值
    #[serde(default)]
    pub navbar_height: Option<f32>,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            lerp: default_scroll_lerp(),
            navbar_height: None,
        }
    }
}

/// 贡献日历配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionsConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_username")]
    pub username: String,

    /// 存放访问令牌的环境变量名
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for ContributionsConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            username: default_username(),
            token_env: default_token_env(),
        }
    }
}

// 默认值函数
fn default_frame_rate() -> u32 {
    60
}

fn default_resume_path() -> PathBuf {
    PathBuf::from("public/resume.pdf")
}

fn default_touch_pulse_ms() -> u64 {
    300
}

fn default_scroll_lerp() -> f32 {
    SCROLL_LERP
}

fn default_api_url() -> String {
    "https://api.github.com/graphql".to_string()
}

fn default_username() -> String {
    "folio".to_string()
}

fn default_token_env() -> String {
    "FOLIO_GITHUB_TOKEN".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device: DeviceProfile::default(),
            viewport: Size::default(),
            frame_rate: default_frame_rate(),
            resume_path: default_resume_path(),
            loading: LoadingConfig::default(),
            tracker: TrackerSettings::default(),
            visibility: VisibilityOptions::default(),
            hover: HoverConfig::default(),
            scroll: ScrollConfig::default(),
            contributions: ContributionsConfig::default(),
        }
    }
}

impl AppConfig {
    /// 加载配置文件
    ///
    /// 如果文件不存在或解析失败，返回默认配置并记录警告。
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            warn!(path = %path.display(), "配置文件不存在，使用默认配置");
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => {
                    info!(path = %path.display(), "配置文件加载成功");
                    config
                }
                Err(e) => {
                    warn!(error = %e, "配置文件解析失败，使用默认配置");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(error = %e, "配置文件读取失败，使用默认配置");
                Self::default()
            }
        }
    }

    /// 保存配置到文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializationFailed(e.to_string()))?;

        fs::write(path, json).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_rate == 0 || self.frame_rate > 240 {
            return Err(ConfigError::ValidationFailed(
                "帧率必须在 1 - 240 之间".to_string(),
            ));
        }

        if !(self.viewport.width > 0.0 && self.viewport.height > 0.0) {
            return Err(ConfigError::ValidationFailed(
                "视口尺寸必须为正数".to_string(),
            ));
        }

        if self.loading.duration_ms == Some(0) {
            return Err(ConfigError::ValidationFailed(
                "加载时长必须大于 0".to_string(),
            ));
        }

        if self.contributions.username.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "必须配置 contributions.username".to_string(),
            ));
        }

        if self.resume_path.file_name().is_none() {
            return Err(ConfigError::ValidationFailed(
                "resume_path 必须指向一个文件".to_string(),
            ));
        }

        if self.scroll.navbar_height.is_some_and(|h| h <= 0.0) {
            return Err(ConfigError::ValidationFailed(
                "导航栏高度必须为正数".to_string(),
            ));
        }

        self.tracker.dot.validate()?;
        self.tracker.triangle.validate()?;
        self.visibility.validate()?;
        self.sequencer_config().validate()?;
        SmoothScroll::new(0.0).with_lerp(self.scroll.lerp)?;

        Ok(())
    }

    /// 结合配置视口得到的设备能力
    pub fn device_profile(&self) -> DeviceProfile {
        self.device.for_viewport(self.viewport.width)
    }

    /// 按设备和覆盖项得到加载序列配置
    pub fn sequencer_config(&self) -> SequencerConfig {
        let config = self.loading.variant.config(&self.device_profile());
        match self.loading.duration_ms {
            Some(ms) => config.with_duration(Duration::from_millis(ms)),
            None => config,
        }
    }

    /// 简历下载链接；`public/` 下的文件从站点根目录提供
    pub fn resume_link(&self) -> String {
        let path = self
            .resume_path
            .strip_prefix(PUBLIC_DIR)
            .unwrap_or(self.resume_path.as_path());
        let href = path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        format!("/{}", href.trim_start_matches('/'))
    }

    pub fn touch_pulse(&self) -> Duration {
        Duration::from_millis(self.hover.touch_pulse_ms)
    }

    /// 回放的帧间隔
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frame_rate.max(1)))
    }

    /// 从环境变量读取访问令牌，空值视为缺失
    pub fn github_token(&self) -> Option<String> {
        std::env::var(&self.contributions.token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
    }
}

/// 配置错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// 序列化失败
    #[error("配置序列化失败: {0}")]
    SerializationFailed(String),

    /// IO 错误
    #[error("配置 IO 错误: {0}")]
    IoError(String),

    /// 验证失败
    #[error("配置验证失败: {0}")]
    ValidationFailed(String),

    /// 动效参数无效
    #[error("配置验证失败: {0}")]
    Motion(#[from] MotionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.frame_rate, 60);
        assert_eq!(config.viewport, Size::new(1280.0, 800.0));
        assert_eq!(config.loading.variant, LoadingVariant::Curtain);
        assert_eq!(config.contributions.token_env, "FOLIO_GITHUB_TOKEN");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();

        // 反序列化
        let loaded: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{ "device": { "mobile": true }, "loading": { "variant": "classic" } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert!(config.device.mobile);
        assert!(!config.device.reduced_motion);
        assert_eq!(config.frame_rate, 60);
        assert_eq!(config.tracker, TrackerSettings::default());

        // 移动端的经典变体使用短时长
        let sequencer = config.sequencer_config();
        assert_eq!(sequencer.duration, Duration::from_millis(1200));
        assert_eq!(sequencer.hold, Duration::from_millis(150));
    }

    #[test]
    fn test_duration_override() {
        let mut config = AppConfig::default();
        config.loading.duration_ms = Some(500);
        assert_eq!(config.sequencer_config().duration, Duration::from_millis(500));
        assert!(config.validate().is_ok());

        config.loading.duration_ms = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();

        // 无效帧率
        config.frame_rate = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed(_))
        ));
        config.frame_rate = 60;

        // 无效平滑系数
        config.tracker.dot.smoothing = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Motion(_))));
        config.tracker.dot = TrackerConfig::dot_eye();

        // 无效阈值
        config.visibility.threshold = 2.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Motion(MotionError::InvalidThreshold { .. }))
        ));
        config.visibility.threshold = 0.1;

        config.scroll.lerp = 0.0;
        assert!(config.validate().is_err());
        config.scroll.lerp = 0.1;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folio.json");

        let mut config = AppConfig::default();
        config.frame_rate = 120;
        config.device.reduced_motion = true;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path);
        assert_eq!(loaded.frame_rate, 120);
        assert!(loaded.device.reduced_motion);
        assert_eq!(loaded.frame_interval(), Duration::from_secs_f64(1.0 / 120.0));
    }

    #[test]
    fn test_load_missing_or_invalid_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let missing = AppConfig::load(dir.path().join("nope.json"));
        assert_eq!(missing, AppConfig::default());

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ not json").unwrap();
        assert_eq!(AppConfig::load(&broken), AppConfig::default());
    }

    #[test]
    fn test_resume_link() {
        let mut config = AppConfig::default();
        assert_eq!(config.resume_link(), "/resume.pdf");

        config.resume_path = PathBuf::from("public/docs/cv.pdf");
        assert_eq!(config.resume_link(), "/docs/cv.pdf");

        config.resume_path = PathBuf::from("cv.pdf");
        assert_eq!(config.resume_link(), "/cv.pdf");

        config.resume_path = PathBuf::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_narrow_viewport_is_mobile() {
        let mut config = AppConfig::default();
        assert!(!config.device_profile().mobile);
        assert_eq!(config.sequencer_config().duration, Duration::from_millis(2500));

        config.viewport = Size::new(375.0, 667.0);
        assert!(config.device_profile().mobile);
        assert!(!config.device.mobile);
        assert_eq!(config.sequencer_config().duration, Duration::from_millis(2000));
    }

    #[test]
    fn test_github_token_from_env() {
        let mut config = AppConfig::default();
        config.contributions.token_env = "FOLIO_TEST_TOKEN_THAT_IS_NOT_SET".to_string();
        assert_eq!(config.github_token(), None);
    }
}
