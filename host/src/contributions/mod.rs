//! # Contributions 模块
//!
//! GitHub 贡献日历：GraphQL 拉取 + 网格布局。
//!
//! 拉取失败不影响页面其它部分，调用方通过 [`load_or_empty`] 拿到空日历即可。

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AppConfig;

/// 方块边长
pub const SQUARE_SIZE: f32 = 14.0;
/// 方块间距
pub const SQUARE_GAP: f32 = 3.0;
/// 方块圆角
pub const SQUARE_RADIUS: f32 = 3.0;
/// 每周 7 行
pub const DAYS_PER_WEEK: usize = 7;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const CALENDAR_QUERY: &str = "query($login: String!) {
  user(login: $login) {
    contributionsCollection {
      contributionCalendar {
        weeks {
          contributionDays {
            date
            contributionCount
          }
        }
      }
    }
  }
}";

/// 贡献日历错误
#[derive(Error, Debug)]
pub enum ContributionError {
    /// 未配置访问令牌
    #[error("环境变量 {env} 未设置访问令牌")]
    MissingToken { env: String },

    /// 网络错误
    #[error("HTTP 请求失败: {0}")]
    Http(#[from] reqwest::Error),

    /// 非 2xx 响应
    #[error("GitHub API 返回状态码 {0}")]
    Status(u16),

    /// GraphQL 返回了错误或缺少数据
    #[error("GitHub API 错误: {0}")]
    Api(String),

    /// 响应不是预期的 JSON
    #[error("响应解析失败: {0}")]
    Payload(#[from] serde_json::Error),
}

/// 单日贡献
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionDay {
    pub date: String,
    pub contribution_count: u32,
}

/// 一周
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionWeek {
    pub contribution_days: Vec<ContributionDay>,
}

/// 贡献日历
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContributionCalendar {
    pub weeks: Vec<ContributionWeek>,
}

impl ContributionCalendar {
    pub fn is_empty(&self) -> bool {
        self.weeks.is_empty()
    }

    pub fn total(&self) -> u32 {
        self.weeks
            .iter()
            .flat_map(|w| &w.contribution_days)
            .map(|d| d.contribution_count)
            .sum()
    }

    /// 有贡献的天数
    pub fn active_days(&self) -> usize {
        self.weeks
            .iter()
            .flat_map(|w| &w.contribution_days)
            .filter(|d| d.contribution_count > 0)
            .count()
    }
}

// GraphQL 响应外壳
#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<ResponseData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    user: Option<UserData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserData {
    contributions_collection: CollectionData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionData {
    contribution_calendar: ContributionCalendar,
}

/// 请求体
pub fn request_body(username: &str) -> serde_json::Value {
    serde_json::json!({
        "query": CALENDAR_QUERY,
        "variables": { "login": username },
    })
}

/// 解析 GraphQL 响应
pub fn parse_response(body: &str) -> Result<ContributionCalendar, ContributionError> {
    let response: GraphqlResponse = serde_json::from_str(body)?;
    if let Some(first) = response.errors.first() {
        return Err(ContributionError::Api(first.message.clone()));
    }
    let user = response
        .data
        .and_then(|data| data.user)
        .ok_or_else(|| ContributionError::Api("响应中没有用户数据".to_string()))?;
    Ok(user.contributions_collection.contribution_calendar)
}

/// GitHub GraphQL 客户端
pub struct ContributionClient {
    http: Client,
    api_url: String,
    username: String,
    token: String,
}

impl ContributionClient {
    /// 令牌从配置指定的环境变量读取
    pub fn from_config(config: &AppConfig) -> Result<Self, ContributionError> {
        let token = config
            .github_token()
            .ok_or_else(|| ContributionError::MissingToken {
                env: config.contributions.token_env.clone(),
            })?;
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_url: config.contributions.api_url.clone(),
            username: config.contributions.username.clone(),
            token,
        })
    }

    pub fn fetch(&self) -> Result<ContributionCalendar, ContributionError> {
        debug!(url = %self.api_url, user = %self.username, "请求贡献日历");
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.token)
            .header(USER_AGENT, "folio-host")
            .json(&request_body(&self.username))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContributionError::Status(status.as_u16()));
        }
        parse_response(&response.text()?)
    }
}

/// 拉取日历，任何失败都退化为空日历
pub fn load_or_empty(config: &AppConfig) -> ContributionCalendar {
    let client = match ContributionClient::from_config(config) {
        Ok(client) => client,
        Err(e) => {
            info!(error = %e, "跳过贡献日历");
            return ContributionCalendar::default();
        }
    };
    match client.fetch() {
        Ok(calendar) => {
            info!(
                weeks = calendar.weeks.len(),
                total = calendar.total(),
                "贡献日历加载完成"
            );
            calendar
        }
        Err(e) => {
            warn!(error = %e, "贡献日历加载失败，显示为空");
            ContributionCalendar::default()
        }
    }
}

/// 网格中的一个方块
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridCell {
    pub x: f32,
    pub y: f32,
    pub filled: bool,
    /// 悬停提示
    pub title: String,
}

/// 布局后的网格：列为周，行为一周中的第几天
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributionGrid {
    pub width: f32,
    pub height: f32,
    pub columns: usize,
    pub cells: Vec<GridCell>,
}

impl ContributionGrid {
    pub fn layout(calendar: &ContributionCalendar) -> Self {
        let pitch = SQUARE_SIZE + SQUARE_GAP;
        let cells = calendar
            .weeks
            .iter()
            .enumerate()
            .flat_map(|(col, week)| {
                week.contribution_days
                    .iter()
                    .take(DAYS_PER_WEEK)
                    .enumerate()
                    .map(move |(row, day)| GridCell {
                        x: col as f32 * pitch,
                        y: row as f32 * pitch,
                        filled: day.contribution_count > 0,
                        title: format!("{}: {} contributions", day.date, day.contribution_count),
                    })
            })
            .collect();

        Self {
            width: calendar.weeks.len() as f32 * pitch,
            height: DAYS_PER_WEEK as f32 * pitch,
            columns: calendar.weeks.len(),
            cells,
        }
    }

    /// 字符画，`#` 为有贡献，`.` 为无贡献，空格为缺失的日子
    pub fn to_ascii(&self) -> String {
        let pitch = SQUARE_SIZE + SQUARE_GAP;
        let mut rows = vec![vec![' '; self.columns]; DAYS_PER_WEEK];
        for cell in &self.cells {
            let col = (cell.x / pitch).round() as usize;
            let row = (cell.y / pitch).round() as usize;
            if let Some(slot) = rows.get_mut(row).and_then(|r| r.get_mut(col)) {
                *slot = if cell.filled { '#' } else { '.' };
            }
        }
        rows.into_iter()
            .map(|r| r.into_iter().collect::<String>().trim_end().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
