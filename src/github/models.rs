use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value.get(field)?.as_str().map(str::to_string)
}

/// 提交记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub message: String,
    pub author: Option<String>,
    pub author_email: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

impl Commit {
    pub fn from_api(data: &Value) -> Self {
        let commit = data.get("commit").cloned().unwrap_or(Value::Null);
        let commit_author = commit.get("author").cloned().unwrap_or(Value::Null);
        Self {
            sha: string_field(data, "sha").unwrap_or_default(),
            message: string_field(&commit, "message").unwrap_or_default(),
            // 顶层 author 是 GitHub 账号；提交对象里的 author 是 git 签名
            author: data
                .get("author")
                .and_then(|a| string_field(a, "login")),
            author_email: string_field(&commit_author, "email"),
            date: commit_author
                .get("date")
                .and_then(parse_timestamp),
        }
    }
}

/// 拉取请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub merged: bool,
    pub author: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    pub fn from_api(data: &Value) -> Self {
        let merged_at = data.get("merged_at").and_then(parse_timestamp);
        Self {
            number: data.get("number").and_then(Value::as_u64).unwrap_or(0),
            title: string_field(data, "title").unwrap_or_default(),
            state: string_field(data, "state").unwrap_or_default(),
            // merged 的判据是 merged_at 存在，与文本 state 无关
            merged: merged_at.is_some(),
            author: data.get("user").and_then(|u| string_field(u, "login")),
            created_at: data.get("created_at").and_then(parse_timestamp),
            merged_at,
        }
    }
}

/// 议题
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub author: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub labels: Vec<String>,
}

impl Issue {
    pub fn from_api(data: &Value) -> Self {
        Self {
            number: data.get("number").and_then(Value::as_u64).unwrap_or(0),
            title: string_field(data, "title").unwrap_or_default(),
            state: string_field(data, "state").unwrap_or_default(),
            author: data.get("user").and_then(|u| string_field(u, "login")),
            created_at: data.get("created_at").and_then(parse_timestamp),
            closed_at: data.get("closed_at").and_then(parse_timestamp),
            labels: data
                .get("labels")
                .and_then(Value::as_array)
                .map(|labels| {
                    labels
                        .iter()
                        .filter_map(|l| string_field(l, "name"))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// issues 端点会混入拉取请求，按 pull_request 标记剔除
    pub fn is_pull_request(data: &Value) -> bool {
        data.get("pull_request").is_some()
    }
}

/// 单仓库在一个时间窗口内的活动统计
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoStats {
    pub commits: u64,
    pub prs_opened: u64,
    pub prs_merged: u64,
    pub prs_closed: u64,
    pub issues_opened: u64,
    pub issues_closed: u64,
    pub contributors: u64,
    pub timeframe: String,
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
}

/// 跨仓库聚合结果；每次缓存未命中时重新计算，不做持久化
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    pub repos: usize,
    pub total_commits: u64,
    pub total_prs_merged: u64,
    pub total_issues_closed: u64,
    /// 各仓库贡献者数之和；仓库间共享贡献者时会重复计数
    pub unique_contributors: u64,
    pub per_repo: HashMap<String, RepoStats>,
    pub timeframe: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}
