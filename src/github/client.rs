use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use thiserror::Error;

use crate::config::Config;
use crate::github::models::{Commit, Issue, PullRequest, RepoStats};
use crate::validators::Timeframe;

/// 单次调用超时
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 瞬时故障的最大尝试次数
const MAX_ATTEMPTS: u32 = 3;

/// 退避起始间隔，每次翻倍
const BACKOFF_BASE: Duration = Duration::from_secs(2);

/// 退避上限
const BACKOFF_MAX: Duration = Duration::from_secs(10);

/// 每页条目数
const PER_PAGE: &str = "100";

#[derive(Debug, Error)]
pub enum GithubError {
    /// 上游预算耗尽，未发出请求就拒绝
    #[error("rate limited, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: i64 },

    /// 非瞬时的上游状态码(4xx)，或重试耗尽后的 5xx
    #[error("github api returned status {0}")]
    Status(u16),

    /// 网络层故障，重试耗尽
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// 从上游响应头跟踪到的预算状态；仅作预判，不是硬保证
#[derive(Debug, Clone, Copy)]
struct UpstreamRateState {
    remaining: i64,
    reset_at: Option<DateTime<Utc>>,
}

/// GitHub API 客户端
///
/// 三重保护：30 秒调用超时；瞬时故障(网络/5xx)按指数退避重试；
/// 自跟踪上游配额，余量触底时在发出请求之前快速失败。
pub struct GithubClient {
    http: reqwest::Client,
    base_url: String,
    rate_limit_buffer: i64,
    rate_state: Mutex<UpstreamRateState>,
}

impl GithubClient {
    pub fn new(config: &Config) -> Result<Self, GithubError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "accept",
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );
        if !config.github_token.is_empty() {
            if let Ok(value) =
                HeaderValue::from_str(&format!("Bearer {}", config.github_token))
            {
                headers.insert("authorization", value);
            }
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("hyperbeats/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: config.github_api_base_url.trim_end_matches('/').to_string(),
            rate_limit_buffer: config.github_rate_limit_buffer,
            rate_state: Mutex::new(UpstreamRateState {
                remaining: 5000,
                reset_at: None,
            }),
        })
    }

    /// 预算触底且重置时刻未到时返回需要等待的秒数
    fn fail_fast_wait(&self, now: DateTime<Utc>) -> Option<i64> {
        let state = self.rate_state.lock().unwrap();
        if state.remaining > self.rate_limit_buffer {
            return None;
        }
        match state.reset_at {
            Some(reset_at) if reset_at > now => Some((reset_at - now).num_seconds().max(1)),
            _ => None,
        }
    }

    /// 从响应头更新预算跟踪
    fn update_rate_state(&self, headers: &HeaderMap) {
        let mut state = self.rate_state.lock().unwrap();
        if let Some(remaining) = headers
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
        {
            state.remaining = remaining;
        }
        if let Some(reset) = headers
            .get("x-ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
        {
            state.reset_at = DateTime::from_timestamp(reset, 0);
        }
    }

    fn backoff_delay(attempt: u32) -> Duration {
        // attempt 从 1 开始：2s, 4s, 8s... 上限 10s
        let delay = BACKOFF_BASE * 2u32.saturating_pow(attempt.saturating_sub(1));
        delay.min(BACKOFF_MAX)
    }

    async fn request(&self, path: &str, params: &[(&str, String)]) -> Result<Value, GithubError> {
        // 上游预算闸门：快速失败不消耗重试次数
        if let Some(wait) = self.fail_fast_wait(Utc::now()) {
            return Err(GithubError::RateLimited {
                retry_after_secs: wait,
            });
        }

        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let result = self.http.get(&url).query(params).send().await;
            match result {
                Ok(response) => {
                    self.update_rate_state(response.headers());
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    // 4xx 是请求本身的问题，重试无意义
                    if status.is_client_error() || attempt >= MAX_ATTEMPTS {
                        return Err(GithubError::Status(status.as_u16()));
                    }

                    tracing::warn!(
                        "GitHub returned {} for {}, retrying (attempt {}/{})",
                        status,
                        path,
                        attempt,
                        MAX_ATTEMPTS
                    );
                }
                Err(err) => {
                    if attempt >= MAX_ATTEMPTS {
                        return Err(GithubError::Transport(err));
                    }
                    tracing::warn!(
                        "GitHub request to {} failed: {}, retrying (attempt {}/{})",
                        path,
                        err,
                        attempt,
                        MAX_ATTEMPTS
                    );
                }
            }

            tokio::time::sleep(Self::backoff_delay(attempt)).await;
        }
    }

    /// 仓库基本信息
    pub async fn get_repo(&self, owner: &str, repo: &str) -> Result<Value, GithubError> {
        self.request(&format!("/repos/{}/{}", owner, repo), &[]).await
    }

    /// 某时间点之后的提交
    pub async fn get_commits(
        &self,
        owner: &str,
        repo: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Commit>, GithubError> {
        let mut params = vec![("per_page", PER_PAGE.to_string())];
        if let Some(since) = since {
            params.push(("since", since.to_rfc3339()));
        }

        let data = self
            .request(&format!("/repos/{}/{}/commits", owner, repo), &params)
            .await?;
        Ok(as_array(&data).iter().map(Commit::from_api).collect())
    }

    /// 拉取请求，可按状态过滤
    pub async fn get_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        state: &str,
    ) -> Result<Vec<PullRequest>, GithubError> {
        let params = [
            ("state", state.to_string()),
            ("per_page", PER_PAGE.to_string()),
            ("sort", "updated".to_string()),
        ];

        let data = self
            .request(&format!("/repos/{}/{}/pulls", owner, repo), &params)
            .await?;
        Ok(as_array(&data).iter().map(PullRequest::from_api).collect())
    }

    /// 议题；issues 端点混入的拉取请求在此剔除
    pub async fn get_issues(&self, owner: &str, repo: &str) -> Result<Vec<Issue>, GithubError> {
        let params = [
            ("state", "all".to_string()),
            ("per_page", PER_PAGE.to_string()),
            ("sort", "updated".to_string()),
        ];

        let data = self
            .request(&format!("/repos/{}/{}/issues", owner, repo), &params)
            .await?;
        Ok(as_array(&data)
            .iter()
            .filter(|item| !Issue::is_pull_request(item))
            .map(Issue::from_api)
            .collect())
    }

    /// 拉取一个时间窗口内的活动并汇总为 RepoStats
    pub async fn repo_stats(
        &self,
        owner: &str,
        repo: &str,
        timeframe: Timeframe,
    ) -> Result<RepoStats, GithubError> {
        let since = Utc::now() - chrono::Duration::days(timeframe.days());

        let repo_info = self.get_repo(owner, repo).await?;
        let commits = self.get_commits(owner, repo, Some(since)).await?;
        let prs = self.get_pull_requests(owner, repo, "all").await?;
        let issues = self.get_issues(owner, repo).await?;

        Ok(build_repo_stats(
            &repo_info, &commits, &prs, &issues, since, timeframe,
        ))
    }
}

fn as_array(data: &Value) -> &[Value] {
    data.as_array().map(Vec::as_slice).unwrap_or(&[])
}

/// 统计推导：PR/议题只计窗口内创建的；merged 以 merged_at 为准；
/// 贡献者数是窗口内提交作者去重后的数量(只是近似值)
fn build_repo_stats(
    repo_info: &Value,
    commits: &[Commit],
    prs: &[PullRequest],
    issues: &[Issue],
    since: DateTime<Utc>,
    timeframe: Timeframe,
) -> RepoStats {
    let prs_in_range: Vec<&PullRequest> = prs
        .iter()
        .filter(|pr| pr.created_at.is_some_and(|at| at >= since))
        .collect();
    let issues_in_range: Vec<&Issue> = issues
        .iter()
        .filter(|issue| issue.created_at.is_some_and(|at| at >= since))
        .collect();

    let contributors: HashSet<&str> = commits
        .iter()
        .filter_map(|c| c.author.as_deref())
        .filter(|author| !author.is_empty())
        .collect();

    let count = |n: usize| n as u64;

    RepoStats {
        commits: count(commits.len()),
        prs_opened: count(prs_in_range.iter().filter(|pr| pr.state == "open").count()),
        prs_merged: count(prs_in_range.iter().filter(|pr| pr.merged).count()),
        prs_closed: count(
            prs_in_range
                .iter()
                .filter(|pr| pr.state == "closed" && !pr.merged)
                .count(),
        ),
        issues_opened: count(
            issues_in_range
                .iter()
                .filter(|issue| issue.state == "open")
                .count(),
        ),
        issues_closed: count(
            issues_in_range
                .iter()
                .filter(|issue| issue.state == "closed")
                .count(),
        ),
        contributors: count(contributors.len()),
        timeframe: timeframe.as_str().to_string(),
        stars: repo_info
            .get("stargazers_count")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        forks: repo_info.get("forks_count").and_then(Value::as_u64).unwrap_or(0),
        watchers: repo_info
            .get("subscribers_count")
            .and_then(Value::as_u64)
            .unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> Config {
        Config {
            redis_url: "redis://localhost".into(),
            server_host: "::".into(),
            server_port: 8000,
            github_token: String::new(),
            github_api_base_url: "https://api.github.com".into(),
            github_rate_limit_buffer: 10,
            cache_ttl_secs: 3600,
            rate_limit_window_secs: 3600,
            rate_limit_public: 100,
            rate_limit_authenticated: 1000,
            api_key_header: "x-api-key".into(),
            prometheus_enabled: true,
        }
    }

    fn commit(author: Option<&str>) -> Commit {
        Commit {
            sha: "sha".into(),
            message: "msg".into(),
            author: author.map(str::to_string),
            author_email: None,
            date: Some(Utc::now()),
        }
    }

    fn pr(state: &str, merged: bool, days_ago: i64) -> PullRequest {
        PullRequest {
            number: 1,
            title: "pr".into(),
            state: state.into(),
            merged,
            author: None,
            created_at: Some(Utc::now() - chrono::Duration::days(days_ago)),
            merged_at: merged.then(Utc::now),
        }
    }

    fn issue(state: &str, days_ago: i64) -> Issue {
        Issue {
            number: 1,
            title: "issue".into(),
            state: state.into(),
            author: None,
            created_at: Some(Utc::now() - chrono::Duration::days(days_ago)),
            closed_at: None,
            labels: Vec::new(),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        assert_eq!(GithubClient::backoff_delay(1), Duration::from_secs(2));
        assert_eq!(GithubClient::backoff_delay(2), Duration::from_secs(4));
        assert_eq!(GithubClient::backoff_delay(3), Duration::from_secs(8));
        assert_eq!(GithubClient::backoff_delay(4), Duration::from_secs(10));
        assert_eq!(GithubClient::backoff_delay(10), Duration::from_secs(10));
    }

    #[test]
    fn test_fail_fast_when_budget_exhausted() {
        let client = GithubClient::new(&config()).unwrap();
        let now = Utc::now();
        {
            let mut state = client.rate_state.lock().unwrap();
            state.remaining = 5;
            state.reset_at = Some(now + chrono::Duration::seconds(120));
        }

        let wait = client.fail_fast_wait(now).expect("should fail fast");
        assert!((1..=120).contains(&wait));
    }

    #[test]
    fn test_no_fail_fast_with_healthy_budget() {
        let client = GithubClient::new(&config()).unwrap();
        assert!(client.fail_fast_wait(Utc::now()).is_none());
    }

    #[test]
    fn test_no_fail_fast_after_reset_passed() {
        let client = GithubClient::new(&config()).unwrap();
        let now = Utc::now();
        {
            let mut state = client.rate_state.lock().unwrap();
            state.remaining = 0;
            state.reset_at = Some(now - chrono::Duration::seconds(5));
        }

        assert!(client.fail_fast_wait(now).is_none());
    }

    #[test]
    fn test_update_rate_state_from_headers() {
        let client = GithubClient::new(&config()).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("42"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1767225600"));

        client.update_rate_state(&headers);

        let state = client.rate_state.lock().unwrap();
        assert_eq!(state.remaining, 42);
        assert_eq!(
            state.reset_at,
            DateTime::from_timestamp(1_767_225_600, 0)
        );
    }

    #[test]
    fn test_build_repo_stats_counts_by_state() {
        let since = Utc::now() - chrono::Duration::days(7);
        let repo_info = json!({
            "stargazers_count": 12, "forks_count": 3, "subscribers_count": 5
        });
        let commits = vec![
            commit(Some("alice")),
            commit(Some("bob")),
            commit(Some("alice")),
            commit(None),
        ];
        let prs = vec![
            pr("open", false, 1),
            pr("closed", true, 2),
            pr("closed", false, 3),
            // 窗口外，不应计入
            pr("closed", true, 30),
        ];
        let issues = vec![issue("open", 1), issue("closed", 2), issue("closed", 40)];

        let stats = build_repo_stats(
            &repo_info,
            &commits,
            &prs,
            &issues,
            since,
            Timeframe::SevenDays,
        );

        assert_eq!(stats.commits, 4);
        assert_eq!(stats.contributors, 2);
        assert_eq!(stats.prs_opened, 1);
        assert_eq!(stats.prs_merged, 1);
        assert_eq!(stats.prs_closed, 1);
        assert_eq!(stats.issues_opened, 1);
        assert_eq!(stats.issues_closed, 1);
        assert_eq!(stats.timeframe, "7d");
        assert_eq!(stats.stars, 12);
        assert_eq!(stats.forks, 3);
        assert_eq!(stats.watchers, 5);
    }
}
