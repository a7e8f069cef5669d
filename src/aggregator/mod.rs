// 聚合模块
// 把多仓库请求扇出到外部客户端，合并结果并隔离单仓库失败

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::join_all;
use serde_json::Value;

use crate::github::client::{GithubClient, GithubError};
use crate::github::models::{AggregatedMetrics, RepoStats};
use crate::validators::Timeframe;

/// 单仓库统计的来源
///
/// 生产环境是 GithubClient；测试注入脚本化实现。
#[async_trait]
pub trait RepoStatsSource: Send + Sync {
    async fn repo_stats(
        &self,
        owner: &str,
        name: &str,
        timeframe: Timeframe,
    ) -> Result<RepoStats, GithubError>;
}

#[async_trait]
impl RepoStatsSource for GithubClient {
    async fn repo_stats(
        &self,
        owner: &str,
        name: &str,
        timeframe: Timeframe,
    ) -> Result<RepoStats, GithubError> {
        GithubClient::repo_stats(self, owner, name, timeframe).await
    }
}

/// 多仓库聚合器
pub struct Aggregator {
    source: Arc<dyn RepoStatsSource>,
}

impl Aggregator {
    pub fn new(source: Arc<dyn RepoStatsSource>) -> Self {
        Self { source }
    }

    /// 聚合各仓库在时间窗口内的活动
    ///
    /// 每个条目独立处理：格式错误和抓取失败都收进错误列表，
    /// 不会中断整个请求。汇总只反映成功抓取的子集。
    pub async fn aggregate(&self, repo_list: &[String], timeframe: Timeframe) -> AggregatedMetrics {
        let fetches = repo_list.iter().map(|repo| async move {
            let Some((owner, name)) = repo.split_once('/') else {
                return Err(format!("Invalid repo format: {}", repo));
            };

            match self.source.repo_stats(owner, name, timeframe).await {
                Ok(stats) => Ok((repo.clone(), stats)),
                Err(err) => Err(format!("Failed to fetch {}: {}", repo, err)),
            }
        });

        let mut per_repo: HashMap<String, RepoStats> = HashMap::new();
        let mut errors: Vec<String> = Vec::new();

        for result in join_all(fetches).await {
            match result {
                Ok((repo, stats)) => {
                    per_repo.insert(repo, stats);
                }
                Err(err) => {
                    tracing::warn!("Aggregation soft error: {}", err);
                    errors.push(err);
                }
            }
        }

        let total_commits = per_repo.values().map(|s| s.commits).sum();
        let total_prs_merged = per_repo.values().map(|s| s.prs_merged).sum();
        let total_issues_closed = per_repo.values().map(|s| s.issues_closed).sum();
        let unique_contributors = per_repo.values().map(|s| s.contributors).sum();

        AggregatedMetrics {
            repos: per_repo.len(),
            total_commits,
            total_prs_merged,
            total_issues_closed,
            unique_contributors,
            per_repo,
            timeframe: timeframe.as_str().to_string(),
            timestamp: Utc::now(),
            errors,
        }
    }

    /// 历史数据点
    ///
    /// 历史时间序列存储不在本系统范围内，这里固定返回空序列。
    pub async fn historical_data(
        &self,
        _repo_list: &[String],
        _timeframe: Timeframe,
    ) -> Vec<Value> {
        Vec::new()
    }
}
