// GitHub 集成模块
// 带重试/退避与上游预算闸门的 API 客户端，以及响应数据模型

pub mod client;
pub mod models;

pub use client::{GithubClient, GithubError};
pub use models::{AggregatedMetrics, Commit, Issue, PullRequest, RepoStats};
