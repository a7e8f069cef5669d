use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use axum_extra::extract::Query;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::AppState;
use crate::cache::{CacheStatus, METRICS_AGGREGATE_PREFIX, derive_key};
use crate::error::AppError;
use crate::github::models::RepoStats;
use crate::validators::{Timeframe, validate_repos};

/// 指标响应比图表更新得勤一些，缓存 30 分钟
const METRICS_CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(1800);

fn default_timeframe() -> String {
    "7d".to_string()
}

// 聚合指标查询参数
#[derive(Debug, Deserialize)]
pub struct AggregateQuery {
    #[serde(default)]
    pub repos: Vec<String>,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    #[serde(default)]
    pub include_historical: bool,
    /// 可选的指标名过滤：commits, prs_merged, issues_closed, contributors
    #[serde(default)]
    pub metrics: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub aggregated: HashMap<String, Value>,
    pub per_repo: HashMap<String, HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub historical: Option<Vec<Value>>,
    pub timeframe: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

// 聚合指标API
pub async fn aggregate(
    State(state): State<AppState>,
    Query(query): Query<AggregateQuery>,
) -> Result<Response, AppError> {
    validate_repos(&query.repos).map_err(AppError::Validation)?;
    let timeframe: Timeframe = query.timeframe.parse().map_err(AppError::Validation)?;

    // 历史标志与指标过滤影响响应内容，也要参与键派生
    let variant = format!(
        "h={}:m={}",
        query.include_historical,
        sorted_filter(&query.metrics).join(",")
    );
    let cache_key = derive_key(
        METRICS_AGGREGATE_PREFIX,
        &query.repos,
        timeframe.as_str(),
        &variant,
        "json",
    );

    if let (Some(payload), CacheStatus::Hit) = state.cache.get(&cache_key).await {
        return Ok(json_response(payload, CacheStatus::Hit));
    }

    let result = state.aggregator.aggregate(&query.repos, timeframe).await;
    if result.per_repo.is_empty() && !result.errors.is_empty() {
        return Err(AppError::UpstreamFailed(result.errors.join("; ")));
    }

    let filter = sorted_filter(&query.metrics);

    let mut aggregated: HashMap<String, Value> = HashMap::from([
        ("commits".to_string(), json!(result.total_commits)),
        ("prs_merged".to_string(), json!(result.total_prs_merged)),
        ("issues_closed".to_string(), json!(result.total_issues_closed)),
        ("contributors".to_string(), json!(result.unique_contributors)),
        ("repos_count".to_string(), json!(result.repos)),
    ]);
    retain_filtered(&mut aggregated, &filter);

    let per_repo = result
        .per_repo
        .iter()
        .map(|(repo, stats)| {
            let mut fields = per_repo_fields(stats);
            retain_filtered(&mut fields, &filter);
            (repo.clone(), fields)
        })
        .collect();

    let historical = if query.include_historical {
        Some(
            state
                .aggregator
                .historical_data(&query.repos, timeframe)
                .await,
        )
    } else {
        None
    };

    let response = MetricsResponse {
        aggregated,
        per_repo,
        historical,
        timeframe: timeframe.as_str().to_string(),
        timestamp: result.timestamp,
        errors: result.errors,
    };

    let payload = serde_json::to_string(&response)
        .map_err(|e| AppError::UpstreamFailed(e.to_string()))?;
    state
        .cache
        .set(&cache_key, payload.clone(), Some(METRICS_CACHE_TTL))
        .await;

    Ok(json_response(payload, CacheStatus::Miss))
}

#[derive(Debug, Deserialize)]
pub struct RepoQuery {
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
}

// 单仓库指标API
pub async fn repo_metrics(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
    Query(query): Query<RepoQuery>,
) -> Result<Response, AppError> {
    let timeframe: Timeframe = query.timeframe.parse().map_err(AppError::Validation)?;

    // 路径段拼出的仓库名要过和列表端点相同的校验，否则 ".." 会直接进上游 URL
    let repo_key = format!("{}/{}", owner, repo);
    validate_repos(std::slice::from_ref(&repo_key)).map_err(AppError::Validation)?;

    let result = state
        .aggregator
        .aggregate(std::slice::from_ref(&repo_key), timeframe)
        .await;

    let Some(stats) = result.per_repo.get(&repo_key) else {
        return Err(AppError::NotFound("Repository not found".to_string()));
    };

    let payload = json!({
        "repository": repo_key,
        "timeframe": timeframe.as_str(),
        "metrics": {
            "commits": stats.commits,
            "prs_opened": stats.prs_opened,
            "prs_merged": stats.prs_merged,
            "issues_opened": stats.issues_opened,
            "issues_closed": stats.issues_closed,
            "contributors": stats.contributors,
        },
        "timestamp": result.timestamp,
    });

    Ok(json_response(payload.to_string(), CacheStatus::Miss))
}

fn per_repo_fields(stats: &RepoStats) -> HashMap<String, Value> {
    HashMap::from([
        ("commits".to_string(), json!(stats.commits)),
        ("prs_merged".to_string(), json!(stats.prs_merged)),
        ("issues_closed".to_string(), json!(stats.issues_closed)),
        ("contributors".to_string(), json!(stats.contributors)),
    ])
}

/// 过滤列表排序去重，保证键派生与过滤行为稳定
fn sorted_filter(metrics: &[String]) -> Vec<String> {
    let mut filter: Vec<String> = metrics.to_vec();
    filter.sort_unstable();
    filter.dedup();
    filter
}

/// 按指标名过滤；repos_count 永远保留
fn retain_filtered(fields: &mut HashMap<String, Value>, filter: &[String]) {
    if filter.is_empty() {
        return;
    }
    fields.retain(|name, _| name == "repos_count" || filter.iter().any(|f| f == name));
}

fn json_response(payload: String, status: CacheStatus) -> Response {
    let mut response = Response::new(payload.into());
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert("x-cache", HeaderValue::from_static(status.as_str()));
    response
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::to_bytes;

    use super::*;
    use crate::aggregator::Aggregator;
    use crate::aggregator::testing::{ScriptedSource, stats};
    use crate::cache::CacheService;
    use crate::cache::store::testing::MemoryCacheStore;
    use crate::config::Config;
    use crate::security::AccessControl;

    fn test_config() -> Config {
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

    fn state_with(source: ScriptedSource) -> AppState {
        let store = Arc::new(MemoryCacheStore::new());
        AppState {
            config: test_config(),
            cache: Arc::new(CacheService::new(store.clone(), Duration::from_secs(3600))),
            aggregator: Arc::new(Aggregator::new(Arc::new(source))),
            access: Arc::new(AccessControl::new(store)),
            metrics: Arc::new(crate::middleware::HttpMetrics::new().unwrap()),
        }
    }

    fn aggregate_query(repos: &[&str]) -> AggregateQuery {
        AggregateQuery {
            repos: repos.iter().map(|s| s.to_string()).collect(),
            timeframe: "7d".into(),
            include_historical: false,
            metrics: Vec::new(),
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_aggregate_reports_totals_and_per_repo() {
        let source = ScriptedSource::new()
            .with_stats("a/one", stats(10, 2, 3, 4))
            .with_stats("b/two", stats(5, 1, 0, 2));
        let state = state_with(source);

        let response = aggregate(State(state), Query(aggregate_query(&["a/one", "b/two"])))
            .await
            .unwrap();
        assert_eq!(response.headers()["x-cache"], "MISS");

        let body = body_json(response).await;
        assert_eq!(body["aggregated"]["commits"], 15);
        assert_eq!(body["aggregated"]["prs_merged"], 3);
        assert_eq!(body["aggregated"]["repos_count"], 2);
        assert_eq!(body["per_repo"]["a/one"]["commits"], 10);
        assert_eq!(body["per_repo"]["b/two"]["contributors"], 2);
        assert_eq!(body["timeframe"], "7d");
        assert!(body.get("historical").is_none());
    }

    #[tokio::test]
    async fn test_aggregate_served_from_cache_on_repeat() {
        let source = ScriptedSource::new().with_stats("a/one", stats(10, 2, 3, 4));
        let state = state_with(source);

        let first = aggregate(
            State(state.clone()),
            Query(aggregate_query(&["a/one"])),
        )
        .await
        .unwrap();
        assert_eq!(first.headers()["x-cache"], "MISS");
        let first_body = body_json(first).await;

        let second = aggregate(State(state), Query(aggregate_query(&["a/one"])))
            .await
            .unwrap();
        assert_eq!(second.headers()["x-cache"], "HIT");
        assert_eq!(body_json(second).await, first_body);
    }

    #[tokio::test]
    async fn test_metric_filter_keeps_repos_count() {
        let source = ScriptedSource::new().with_stats("a/one", stats(10, 2, 3, 4));
        let state = state_with(source);

        let mut query = aggregate_query(&["a/one"]);
        query.metrics = vec!["commits".to_string()];

        let body = body_json(
            aggregate(State(state), Query(query)).await.unwrap(),
        )
        .await;

        assert_eq!(body["aggregated"]["commits"], 10);
        assert_eq!(body["aggregated"]["repos_count"], 1);
        assert!(body["aggregated"].get("prs_merged").is_none());
        assert!(body["per_repo"]["a/one"].get("contributors").is_none());
    }

    #[tokio::test]
    async fn test_include_historical_yields_empty_stub() {
        let source = ScriptedSource::new().with_stats("a/one", stats(1, 0, 0, 1));
        let state = state_with(source);

        let mut query = aggregate_query(&["a/one"]);
        query.include_historical = true;

        let body = body_json(
            aggregate(State(state), Query(query)).await.unwrap(),
        )
        .await;
        assert_eq!(body["historical"], json!([]));
    }

    #[tokio::test]
    async fn test_partial_failure_surfaces_error_list() {
        let source = ScriptedSource::new()
            .with_stats("good/repo", stats(5, 1, 1, 2))
            .with_failure("bad/repo", 502);
        let state = state_with(source);

        let body = body_json(
            aggregate(
                State(state),
                Query(aggregate_query(&["good/repo", "bad/repo"])),
            )
            .await
            .unwrap(),
        )
        .await;

        assert_eq!(body["aggregated"]["repos_count"], 1);
        assert_eq!(body["errors"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_repo_metrics_found_and_not_found() {
        let source = ScriptedSource::new().with_stats("octocat/Hello-World", stats(7, 2, 1, 3));
        let state = state_with(source);

        let response = repo_metrics(
            State(state.clone()),
            Path(("octocat".to_string(), "Hello-World".to_string())),
            Query(RepoQuery {
                timeframe: "7d".into(),
            }),
        )
        .await
        .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["repository"], "octocat/Hello-World");
        assert_eq!(body["metrics"]["commits"], 7);

        let err = repo_metrics(
            State(state),
            Path(("missing".to_string(), "repo".to_string())),
            Query(RepoQuery {
                timeframe: "7d".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_repo_metrics_rejects_traversal_path_segments() {
        let state = state_with(ScriptedSource::new());

        let err = repo_metrics(
            State(state),
            Path(("..".to_string(), "etc".to_string())),
            Query(RepoQuery {
                timeframe: "7d".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_invalid_timeframe_rejected() {
        let state = state_with(ScriptedSource::new());
        let mut query = aggregate_query(&["a/one"]);
        query.timeframe = "fortnight".into();

        let err = aggregate(State(state), Query(query)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
