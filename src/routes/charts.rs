use axum::{
    extract::State,
    http::{HeaderValue, header},
    response::Response,
};
use axum_extra::extract::Query;
use serde::Deserialize;

use crate::AppState;
use crate::cache::{CHART_ACTIVITY_PREFIX, CacheStatus, derive_key};
use crate::error::AppError;
use crate::render::{SvgRenderer, chart_data};
use crate::themes;
use crate::validators::{ChartFormat, Timeframe, validate_dimensions, validate_repos};

/// 图表响应的缓存指令
const CACHE_CONTROL: &str = "public, max-age=3600";

fn default_timeframe() -> String {
    "7d".to_string()
}

fn default_format() -> String {
    "svg".to_string()
}

fn default_theme() -> String {
    "light".to_string()
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    400
}

// 活动图表查询参数，repos 允许重复出现
#[derive(Debug, Deserialize)]
pub struct ActivityChartQuery {
    #[serde(default)]
    pub repos: Vec<String>,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

// 活动图表API
//
// 管线：校验 → 键派生 → 缓存查询 → (未命中)聚合 → 渲染 → 回填缓存。
// 两个并发未命中可能都重算并都写回，后写覆盖先写，不加去重锁。
pub async fn activity(
    State(state): State<AppState>,
    Query(query): Query<ActivityChartQuery>,
) -> Result<Response, AppError> {
    validate_repos(&query.repos).map_err(AppError::Validation)?;
    let timeframe: Timeframe = query.timeframe.parse().map_err(AppError::Validation)?;
    let format: ChartFormat = query.format.parse().map_err(AppError::Validation)?;
    validate_dimensions(query.width, query.height).map_err(AppError::Validation)?;

    let colors = themes::theme(&query.theme).ok_or_else(|| {
        AppError::Validation(format!(
            "Invalid theme: {}. Available: {}",
            query.theme,
            themes::THEME_NAMES.join(", ")
        ))
    })?;

    // png 是合法格式但本部署没有栅格化后端，按未实现返回而不是参数错误
    if format == ChartFormat::Png {
        return Err(AppError::Unsupported(
            "PNG rendering is not available in this deployment, use format=svg".to_string(),
        ));
    }

    let cache_key = derive_key(
        CHART_ACTIVITY_PREFIX,
        &query.repos,
        timeframe.as_str(),
        &query.theme,
        format.as_str(),
    );

    if let (Some(payload), CacheStatus::Hit) = state.cache.get(&cache_key).await {
        return Ok(image_response(payload, format, CacheStatus::Hit));
    }

    let metrics = state.aggregator.aggregate(&query.repos, timeframe).await;
    if metrics.per_repo.is_empty() && !metrics.errors.is_empty() {
        return Err(AppError::UpstreamFailed(metrics.errors.join("; ")));
    }

    let title = if query.repos.len() == 1 {
        format!("{} - Last {}", query.repos[0], timeframe.as_str())
    } else {
        format!("Activity - Last {}", timeframe.as_str())
    };

    let data = chart_data(&metrics, timeframe);
    let svg = SvgRenderer::new(query.width, query.height).render_activity_chart(
        &data, &title, colors,
    );

    state.cache.set(&cache_key, svg.clone(), None).await;

    Ok(image_response(svg, format, CacheStatus::Miss))
}

fn image_response(payload: String, format: ChartFormat, status: CacheStatus) -> Response {
    let mut response = Response::new(payload.into());
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(format.content_type()),
    );
    headers.insert("x-cache", HeaderValue::from_static(status.as_str()));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(CACHE_CONTROL),
    );
    response
}
