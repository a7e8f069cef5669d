use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use crate::AppState;

// 存活探针，顺带暴露缓存命中统计
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let cache = state.cache.stats();
    Json(json!({
        "status": "ok",
        "service": "hyperbeats",
        "version": env!("CARGO_PKG_VERSION"),
        "cache": {
            "default_ttl": cache.default_ttl_secs,
            "hits": cache.hits,
            "misses": cache.misses,
        },
    }))
}

// 就绪探针：Redis 不可达时返回 503，让编排层摘除流量
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.cache.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ready", "redis": "ok" })),
        ),
        Err(err) => {
            tracing::warn!("Readiness check failed: {}", err);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "not_ready", "redis": "unavailable" })),
            )
        }
    }
}

// Prometheus 抓取端点
pub async fn metrics_scrape(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            [(
                header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Failed to encode metrics: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
