use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::ratelimit::{RateLimitMetadata, RateLimiter};
use crate::security::AccessControl;

/// 限流中间件的注入状态
#[derive(Clone)]
pub struct RateLimitContext {
    pub limiter: Arc<RateLimiter>,
    pub access: Arc<AccessControl>,
    pub api_key_header: String,
}

/// 限流中间件
///
/// 先由密钥解析层级(无效密钥按匿名处理)，再按 (tier, identifier)
/// 计数；标识优先用密钥本身，匿名请求退回调用方 IP。
/// 无论放行还是拒绝，响应都带 X-RateLimit-* 头。
pub async fn rate_limit(
    State(ctx): State<RateLimitContext>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let api_key = req
        .headers()
        .get(ctx.api_key_header.as_str())
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let tier = ctx.access.tier_for(api_key.as_deref()).await;
    let identifier = api_key.unwrap_or_else(|| client_ip(&req));

    let (allowed, metadata) = ctx.limiter.check(&identifier, tier).await;

    if !allowed {
        tracing::info!(
            "Rate limit exceeded for {} (tier {})",
            identifier,
            tier.as_str()
        );
        let mut response = AppError::RateLimitExceeded {
            limit: metadata.limit,
            reset_in_seconds: metadata.reset_seconds,
        }
        .into_response();
        apply_headers(&mut response, metadata);
        return response;
    }

    let mut response = next.run(req).await;
    apply_headers(&mut response, metadata);
    response
}

fn apply_headers(response: &mut Response, metadata: RateLimitMetadata) {
    let headers = response.headers_mut();
    let pairs = [
        ("x-ratelimit-limit", metadata.limit),
        ("x-ratelimit-remaining", metadata.remaining),
        ("x-ratelimit-reset", metadata.reset_seconds),
    ];
    for (name, value) in pairs {
        if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
            headers.insert(name, value);
        }
    }
}

/// 调用方 IP：优先信任反代写入的头，降级使用连接地址
fn client_ip(req: &Request<Body>) -> String {
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    req.headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .or_else(|| {
            req.headers()
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or_else(|| remote_ip.as_deref())
        .unwrap_or("unknown")
        .trim()
        .to_string()
}
