use axum::{
    body::{Body, to_bytes},
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::error;

/// 5xx 响应体读取上限，超出部分截断后记录
const ERROR_BODY_LIMIT: usize = 4096;

// 5xx 响应日志中间件：带上请求方法与路径，响应体读完后原样重建
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;
    if !response.status().is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, ERROR_BODY_LIMIT).await {
        Ok(b) => b,
        Err(e) => {
            error!(
                status = %parts.status,
                method = %method,
                path = %path,
                "Failed to read error response body: {}",
                e
            );
            return Response::from_parts(parts, Body::empty());
        }
    };

    error!(
        status = %parts.status,
        method = %method,
        path = %path,
        body = %String::from_utf8_lossy(&bytes),
        "Handler returned server error"
    );

    // body 已被消费，去掉原 content-length 再重建
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(bytes))
}
