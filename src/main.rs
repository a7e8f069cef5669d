use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{Router, routing::get};
use hyperbeats::{
    AppState,
    aggregator::Aggregator,
    cache::{CacheService, RedisCacheStore},
    config::Config,
    github::GithubClient,
    middleware::{HttpMetrics, RateLimitContext, log_errors, rate_limit, track_metrics},
    ratelimit::{RateLimiter, RedisCounterStore},
    routes,
    security::AccessControl,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 设置 Redis 客户端，缓存与限流计数共用一个实例
    let redis_client =
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client");
    let redis_arc = Arc::new(redis_client);

    // 显式构造各服务并注入，不依赖进程级单例
    let cache = Arc::new(CacheService::new(
        Arc::new(RedisCacheStore::new(redis_arc.clone())),
        config.cache_ttl(),
    ));
    let access = Arc::new(AccessControl::new(Arc::new(RedisCacheStore::new(
        redis_arc.clone(),
    ))));
    let limiter = Arc::new(RateLimiter::new(
        Arc::new(RedisCounterStore::new(redis_arc.clone())),
        &config,
    ));
    let github = Arc::new(GithubClient::new(&config).expect("Failed to create GitHub client"));
    let aggregator = Arc::new(Aggregator::new(github));
    let metrics = Arc::new(HttpMetrics::new().expect("Failed to register metrics"));

    let state = AppState {
        config: config.clone(),
        cache,
        aggregator,
        access: access.clone(),
        metrics,
    };

    let rate_limit_ctx = RateLimitContext {
        limiter,
        access,
        api_key_header: config.api_key_header.clone(),
    };

    // API 路由；限流只覆盖业务端点，探针和抓取端点不计数
    let api_routes = Router::new()
        .route("/charts/activity", get(routes::charts::activity))
        .route("/metrics/aggregate", get(routes::metrics::aggregate))
        .route(
            "/metrics/repos/{owner}/{repo}",
            get(routes::metrics::repo_metrics),
        )
        .layer(axum::middleware::from_fn_with_state(
            rate_limit_ctx,
            rate_limit,
        ));

    let mut router = Router::new()
        .route("/health", get(routes::health::health))
        .route("/ready", get(routes::health::ready))
        .nest("/api/v1", api_routes);

    if state.config.prometheus_enabled {
        router = router
            .route("/metrics", get(routes::health::metrics_scrape))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                track_metrics,
            ));
    }

    // 错误日志包在最外层
    let router = router.layer(axum::middleware::from_fn(log_errors));

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        let cors = tower_http::cors::CorsLayer::permissive();
        router.layer(cors)
    };

    // 添加应用状态
    let app = router.with_state(state.clone());

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
