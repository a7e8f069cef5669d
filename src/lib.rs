use std::sync::Arc;

use aggregator::Aggregator;
use cache::CacheService;
use config::Config;
use middleware::HttpMetrics;
use security::AccessControl;

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod error;
pub mod github;
pub mod middleware;
pub mod ratelimit;
pub mod render;
pub mod routes;
pub mod security;
pub mod themes;
pub mod validators;

/// 应用状态
///
/// 所有服务显式构造后注入，不使用进程级单例。
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub cache: Arc<CacheService>,
    pub aggregator: Arc<Aggregator>,
    pub access: Arc<AccessControl>,
    pub metrics: Arc<HttpMetrics>,
}
