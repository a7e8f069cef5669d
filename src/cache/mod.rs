// 缓存模块
// 包含缓存键派生、存储后端和带 TTL 的缓存服务

pub mod keys;
pub mod service;
pub mod store;

pub use keys::{CHART_ACTIVITY_PREFIX, METRICS_AGGREGATE_PREFIX, derive_key};
pub use service::{CacheService, CacheStatus};
pub use store::{CacheStore, RedisCacheStore};
