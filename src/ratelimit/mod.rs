// 限流模块
// 按 (tier, identifier) 维护固定窗口计数器，窗口长度与配额由配置决定

pub mod limiter;
pub mod store;
pub mod tier;

pub use limiter::{RateLimitMetadata, RateLimiter};
pub use store::{CounterStore, RedisCounterStore};
pub use tier::{Feature, Tier};
