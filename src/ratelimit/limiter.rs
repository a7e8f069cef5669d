use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::ratelimit::store::CounterStore;
use crate::ratelimit::tier::Tier;

/// 随响应返回的限流元数据
///
/// enterprise 层级用 limit = -1 表示不限量。
#[derive(Debug, Clone, Copy)]
pub struct RateLimitMetadata {
    pub limit: i64,
    pub remaining: i64,
    pub reset_seconds: i64,
}

/// 分层限流器
///
/// 计数器按 (tier, identifier) 存放在共享存储里，固定窗口：
/// 窗口内第一次计数时装上 TTL，到期后计数器整体消失重新开始。
///
/// 读取与自增不是一个原子步骤，并发突发下计数最多可能超限一个，
/// 这是接受的近似而非严格保证。
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    public_limit: u32,
    authenticated_limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: &Config) -> Self {
        Self {
            store,
            public_limit: config.rate_limit_public,
            authenticated_limit: config.rate_limit_authenticated,
            window: config.rate_limit_window(),
        }
    }

    /// 层级配额，None 表示不限量
    fn limit_for(&self, tier: Tier) -> Option<u32> {
        match tier {
            Tier::Public => Some(self.public_limit),
            Tier::Authenticated => Some(self.authenticated_limit),
            Tier::Enterprise => None,
        }
    }

    /// 检查并计数一次请求
    ///
    /// 计数器存储不可用时放行(fail-open)：牺牲限流精度保可用性，
    /// 上游仍有外部客户端自身的预算闸门保护。
    pub async fn check(&self, identifier: &str, tier: Tier) -> (bool, RateLimitMetadata) {
        let Some(limit) = self.limit_for(tier) else {
            return (
                true,
                RateLimitMetadata {
                    limit: -1,
                    remaining: -1,
                    reset_seconds: 0,
                },
            );
        };

        let key = format!("rate_limit:{}:{}", tier.as_str(), identifier);
        let window_secs = self.window.as_secs();

        // 快速预检：已达上限直接拒绝，报告窗口剩余时间
        let count = match self.store.get(&key).await {
            Ok(count) => count.unwrap_or(0),
            Err(err) => {
                tracing::warn!("Counter store unavailable, allowing request: {}", err);
                return (true, self.open_metadata(limit));
            }
        };

        if count >= u64::from(limit) {
            let reset = self.window_reset(&key, window_secs).await;
            return (
                false,
                RateLimitMetadata {
                    limit: i64::from(limit),
                    remaining: 0,
                    reset_seconds: reset,
                },
            );
        }

        let new_count = match self.store.incr_and_arm(&key, window_secs).await {
            Ok(new_count) => new_count,
            Err(err) => {
                tracing::warn!("Counter store unavailable, allowing request: {}", err);
                return (true, self.open_metadata(limit));
            }
        };

        let remaining = i64::from(limit).saturating_sub(new_count as i64).max(0);
        let reset = self.window_reset(&key, window_secs).await;

        (
            true,
            RateLimitMetadata {
                limit: i64::from(limit),
                remaining,
                reset_seconds: reset,
            },
        )
    }

    async fn window_reset(&self, key: &str, window_secs: u64) -> i64 {
        match self.store.ttl(key).await {
            Ok(ttl) if ttl > 0 => ttl,
            _ => window_secs as i64,
        }
    }

    /// 存储故障时的降级元数据
    fn open_metadata(&self, limit: u32) -> RateLimitMetadata {
        RateLimitMetadata {
            limit: i64::from(limit),
            remaining: i64::from(limit),
            reset_seconds: self.window.as_secs() as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::store::testing::{FailingCounterStore, MemoryCounterStore};

    fn config() -> Config {
        Config {
            redis_url: "redis://localhost".into(),
            server_host: "::".into(),
            server_port: 8000,
            github_token: String::new(),
            github_api_base_url: "https://api.github.com".into(),
            github_rate_limit_buffer: 10,
            cache_ttl_secs: 3600,
            rate_limit_window_secs: 60,
            rate_limit_public: 5,
            rate_limit_authenticated: 50,
            api_key_header: "x-api-key".into(),
            prometheus_enabled: true,
        }
    }

    fn limiter(store: Arc<dyn CounterStore>) -> RateLimiter {
        RateLimiter::new(store, &config())
    }

    #[tokio::test]
    async fn test_public_tier_exhausts_quota() {
        let limiter = limiter(Arc::new(MemoryCounterStore::new()));

        for i in 1..=5u64 {
            let (allowed, meta) = limiter.check("1.2.3.4", Tier::Public).await;
            assert!(allowed, "request {} should be admitted", i);
            assert_eq!(meta.limit, 5);
            assert_eq!(meta.remaining, 5 - i as i64);
        }

        let (allowed, meta) = limiter.check("1.2.3.4", Tier::Public).await;
        assert!(!allowed);
        assert_eq!(meta.remaining, 0);
        assert!(meta.reset_seconds > 0);
    }

    #[tokio::test]
    async fn test_enterprise_is_unbounded() {
        let limiter = limiter(Arc::new(MemoryCounterStore::new()));

        for _ in 0..100 {
            let (allowed, meta) = limiter.check("acme-corp", Tier::Enterprise).await;
            assert!(allowed);
            assert_eq!(meta.limit, -1);
            assert_eq!(meta.remaining, -1);
        }
    }

    #[tokio::test]
    async fn test_identifiers_count_independently() {
        let limiter = limiter(Arc::new(MemoryCounterStore::new()));

        for _ in 0..5 {
            limiter.check("1.2.3.4", Tier::Public).await;
        }
        let (allowed, _) = limiter.check("1.2.3.4", Tier::Public).await;
        assert!(!allowed);

        let (allowed, meta) = limiter.check("5.6.7.8", Tier::Public).await;
        assert!(allowed);
        assert_eq!(meta.remaining, 4);
    }

    #[tokio::test]
    async fn test_same_identifier_separate_tiers() {
        let limiter = limiter(Arc::new(MemoryCounterStore::new()));

        for _ in 0..5 {
            limiter.check("key-1", Tier::Public).await;
        }
        let (allowed, _) = limiter.check("key-1", Tier::Public).await;
        assert!(!allowed);

        // 同一标识在 authenticated 层级是独立的计数器
        let (allowed, _) = limiter.check("key-1", Tier::Authenticated).await;
        assert!(allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_counter_resets_after_window() {
        let limiter = limiter(Arc::new(MemoryCounterStore::new()));

        for _ in 0..5 {
            limiter.check("1.2.3.4", Tier::Public).await;
        }
        let (allowed, _) = limiter.check("1.2.3.4", Tier::Public).await;
        assert!(!allowed);

        tokio::time::advance(Duration::from_secs(61)).await;

        let (allowed, meta) = limiter.check("1.2.3.4", Tier::Public).await;
        assert!(allowed);
        assert_eq!(meta.remaining, 4);
    }

    #[tokio::test]
    async fn test_store_outage_fails_open() {
        let limiter = limiter(Arc::new(FailingCounterStore));

        let (allowed, meta) = limiter.check("1.2.3.4", Tier::Public).await;
        assert!(allowed);
        assert_eq!(meta.limit, 5);
    }
}
