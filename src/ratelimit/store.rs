use std::sync::Arc;

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient};

/// 限流计数器存储抽象
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// 当前窗口内的计数；键不存在(窗口已过期)时为 None
    async fn get(&self, key: &str) -> Result<Option<u64>, redis::RedisError>;

    /// 原子自增；若本次是新窗口的第一个计数则装上窗口过期时间
    async fn incr_and_arm(&self, key: &str, window_secs: u64) -> Result<u64, redis::RedisError>;

    /// 距窗口过期的剩余秒数
    async fn ttl(&self, key: &str) -> Result<i64, redis::RedisError>;
}

/// Redis 计数器后端，INCR + 首次 EXPIRE
pub struct RedisCounterStore {
    redis: Arc<RedisClient>,
}

impl RedisCounterStore {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, key: &str) -> Result<Option<u64>, redis::RedisError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        conn.get(key).await
    }

    async fn incr_and_arm(&self, key: &str, window_secs: u64) -> Result<u64, redis::RedisError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let count: u64 = conn.incr(key, 1).await?;
        if count == 1 {
            let _: () = conn.expire(key, window_secs as i64).await?;
        }
        Ok(count)
    }

    async fn ttl(&self, key: &str) -> Result<i64, redis::RedisError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        conn.ttl(key).await
    }
}
