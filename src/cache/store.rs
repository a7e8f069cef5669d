use std::sync::Arc;

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient};

/// 键值存储抽象
///
/// 缓存服务与访问控制共用同一个后端。生产环境使用 Redis，
/// 测试中注入内存实现。
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, redis::RedisError>;

    /// 带过期时间写入，无条件覆盖已有条目
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), redis::RedisError>;

    /// 持久写入(无过期时间)
    async fn set(&self, key: &str, value: &str) -> Result<(), redis::RedisError>;

    /// 返回 true 表示确实删除了一个条目
    async fn delete(&self, key: &str) -> Result<bool, redis::RedisError>;

    /// 剩余存活秒数；键不存在或无过期时间时为负值
    async fn ttl(&self, key: &str) -> Result<i64, redis::RedisError>;

    /// 后端连通性检查，就绪探针用
    async fn ping(&self) -> Result<(), redis::RedisError>;
}

/// Redis 存储后端
pub struct RedisCacheStore {
    redis: Arc<RedisClient>,
}

impl RedisCacheStore {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, redis::RedisError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        conn.get(key).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), redis::RedisError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, redis::RedisError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn ttl(&self, key: &str) -> Result<i64, redis::RedisError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        conn.ttl(key).await
    }

    async fn ping(&self) -> Result<(), redis::RedisError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
