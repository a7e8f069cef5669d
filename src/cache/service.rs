use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::store::CacheStore;

/// 缓存查询结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// 缓存条目，以 JSON 形式存放在后端，过期由存储的 TTL 控制
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    payload: String,
    created_at: i64,
    hit_count: u64,
}

/// 缓存统计信息
#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub default_ttl_secs: u64,
    pub hits: u64,
    pub misses: u64,
}

/// 带 TTL 的缓存服务
///
/// 后端故障一律降级为 MISS，绝不把存储错误上抛给请求(fail-open)。
pub struct CacheService {
    store: Arc<dyn CacheStore>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheService {
    pub fn new(store: Arc<dyn CacheStore>, default_ttl: Duration) -> Self {
        Self {
            store,
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn store_key(key: &str) -> String {
        format!("cache:{}", key)
    }

    /// 后端连通性检查，错误原样上抛给就绪探针
    pub async fn ping(&self) -> Result<(), redis::RedisError> {
        self.store.ping().await
    }

    /// 查询缓存
    ///
    /// 未命中、已过期和后端故障都返回 MISS；命中时累加条目的
    /// hit_count 并尽力写回(失败忽略)。
    pub async fn get(&self, key: &str) -> (Option<String>, CacheStatus) {
        let store_key = Self::store_key(key);

        let raw = match self.store.get(&store_key).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!("Cache store unavailable, degrading to MISS: {}", err);
                self.misses.fetch_add(1, Ordering::Relaxed);
                return (None, CacheStatus::Miss);
            }
        };

        let Some(json) = raw else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return (None, CacheStatus::Miss);
        };

        let Ok(mut entry) = serde_json::from_str::<CacheEntry>(&json) else {
            tracing::warn!("Discarding malformed cache entry for key {}", key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return (None, CacheStatus::Miss);
        };

        entry.hit_count += 1;
        self.write_back(&store_key, &entry).await;

        self.hits.fetch_add(1, Ordering::Relaxed);
        (Some(entry.payload), CacheStatus::Hit)
    }

    /// 写入缓存，绝对过期时间为 now + ttl，后写覆盖先写
    pub async fn set(&self, key: &str, payload: String, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let entry = CacheEntry {
            payload,
            created_at: chrono::Utc::now().timestamp(),
            hit_count: 0,
        };

        let json = match serde_json::to_string(&entry) {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!("Failed to serialize cache entry for key {}: {}", key, err);
                return;
            }
        };

        if let Err(err) = self
            .store
            .set_ex(&Self::store_key(key), &json, ttl.as_secs())
            .await
        {
            tracing::warn!("Cache store write failed for key {}: {}", key, err);
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            default_ttl_secs: self.default_ttl.as_secs(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// 命中计数写回，保留剩余 TTL
    async fn write_back(&self, store_key: &str, entry: &CacheEntry) {
        let remaining = match self.store.ttl(store_key).await {
            Ok(secs) if secs > 0 => secs as u64,
            _ => return,
        };
        if let Ok(json) = serde_json::to_string(entry) {
            let _ = self.store.set_ex(store_key, &json, remaining).await;
        }
    }
}
