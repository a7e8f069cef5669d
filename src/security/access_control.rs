use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::cache::store::CacheStore;
use crate::ratelimit::tier::Tier;

/// 存储的密钥记录，只按密钥哈希索引，原始密钥从不落库
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub name: String,
    pub tier: Tier,
    pub owner_email: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// 签发结果，明文密钥只在此处出现一次
#[derive(Debug, Serialize)]
pub struct IssuedKey {
    pub api_key: String,
    pub name: String,
    pub tier: Tier,
    pub expires_at: Option<DateTime<Utc>>,
}

/// 访问控制服务
pub struct AccessControl {
    store: Arc<dyn CacheStore>,
}

impl AccessControl {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// 生成高熵密钥，hb_ 前缀 + 两段 uuid
    pub fn generate_api_key() -> String {
        format!(
            "hb_{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        )
    }

    /// 密钥哈希，作为唯一的存储与查找键
    pub fn hash_key(api_key: &str) -> String {
        let digest = Sha256::digest(api_key.as_bytes());
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(hex, "{:02x}", byte);
        }
        hex
    }

    fn store_key(api_key: &str) -> String {
        format!("api_key:{}", Self::hash_key(api_key))
    }

    /// 校验密钥；查无此键、已过期或已停用都返回 None
    ///
    /// 存储故障同样返回 None：调用方把请求当作匿名处理，而不是失败。
    pub async fn validate(&self, api_key: &str) -> Option<ApiKeyRecord> {
        let json = match self.store.get(&Self::store_key(api_key)).await {
            Ok(json) => json?,
            Err(err) => {
                tracing::warn!("Credential store unavailable, treating as anonymous: {}", err);
                return None;
            }
        };

        let record: ApiKeyRecord = serde_json::from_str(&json).ok()?;

        if let Some(expires_at) = record.expires_at {
            if Utc::now() > expires_at {
                return None;
            }
        }

        if !record.is_active {
            return None;
        }

        Some(record)
    }

    /// 解析层级；无密钥或密钥无效一律按 public 处理
    pub async fn tier_for(&self, api_key: Option<&str>) -> Tier {
        let Some(api_key) = api_key else {
            return Tier::Public;
        };
        match self.validate(api_key).await {
            Some(record) => record.tier,
            None => Tier::Public,
        }
    }

    /// 签发新密钥，只存哈希与元数据
    pub async fn issue(
        &self,
        name: &str,
        tier: Tier,
        owner_email: Option<String>,
        expires_days: Option<i64>,
    ) -> Result<IssuedKey, redis::RedisError> {
        let api_key = Self::generate_api_key();
        let expires_at = expires_days.map(|days| Utc::now() + Duration::days(days));

        let record = ApiKeyRecord {
            name: name.to_string(),
            tier,
            owner_email,
            is_active: true,
            created_at: Utc::now(),
            expires_at,
        };

        let json = serde_json::to_string(&record).map_err(|e| {
            redis::RedisError::from((redis::ErrorKind::IoError, "serialize error", e.to_string()))
        })?;
        // 会过期的记录带同步的存储 TTL，失效后自动清除而不是永久留存
        match record.expires_at {
            Some(expires_at) => {
                let ttl_secs = (expires_at - Utc::now()).num_seconds().max(1) as u64;
                self.store
                    .set_ex(&Self::store_key(&api_key), &json, ttl_secs)
                    .await?;
            }
            None => self.store.set(&Self::store_key(&api_key), &json).await?,
        }

        Ok(IssuedKey {
            api_key,
            name: record.name,
            tier: record.tier,
            expires_at: record.expires_at,
        })
    }

    /// 吊销密钥；返回 false 表示没有删除任何记录
    pub async fn revoke(&self, api_key: &str) -> bool {
        match self.store.delete(&Self::store_key(api_key)).await {
            Ok(removed) => removed,
            Err(err) => {
                tracing::warn!("Credential store unavailable, revoke failed: {}", err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::testing::MemoryCacheStore;

    fn access() -> (AccessControl, Arc<MemoryCacheStore>) {
        let store = Arc::new(MemoryCacheStore::new());
        (AccessControl::new(store.clone()), store)
    }

    #[test]
    fn test_hash_key_deterministic_and_opaque() {
        let a = AccessControl::hash_key("hb_secret");
        let b = AccessControl::hash_key("hb_secret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(!a.contains("secret"));
        assert_ne!(a, AccessControl::hash_key("hb_other"));
    }

    #[test]
    fn test_generated_keys_are_unique() {
        let a = AccessControl::generate_api_key();
        let b = AccessControl::generate_api_key();
        assert!(a.starts_with("hb_"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_issue_then_validate() {
        let (access, _) = access();
        let issued = access
            .issue("ci-bot", Tier::Authenticated, None, Some(30))
            .await
            .unwrap();

        let record = access.validate(&issued.api_key).await.expect("valid key");
        assert_eq!(record.tier, Tier::Authenticated);
        assert_eq!(record.name, "ci-bot");
        assert!(record.is_active);
    }

    #[tokio::test]
    async fn test_expiring_record_carries_store_ttl() {
        let (access, store) = access();
        let issued = access
            .issue("short-lived", Tier::Authenticated, None, Some(30))
            .await
            .unwrap();

        let ttl = store
            .ttl(&AccessControl::store_key(&issued.api_key))
            .await
            .unwrap();
        assert!(ttl > 0);
        assert!(ttl <= 30 * 86_400);
    }

    #[tokio::test]
    async fn test_permanent_record_has_no_store_ttl() {
        let (access, store) = access();
        let issued = access
            .issue("forever", Tier::Enterprise, None, None)
            .await
            .unwrap();

        let ttl = store
            .ttl(&AccessControl::store_key(&issued.api_key))
            .await
            .unwrap();
        assert_eq!(ttl, -1);
    }

    #[tokio::test]
    async fn test_unknown_key_is_invalid() {
        let (access, _) = access();
        assert!(access.validate("hb_never_issued").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_key_is_invalid() {
        let (access, store) = access();
        let record = ApiKeyRecord {
            name: "old".into(),
            tier: Tier::Authenticated,
            owner_email: None,
            is_active: true,
            created_at: Utc::now() - Duration::days(60),
            expires_at: Some(Utc::now() - Duration::days(30)),
        };
        let json = serde_json::to_string(&record).unwrap();
        store
            .set(&AccessControl::store_key("hb_expired"), &json)
            .await
            .unwrap();

        assert!(access.validate("hb_expired").await.is_none());
        assert_eq!(access.tier_for(Some("hb_expired")).await, Tier::Public);
    }

    #[tokio::test]
    async fn test_deactivated_key_is_invalid() {
        let (access, store) = access();
        let record = ApiKeyRecord {
            name: "disabled".into(),
            tier: Tier::Enterprise,
            owner_email: None,
            is_active: false,
            created_at: Utc::now(),
            expires_at: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        store
            .set(&AccessControl::store_key("hb_disabled"), &json)
            .await
            .unwrap();

        assert!(access.validate("hb_disabled").await.is_none());
    }

    #[tokio::test]
    async fn test_tier_for_anonymous_is_public() {
        let (access, _) = access();
        assert_eq!(access.tier_for(None).await, Tier::Public);
        assert_eq!(access.tier_for(Some("hb_bogus")).await, Tier::Public);
    }

    #[tokio::test]
    async fn test_revoke_removes_record() {
        let (access, _) = access();
        let issued = access
            .issue("temp", Tier::Enterprise, Some("ops@example.com".into()), None)
            .await
            .unwrap();

        assert!(access.revoke(&issued.api_key).await);
        assert!(access.validate(&issued.api_key).await.is_none());
        assert!(!access.revoke(&issued.api_key).await);
    }
}
