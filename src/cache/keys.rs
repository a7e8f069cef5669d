use std::fmt::Write as _;

use sha2::{Digest, Sha256};

/// 活动图表缓存键前缀
pub const CHART_ACTIVITY_PREFIX: &str = "chart:activity";

/// 聚合指标缓存键前缀
pub const METRICS_AGGREGATE_PREFIX: &str = "metrics:aggregate";

/// 派生键的固定长度(十六进制字符数)
const KEY_LENGTH: usize = 32;

/// 派生确定性缓存键
///
/// 仓库列表先去重再按字典序排序，保证同一逻辑请求无论入参顺序
/// 如何都得到相同的键。各字段用 `:` 拼接后做 SHA-256，截断为
/// 32 个十六进制字符。
pub fn derive_key(
    prefix: &str,
    repos: &[String],
    timeframe: &str,
    theme: &str,
    format: &str,
) -> String {
    let mut sorted: Vec<&str> = repos.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let material = format!(
        "{}:{}:{}:{}:{}",
        prefix,
        sorted.join(","),
        timeframe,
        theme,
        format
    );

    let digest = Sha256::digest(material.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{:02x}", byte);
    }
    hex.truncate(KEY_LENGTH);
    hex
}
