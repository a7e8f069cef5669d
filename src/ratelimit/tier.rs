use serde::{Deserialize, Serialize};

/// 访问层级，决定限流配额与可用功能
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Public,
    Authenticated,
    Enterprise,
}

/// 按层级开放的功能
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    ChartActivity,
    MetricsAggregate,
    ChartTvl,
    ChartChain,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Public => "public",
            Tier::Authenticated => "authenticated",
            Tier::Enterprise => "enterprise",
        }
    }

    /// 层级是否开放某功能，enterprise 开放全部
    pub fn allows(self, feature: Feature) -> bool {
        match self {
            Tier::Public => matches!(
                feature,
                Feature::ChartActivity | Feature::MetricsAggregate
            ),
            Tier::Authenticated => matches!(
                feature,
                Feature::ChartActivity
                    | Feature::MetricsAggregate
                    | Feature::ChartTvl
                    | Feature::ChartChain
            ),
            Tier::Enterprise => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_feature_set() {
        assert!(Tier::Public.allows(Feature::ChartActivity));
        assert!(Tier::Public.allows(Feature::MetricsAggregate));
        assert!(!Tier::Public.allows(Feature::ChartTvl));
        assert!(!Tier::Public.allows(Feature::ChartChain));
    }

    #[test]
    fn test_authenticated_feature_set() {
        assert!(Tier::Authenticated.allows(Feature::ChartActivity));
        assert!(Tier::Authenticated.allows(Feature::ChartTvl));
        assert!(Tier::Authenticated.allows(Feature::ChartChain));
    }

    #[test]
    fn test_enterprise_allows_everything() {
        assert!(Tier::Enterprise.allows(Feature::ChartActivity));
        assert!(Tier::Enterprise.allows(Feature::MetricsAggregate));
        assert!(Tier::Enterprise.allows(Feature::ChartTvl));
        assert!(Tier::Enterprise.allows(Feature::ChartChain));
    }

    #[test]
    fn test_tier_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Tier::Enterprise).unwrap(), "\"enterprise\"");
        let tier: Tier = serde_json::from_str("\"authenticated\"").unwrap();
        assert_eq!(tier, Tier::Authenticated);
    }
}
