// 入参校验模块
// 所有校验错误都在边界处转成 400，绝不进入管线内部

use std::str::FromStr;

/// 单次请求允许的最大仓库数
const MAX_REPOS: usize = 10;

/// 仓库名最大长度
const MAX_REPO_LEN: usize = 100;

/// 统计时间窗口
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    OneDay,
    SevenDays,
    ThirtyDays,
    NinetyDays,
    OneYear,
}

impl Timeframe {
    pub fn days(self) -> i64 {
        match self {
            Timeframe::OneDay => 1,
            Timeframe::SevenDays => 7,
            Timeframe::ThirtyDays => 30,
            Timeframe::NinetyDays => 90,
            Timeframe::OneYear => 365,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::OneDay => "1d",
            Timeframe::SevenDays => "7d",
            Timeframe::ThirtyDays => "30d",
            Timeframe::NinetyDays => "90d",
            Timeframe::OneYear => "1y",
        }
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1d" => Ok(Timeframe::OneDay),
            "7d" => Ok(Timeframe::SevenDays),
            "30d" => Ok(Timeframe::ThirtyDays),
            "90d" => Ok(Timeframe::NinetyDays),
            "1y" => Ok(Timeframe::OneYear),
            other => Err(format!(
                "Invalid timeframe: {}. Valid options: 1d, 7d, 30d, 90d, 1y",
                other
            )),
        }
    }
}

/// 图表输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartFormat {
    Svg,
    Png,
}

impl ChartFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ChartFormat::Svg => "svg",
            ChartFormat::Png => "png",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ChartFormat::Svg => "image/svg+xml",
            ChartFormat::Png => "image/png",
        }
    }
}

impl FromStr for ChartFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "svg" => Ok(ChartFormat::Svg),
            "png" => Ok(ChartFormat::Png),
            other => Err(format!("Invalid format: {}. Valid options: png, svg", other)),
        }
    }
}

/// 校验仓库列表
///
/// 规则：1~10 个条目；每个条目非空、不超过 100 字符、不含路径
/// 穿越(`..`、首尾 `/`)、且符合 `owner/repo` 语法。
pub fn validate_repos(repos: &[String]) -> Result<(), String> {
    if repos.is_empty() {
        return Err("At least one repository is required".to_string());
    }

    if repos.len() > MAX_REPOS {
        return Err("Maximum 10 repositories allowed per request".to_string());
    }

    for repo in repos {
        if repo.is_empty() {
            return Err("Repository name cannot be empty".to_string());
        }

        if repo.len() > MAX_REPO_LEN {
            let head: String = repo.chars().take(20).collect();
            return Err(format!("Repository name too long: {}...", head));
        }

        // 路径穿越先于语法检查，给出更明确的拒绝原因
        if repo.contains("..") || repo.starts_with('/') || repo.ends_with('/') {
            return Err(format!("Invalid repository name: {}", repo));
        }

        if !matches_repo_pattern(repo) {
            return Err(format!(
                "Invalid repository format: {}. Expected 'owner/repo'",
                repo
            ));
        }
    }

    Ok(())
}

/// owner/repo 语法：owner 首尾必须是字母数字，中间允许 . _ -；
/// repo 段允许字母数字和 . _ -，恰好一个分隔符
fn matches_repo_pattern(repo: &str) -> bool {
    let Some((owner, name)) = repo.split_once('/') else {
        return false;
    };
    if name.contains('/') {
        return false;
    }

    let valid_inner = |c: char| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-';

    let owner_ok = !owner.is_empty()
        && owner.chars().all(valid_inner)
        && owner.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
        && owner.chars().last().is_some_and(|c| c.is_ascii_alphanumeric());

    let name_ok = !name.is_empty() && name.chars().all(valid_inner);

    owner_ok && name_ok
}

/// 校验图表尺寸
pub fn validate_dimensions(width: u32, height: u32) -> Result<(), String> {
    if !(200..=2000).contains(&width) {
        return Err("Width must be between 200 and 2000 pixels".to_string());
    }

    if !(100..=1000).contains(&height) {
        return Err("Height must be between 100 and 1000 pixels".to_string());
    }

    Ok(())
}
