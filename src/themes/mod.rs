// 主题模块
// 图表配色的封闭枚举表，未知主题在边界处按校验错误处理

use serde::Serialize;

/// 一套图表配色
#[derive(Debug, Clone, Serialize)]
pub struct ThemeColors {
    pub background: &'static str,
    pub text: &'static str,
    pub primary: &'static str,
    pub secondary: &'static str,
    pub accent: &'static str,
    pub grid: &'static str,
    pub border: &'static str,
    pub muted: &'static str,
}

pub const LIGHT: ThemeColors = ThemeColors {
    background: "#ffffff",
    text: "#1f2937",
    primary: "#3182ce",
    secondary: "#48bb78",
    accent: "#ed8936",
    grid: "#e2e8f0",
    border: "#d1d5db",
    muted: "#9ca3af",
};

pub const DARK: ThemeColors = ThemeColors {
    background: "#1a202c",
    text: "#e2e8f0",
    primary: "#63b3ed",
    secondary: "#68d391",
    accent: "#f6ad55",
    grid: "#4a5568",
    border: "#4a5568",
    muted: "#718096",
};

pub const HYPERKIT: ThemeColors = ThemeColors {
    background: "#0f1419",
    text: "#e8f0f7",
    primary: "#2186b5",
    secondary: "#8bcf7f",
    accent: "#f59e0b",
    grid: "#2d3748",
    border: "#374151",
    muted: "#6b7280",
};

pub const MINT: ThemeColors = ThemeColors {
    background: "#f0fdf4",
    text: "#1e4e2c",
    primary: "#10b981",
    secondary: "#34d399",
    accent: "#6ee7b7",
    grid: "#d1fae5",
    border: "#a7f3d0",
    muted: "#6ee7b7",
};

pub const SUNSET: ThemeColors = ThemeColors {
    background: "#1f1f1f",
    text: "#fef3c7",
    primary: "#f97316",
    secondary: "#fb923c",
    accent: "#fbbf24",
    grid: "#374151",
    border: "#4b5563",
    muted: "#9ca3af",
};

pub const OCEAN: ThemeColors = ThemeColors {
    background: "#0c4a6e",
    text: "#f0f9ff",
    primary: "#38bdf8",
    secondary: "#7dd3fc",
    accent: "#0ea5e9",
    grid: "#164e63",
    border: "#155e75",
    muted: "#67e8f9",
};

pub const FOREST: ThemeColors = ThemeColors {
    background: "#14532d",
    text: "#f0fdf4",
    primary: "#22c55e",
    secondary: "#4ade80",
    accent: "#86efac",
    grid: "#166534",
    border: "#15803d",
    muted: "#6ee7b7",
};

/// 可用主题名，按展示顺序
pub const THEME_NAMES: [&str; 7] = [
    "light", "dark", "hyperkit", "mint", "sunset", "ocean", "forest",
];

/// 按名称查主题；未知名称返回 None
pub fn theme(name: &str) -> Option<&'static ThemeColors> {
    match name {
        "light" => Some(&LIGHT),
        "dark" => Some(&DARK),
        "hyperkit" => Some(&HYPERKIT),
        "mint" => Some(&MINT),
        "sunset" => Some(&SUNSET),
        "ocean" => Some(&OCEAN),
        "forest" => Some(&FOREST),
        _ => None,
    }
}

/// 宽松查找，未知主题回落到 light
pub fn theme_or_light(name: &str) -> &'static ThemeColors {
    theme(name).unwrap_or(&LIGHT)
}
