// 渲染模块
// 从聚合指标合成逐日数据点并绘制 SVG 活动折线图

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::github::models::AggregatedMetrics;
use crate::themes::ThemeColors;
use crate::validators::Timeframe;

const PADDING_TOP: u32 = 60;
const PADDING_RIGHT: u32 = 40;
const PADDING_BOTTOM: u32 = 60;
const PADDING_LEFT: u32 = 70;

/// 图表上的一个数据点
#[derive(Debug, Clone)]
pub struct ChartPoint {
    pub date: DateTime<Utc>,
    pub commits: u64,
    pub prs: u64,
    pub issues: u64,
}

/// 把聚合结果铺成逐日序列
///
/// 没有历史存储，只能把窗口总量均摊到每天再加少量起伏，
/// 让折线可读；这不是真实的逐日分布。
pub fn chart_data(metrics: &AggregatedMetrics, timeframe: Timeframe) -> Vec<ChartPoint> {
    let days = timeframe.days();
    let daily_commits = metrics.total_commits / days as u64;
    let daily_prs = metrics.total_prs_merged / days as u64;
    let daily_issues = metrics.total_issues_closed / days as u64;

    (0..days)
        .map(|i| ChartPoint {
            date: Utc::now() - chrono::Duration::days(days - i - 1),
            commits: daily_commits + (i % 3) as u64,
            prs: daily_prs + (i % 2) as u64,
            issues: daily_issues + ((i + 1) % 2) as u64,
        })
        .collect()
}

/// SVG 活动图渲染器
pub struct SvgRenderer {
    width: u32,
    height: u32,
}

impl SvgRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn chart_width(&self) -> u32 {
        self.width.saturating_sub(PADDING_LEFT + PADDING_RIGHT)
    }

    fn chart_height(&self) -> u32 {
        self.height.saturating_sub(PADDING_TOP + PADDING_BOTTOM)
    }

    /// 绘制三条折线(提交/PR/议题)的活动图
    pub fn render_activity_chart(
        &self,
        data: &[ChartPoint],
        title: &str,
        colors: &ThemeColors,
    ) -> String {
        let max_value = data
            .iter()
            .flat_map(|p| [p.commits, p.prs, p.issues])
            .max()
            .unwrap_or(0)
            .max(1);

        let commits_path = self.line_path(data, |p| p.commits, max_value);
        let prs_path = self.line_path(data, |p| p.prs, max_value);
        let issues_path = self.line_path(data, |p| p.issues, max_value);

        let mut svg = String::new();
        let _ = write!(
            svg,
            r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="{w}" height="{h}">
  <defs>
    <style>
      .chart-title {{ font-family: system-ui, -apple-system, sans-serif; font-size: 18px; font-weight: 600; }}
      .axis-label {{ font-family: system-ui, sans-serif; font-size: 11px; }}
      .legend-text {{ font-family: system-ui, sans-serif; font-size: 12px; }}
    </style>
  </defs>
  <rect width="{w}" height="{h}" fill="{background}"/>
  <text x="{title_x}" y="30" class="chart-title" text-anchor="middle" fill="{text}">{title}</text>
"#,
            w = self.width,
            h = self.height,
            background = colors.background,
            text = colors.text,
            title_x = self.width / 2,
            title = title,
        );

        self.push_grid(&mut svg, colors, max_value);

        let _ = write!(
            svg,
            r#"  <g transform="translate({left}, {top})">
    <path d="{commits}" fill="none" stroke="{primary}" stroke-width="2.5" stroke-linecap="round" stroke-linejoin="round"/>
    <path d="{prs}" fill="none" stroke="{secondary}" stroke-width="2.5" stroke-linecap="round" stroke-linejoin="round"/>
    <path d="{issues}" fill="none" stroke="{accent}" stroke-width="2.5" stroke-linecap="round" stroke-linejoin="round"/>
  </g>
"#,
            left = PADDING_LEFT,
            top = PADDING_TOP,
            commits = commits_path,
            prs = prs_path,
            issues = issues_path,
            primary = colors.primary,
            secondary = colors.secondary,
            accent = colors.accent,
        );

        self.push_axis_labels(&mut svg, data, colors);
        self.push_legend(&mut svg, colors);

        let _ = write!(
            svg,
            r#"  <text x="{x}" y="{y}" class="axis-label" text-anchor="end" fill="{muted}">Updated: {ts} UTC</text>
</svg>"#,
            x = self.width - 10,
            y = self.height - 10,
            muted = colors.muted,
            ts = Utc::now().format("%Y-%m-%d %H:%M"),
        );

        svg
    }

    /// 单条折线的 path 数据
    fn line_path(
        &self,
        data: &[ChartPoint],
        value: impl Fn(&ChartPoint) -> u64,
        max_value: u64,
    ) -> String {
        let chart_w = f64::from(self.chart_width());
        let chart_h = f64::from(self.chart_height());
        let step = if data.len() > 1 {
            chart_w / (data.len() - 1) as f64
        } else {
            0.0
        };

        let mut path = String::new();
        for (i, point) in data.iter().enumerate() {
            let x = step * i as f64;
            let y = chart_h - (value(point) as f64 / max_value as f64) * chart_h;
            let cmd = if i == 0 { 'M' } else { 'L' };
            let _ = write!(path, "{}{:.1},{:.1} ", cmd, x, y);
        }
        path.trim_end().to_string()
    }

    fn push_grid(&self, svg: &mut String, colors: &ThemeColors, max_value: u64) {
        let chart_h = self.chart_height();
        for i in 0..=4u32 {
            let y = PADDING_TOP + chart_h * i / 4;
            let label = max_value - (u64::from(i) * max_value / 4);
            let _ = write!(
                svg,
                r#"  <line x1="{x1}" y1="{y}" x2="{x2}" y2="{y}" stroke="{grid}" stroke-width="1" opacity="0.5"/>
  <text x="{lx}" y="{ly}" class="axis-label" text-anchor="end" fill="{muted}">{label}</text>
"#,
                x1 = PADDING_LEFT,
                x2 = self.width - PADDING_RIGHT,
                y = y,
                grid = colors.grid,
                lx = PADDING_LEFT - 8,
                ly = y + 4,
                muted = colors.muted,
                label = label,
            );
        }
    }

    fn push_axis_labels(&self, svg: &mut String, data: &[ChartPoint], colors: &ThemeColors) {
        let (Some(first), Some(last)) = (data.first(), data.last()) else {
            return;
        };
        let y = self.height - PADDING_BOTTOM + 20;
        let _ = write!(
            svg,
            r#"  <text x="{x1}" y="{y}" class="axis-label" text-anchor="start" fill="{muted}">{from}</text>
  <text x="{x2}" y="{y}" class="axis-label" text-anchor="end" fill="{muted}">{to}</text>
"#,
            x1 = PADDING_LEFT,
            x2 = self.width - PADDING_RIGHT,
            y = y,
            muted = colors.muted,
            from = first.date.format("%m-%d"),
            to = last.date.format("%m-%d"),
        );
    }

    fn push_legend(&self, svg: &mut String, colors: &ThemeColors) {
        let entries = [
            ("Commits", colors.primary),
            ("PRs", colors.secondary),
            ("Issues", colors.accent),
        ];
        let y = self.height - 18;
        let mut x = PADDING_LEFT;
        for (label, color) in entries {
            let _ = write!(
                svg,
                r#"  <rect x="{x}" y="{ry}" width="10" height="10" fill="{color}"/>
  <text x="{tx}" y="{ty}" class="legend-text" fill="{text}">{label}</text>
"#,
                x = x,
                ry = y - 9,
                color = color,
                tx = x + 14,
                ty = y,
                text = colors.text,
                label = label,
            );
            x += 90;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::themes;

    fn metrics(commits: u64, prs: u64, issues: u64) -> AggregatedMetrics {
        AggregatedMetrics {
            repos: 1,
            total_commits: commits,
            total_prs_merged: prs,
            total_issues_closed: issues,
            unique_contributors: 3,
            per_repo: HashMap::new(),
            timeframe: "7d".into(),
            timestamp: Utc::now(),
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_chart_data_one_point_per_day() {
        let data = chart_data(&metrics(70, 14, 7), Timeframe::SevenDays);
        assert_eq!(data.len(), 7);

        let data = chart_data(&metrics(0, 0, 0), Timeframe::OneDay);
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn test_chart_data_distributes_totals() {
        let data = chart_data(&metrics(70, 0, 0), Timeframe::SevenDays);
        // 每日基线是总量均摊，叠加的起伏不超过 2
        for point in &data {
            assert!(point.commits >= 10);
            assert!(point.commits <= 12);
        }
    }

    #[test]
    fn test_render_produces_valid_svg_shell() {
        let data = chart_data(&metrics(70, 14, 7), Timeframe::SevenDays);
        let svg = SvgRenderer::new(800, 400).render_activity_chart(
            &data,
            "octocat/Hello-World - Last 7d",
            &themes::LIGHT,
        );

        assert!(svg.starts_with("<?xml"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("octocat/Hello-World - Last 7d"));
        assert!(svg.contains(themes::LIGHT.background));
        assert!(svg.contains(themes::LIGHT.primary));
        assert!(svg.contains(r#"viewBox="0 0 800 400""#));
    }

    #[test]
    fn test_render_handles_empty_series() {
        let svg = SvgRenderer::new(200, 100).render_activity_chart(
            &[],
            "Activity - Last 7d",
            &themes::DARK,
        );
        assert!(svg.contains("</svg>"));
    }
}
