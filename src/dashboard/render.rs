//! 伺服器端渲染的看板頁面

use crate::dashboard::state::{CategoryView, DashboardSnapshot};
use crate::domain::model::ProgressStatus;
use std::fmt::Write;

const DONE: &[&str] = &[
    "🎉 任務完成！完美收工！",
    "🏆 大功告成，今日圓滿！",
    "🌟 全部清零，明日再戰！",
    "💎 百分百達成，無懈可擊！",
];
const FAR_AHEAD: &[&str] = &[
    "🚀 大幅領先，再接再厲！",
    "🔥 火力全開，勢不可擋！",
    "⭐ 進度領先，保持節奏！",
];
const AHEAD: &[&str] = &[
    "👍 進度不錯，穩步前進！",
    "✨ 保持狀態，繼續努力！",
    "📈 穩紮穩打，步步為營！",
];
const ON_TRACK: &[&str] = &[
    "💪 穩中求進，繼續加油！",
    "🎯 瞄準目標，馬上追上！",
    "⚡ 保持節奏，你能行！",
];
const BEHIND: &[&str] = &[
    "⏰ 時間緊迫，需要加速！",
    "🔔 抓緊時間，不要掉隊！",
    "⚠️ 黃牌警告，立即提速！",
];
const FAR_BEHIND: &[&str] = &[
    "🚨 落後較多，全力衝刺！",
    "🆘 紅色警報，刻不容緩！",
    "⛔ 嚴重滯後，全員加速！",
];

/// 依實際完成比例與差值分檔；同檔內以 `seed` 固定挑選
pub fn encouragement(actual_pct: f64, delta_pct: f64, seed: u64) -> &'static str {
    let tier = if actual_pct >= 100.0 {
        DONE
    } else if delta_pct >= 5.0 {
        FAR_AHEAD
    } else if delta_pct >= 2.0 {
        AHEAD
    } else if delta_pct >= -1.0 {
        ON_TRACK
    } else if delta_pct >= -3.0 {
        BEHIND
    } else {
        FAR_BEHIND
    };
    tier[(seed % tier.len() as u64) as usize]
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// 進度條寬度，限制在 0..=100
pub fn bar_width(pct: f64) -> f64 {
    if pct.is_finite() {
        pct.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

fn status_class(status: ProgressStatus) -> &'static str {
    match status {
        ProgressStatus::Ok => "ok",
        ProgressStatus::Warn => "warn",
        ProgressStatus::Critical => "critical",
        ProgressStatus::NoBaseline => "none",
    }
}

const STYLE: &str = r#"
body { font-family: -apple-system, "Segoe UI", "PingFang SC", sans-serif; margin: 0 auto; max-width: 1100px; padding: 16px; color: #1f2937; }
h1 { font-size: 1.6rem; }
.muted { color: #6b7280; font-size: 0.9rem; }
.pill { display: inline-block; padding: 4px 14px; border-radius: 999px; font-weight: 600; }
.pill.ok { background: #dcfce7; color: #166534; }
.pill.warn { background: #fef3c7; color: #92400e; }
.pill.critical { background: #fee2e2; color: #991b1b; }
.pill.none { background: #e5e7eb; color: #374151; }
.metrics { display: grid; grid-template-columns: repeat(auto-fit, minmax(160px, 1fr)); gap: 12px; margin: 16px 0; }
.metric { background: #f9fafb; border-radius: 8px; padding: 12px; }
.metric .value { font-size: 1.5rem; font-weight: 700; }
.bar { background: #e5e7eb; border-radius: 6px; height: 18px; margin: 4px 0 10px; }
.bar > span { display: block; height: 100%; border-radius: 6px; }
.bar .target { background: #93c5fd; }
.bar .actual { background: #22c55e; }
.cards { display: grid; grid-template-columns: repeat(auto-fit, minmax(220px, 1fr)); gap: 12px; }
.card { border: 1px solid #e5e7eb; border-radius: 8px; padding: 12px; }
table { border-collapse: collapse; width: 100%; margin-top: 12px; }
th, td { border-bottom: 1px solid #e5e7eb; padding: 6px 8px; text-align: right; }
th:first-child, td:first-child { text-align: left; }
.error { background: #fee2e2; color: #991b1b; padding: 16px; border-radius: 8px; }
"#;

fn page(refresh_seconds: u64, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="zh">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<meta http-equiv="refresh" content="{refresh}">
<title>分揀進度即時看板</title>
<style>{style}</style>
</head>
<body>
<h1>分揀進度即時看板</h1>
{body}
</body>
</html>
"#,
        refresh = refresh_seconds,
        style = STYLE,
        body = body
    )
}

pub fn render_page(snapshot: &DashboardSnapshot, refresh_seconds: u64) -> String {
    if let Some(error) = &snapshot.error {
        return render_error_page(snapshot, error, refresh_seconds);
    }

    let mut body = String::new();
    let _ = writeln!(
        body,
        r#"<p class="muted">更新時間 {} ｜ 目標日期 {} ｜ 每 {} 秒自動刷新</p>"#,
        snapshot.generated_at.format("%Y-%m-%d %H:%M:%S"),
        escape_html(&snapshot.target_date),
        refresh_seconds
    );

    if let Some(comparison) = &snapshot.comparison {
        let _ = writeln!(
            body,
            r#"<p><span class="pill {}">狀態：{}</span> <strong>{}</strong></p>"#,
            status_class(comparison.status),
            comparison.status,
            escape_html(&snapshot.encouragement)
        );

        let _ = writeln!(body, r#"<div class="metrics">"#);
        metric(&mut body, "總任務數", &snapshot.stats.total_tasks.to_string());
        metric(&mut body, "已完成", &snapshot.stats.completed_tasks.to_string());
        metric(
            &mut body,
            "目標完成比例",
            &format!("{:.1}%", comparison.required_order_pct),
        );
        metric(
            &mut body,
            "實際完成比例",
            &format!("{:.1}%", comparison.actual_order_pct),
        );
        metric(&mut body, "與目標差值", &format!("{:+.1}%", comparison.delta_pct));
        metric(
            &mut body,
            "基準時間點",
            &escape_html(comparison.time_point.as_deref().unwrap_or("-")),
        );
        let _ = writeln!(body, "</div>");

        let _ = writeln!(
            body,
            r#"<div>目標 {:.1}%<div class="bar"><span class="target" style="width:{:.1}%"></span></div>實際 {:.1}%<div class="bar"><span class="actual" style="width:{:.1}%"></span></div></div>"#,
            comparison.required_order_pct,
            bar_width(comparison.required_order_pct),
            comparison.actual_order_pct,
            bar_width(comparison.actual_order_pct)
        );
    }

    let _ = writeln!(
        body,
        r#"<p class="muted">HTTP {} ｜ API 狀態 {} ｜ 提示 {}</p>"#,
        snapshot
            .meta
            .http_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string()),
        escape_html(snapshot.meta.api_code.as_deref().unwrap_or("-")),
        escape_html(snapshot.meta.api_msg.as_deref().unwrap_or("-"))
    );

    render_categories(&mut body, snapshot);
    page(refresh_seconds, &body)
}

fn metric(out: &mut String, label: &str, value: &str) {
    let _ = writeln!(
        out,
        r#"<div class="metric"><div class="muted">{}</div><div class="value">{}</div></div>"#,
        label, value
    );
}

fn render_categories(out: &mut String, snapshot: &DashboardSnapshot) {
    let _ = writeln!(out, "<h2>分類進度</h2>");
    if snapshot.categories.is_empty() {
        let _ = writeln!(out, r#"<p class="muted">暫無分類資料</p>"#);
        return;
    }

    if let Some(status) = snapshot.category_status {
        let _ = writeln!(
            out,
            r#"<p><span class="pill {}">分類狀態：{}</span> <span class="muted">基準時間點 {}</span></p>"#,
            status_class(status),
            status,
            escape_html(snapshot.category_baseline_time.as_deref().unwrap_or("-"))
        );
    }

    let _ = writeln!(out, r#"<div class="cards">"#);
    for category in &snapshot.categories {
        render_card(out, category);
    }
    let _ = writeln!(out, "</div>");

    let _ = writeln!(out, "<h2>📊 分類進度詳情</h2>");
    let _ = writeln!(
        out,
        "<table><tr><th>分類</th><th>總數</th><th>已完成</th><th>未完成</th><th>缺貨</th><th>完成率</th><th>目標</th><th>差值</th></tr>"
    );
    for category in &snapshot.categories {
        let p = &category.progress;
        let _ = writeln!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{:.1}%</td><td>{}</td><td>{}</td></tr>",
            escape_html(&p.name),
            p.total_count,
            p.finished_count,
            p.unfinished_count,
            p.out_of_stock_count,
            p.completion_rate,
            category
                .baseline_rate
                .map(|r| format!("{:.1}%", r))
                .unwrap_or_else(|| "-".to_string()),
            category
                .delta
                .map(|d| format!("{:+.1}%", d))
                .unwrap_or_else(|| "-".to_string())
        );
    }
    let _ = writeln!(out, "</table>");
}

fn render_card(out: &mut String, category: &CategoryView) {
    let p = &category.progress;
    let status = category
        .status
        .map(|s| {
            format!(
                r#" <span class="pill {}">{}</span>"#,
                status_class(s),
                s
            )
        })
        .unwrap_or_default();

    let _ = writeln!(
        out,
        r#"<div class="card"><strong>{}</strong>{}<div class="muted">{} / {} 件</div><div class="bar"><span class="actual" style="width:{:.1}%"></span></div>"#,
        escape_html(&p.name),
        status,
        p.finished_count,
        p.total_count,
        bar_width(p.completion_rate)
    );
    if let Some(rate) = category.baseline_rate {
        let _ = writeln!(
            out,
            r#"<div class="bar"><span class="target" style="width:{:.1}%"></span></div><div class="muted">實際 {:.1}% ｜ 目標 {:.1}%</div>"#,
            bar_width(rate),
            p.completion_rate,
            rate
        );
    } else {
        let _ = writeln!(out, r#"<div class="muted">完成率 {:.1}%</div>"#, p.completion_rate);
    }
    let _ = writeln!(out, "</div>");
}

pub fn render_error_page(snapshot: &DashboardSnapshot, error: &str, refresh_seconds: u64) -> String {
    let body = format!(
        r#"<div class="error"><strong>❌ 無法取得分揀進度</strong><p>{}</p><p class="muted">{} ｜ 目標日期 {} ｜ {} 秒後自動重試</p></div>"#,
        escape_html(error),
        snapshot.generated_at.format("%Y-%m-%d %H:%M:%S"),
        escape_html(&snapshot.target_date),
        refresh_seconds
    );
    page(refresh_seconds, &body)
}
