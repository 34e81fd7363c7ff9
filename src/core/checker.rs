//! 即時比對：抓取一次進度並與基準曲線比較，不落盤

use crate::core::baseline::{compare_with_baseline, Baseline};
use crate::core::parser::{data_snippet, extract_progress, top_level_keys};
use crate::core::schedule::{target_date, target_date_param};
use crate::domain::model::{ApiMeta, ProgressComparison, ProgressStats};
use crate::domain::ports::ProgressSource;
use crate::utils::error::Result;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt::Write;

const DEBUG_KEY_LIMIT: usize = 10;
const DEBUG_SNIPPET_CHARS: usize = 300;

pub struct ProgressChecker<P: ProgressSource> {
    source: P,
    baseline: Baseline,
    threshold: f64,
    rollover_hour: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub checked_at: NaiveDateTime,
    pub target_date: String,
    pub meta: ApiMeta,
    pub stats: ProgressStats,
    pub comparison: ProgressComparison,
    pub top_level_keys: Vec<String>,
    pub data_keys: Vec<String>,
    /// 只有總數為 0 時才保留，方便排查回應格式
    pub data_snippet: Option<String>,
}

impl<P: ProgressSource> ProgressChecker<P> {
    pub fn new(source: P, baseline: Baseline, threshold: f64, rollover_hour: u32) -> Self {
        Self {
            source,
            baseline,
            threshold,
            rollover_hour,
        }
    }

    pub async fn check_once(&self, now: NaiveDateTime) -> Result<CheckReport> {
        let target = target_date_param(target_date(now, self.rollover_hour));
        let response = self.source.progress_snapshot(&target).await?;

        let body = &response.body;
        let stats = extract_progress(body);
        let comparison = compare_with_baseline(&stats, &self.baseline, self.threshold, now.time());
        tracing::debug!(
            "比對結果: {} (實際 {}%, 目標 {}%)",
            comparison.status,
            comparison.actual_order_pct,
            comparison.required_order_pct
        );

        Ok(CheckReport {
            checked_at: now,
            target_date: target,
            meta: ApiMeta::from_response(Some(response.http_status), body),
            stats,
            comparison,
            top_level_keys: top_level_keys(Some(body), DEBUG_KEY_LIMIT),
            data_keys: top_level_keys(body.get("data"), DEBUG_KEY_LIMIT),
            data_snippet: (stats.total_tasks == 0).then(|| data_snippet(body, DEBUG_SNIPPET_CHARS)),
        })
    }
}

fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

impl CheckReport {
    /// 0: OK / NO_BASELINE，1: 進度落後
    pub fn exit_code(&self) -> i32 {
        if self.comparison.status.is_behind() {
            1
        } else {
            0
        }
    }

    pub fn render(&self, debug: bool) -> String {
        let mut out = String::new();
        let http = self
            .meta
            .http_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());

        if debug {
            let _ = writeln!(out, "介面除錯資訊:");
            let _ = writeln!(out, "- HTTP狀態: {}", http);
            let _ = writeln!(
                out,
                "- API狀態: {} | 提示: {}",
                or_dash(self.meta.api_code.as_deref()),
                or_dash(self.meta.api_msg.as_deref())
            );
            let _ = writeln!(out, "- 頂層鍵: {:?}", self.top_level_keys);
            let _ = writeln!(out, "- data鍵: {:?}", self.data_keys);
            if let Some(snippet) = &self.data_snippet {
                let _ = writeln!(out, "- data片段: {}...", snippet);
            }
            let _ = writeln!(out);
        }

        let _ = writeln!(out, "==== 分揀進度即時比對（不落盤）====");
        let _ = writeln!(
            out,
            "HTTP: {} | API狀態: {} | 提示: {}",
            http,
            or_dash(self.meta.api_code.as_deref()),
            or_dash(self.meta.api_msg.as_deref())
        );
        let _ = writeln!(out, "目標日期: {}", self.target_date);
        let _ = writeln!(
            out,
            "當前時間點: {}",
            or_dash(self.comparison.time_point.as_deref())
        );
        let _ = writeln!(
            out,
            "總任務數: {} | 已完成: {}",
            self.stats.total_tasks, self.stats.completed_tasks
        );
        let _ = writeln!(
            out,
            "目標完成比例(單數): {:.1}%",
            self.comparison.required_order_pct
        );
        let _ = writeln!(
            out,
            "實際完成比例(單數): {:.1}%",
            self.comparison.actual_order_pct
        );
        let _ = writeln!(out, "與目標差值: {:+.1}%", self.comparison.delta_pct);
        let _ = writeln!(out, "狀態: {}", self.comparison.status);
        out
    }
}
