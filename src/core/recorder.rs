//! 採集結果落盤：JSON 陣列日誌與只追加的 CSV 表
//!
//! CSV 只在檔案新建時寫入表頭，並以 UTF-8 BOM 開頭以便試算表軟體辨識編碼。

use crate::core::parser::{
    api_code_is_ok, extract_sorter_ranks, parse_statistics, CATEGORY_NAMES, OTHER_CATEGORY,
};
use crate::domain::model::{ApiMeta, FetchOutcome, RankOutcome};
use crate::domain::ports::Storage;
use crate::utils::error::{MonitorError, Result};
use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;
use serde_json::Value;

pub const RAW_DATA_CSV: &str = "raw_data.csv";
pub const SUMMARY_STATS_CSV: &str = "summary_stats.csv";
pub const SORTER_RANK_JSON: &str = "sorter_rank.json";
pub const SORTER_RANK_DETAIL_CSV: &str = "sorter_rank_detail.csv";
pub const SORTER_RANK_SUMMARY_CSV: &str = "sorter_rank_summary.csv";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const RAW_HEADERS: &[&str] = &[
    "采集时间",
    "目标日期",
    "API状态码",
    "API消息",
    "响应状态",
    "原始数据",
    "备注",
];

const SUMMARY_LEADING_HEADERS: &[&str] = &[
    "采集时间",
    "目标日期",
    "总任务数",
    "已完成任务数",
    "缺货任务数",
    "未完成任务数",
    "计重任务数",
    "商品种类数",
    "不计重任务数",
    "商户数",
];

const SUMMARY_TRAILING_HEADERS: &[&str] = &["响应耗时(ms)", "数据完整性"];

const RANK_DETAIL_HEADERS: &[&str] = &[
    "采集时间",
    "周期开始时间",
    "周期结束时间",
    "API状态码",
    "API消息",
    "分拣员姓名",
    "排名",
    "完成件数",
    "响应状态",
    "备注",
];

const RANK_SUMMARY_HEADERS: &[&str] = &[
    "采集时间",
    "周期开始时间",
    "周期结束时间",
    "分拣员总数",
    "总完成件数",
    "平均完成件数",
    "响应状态",
];

/// summary_stats.csv 固定的分類欄順序
fn summary_categories() -> impl Iterator<Item = &'static str> {
    CATEGORY_NAMES
        .iter()
        .map(|(_, name)| *name)
        .chain(std::iter::once(OTHER_CATEGORY))
}

pub fn summary_headers() -> Vec<String> {
    let mut headers: Vec<String> = SUMMARY_LEADING_HEADERS
        .iter()
        .map(|h| h.to_string())
        .collect();
    for name in summary_categories() {
        headers.push(format!("{}_未完成", name));
        headers.push(format!("{}_已完成", name));
        headers.push(format!("{}_缺货", name));
    }
    headers.extend(SUMMARY_TRAILING_HEADERS.iter().map(|h| h.to_string()));
    headers
}

fn format_timestamp(ts: &DateTime<Local>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

pub struct ProgressRecorder<S: Storage> {
    storage: S,
    json_filename: String,
}

impl<S: Storage> ProgressRecorder<S> {
    pub fn new(storage: S, json_filename: impl Into<String>) -> Self {
        Self {
            storage,
            json_filename: json_filename.into(),
        }
    }

    /// `{date}` 以 YYYYMMDD 替換
    pub fn json_filename_for(&self, date: NaiveDate) -> String {
        self.json_filename
            .replace("{date}", &date.format("%Y%m%d").to_string())
    }

    pub async fn record_progress(&self, outcome: &FetchOutcome, date: NaiveDate) -> Result<()> {
        let json_path = self.json_filename_for(date);
        self.append_json(&json_path, outcome).await?;
        tracing::info!("資料已保存到JSON檔案: {}", json_path);

        let empty = Value::Object(Default::default());
        let body = outcome.data.as_ref().unwrap_or(&empty);
        let meta = ApiMeta::from_response(None, body);
        let timestamp = format_timestamp(&outcome.timestamp);

        let raw_row = vec![
            timestamp.clone(),
            outcome.target_date.clone(),
            meta.api_code.clone().unwrap_or_default(),
            meta.api_msg.clone().unwrap_or_default(),
            outcome.status.as_str().to_string(),
            serde_json::to_string(body)?,
            outcome.error.clone().unwrap_or_default(),
        ];
        self.append_rows(RAW_DATA_CSV, RAW_HEADERS, vec![raw_row])
            .await?;
        tracing::info!("資料已保存到CSV檔案: {}", RAW_DATA_CSV);

        if outcome.is_success() && api_code_is_ok(body) {
            let headers = summary_headers();
            let row = if body.get("data").is_some_and(Value::is_object) {
                summary_row(&timestamp, outcome, body)
            } else {
                let mut blank = vec![String::new(); headers.len()];
                blank[0] = timestamp;
                blank[1] = outcome.target_date.clone();
                blank
            };
            let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();
            self.append_rows(SUMMARY_STATS_CSV, &header_refs, vec![row])
                .await?;
            tracing::info!("統計資料已保存到: {}", SUMMARY_STATS_CSV);
        }

        Ok(())
    }

    pub async fn record_sorter_rank(&self, outcome: &RankOutcome) -> Result<()> {
        self.append_json(SORTER_RANK_JSON, outcome).await?;

        let empty = Value::Object(Default::default());
        let body = outcome.data.as_ref().unwrap_or(&empty);
        let meta = ApiMeta::from_response(None, body);
        let timestamp = format_timestamp(&outcome.timestamp);
        let ranks = extract_sorter_ranks(body);

        let prefix = || {
            vec![
                timestamp.clone(),
                outcome.cycle_start_time.clone(),
                outcome.cycle_end_time.clone(),
            ]
        };

        let detail_rows = match &ranks {
            Some(ranks) => ranks
                .iter()
                .map(|sorter| {
                    let mut row = prefix();
                    row.extend([
                        meta.api_code.clone().unwrap_or_default(),
                        meta.api_msg.clone().unwrap_or_default(),
                        sorter.sorter_name.clone(),
                        sorter.rank.map(|r| r.to_string()).unwrap_or_default(),
                        sorter.statistic_results.to_string(),
                        outcome.status.as_str().to_string(),
                        String::new(),
                    ]);
                    row
                })
                .collect(),
            None => {
                let mut row = prefix();
                row.extend([
                    meta.api_code.clone().unwrap_or_default(),
                    meta.api_msg.clone().unwrap_or_default(),
                    String::new(),
                    String::new(),
                    String::new(),
                    outcome.status.as_str().to_string(),
                    outcome.error.clone().unwrap_or_default(),
                ]);
                vec![row]
            }
        };
        self.append_rows(SORTER_RANK_DETAIL_CSV, RANK_DETAIL_HEADERS, detail_rows)
            .await?;

        let (count, total) = ranks
            .as_ref()
            .map(|r| (r.len() as u64, r.iter().map(|s| s.statistic_results).sum::<u64>()))
            .unwrap_or((0, 0));
        let average = if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        };

        let mut summary = prefix();
        summary.extend([
            count.to_string(),
            total.to_string(),
            format!("{:.2}", average),
            outcome.status.as_str().to_string(),
        ]);
        self.append_rows(SORTER_RANK_SUMMARY_CSV, RANK_SUMMARY_HEADERS, vec![summary])
            .await?;

        tracing::info!(
            "分揀員排名資料已保存到: {}, {} 和 {}",
            SORTER_RANK_JSON,
            SORTER_RANK_DETAIL_CSV,
            SORTER_RANK_SUMMARY_CSV
        );
        Ok(())
    }

    /// 追加到 JSON 陣列檔；檔案損毀時重新開始，非陣列內容包成陣列
    async fn append_json<T: Serialize>(&self, path: &str, record: &T) -> Result<()> {
        let mut entries = if self.storage.exists(path).await {
            match self
                .storage
                .read_file(path)
                .await
                .ok()
                .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok())
            {
                Some(Value::Array(items)) => items,
                Some(other) => vec![other],
                None => {
                    tracing::warn!("⚠️ JSON 日誌 {} 無法解析，重新建立", path);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        entries.push(serde_json::to_value(record)?);
        let data = serde_json::to_vec_pretty(&entries)?;
        self.storage.write_file(path, &data).await
    }

    async fn append_rows(&self, path: &str, headers: &[&str], rows: Vec<Vec<String>>) -> Result<()> {
        let is_new = !self.storage.exists(path).await;

        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        if is_new {
            writer.write_record(headers)?;
        }
        for row in rows {
            writer.write_record(&row)?;
        }
        let body = writer
            .into_inner()
            .map_err(|e| MonitorError::IoError(e.into_error()))?;

        let data = if is_new {
            [UTF8_BOM, body.as_slice()].concat()
        } else {
            body
        };
        self.storage.append_file(path, &data).await
    }
}

fn summary_row(timestamp: &str, outcome: &FetchOutcome, body: &Value) -> Vec<String> {
    let stats = parse_statistics(body);

    let mut row = vec![
        timestamp.to_string(),
        outcome.target_date.clone(),
        stats.total_tasks.to_string(),
        stats.completed_tasks.to_string(),
        stats.shortage_tasks.to_string(),
        stats.uncompleted_tasks.to_string(),
        stats.weight_tasks.to_string(),
        stats.product_types.to_string(),
        stats.no_weight_tasks.to_string(),
        stats.merchant_count.to_string(),
    ];

    for name in summary_categories() {
        let counts = stats.categories.get(name).copied().unwrap_or_default();
        row.push(counts.unfinished.to_string());
        row.push(counts.finished.to_string());
        row.push(counts.out_of_stock.to_string());
    }

    row.push(
        outcome
            .response_time_ms
            .map(|ms| ms.to_string())
            .unwrap_or_default(),
    );
    row.push(stats.data_integrity);
    row
}
