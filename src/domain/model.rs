use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Success,
    Failed,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::Success => "success",
            FetchStatus::Failed => "failed",
        }
    }
}

/// 單次 HTTP 呼叫成功後的回應
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub http_status: u16,
    pub body: serde_json::Value,
    pub size: usize,
    pub elapsed_ms: u64,
}

/// 分揀進度採集結果，成功或失敗都會寫入日誌
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub timestamp: DateTime<Local>,
    pub target_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    pub status: FetchStatus,
}

impl FetchOutcome {
    pub fn success(target_date: String, response: ApiResponse) -> Self {
        Self {
            timestamp: Local::now(),
            target_date,
            data: Some(response.body),
            error: None,
            response_time_ms: Some(response.elapsed_ms),
            status: FetchStatus::Success,
        }
    }

    pub fn failed(target_date: String, error: String) -> Self {
        Self {
            timestamp: Local::now(),
            target_date,
            data: None,
            error: Some(error),
            response_time_ms: None,
            status: FetchStatus::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }
}

/// 分揀員排名採集結果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankOutcome {
    pub timestamp: DateTime<Local>,
    pub cycle_start_time: String,
    pub cycle_end_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status: FetchStatus,
}

impl RankOutcome {
    pub fn success(cycle: (String, String), response: ApiResponse) -> Self {
        Self {
            timestamp: Local::now(),
            cycle_start_time: cycle.0,
            cycle_end_time: cycle.1,
            data: Some(response.body),
            error: None,
            status: FetchStatus::Success,
        }
    }

    pub fn failed(cycle: (String, String), error: String) -> Self {
        Self {
            timestamp: Local::now(),
            cycle_start_time: cycle.0,
            cycle_end_time: cycle.1,
            data: None,
            error: Some(error),
            status: FetchStatus::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }
}

/// 回應中的狀態碼與提示訊息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiMeta {
    pub http_status: Option<u16>,
    pub api_code: Option<String>,
    pub api_msg: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressStats {
    pub total_tasks: u64,
    pub completed_tasks: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub unfinished: u64,
    pub finished: u64,
    pub out_of_stock: u64,
}

/// 寫入 summary_stats.csv 的彙總統計
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub shortage_tasks: u64,
    pub uncompleted_tasks: u64,
    pub weight_tasks: u64,
    pub product_types: u64,
    pub no_weight_tasks: u64,
    pub merchant_count: u64,
    pub categories: BTreeMap<String, CategoryCounts>,
    pub data_integrity: String,
}

impl Default for SummaryStats {
    fn default() -> Self {
        Self {
            total_tasks: 0,
            completed_tasks: 0,
            shortage_tasks: 0,
            uncompleted_tasks: 0,
            weight_tasks: 0,
            product_types: 0,
            no_weight_tasks: 0,
            merchant_count: 0,
            categories: BTreeMap::new(),
            data_integrity: "完整".to_string(),
        }
    }
}

impl SummaryStats {
    pub fn completion_rate(&self) -> Option<f64> {
        (self.total_tasks > 0)
            .then(|| round1(self.completed_tasks as f64 / self.total_tasks as f64 * 100.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryProgress {
    pub id: String,
    pub name: String,
    pub total_count: u64,
    pub finished_count: u64,
    pub unfinished_count: u64,
    pub out_of_stock_count: u64,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SorterRank {
    pub sorter_name: String,
    pub rank: Option<u64>,
    pub statistic_results: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselinePoint {
    pub order_pct: f64,
    pub weight_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgressStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "WARN")]
    Warn,
    #[serde(rename = "CRITICAL")]
    Critical,
    #[serde(rename = "NO_BASELINE")]
    NoBaseline,
}

impl ProgressStatus {
    /// 依落後幅度分級：落後超過兩倍門檻為 CRITICAL，超過門檻為 WARN
    pub fn classify(delta: f64, threshold: f64) -> Self {
        if delta < -threshold * 2.0 {
            ProgressStatus::Critical
        } else if delta < -threshold {
            ProgressStatus::Warn
        } else {
            ProgressStatus::Ok
        }
    }

    fn rank(&self) -> u8 {
        match self {
            ProgressStatus::NoBaseline => 0,
            ProgressStatus::Ok => 1,
            ProgressStatus::Warn => 2,
            ProgressStatus::Critical => 3,
        }
    }

    pub fn worst(self, other: Self) -> Self {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }

    pub fn is_behind(&self) -> bool {
        matches!(self, ProgressStatus::Warn | ProgressStatus::Critical)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::Ok => "OK",
            ProgressStatus::Warn => "WARN",
            ProgressStatus::Critical => "CRITICAL",
            ProgressStatus::NoBaseline => "NO_BASELINE",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressComparison {
    pub time_point: Option<String>,
    pub actual_order_pct: f64,
    pub required_order_pct: f64,
    pub delta_pct: f64,
    pub status: ProgressStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryComparison {
    pub name: String,
    pub actual_rate: f64,
    pub baseline_rate: f64,
    pub delta: f64,
    pub status: ProgressStatus,
    pub total_count: u64,
    pub finished_count: u64,
    pub unfinished_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryComparisonReport {
    pub status: ProgressStatus,
    pub baseline_time: Option<String>,
    pub current_time: String,
    pub categories: Vec<CategoryComparison>,
    pub threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    Success,
    PartialSuccess,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionReport {
    pub sorting_progress: FetchOutcome,
    pub sorter_ranking: RankOutcome,
    pub status: CollectionStatus,
    pub timestamp: DateTime<Local>,
}

/// 四捨五入到小數點後一位
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
