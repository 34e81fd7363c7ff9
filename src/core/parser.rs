//! 寬鬆解析分揀平台回應；欄位缺失或型別不符時一律退回 0 / 空值

use crate::domain::model::{
    round1, ApiMeta, CategoryCounts, CategoryProgress, ProgressStats, SorterRank, SummaryStats,
};
use serde_json::{Map, Value};

/// 平台分類 ID 與名稱對照，回應缺少 name 時使用
pub const CATEGORY_NAMES: &[(&str, &str)] = &[
    ("A627108", "新鲜蔬菜"),
    ("A627109", "新鲜肉类"),
    ("A627111", "鲜活水产"),
    ("A627113", "时令果蔬"),
    ("A627110", "鲜活禽类"),
    ("A627118", "休闲食品"),
    ("A627112", "速冻速食"),
    ("A627115", "南北干货"),
    ("A627119", "厨房酱料"),
    ("A627114", "乳品烘焙"),
    ("A629184", "厨房用品"),
    ("A627117", "米面粮油"),
    ("A627116", "腊味熟食"),
];

pub const OTHER_CATEGORY: &str = "其他";

const TOTAL_KEYS: &[&str] = &[
    "total_tasks",
    "task_total",
    "total",
    "total_task_count",
    "sum_task",
];
const DONE_KEYS: &[&str] = &[
    "completed_tasks",
    "finished",
    "done",
    "finished_count",
    "completed",
];
const DONE_TASK_STATUSES: &[&str] = &["finished", "done", "completed"];

/// 數字或數字字串轉為 u64，其餘為 0
pub fn lenient_u64(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u64))
                .unwrap_or(0)
        }
        _ => 0,
    }
}

pub fn lenient_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn data_object(body: &Value) -> Option<&Map<String, Value>> {
    body.get("data").and_then(Value::as_object)
}

fn non_empty_object<'a>(value: Option<&'a Value>) -> Option<&'a Map<String, Value>> {
    value.and_then(Value::as_object).filter(|m| !m.is_empty())
}

impl ApiMeta {
    pub fn from_response(http_status: Option<u16>, body: &Value) -> Self {
        let code = body
            .get("code")
            .filter(|v| !v.is_null())
            .or_else(|| body.get("status").filter(|v| !v.is_null()))
            .map(|v| lenient_string(Some(v)))
            .filter(|s| !s.is_empty());
        let msg = ["msg", "message"]
            .iter()
            .filter_map(|key| body.get(*key).and_then(Value::as_str))
            .find(|s| !s.is_empty())
            .map(str::to_string);

        Self {
            http_status,
            api_code: code,
            api_msg: msg,
        }
    }
}

/// 平台以 `code == 0` 表示業務成功
pub fn api_code_is_ok(body: &Value) -> bool {
    match body.get("code") {
        Some(Value::Number(n)) => n.as_i64() == Some(0),
        Some(Value::String(s)) => s.trim() == "0",
        _ => false,
    }
}

pub fn category_name(id: &str, name: &str) -> String {
    if !name.is_empty() && name != OTHER_CATEGORY {
        return name.to_string();
    }
    CATEGORY_NAMES
        .iter()
        .find(|(known_id, _)| *known_id == id)
        .map(|(_, known_name)| known_name.to_string())
        .unwrap_or_else(|| OTHER_CATEGORY.to_string())
}

pub fn parse_statistics(body: &Value) -> SummaryStats {
    let mut stats = SummaryStats::default();

    let Some(data) = data_object(body) else {
        return stats;
    };

    match data.get("category_schedule").and_then(Value::as_array) {
        Some(categories) => {
            for category in categories {
                let id = lenient_string(category.get("id"));
                let name = category_name(&id, &lenient_string(category.get("name")));
                let total = lenient_u64(category.get("total_count"));
                let finished = lenient_u64(category.get("finished_count"));
                let unfinished = lenient_u64(category.get("unfinished_count"));
                let out_of_stock = lenient_u64(category.get("out_of_stock_count"));

                let counts = stats.categories.entry(name).or_insert_with(CategoryCounts::default);
                counts.unfinished += unfinished;
                counts.finished += finished;
                counts.out_of_stock += out_of_stock;

                stats.total_tasks += total;
                stats.completed_tasks += finished;
                stats.uncompleted_tasks += unfinished;
                stats.shortage_tasks += out_of_stock;
            }
        }
        None => stats.data_integrity = "缺少分類資料".to_string(),
    }

    if let Some(sort_data) = data.get("sort_data") {
        stats.merchant_count = lenient_u64(sort_data.get("address_count"));
        stats.product_types = lenient_u64(sort_data.get("sku_count"));
        stats.no_weight_tasks = lenient_u64(sort_data.get("unweight_count"));
        stats.weight_tasks = lenient_u64(sort_data.get("weight_count"));
    }

    // total_schedule 為平台彙總值，比分類累加更準確
    if let Some(total_schedule) = data.get("total_schedule") {
        let api_total = lenient_u64(total_schedule.get("total_count"));
        if api_total > 0 {
            stats.total_tasks = api_total;
            stats.completed_tasks = lenient_u64(total_schedule.get("finished_count"));
            stats.uncompleted_tasks = lenient_u64(total_schedule.get("unfinished_count"));
            stats.shortage_tasks = lenient_u64(total_schedule.get("out_of_stock_count"));
        }
    }

    tracing::debug!(
        "解析統計資料: 總任務 {}, 已完成 {}, 未完成 {}, 缺貨 {}",
        stats.total_tasks,
        stats.completed_tasks,
        stats.uncompleted_tasks,
        stats.shortage_tasks
    );

    stats
}

fn first_present(source: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter()
        .find_map(|key| source.get(*key).filter(|v| !v.is_null()))
        .map(|v| lenient_u64(Some(v)))
}

fn first_non_zero(source: &Map<String, Value>, keys: &[&str]) -> u64 {
    keys.iter()
        .map(|key| lenient_u64(source.get(*key)))
        .find(|v| *v > 0)
        .unwrap_or(0)
}

/// 從多種可能的回應結構推斷總任務數與已完成數
pub fn extract_progress(body: &Value) -> ProgressStats {
    let empty = Map::new();
    let payload = data_object(body).unwrap_or(&empty);

    let statistics = non_empty_object(payload.get("statistics"))
        .or_else(|| non_empty_object(payload.get("weight_info").and_then(|w| w.get("statistics"))))
        .unwrap_or(&empty);

    let mut total = first_present(statistics, TOTAL_KEYS).unwrap_or(0);
    let mut completed = first_present(statistics, DONE_KEYS).unwrap_or(0);

    if total == 0 {
        if let Some(tasks) = payload.get("tasks").and_then(Value::as_array) {
            total = tasks.len() as u64;
            completed = tasks
                .iter()
                .filter(|task| {
                    let status = lenient_string(task.get("status")).to_lowercase();
                    DONE_TASK_STATUSES.contains(&status.as_str())
                })
                .count() as u64;
        }
    }

    if total == 0 {
        if let Some(schedule) = payload.get("total_schedule").and_then(Value::as_object) {
            total = lenient_u64(schedule.get("total_count"));
            completed = lenient_u64(schedule.get("finished_count"));
        }
    }

    if total == 0 {
        total = first_non_zero(payload, &["total_tasks", "task_total"]);
    }
    if completed == 0 {
        completed = first_non_zero(payload, &["completed_tasks", "finished"]);
    }

    ProgressStats {
        total_tasks: total,
        completed_tasks: completed,
    }
}

pub fn extract_categories(body: &Value) -> Vec<CategoryProgress> {
    let Some(categories) = data_object(body)
        .and_then(|data| data.get("category_schedule"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    categories
        .iter()
        .map(|category| {
            let id = lenient_string(category.get("id"));
            let name = category_name(&id, &lenient_string(category.get("name")));
            let total_count = lenient_u64(category.get("total_count"));
            let finished_count = lenient_u64(category.get("finished_count"));
            let completion_rate = if total_count > 0 {
                round1(finished_count as f64 / total_count as f64 * 100.0)
            } else {
                0.0
            };

            CategoryProgress {
                id,
                name,
                total_count,
                finished_count,
                unfinished_count: lenient_u64(category.get("unfinished_count")),
                out_of_stock_count: lenient_u64(category.get("out_of_stock_count")),
                completion_rate,
            }
        })
        .collect()
}

/// 僅在 `code == 0` 且 `data` 為陣列時回傳排名
pub fn extract_sorter_ranks(body: &Value) -> Option<Vec<SorterRank>> {
    if !api_code_is_ok(body) {
        return None;
    }
    let items = body.get("data")?.as_array()?;

    Some(
        items
            .iter()
            .map(|item| SorterRank {
                sorter_name: lenient_string(item.get("sorter_name")),
                rank: item
                    .get("rank")
                    .filter(|v| !v.is_null())
                    .map(|v| lenient_u64(Some(v))),
                statistic_results: lenient_u64(item.get("statistic_results")),
            })
            .collect(),
    )
}

pub fn top_level_keys(value: Option<&Value>, limit: usize) -> Vec<String> {
    value
        .and_then(Value::as_object)
        .map(|m| m.keys().take(limit).cloned().collect())
        .unwrap_or_default()
}

/// `data` 欄位的前 `max_chars` 個字元
pub fn data_snippet(body: &Value, max_chars: usize) -> String {
    let data = body.get("data").cloned().unwrap_or(Value::Object(Map::new()));
    let text = match data {
        Value::Null => "{}".to_string(),
        other => other.to_string(),
    };
    text.chars().take(max_chars).collect()
}
