//! 進度基準曲線：按時間點載入目標完成比例並與實際進度比對

use crate::config::AppConfig;
use crate::core::schedule::{
    floor_to_five_minutes, minutes_between_circular, parse_hhmm, pivot_adjusted_distance,
    time_key,
};
use crate::domain::model::{
    round1, BaselinePoint, CategoryComparison, CategoryComparisonReport, CategoryProgress,
    ProgressComparison, ProgressStats, ProgressStatus,
};
use crate::utils::error::{MonitorError, Result};
use chrono::{NaiveTime, Timelike};
use csv::StringRecord;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const TIME_COLUMNS: &[&str] = &["时间", "time"];
const ORDER_PCT_COLUMNS: &[&str] = &["累计单数完成比例(%)", "order_pct"];
const WEIGHT_PCT_COLUMNS: &[&str] = &["累计重量完成比例(%)", "weight_pct"];

/// 解析基準檔路徑
///
/// 絕對路徑直接使用；相對路徑依序嘗試配置檔目錄、其上層目錄與目前工作目錄。
pub fn resolve_baseline_path(path: &str, config_dir: Option<&Path>) -> Result<PathBuf> {
    if path.trim().is_empty() {
        return Err(MonitorError::BaselineError {
            message: "baseline path is not configured".to_string(),
        });
    }

    let candidate = Path::new(path);
    if candidate.is_absolute() {
        return Ok(candidate.to_path_buf());
    }

    let mut candidates = Vec::new();
    if let Some(dir) = config_dir {
        candidates.push(dir.join(candidate));
        if let Some(parent) = dir.parent() {
            candidates.push(parent.join(candidate));
        }
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join(candidate));
    }

    candidates
        .iter()
        .find(|p| p.exists())
        .cloned()
        .ok_or_else(|| MonitorError::BaselineError {
            message: format!(
                "baseline file '{}' not found (tried: {})",
                path,
                candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        })
}

fn normalize_header(header: &str) -> &str {
    header.trim_start_matches('\u{feff}').trim()
}

fn find_column(headers: &StringRecord, aliases: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| aliases.contains(&normalize_header(h)))
}

fn parse_pct(value: Option<&str>) -> f64 {
    value
        .map(|v| v.trim().trim_end_matches('%').trim())
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn open_csv(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| MonitorError::BaselineError {
        message: format!("cannot open {}: {}", path.display(), e),
    })
}

/// 整體進度基準，以一天中的時間點為鍵
#[derive(Debug, Clone, Default)]
pub struct Baseline {
    points: BTreeMap<NaiveTime, BaselinePoint>,
    /// 時間點在 CSV 中首次出現的順序，距離相同時取較前面的列
    order: Vec<NaiveTime>,
}

impl Baseline {
    pub fn load(path: &Path) -> Result<Self> {
        let baseline = Self::from_reader(open_csv(path)?)?;
        tracing::info!(
            "📈 已載入進度基準 {} ({} 個時間點)",
            path.display(),
            baseline.len()
        );
        Ok(baseline)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = rdr.headers()?.clone();

        let time_col = find_column(&headers, TIME_COLUMNS).ok_or_else(|| {
            MonitorError::BaselineError {
                message: "baseline CSV has no 时间/time column".to_string(),
            }
        })?;
        let order_col = find_column(&headers, ORDER_PCT_COLUMNS);
        let weight_col = find_column(&headers, WEIGHT_PCT_COLUMNS);

        let mut baseline = Self::default();
        for record in rdr.records() {
            let record = record?;
            let raw_time = record.get(time_col).unwrap_or("").trim();
            if raw_time.is_empty() {
                continue;
            }
            let Ok(time) = parse_hhmm(raw_time) else {
                tracing::debug!("略過無法解析的基準時間: {}", raw_time);
                continue;
            };

            baseline.insert(
                time,
                BaselinePoint {
                    order_pct: parse_pct(order_col.and_then(|c| record.get(c))),
                    weight_pct: parse_pct(weight_col.and_then(|c| record.get(c))),
                },
            );
        }

        Ok(baseline)
    }

    pub fn from_points(points: impl IntoIterator<Item = (NaiveTime, BaselinePoint)>) -> Self {
        let mut baseline = Self::default();
        for (time, point) in points {
            baseline.insert(time, point);
        }
        baseline
    }

    fn insert(&mut self, time: NaiveTime, point: BaselinePoint) {
        if self.points.insert(time, point).is_none() {
            self.order.push(time);
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 精確分鐘 → 5 分鐘取整 → 環狀時鐘上最接近的時間點
    pub fn lookup(&self, now: NaiveTime) -> Option<(NaiveTime, BaselinePoint)> {
        let minute = NaiveTime::from_hms_opt(now.hour(), now.minute(), 0)?;

        for key in [minute, floor_to_five_minutes(minute)] {
            if let Some(point) = self.points.get(&key) {
                return Some((key, *point));
            }
        }

        let mut nearest: Option<(i64, NaiveTime)> = None;
        for time in &self.order {
            let distance = minutes_between_circular(minute, *time);
            if nearest.map_or(true, |(best, _)| distance < best) {
                nearest = Some((distance, *time));
            }
        }
        let (_, time) = nearest?;
        self.points.get(&time).map(|point| (time, *point))
    }
}

pub fn compare_with_baseline(
    stats: &ProgressStats,
    baseline: &Baseline,
    threshold: f64,
    now: NaiveTime,
) -> ProgressComparison {
    let actual_order_pct = if stats.total_tasks > 0 {
        round1(stats.completed_tasks as f64 / stats.total_tasks as f64 * 100.0)
    } else {
        0.0
    };

    match baseline.lookup(now) {
        Some((time, point)) => {
            let delta_pct = round1(actual_order_pct - point.order_pct);
            ProgressComparison {
                time_point: Some(time_key(time)),
                actual_order_pct,
                required_order_pct: point.order_pct,
                delta_pct,
                status: ProgressStatus::classify(delta_pct, threshold),
            }
        }
        None => ProgressComparison {
            time_point: None,
            actual_order_pct,
            required_order_pct: 0.0,
            delta_pct: actual_order_pct,
            status: ProgressStatus::NoBaseline,
        },
    }
}

/// 分類進度基準：時間欄加上每個分類一欄完成比例
#[derive(Debug, Clone, Default)]
pub struct CategoryBaseline {
    columns: Vec<String>,
    rows: Vec<(NaiveTime, Vec<f64>)>,
}

#[derive(Debug, Clone, Copy)]
pub struct CategoryBaselineRow<'a> {
    pub time: NaiveTime,
    columns: &'a [String],
    values: &'a [f64],
}

impl CategoryBaselineRow<'_> {
    /// 第一個欄名包含分類名稱的欄位；找不到為 0
    pub fn rate_for(&self, category: &str) -> f64 {
        self.columns
            .iter()
            .position(|column| column.contains(category))
            .and_then(|idx| self.values.get(idx).copied())
            .unwrap_or(0.0)
    }
}

impl CategoryBaseline {
    pub fn load(path: &Path) -> Result<Self> {
        let baseline = Self::from_reader(open_csv(path)?)?;
        tracing::info!(
            "📈 已載入分類基準 {} ({} 個分類, {} 個時間點)",
            path.display(),
            baseline.columns.len(),
            baseline.rows.len()
        );
        Ok(baseline)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = rdr.headers()?.clone();

        let time_col = find_column(&headers, TIME_COLUMNS).ok_or_else(|| {
            MonitorError::BaselineError {
                message: "category baseline CSV has no 时间/time column".to_string(),
            }
        })?;

        let value_cols: Vec<usize> = (0..headers.len()).filter(|i| *i != time_col).collect();
        let columns = value_cols
            .iter()
            .filter_map(|i| headers.get(*i))
            .map(|h| normalize_header(h).to_string())
            .collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let Ok(time) = parse_hhmm(record.get(time_col).unwrap_or("")) else {
                continue;
            };
            let values = value_cols
                .iter()
                .map(|i| parse_pct(record.get(*i)))
                .collect();
            rows.push((time, values));
        }

        Ok(Self { columns, rows })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 以 `pivot_hour` 劃分作業日後最接近的一列
    pub fn lookup(&self, now: NaiveTime, pivot_hour: u32) -> Option<CategoryBaselineRow<'_>> {
        self.rows
            .iter()
            .min_by_key(|(time, _)| pivot_adjusted_distance(now, *time, pivot_hour))
            .map(|(time, values)| CategoryBaselineRow {
                time: *time,
                columns: &self.columns,
                values,
            })
    }
}

pub fn compare_categories_with_baseline(
    categories: &[CategoryProgress],
    baseline: &CategoryBaseline,
    threshold: f64,
    now: NaiveTime,
    pivot_hour: u32,
) -> CategoryComparisonReport {
    let current_time = time_key(now);

    let Some(row) = baseline.lookup(now, pivot_hour) else {
        return CategoryComparisonReport {
            status: ProgressStatus::NoBaseline,
            baseline_time: None,
            current_time,
            categories: Vec::new(),
            threshold,
        };
    };

    let mut overall = ProgressStatus::Ok;
    let comparisons = categories
        .iter()
        .map(|category| {
            let baseline_rate = row.rate_for(&category.name);
            let delta = round1(category.completion_rate - baseline_rate);
            let status = ProgressStatus::classify(delta, threshold);
            overall = overall.worst(status);

            CategoryComparison {
                name: category.name.clone(),
                actual_rate: category.completion_rate,
                baseline_rate,
                delta,
                status,
                total_count: category.total_count,
                finished_count: category.finished_count,
                unfinished_count: category.unfinished_count,
            }
        })
        .collect();

    CategoryComparisonReport {
        status: overall,
        baseline_time: Some(time_key(row.time)),
        current_time,
        categories: comparisons,
        threshold,
    }
}

/// 依配置載入整體基準與（可選的）分類基準
///
/// 整體基準載入失敗會回傳錯誤；分類基準只記錄警告。
pub fn load_configured(config: &AppConfig) -> Result<(Baseline, Option<CategoryBaseline>)> {
    let config_dir = config.source_dir.as_deref();
    let path = resolve_baseline_path(&config.monitor.baseline_file, config_dir)?;
    let baseline = Baseline::load(&path)?;

    let category_baseline = match config.monitor.category_baseline_file.as_deref() {
        Some(file) => match resolve_baseline_path(file, config_dir)
            .and_then(|path| CategoryBaseline::load(&path))
        {
            Ok(loaded) => Some(loaded),
            Err(e) => {
                tracing::warn!("⚠️ 分類基準載入失敗，略過分類比對: {}", e);
                None
            }
        },
        None => None,
    };

    Ok((baseline, category_baseline))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn t(value: &str) -> NaiveTime {
        parse_hhmm(value).unwrap()
    }

    const BASELINE_CSV: &str = "\u{feff}时间,累计单数完成比例(%),累计重量完成比例(%)\n\
        22:00,10.0,8.0\n\
        22:05,12.5,9.1\n\
        23:55,40,35\n\
        ,99,99\n\
        bogus,1,1\n\
        04:00,95.5,n/a\n";

    #[test]
    fn test_load_baseline_with_bom_and_bad_rows() {
        let baseline = Baseline::from_reader(BASELINE_CSV.as_bytes()).unwrap();
        assert_eq!(baseline.len(), 4);

        let (_, point) = baseline.lookup(t("04:00")).unwrap();
        assert_eq!(point.order_pct, 95.5);
        assert_eq!(point.weight_pct, 0.0);
    }

    #[test]
    fn test_load_baseline_english_columns() {
        let csv = "time,order_pct,weight_pct\n05:10,100,100\n";
        let baseline = Baseline::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(baseline.lookup(t("05:10")).unwrap().1.order_pct, 100.0);
    }

    #[test]
    fn test_missing_time_column_is_error() {
        let csv = "when,order_pct\n05:10,100\n";
        assert!(Baseline::from_reader(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_lookup_exact_then_floor_then_nearest() {
        let baseline = Baseline::from_reader(BASELINE_CSV.as_bytes()).unwrap();

        assert_eq!(time_key(baseline.lookup(t("22:05")).unwrap().0), "22:05");
        // 22:07 → 5 分鐘取整 22:05
        assert_eq!(time_key(baseline.lookup(t("22:07")).unwrap().0), "22:05");
        // 00:10 沒有取整鍵，環狀最接近的是 23:55
        assert_eq!(time_key(baseline.lookup(t("00:10")).unwrap().0), "23:55");
    }

    #[test]
    fn test_compare_with_baseline_statuses() {
        let baseline = Baseline::from_points([(
            t("03:00"),
            BaselinePoint {
                order_pct: 60.0,
                weight_pct: 55.0,
            },
        )]);

        let on_track = ProgressStats {
            total_tasks: 1000,
            completed_tasks: 590,
        };
        let result = compare_with_baseline(&on_track, &baseline, 2.0, t("03:00"));
        assert_eq!(result.actual_order_pct, 59.0);
        assert_eq!(result.delta_pct, -1.0);
        assert_eq!(result.status, ProgressStatus::Ok);
        assert_eq!(result.time_point.as_deref(), Some("03:00"));

        let behind = ProgressStats {
            total_tasks: 1000,
            completed_tasks: 570,
        };
        assert_eq!(
            compare_with_baseline(&behind, &baseline, 2.0, t("03:00")).status,
            ProgressStatus::Warn
        );

        let far_behind = ProgressStats {
            total_tasks: 1000,
            completed_tasks: 500,
        };
        assert_eq!(
            compare_with_baseline(&far_behind, &baseline, 2.0, t("03:00")).status,
            ProgressStatus::Critical
        );
    }

    #[test]
    fn test_compare_without_baseline() {
        let stats = ProgressStats {
            total_tasks: 0,
            completed_tasks: 0,
        };
        let result = compare_with_baseline(&stats, &Baseline::default(), 2.0, t("03:00"));
        assert_eq!(result.status, ProgressStatus::NoBaseline);
        assert_eq!(result.actual_order_pct, 0.0);
        assert!(result.time_point.is_none());
    }

    fn category(name: &str, rate: f64) -> CategoryProgress {
        CategoryProgress {
            id: String::new(),
            name: name.to_string(),
            total_count: 100,
            finished_count: rate as u64,
            unfinished_count: 100 - rate as u64,
            out_of_stock_count: 0,
            completion_rate: rate,
        }
    }

    #[test]
    fn test_compare_categories_with_pivot() {
        let csv = "时间,新鲜蔬菜完成比例(%),新鲜肉类完成比例(%)\n\
            23:00,20,30\n\
            01:00,40,50\n";
        let baseline = CategoryBaseline::from_reader(csv.as_bytes()).unwrap();

        let categories = vec![category("新鲜蔬菜", 41.0), category("新鲜肉类", 44.0), category("其他", 5.0)];
        let report = compare_categories_with_baseline(&categories, &baseline, 2.0, t("00:50"), 18);

        assert_eq!(report.baseline_time.as_deref(), Some("01:00"));
        assert_eq!(report.categories[0].status, ProgressStatus::Ok);
        assert_eq!(report.categories[1].delta, -6.0);
        assert_eq!(report.categories[1].status, ProgressStatus::Critical);
        // 沒有對應欄位的分類以 0 為基準
        assert_eq!(report.categories[2].baseline_rate, 0.0);
        assert_eq!(report.status, ProgressStatus::Critical);
    }

    #[test]
    fn test_compare_categories_empty_baseline() {
        let report = compare_categories_with_baseline(
            &[category("新鲜蔬菜", 10.0)],
            &CategoryBaseline::default(),
            2.0,
            t("02:00"),
            18,
        );
        assert_eq!(report.status, ProgressStatus::NoBaseline);
        assert!(report.categories.is_empty());
    }

    #[test]
    fn test_resolve_baseline_path_prefers_config_dir() {
        let dir = TempDir::new().unwrap();
        let config_dir = dir.path().join("conf");
        std::fs::create_dir_all(&config_dir).unwrap();

        let mut file = File::create(dir.path().join("baseline.csv")).unwrap();
        file.write_all(b"time,order_pct\n").unwrap();

        // 配置檔目錄沒有，退到上層目錄
        let resolved = resolve_baseline_path("baseline.csv", Some(&config_dir)).unwrap();
        assert_eq!(resolved, dir.path().join("baseline.csv"));

        assert!(resolve_baseline_path("missing-baseline.csv", Some(&config_dir)).is_err());
        assert!(resolve_baseline_path("", None).is_err());
    }

    #[test]
    fn test_lookup_tie_prefers_earlier_csv_row() {
        let csv = "时间,累计单数完成比例(%)\n18:00,0\n06:00,100\n";
        let baseline = Baseline::from_reader(csv.as_bytes()).unwrap();

        // 12:00 與兩個時間點都相差 6 小時
        let (time, point) = baseline.lookup(t("12:00")).unwrap();
        assert_eq!(time, t("18:00"));
        assert_eq!(point.order_pct, 0.0);

        let reversed = Baseline::from_points([
            (t("06:00"), BaselinePoint { order_pct: 100.0, weight_pct: 100.0 }),
            (t("18:00"), BaselinePoint::default()),
        ]);
        assert_eq!(reversed.lookup(t("12:00")).unwrap().0, t("06:00"));
    }

    #[test]
    fn test_load_configured_skips_unreadable_category_baseline() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("baseline.csv"), "time,order_pct\n22:00,10\n").unwrap();
        std::fs::write(dir.path().join("category.csv"), "when,蔬菜\n22:00,10\n").unwrap();

        let mut config = AppConfig::default();
        config.source_dir = Some(dir.path().to_path_buf());
        config.monitor.baseline_file = "baseline.csv".to_string();

        // 沒有時間欄位
        config.monitor.category_baseline_file = Some("category.csv".to_string());
        let (baseline, category) = load_configured(&config).unwrap();
        assert_eq!(baseline.len(), 1);
        assert!(category.is_none());

        // 檔案不存在
        let missing = dir.path().join("missing-category.csv");
        config.monitor.category_baseline_file = Some(missing.display().to_string());
        let (_, category) = load_configured(&config).unwrap();
        assert!(category.is_none());

        // 整體基準缺失仍是錯誤
        config.monitor.baseline_file = dir.path().join("missing.csv").display().to_string();
        assert!(load_configured(&config).is_err());
    }
}
