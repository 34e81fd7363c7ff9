use crate::core::baseline::{
    compare_categories_with_baseline, compare_with_baseline, Baseline, CategoryBaseline,
};
use crate::core::parser::{extract_categories, extract_progress};
use crate::core::schedule::{target_date, target_date_param};
use crate::dashboard::render::encouragement;
use crate::domain::model::{
    ApiMeta, CategoryProgress, ProgressComparison, ProgressStats, ProgressStatus,
};
use crate::domain::ports::ProgressSource;
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// 單個分類的進度，有分類基準時附帶目標比例與差值
#[derive(Debug, Clone, Serialize)]
pub struct CategoryView {
    #[serde(flatten)]
    pub progress: CategoryProgress,
    pub baseline_rate: Option<f64>,
    pub delta: Option<f64>,
    pub status: Option<ProgressStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub generated_at: NaiveDateTime,
    pub target_date: String,
    pub meta: ApiMeta,
    pub stats: ProgressStats,
    pub comparison: Option<ProgressComparison>,
    pub categories: Vec<CategoryView>,
    pub category_status: Option<ProgressStatus>,
    pub category_baseline_time: Option<String>,
    pub encouragement: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DashboardSnapshot {
    fn failed(generated_at: NaiveDateTime, target_date: String, error: String) -> Self {
        Self {
            generated_at,
            target_date,
            meta: ApiMeta::default(),
            stats: ProgressStats::default(),
            comparison: None,
            categories: Vec::new(),
            category_status: None,
            category_baseline_time: None,
            encouragement: String::new(),
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

struct CachedSnapshot {
    fetched_at: Instant,
    snapshot: Arc<DashboardSnapshot>,
}

/// 看板共享狀態；快照在 `refresh` 期間內重複使用
pub struct DashboardState {
    source: Arc<dyn ProgressSource>,
    baseline: Baseline,
    category_baseline: Option<CategoryBaseline>,
    threshold: f64,
    rollover_hour: u32,
    refresh: Duration,
    cache: Mutex<Option<CachedSnapshot>>,
}

impl DashboardState {
    pub fn new(
        source: Arc<dyn ProgressSource>,
        baseline: Baseline,
        category_baseline: Option<CategoryBaseline>,
        threshold: f64,
        rollover_hour: u32,
        refresh: Duration,
    ) -> Self {
        Self {
            source,
            baseline,
            category_baseline,
            threshold,
            rollover_hour,
            refresh,
            cache: Mutex::new(None),
        }
    }

    pub fn refresh_seconds(&self) -> u64 {
        self.refresh.as_secs().max(1)
    }

    /// 取得目前快照；過期時重新抓取，失敗結果不快取
    pub async fn snapshot(&self) -> Arc<DashboardSnapshot> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.fetched_at.elapsed() < self.refresh {
                return cached.snapshot.clone();
            }
        }

        let snapshot = Arc::new(self.build_snapshot(Local::now().naive_local()).await);
        if snapshot.is_error() {
            *cache = None;
        } else {
            *cache = Some(CachedSnapshot {
                fetched_at: Instant::now(),
                snapshot: snapshot.clone(),
            });
        }
        snapshot
    }

    pub async fn build_snapshot(&self, now: NaiveDateTime) -> DashboardSnapshot {
        let target = target_date_param(target_date(now, self.rollover_hour));
        tracing::debug!("🔄 重新整理看板資料，目標日期 {}", target);

        let response = match self.source.progress_snapshot(&target).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("❌ 看板取數失敗: {}", e);
                return DashboardSnapshot::failed(now, target, e.user_friendly_message());
            }
        };

        let body = &response.body;
        let stats = extract_progress(body);
        let comparison = compare_with_baseline(&stats, &self.baseline, self.threshold, now.time());
        tracing::info!("{}", refresh_summary(&stats, &comparison));

        let mut categories: Vec<CategoryView> = extract_categories(body)
            .into_iter()
            .map(|progress| CategoryView {
                progress,
                baseline_rate: None,
                delta: None,
                status: None,
            })
            .collect();

        let mut category_status = None;
        let mut category_baseline_time = None;
        if let Some(category_baseline) = &self.category_baseline {
            let progress: Vec<CategoryProgress> =
                categories.iter().map(|c| c.progress.clone()).collect();
            let report = compare_categories_with_baseline(
                &progress,
                category_baseline,
                self.threshold,
                now.time(),
                self.rollover_hour,
            );
            for (view, compared) in categories.iter_mut().zip(report.categories.iter()) {
                view.baseline_rate = Some(compared.baseline_rate);
                view.delta = Some(compared.delta);
                view.status = Some(compared.status);
            }
            category_status = Some(report.status);
            category_baseline_time = report.baseline_time;
        }

        let seed = now.and_utc().timestamp().unsigned_abs();
        DashboardSnapshot {
            generated_at: now,
            target_date: target,
            meta: ApiMeta::from_response(Some(response.http_status), body),
            stats,
            encouragement: encouragement(comparison.actual_order_pct, comparison.delta_pct, seed)
                .to_string(),
            comparison: Some(comparison),
            categories,
            category_status,
            category_baseline_time,
            error: None,
        }
    }
}

fn refresh_summary(stats: &ProgressStats, comparison: &ProgressComparison) -> String {
    let target = match &comparison.time_point {
        Some(time) => format!("{:.1}% ({})", comparison.required_order_pct, time),
        None => "-".to_string(),
    };
    format!(
        "📊 看板已更新: 總任務 {}，已完成 {}，實際 {:.1}%，目標 {}，差值 {:+.1}%，狀態 {}",
        stats.total_tasks,
        stats.completed_tasks,
        comparison.actual_order_pct,
        target,
        comparison.delta_pct,
        comparison.status
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ApiResponse, BaselinePoint, FetchOutcome, RankOutcome};
    use crate::utils::error::{MonitorError, Result};
    use async_trait::async_trait;
    use chrono::NaiveTime;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    impl CountingSource {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl ProgressSource for CountingSource {
        async fn progress_snapshot(&self, _target_date: &str) -> Result<ApiResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(MonitorError::ApiResponseError {
                    message: "gateway timeout".to_string(),
                });
            }
            Ok(ApiResponse {
                http_status: 200,
                body: json!({
                    "code": 0,
                    "msg": "ok",
                    "data": {
                        "total_schedule": {"total_count": 100, "finished_count": 40},
                        "category_schedule": [
                            {"id": "A627108", "name": "", "total_count": 10, "finished_count": 8, "unfinished_count": 2}
                        ]
                    }
                }),
                size: 0,
                elapsed_ms: 3,
            })
        }

        async fn fetch_progress(&self, target_date: &str) -> FetchOutcome {
            FetchOutcome::failed(target_date.to_string(), "unused".to_string())
        }

        async fn fetch_sorter_rank(&self, start: &str, end: &str) -> RankOutcome {
            RankOutcome::failed((start.to_string(), end.to_string()), "unused".to_string())
        }
    }

    fn baseline() -> Baseline {
        Baseline::from_points([(
            NaiveTime::from_hms_opt(3, 0, 0).unwrap(),
            BaselinePoint {
                order_pct: 50.0,
                weight_pct: 45.0,
            },
        )])
    }

    fn category_baseline() -> CategoryBaseline {
        CategoryBaseline::from_reader("时间,新鲜蔬菜(%)\n03:00,70\n".as_bytes()).unwrap()
    }

    fn at(value: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M").unwrap()
    }

    #[tokio::test]
    async fn test_build_snapshot_compares_overall_and_categories() {
        let state = DashboardState::new(
            Arc::new(CountingSource::new()),
            baseline(),
            Some(category_baseline()),
            2.0,
            18,
            Duration::from_secs(30),
        );

        let snapshot = state.build_snapshot(at("2024-03-11 03:00")).await;

        let comparison = snapshot.comparison.unwrap();
        assert_eq!(comparison.actual_order_pct, 40.0);
        assert_eq!(comparison.status, ProgressStatus::Critical);
        assert_eq!(snapshot.categories.len(), 1);
        let vegetables = &snapshot.categories[0];
        assert_eq!(vegetables.progress.name, "新鲜蔬菜");
        assert_eq!(vegetables.baseline_rate, Some(70.0));
        assert_eq!(vegetables.delta, Some(10.0));
        assert_eq!(vegetables.status, Some(ProgressStatus::Ok));
        assert_eq!(snapshot.category_baseline_time.as_deref(), Some("03:00"));
        assert!(!snapshot.encouragement.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_is_cached_until_refresh() {
        let source = Arc::new(CountingSource::new());
        let state = DashboardState::new(
            source.clone(),
            baseline(),
            None,
            2.0,
            18,
            Duration::from_secs(60),
        );

        state.snapshot().await;
        state.snapshot().await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_snapshot_is_not_cached() {
        let source = Arc::new(CountingSource::new());
        source.fail.store(true, Ordering::SeqCst);
        let state = DashboardState::new(
            source.clone(),
            baseline(),
            None,
            2.0,
            18,
            Duration::from_secs(60),
        );

        let first = state.snapshot().await;
        assert!(first.is_error());
        source.fail.store(false, Ordering::SeqCst);
        let second = state.snapshot().await;

        assert!(!second.is_error());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_refresh_summary_line() {
        let stats = ProgressStats {
            total_tasks: 100,
            completed_tasks: 40,
        };
        let three = NaiveTime::from_hms_opt(3, 0, 0).unwrap();
        let comparison = compare_with_baseline(&stats, &baseline(), 2.0, three);
        assert_eq!(
            refresh_summary(&stats, &comparison),
            "📊 看板已更新: 總任務 100，已完成 40，實際 40.0%，目標 50.0% (03:00)，差值 -10.0%，狀態 CRITICAL"
        );

        let comparison = compare_with_baseline(&stats, &Baseline::default(), 2.0, three);
        assert_eq!(
            refresh_summary(&stats, &comparison),
            "📊 看板已更新: 總任務 100，已完成 40，實際 40.0%，目標 -，差值 +40.0%，狀態 NO_BASELINE"
        );
    }
}
