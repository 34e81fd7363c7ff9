//! 定時採集：抓取分揀進度與分揀員排名，落盤並輸出摘要

use crate::config::ScheduleConfig;
use crate::core::parser::{extract_sorter_ranks, parse_statistics};
use crate::core::recorder::ProgressRecorder;
use crate::core::schedule::{parse_hhmm, rank_cycle, target_date, target_date_param};
use crate::domain::model::{CollectionReport, CollectionStatus, FetchOutcome, RankOutcome};
use crate::domain::ports::{ProgressSource, Storage};
use crate::utils::error::Result;
use chrono::{Local, NaiveDateTime, NaiveTime, Timelike};
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

pub struct Collector<P: ProgressSource, S: Storage> {
    source: P,
    recorder: ProgressRecorder<S>,
    rollover_hour: u32,
    cycle_start: NaiveTime,
    cycle_end: NaiveTime,
    interval: Duration,
}

impl<P: ProgressSource, S: Storage> Collector<P, S> {
    pub fn new(
        source: P,
        recorder: ProgressRecorder<S>,
        schedule: &ScheduleConfig,
        interval: Duration,
    ) -> Result<Self> {
        Ok(Self {
            source,
            recorder,
            rollover_hour: schedule.rollover_hour,
            cycle_start: parse_hhmm(&schedule.rank_cycle_start)?,
            cycle_end: parse_hhmm(&schedule.rank_cycle_end)?,
            interval,
        })
    }

    /// 執行一次完整採集，任一步失敗都不會中斷後續步驟
    pub async fn collect_once(&self, now: NaiveDateTime) -> CollectionReport {
        tracing::info!("{}", "=".repeat(60));
        tracing::info!("🚀 開始採集資料 {}", now.format("%Y-%m-%d %H:%M:%S"));

        let target = target_date(now, self.rollover_hour);
        if now.hour() >= self.rollover_hour {
            tracing::info!(
                "⏰ 已過 {}:00，目標日期切換為次日 {}",
                self.rollover_hour,
                target
            );
        }

        let progress = self.source.fetch_progress(&target_date_param(target)).await;
        if let Err(e) = self.recorder.record_progress(&progress, now.date()).await {
            tracing::warn!("⚠️ 分揀進度寫檔失敗: {}", e);
        }
        log_progress_summary(&progress);

        let (cycle_start, cycle_end) =
            rank_cycle(now, self.rollover_hour, self.cycle_start, self.cycle_end);
        tracing::info!("📅 排名統計週期: {} ~ {}", cycle_start, cycle_end);
        let ranking = self.source.fetch_sorter_rank(&cycle_start, &cycle_end).await;
        if let Err(e) = self.recorder.record_sorter_rank(&ranking).await {
            tracing::warn!("⚠️ 分揀員排名寫檔失敗: {}", e);
        }
        log_top_sorters(&ranking);

        let status = if progress.is_success() && ranking.is_success() {
            CollectionStatus::Success
        } else {
            CollectionStatus::PartialSuccess
        };
        match status {
            CollectionStatus::Success => tracing::info!("✅ 本輪採集完成"),
            CollectionStatus::PartialSuccess => tracing::warn!("⚠️ 本輪採集部分失敗"),
        }

        CollectionReport {
            sorting_progress: progress,
            sorter_ranking: ranking,
            status,
            timestamp: Local::now(),
        }
    }

    /// 立即採集一次，之後每個間隔採集，直到 `shutdown` 完成
    pub async fn run_scheduled<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tracing::info!("🔁 定時採集啟動，間隔 {} 秒", self.interval.as_secs());
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = self.collect_once(Local::now().naive_local()) => {}
                    }
                }
            }
        }

        tracing::info!("🛑 收到停止信號，採集結束");
    }
}

fn log_progress_summary(outcome: &FetchOutcome) {
    let Some(body) = outcome.data.as_ref().filter(|_| outcome.is_success()) else {
        tracing::error!(
            "❌ 分揀進度獲取失敗: {}",
            outcome.error.as_deref().unwrap_or("未知錯誤")
        );
        return;
    };

    let stats = parse_statistics(body);
    tracing::info!(
        "📊 總任務 {}，已完成 {}，缺貨 {}，未完成 {}",
        stats.total_tasks,
        stats.completed_tasks,
        stats.shortage_tasks,
        stats.uncompleted_tasks
    );
    if let Some(rate) = stats.completion_rate() {
        tracing::info!("📈 完成率 {:.1}%", rate);
    }
    tracing::info!(
        "🏪 商戶 {}，商品種類 {}，計重任務 {}，不計重任務 {}",
        stats.merchant_count,
        stats.product_types,
        stats.weight_tasks,
        stats.no_weight_tasks
    );
}

fn log_top_sorters(outcome: &RankOutcome) {
    if !outcome.is_success() {
        tracing::error!(
            "❌ 分揀員排名獲取失敗: {}",
            outcome.error.as_deref().unwrap_or("未知錯誤")
        );
        return;
    }

    let Some(mut ranks) = outcome.data.as_ref().and_then(extract_sorter_ranks) else {
        tracing::warn!("⚠️ 排名回應沒有可用的分揀員列表");
        return;
    };
    ranks.sort_by(|a, b| b.statistic_results.cmp(&a.statistic_results));
    for (index, sorter) in ranks.iter().take(3).enumerate() {
        tracing::info!(
            "🏆 第 {} 名: {} ({} 件)",
            index + 1,
            sorter.sorter_name,
            sorter.statistic_results
        );
    }
}
