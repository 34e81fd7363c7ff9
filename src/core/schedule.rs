//! 時間點相關規則：目標日期切換、排名週期、基準時間鍵

use crate::utils::error::{MonitorError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

const MINUTES_PER_DAY: i64 = 24 * 60;

/// 到達 `rollover_hour` 後改為次日
pub fn target_date(now: NaiveDateTime, rollover_hour: u32) -> NaiveDate {
    if now.hour() >= rollover_hour {
        now.date() + Duration::days(1)
    } else {
        now.date()
    }
}

/// API 的 `target_date` 參數格式
pub fn target_date_param(date: NaiveDate) -> String {
    format!("{} 00:00:00", date.format("%Y-%m-%d"))
}

/// 分揀員排名的統計週期 (開始, 結束)，落在目標日期上
pub fn rank_cycle(
    now: NaiveDateTime,
    rollover_hour: u32,
    start: NaiveTime,
    end: NaiveTime,
) -> (String, String) {
    let date = target_date(now, rollover_hour);
    (
        date.and_time(start).format("%Y-%m-%d %H:%M").to_string(),
        date.and_time(end).format("%Y-%m-%d %H:%M").to_string(),
    )
}

pub fn parse_hhmm(value: &str) -> Result<NaiveTime> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|e| MonitorError::ConfigError {
            message: format!("invalid time of day '{}': {}", value, e),
        })
}

pub fn time_key(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

pub fn floor_to_five_minutes(time: NaiveTime) -> NaiveTime {
    let minute = time.minute() - time.minute() % 5;
    NaiveTime::from_hms_opt(time.hour(), minute, 0).unwrap_or(time)
}

pub fn minute_of_day(time: NaiveTime) -> i64 {
    i64::from(time.hour()) * 60 + i64::from(time.minute())
}

/// 24 小時制環狀距離 (分鐘)
pub fn minutes_between_circular(a: NaiveTime, b: NaiveTime) -> i64 {
    let diff = (minute_of_day(a) - minute_of_day(b)).abs();
    diff.min(MINUTES_PER_DAY - diff)
}

/// 以 `pivot_hour` 劃分作業日後的分鐘差
///
/// 夜班從 pivot 開始：當前時間在 pivot 之後而基準點在之前，基準點屬於次日；
/// 反之基準點屬於前一日。
pub fn pivot_adjusted_distance(current: NaiveTime, baseline: NaiveTime, pivot_hour: u32) -> i64 {
    let current_minutes = minute_of_day(current);
    let mut baseline_minutes = minute_of_day(baseline);

    if current.hour() >= pivot_hour && baseline.hour() < pivot_hour {
        baseline_minutes += MINUTES_PER_DAY;
    } else if current.hour() < pivot_hour && baseline.hour() >= pivot_hour {
        baseline_minutes -= MINUTES_PER_DAY;
    }

    (current_minutes - baseline_minutes).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M").unwrap()
    }

    fn t(value: &str) -> NaiveTime {
        parse_hhmm(value).unwrap()
    }

    #[test]
    fn test_target_date_rolls_over_at_six_pm() {
        assert_eq!(
            target_date_param(target_date(at("2024-03-10", "17:59"), 18)),
            "2024-03-10 00:00:00"
        );
        assert_eq!(
            target_date_param(target_date(at("2024-03-10", "18:00"), 18)),
            "2024-03-11 00:00:00"
        );
        assert_eq!(
            target_date_param(target_date(at("2024-12-31", "23:30"), 18)),
            "2025-01-01 00:00:00"
        );
    }

    #[test]
    fn test_rank_cycle_uses_target_date() {
        let (start, end) = rank_cycle(at("2024-03-10", "20:15"), 18, t("05:00"), t("09:00"));
        assert_eq!(start, "2024-03-11 05:00");
        assert_eq!(end, "2024-03-11 09:00");
    }

    #[test]
    fn test_floor_to_five_minutes() {
        assert_eq!(time_key(floor_to_five_minutes(t("04:37"))), "04:35");
        assert_eq!(time_key(floor_to_five_minutes(t("00:00"))), "00:00");
    }

    #[test]
    fn test_circular_distance_wraps_midnight() {
        assert_eq!(minutes_between_circular(t("23:55"), t("00:05")), 10);
        assert_eq!(minutes_between_circular(t("12:00"), t("13:30")), 90);
    }

    #[test]
    fn test_pivot_adjusted_distance() {
        // 22:00 的夜班對應次日 01:00 的基準點
        assert_eq!(pivot_adjusted_distance(t("22:00"), t("01:00"), 18), 180);
        // 凌晨 02:00 對應前一晚 23:00 的基準點
        assert_eq!(pivot_adjusted_distance(t("02:00"), t("23:00"), 18), 180);
        assert_eq!(pivot_adjusted_distance(t("03:00"), t("04:00"), 18), 60);
    }
}
