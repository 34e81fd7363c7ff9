use chrono::NaiveDateTime;
use httpmock::prelude::*;
use sorting_monitor::core::baseline::load_configured;
use sorting_monitor::domain::model::ProgressStatus;
use sorting_monitor::{AppConfig, ProgressChecker, SortingApiClient};
use std::fs;
use tempfile::TempDir;

const BASELINE_CSV: &str = "\u{feff}时间,累计单数完成比例(%),累计重量完成比例(%)\n\
01:00,20.0,18.0\n\
02:00,45.5,40.0\n\
02:05,48.0,44.0\n\
03:00,70.0,66.0\n";

fn write_config(dir: &TempDir, server: &MockServer) -> AppConfig {
    fs::write(dir.path().join("progress_baseline.csv"), BASELINE_CSV).unwrap();
    fs::write(
        dir.path().join("category_baseline.csv"),
        "时间,新鲜蔬菜完成率(%),豆制品完成率(%)\n02:00,50,40\n",
    )
    .unwrap();

    let config_path = dir.path().join("monitor.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[api]
base_url = "{}"
time_config_id = "ST1"

[retry]
max_attempts = 1
delay_seconds = 0

[monitor]
baseline_file = "progress_baseline.csv"
category_baseline_file = "category_baseline.csv"
alert_threshold_percent = 2.0
"#,
            server.base_url()
        ),
    )
    .unwrap();

    AppConfig::from_file(&config_path).unwrap()
}

fn at(value: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M").unwrap()
}

#[tokio::test]
async fn test_check_against_baseline_file() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/weight/weight_collect/weight_info/get")
            .query_param("time_config_id", "ST1")
            .query_param("target_date", "2024-03-11 00:00:00");
        then.status(200).json_body(serde_json::json!({
            "code": 0,
            "msg": "ok",
            "data": {"statistics": {"total_tasks": 1000, "completed_tasks": 440}}
        }));
    });

    let config = write_config(&dir, &server);
    let (baseline, category_baseline) = load_configured(&config).unwrap();
    assert_eq!(baseline.len(), 4);
    assert!(category_baseline.is_some());

    let checker = ProgressChecker::new(
        SortingApiClient::new(&config).unwrap(),
        baseline,
        config.monitor.alert_threshold_percent,
        config.schedule.rollover_hour,
    );

    // 02:03 沒有精確基準，落到 02:00
    let report = checker.check_once(at("2024-03-11 02:03")).await.unwrap();

    api_mock.assert();
    assert_eq!(report.comparison.time_point.as_deref(), Some("02:00"));
    assert_eq!(report.comparison.actual_order_pct, 44.0);
    assert_eq!(report.comparison.required_order_pct, 45.5);
    assert_eq!(report.comparison.delta_pct, -1.5);
    assert_eq!(report.comparison.status, ProgressStatus::Ok);
    assert_eq!(report.exit_code(), 0);
    assert!(report.render(false).contains("目標完成比例(單數): 45.5%"));
}

#[tokio::test]
async fn test_check_reports_warn_and_api_meta() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/weight/weight_collect/weight_info/get");
        then.status(200).json_body(serde_json::json!({
            "code": "0",
            "message": "查詢成功",
            "data": {"total_schedule": {"total_count": "200", "finished_count": "134"}}
        }));
    });

    let config = write_config(&dir, &server);
    let (baseline, _) = load_configured(&config).unwrap();
    let checker = ProgressChecker::new(
        SortingApiClient::new(&config).unwrap(),
        baseline,
        config.monitor.alert_threshold_percent,
        config.schedule.rollover_hour,
    );

    let report = checker.check_once(at("2024-03-11 03:00")).await.unwrap();

    assert_eq!(report.comparison.actual_order_pct, 67.0);
    assert_eq!(report.comparison.delta_pct, -3.0);
    assert_eq!(report.comparison.status, ProgressStatus::Warn);
    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.meta.api_msg.as_deref(), Some("查詢成功"));
    assert_eq!(report.meta.http_status, Some(200));
}

#[test]
fn test_missing_baseline_is_an_error() {
    let mut config = AppConfig::default();
    config.monitor.baseline_file = "definitely_missing_baseline.csv".to_string();
    assert!(load_configured(&config).is_err());
}

#[test]
fn test_demo_config_loads_with_its_baselines() {
    use sorting_monitor::utils::validation::Validate;

    let config = AppConfig::from_file("demos/monitor.toml").unwrap();
    config.validate().unwrap();

    let (baseline, category_baseline) = load_configured(&config).unwrap();
    assert_eq!(baseline.len(), 25);
    assert!(!category_baseline.unwrap().is_empty());
}
