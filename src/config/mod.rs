#[cfg(feature = "cli")]
pub mod cli;

use crate::core::ConfigProvider;
use crate::utils::error::{MonitorError, Result};
use crate::utils::validation::{self, Validate};
use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "monitor.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub collection: CollectionConfig,
    pub retry: RetryConfig,
    pub schedule: ScheduleConfig,
    pub monitor: MonitorConfig,
    pub dashboard: DashboardConfig,

    /// 配置檔所在目錄，用於解析相對路徑的基準檔
    #[serde(skip)]
    pub source_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub endpoint: String,
    pub rank_endpoint: String,
    pub time_config_id: String,
    pub timeout_seconds: u64,
    pub headers: BTreeMap<String, String>,
}

impl ApiConfig {
    pub fn progress_url(&self) -> String {
        join_url(&self.base_url, &self.endpoint)
    }

    pub fn rank_url(&self) -> String {
        join_url(&self.base_url, &self.rank_endpoint)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        let headers = [
            ("Accept", "application/json, text/plain, */*"),
            ("Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8"),
            ("Cache-Control", "no-cache"),
            ("Pragma", "no-cache"),
            ("Referer", "https://station.guanmai.cn/"),
            (
                "User-Agent",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            base_url: "https://station.guanmai.cn".to_string(),
            endpoint: "/weight/weight_collect/weight_info/get".to_string(),
            rank_endpoint: "/weight/weight_collect/sorter/rank".to_string(),
            time_config_id: "ST22071".to_string(),
            timeout_seconds: 30,
            headers,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub interval_minutes: u64,
    pub data_dir: String,
    pub json_filename: String,
    pub log_filename: String,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 5,
            data_dir: "collected_data".to_string(),
            json_filename: "sorting_progress_{date}.json".to_string(),
            log_filename: "collector.log".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// 到達此時數後改為請求次日資料
    pub rollover_hour: u32,
    pub rank_cycle_start: String,
    pub rank_cycle_end: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            rollover_hour: 18,
            rank_cycle_start: "05:00".to_string(),
            rank_cycle_end: "09:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub baseline_file: String,
    pub category_baseline_file: Option<String>,
    pub alert_threshold_percent: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            baseline_file: "progress_baseline.csv".to_string(),
            category_baseline_file: None,
            alert_threshold_percent: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub bind: String,
    pub port: u16,
    pub refresh_seconds: u64,
    pub open_browser: bool,
    pub port_search_span: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8501,
            refresh_seconds: 30,
            open_browser: true,
            port_search_span: 20,
        }
    }
}

impl AppConfig {
    /// 載入配置
    ///
    /// 明確指定的路徑必須存在且可解析；未指定時嘗試 `monitor.toml`，
    /// 缺檔或解析失敗都退回預設值。
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_or_default(explicit, Path::new(DEFAULT_CONFIG_FILE))
    }

    fn load_or_default(explicit: Option<&Path>, path: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if !path.exists() {
            tracing::info!("未找到 {}，使用預設配置", path.display());
            return Ok(Self::default());
        }

        match Self::from_file(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!("⚠️ 配置檔載入失敗，使用預設配置: {}", e);
                Ok(Self::default())
            }
        }
    }

    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| MonitorError::ConfigError {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.source_dir = path
            .canonicalize()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf));
        Ok(config)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| MonitorError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${STATION_COOKIE})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| MonitorError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn log_file_path(&self) -> PathBuf {
        Path::new(&self.collection.data_dir).join(&self.collection.log_filename)
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("api.base_url", &self.api.base_url)?;
        validation::validate_url("api.progress_url", &self.api.progress_url())?;
        validation::validate_url("api.rank_url", &self.api.rank_url())?;
        validation::validate_non_empty_string("api.time_config_id", &self.api.time_config_id)?;
        validation::validate_positive_number("api.timeout_seconds", self.api.timeout_seconds, 1)?;

        for (name, value) in &self.api.headers {
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                MonitorError::InvalidConfigValueError {
                    field: "api.headers".to_string(),
                    value: name.clone(),
                    reason: format!("Invalid header name: {}", e),
                }
            })?;
            HeaderValue::from_str(value).map_err(|e| MonitorError::InvalidConfigValueError {
                field: format!("api.headers.{}", name),
                value: value.clone(),
                reason: format!("Invalid header value: {}", e),
            })?;
        }

        validation::validate_path("collection.data_dir", &self.collection.data_dir)?;
        validation::validate_path("collection.json_filename", &self.collection.json_filename)?;
        validation::validate_path("collection.log_filename", &self.collection.log_filename)?;
        validation::validate_positive_number(
            "collection.interval_minutes",
            self.collection.interval_minutes,
            1,
        )?;

        validation::validate_positive_number(
            "retry.max_attempts",
            u64::from(self.retry.max_attempts),
            1,
        )?;

        validation::validate_range("schedule.rollover_hour", self.schedule.rollover_hour, 0, 23)?;
        let start =
            validation::validate_time_of_day("schedule.rank_cycle_start", &self.schedule.rank_cycle_start)?;
        let end =
            validation::validate_time_of_day("schedule.rank_cycle_end", &self.schedule.rank_cycle_end)?;
        if start >= end {
            return Err(MonitorError::ConfigValidationError {
                field: "schedule.rank_cycle_end".to_string(),
                message: "cycle end must be later than cycle start".to_string(),
            });
        }

        validation::validate_path("monitor.baseline_file", &self.monitor.baseline_file)?;
        validation::validate_range(
            "monitor.alert_threshold_percent",
            self.monitor.alert_threshold_percent,
            0.0,
            100.0,
        )?;

        validation::validate_non_empty_string("dashboard.bind", &self.dashboard.bind)?;
        validation::validate_positive_number(
            "dashboard.refresh_seconds",
            self.dashboard.refresh_seconds,
            1,
        )?;

        Ok(())
    }
}

fn join_url(base: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

impl ConfigProvider for AppConfig {
    fn api(&self) -> &ApiConfig {
        &self.api
    }

    fn retry(&self) -> &RetryConfig {
        &self.retry
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
