use crate::config::RetryConfig;
use crate::core::parser::extract_sorter_ranks;
use crate::domain::model::{ApiResponse, FetchOutcome, RankOutcome};
use crate::domain::ports::{ConfigProvider, ProgressSource};
use crate::utils::error::{MonitorError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::time::{Duration, Instant};

/// 分揀平台 HTTP 客戶端，固定次數、固定間隔重試
#[derive(Debug, Clone)]
pub struct SortingApiClient {
    client: Client,
    progress_url: String,
    rank_url: String,
    time_config_id: String,
    retry: RetryConfig,
}

fn default_headers(headers: &std::collections::BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| MonitorError::ConfigError {
            message: format!("invalid header name '{}': {}", name, e),
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| MonitorError::ConfigError {
            message: format!("invalid value for header '{}': {}", name, e),
        })?;
        map.insert(name, value);
    }
    Ok(map)
}

impl SortingApiClient {
    pub fn new<C: ConfigProvider>(config: &C) -> Result<Self> {
        let api = config.api();
        let client = Client::builder()
            .default_headers(default_headers(&api.headers)?)
            .timeout(Duration::from_secs(api.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            progress_url: api.progress_url(),
            rank_url: api.rank_url(),
            time_config_id: api.time_config_id.clone(),
            retry: config.retry().clone(),
        })
    }

    /// 單次 GET 請求；非 2xx 或 JSON 無法解析都視為失敗
    pub async fn get_json(&self, url: &str, params: &[(&str, &str)]) -> Result<ApiResponse> {
        tracing::debug!("請求URL: {} 參數: {:?}", url, params);
        let started = Instant::now();

        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await?
            .error_for_status()?;
        let http_status = response.status().as_u16();
        let text = response.text().await?;
        let body = serde_json::from_str(&text)?;

        Ok(ApiResponse {
            http_status,
            body,
            size: text.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// 只有傳輸層或 HTTP 狀態錯誤會重試，JSON 解析失敗立即結束
    async fn get_with_retry(
        &self,
        label: &str,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<ApiResponse> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            tracing::info!("正在獲取{} (嘗試 {}/{})", label, attempt, max_attempts);

            match self.get_json(url, params).await {
                Ok(response) => {
                    tracing::info!(
                        "{}獲取成功，響應大小: {} 字元，耗時 {}ms",
                        label,
                        response.size,
                        response.elapsed_ms
                    );
                    return Ok(response);
                }
                Err(e @ MonitorError::ApiError(_)) if attempt < max_attempts => {
                    tracing::error!("{}請求失敗 (嘗試 {}): {}", label, attempt, e);
                    tokio::time::sleep(Duration::from_secs(self.retry.delay_seconds)).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!("{}請求失敗 (嘗試 {}): {}", label, attempt, e);
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl ProgressSource for SortingApiClient {
    async fn progress_snapshot(&self, target_date: &str) -> Result<ApiResponse> {
        let params = [
            ("time_config_id", self.time_config_id.as_str()),
            ("target_date", target_date),
        ];
        self.get_json(&self.progress_url, &params).await
    }

    async fn fetch_progress(&self, target_date: &str) -> FetchOutcome {
        let params = [
            ("time_config_id", self.time_config_id.as_str()),
            ("target_date", target_date),
        ];

        match self
            .get_with_retry("分揀進度資料", &self.progress_url, &params)
            .await
        {
            Ok(response) => FetchOutcome::success(target_date.to_string(), response),
            Err(e) => FetchOutcome::failed(target_date.to_string(), e.to_string()),
        }
    }

    async fn fetch_sorter_rank(&self, cycle_start: &str, cycle_end: &str) -> RankOutcome {
        let params = [
            ("time_config_id", self.time_config_id.as_str()),
            ("cycle_start_time", cycle_start),
            ("cycle_end_time", cycle_end),
        ];
        let cycle = (cycle_start.to_string(), cycle_end.to_string());

        match self
            .get_with_retry("分揀員排名資料", &self.rank_url, &params)
            .await
        {
            Ok(response) => {
                if let Some(ranks) = extract_sorter_ranks(&response.body) {
                    let total: u64 = ranks.iter().map(|r| r.statistic_results).sum();
                    tracing::info!(
                        "獲取到 {} 名分揀員排名資料，總計完成 {} 件",
                        ranks.len(),
                        total
                    );
                }
                RankOutcome::success(cycle, response)
            }
            Err(e) => RankOutcome::failed(cycle, e.to_string()),
        }
    }
}
