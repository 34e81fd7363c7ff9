use crate::config::{ApiConfig, RetryConfig};
use crate::domain::model::{ApiResponse, FetchOutcome, RankOutcome};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn append_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
}

/// HTTP 客戶端所需的配置
pub trait ConfigProvider: Send + Sync {
    fn api(&self) -> &ApiConfig;
    fn retry(&self) -> &RetryConfig;
}

/// 分揀平台資料來源
#[async_trait]
pub trait ProgressSource: Send + Sync {
    /// 單次請求分揀進度，不重試
    async fn progress_snapshot(&self, target_date: &str) -> Result<ApiResponse>;

    /// 帶重試地請求分揀進度，失敗時回傳 `failed` 結果
    async fn fetch_progress(&self, target_date: &str) -> FetchOutcome;

    /// 帶重試地請求分揀員排名
    async fn fetch_sorter_rank(&self, cycle_start: &str, cycle_end: &str) -> RankOutcome;
}
