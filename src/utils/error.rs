use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("API returned an unusable response: {message}")]
    ApiResponseError { message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Baseline error: {message}")]
    BaselineError { message: String },

    #[error("Dashboard server error: {message}")]
    ServerError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Storage,
    Configuration,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl MonitorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            MonitorError::ApiError(_) | MonitorError::ApiResponseError { .. } => {
                ErrorCategory::Network
            }
            MonitorError::CsvError(_)
            | MonitorError::SerializationError(_)
            | MonitorError::BaselineError { .. } => ErrorCategory::Data,
            MonitorError::IoError(_) => ErrorCategory::Storage,
            MonitorError::ConfigError { .. }
            | MonitorError::ConfigValidationError { .. }
            | MonitorError::MissingConfigError { .. }
            | MonitorError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            MonitorError::ServerError { .. } => ErrorCategory::Server,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 網路錯誤通常下一輪輪詢就會恢復
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Storage | ErrorCategory::Server => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            MonitorError::ApiError(_) | MonitorError::ApiResponseError { .. } => {
                "檢查網路連線、api.base_url 以及請求標頭 (Cookie/授權) 是否仍然有效"
            }
            MonitorError::CsvError(_) | MonitorError::BaselineError { .. } => {
                "確認基準 CSV 檔案存在，且包含「時間」欄位與百分比欄位"
            }
            MonitorError::IoError(_) => "確認資料目錄存在且有寫入權限",
            MonitorError::SerializationError(_) => "檢查 JSON 日誌檔是否被其他程式修改",
            MonitorError::ConfigError { .. }
            | MonitorError::ConfigValidationError { .. }
            | MonitorError::MissingConfigError { .. }
            | MonitorError::InvalidConfigValueError { .. } => {
                "檢查 monitor.toml 的欄位名稱與數值範圍"
            }
            MonitorError::ServerError { .. } => "確認綁定位址可用，或改用 --port 指定其他連接埠",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("無法取得分揀資料: {}", self),
            ErrorCategory::Data => format!("資料處理失敗: {}", self),
            ErrorCategory::Storage => format!("檔案讀寫失敗: {}", self),
            ErrorCategory::Configuration => format!("配置有誤: {}", self),
            ErrorCategory::Server => format!("看板啟動失敗: {}", self),
        }
    }

    /// 依嚴重程度對應的行程結束碼
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 2,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
