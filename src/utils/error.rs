use crate::domain::model::SyncStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Archive decode error: {message}")]
    DecodeError { message: String },

    #[error("Catalog store error: {message}")]
    StoreError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

pub type Result<T> = std::result::Result<T, EtlError>;

// 請求網址帶有 apikey，錯誤訊息會寫入 sync log
impl From<reqwest::Error> for EtlError {
    fn from(err: reqwest::Error) -> Self {
        EtlError::ApiError(err.without_url())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Transport,
    Decode,
    Store,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    /// 將 reqwest 錯誤轉為帶操作名稱的超時錯誤（若是超時）
    pub fn from_transport(err: reqwest::Error, operation: &str, seconds: u64) -> Self {
        if err.is_timeout() {
            EtlError::Timeout {
                operation: operation.to_string(),
                seconds,
            }
        } else {
            EtlError::from(err)
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        EtlError::StoreError {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        EtlError::DecodeError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
            EtlError::ApiError(_) | EtlError::Timeout { .. } | EtlError::HttpStatus { .. } => {
                ErrorCategory::Transport
            }
            EtlError::ZipError(_) | EtlError::CsvError(_) | EtlError::DecodeError { .. } => {
                ErrorCategory::Decode
            }
            EtlError::StoreError { .. } => ErrorCategory::Store,
            EtlError::IoError(_)
            | EtlError::SerializationError(_)
            | EtlError::ProcessingError { .. }
            | EtlError::ValidationError { .. } => ErrorCategory::Processing,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Transport | ErrorCategory::Store => ErrorSeverity::Medium,
            ErrorCategory::Decode | ErrorCategory::Processing => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    /// 夥伴執行失敗時寫入 sync log 的終態
    pub fn sync_status(&self) -> SyncStatus {
        match self {
            EtlError::Timeout { .. } => SyncStatus::Timeout,
            EtlError::ApiError(e) if e.is_timeout() => SyncStatus::Timeout,
            EtlError::HttpStatus { status, .. } if *status == 403 || *status == 429 => {
                SyncStatus::Banned
            }
            _ => SyncStatus::Error,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the TOML configuration file and the environment variables it references"
            }
            ErrorCategory::Transport => {
                "Network or partner server problem; the next scheduled run will retry"
            }
            ErrorCategory::Decode => {
                "The feed archive is malformed; check the requested columns and feed format"
            }
            ErrorCategory::Store => "Check catalog store connectivity and constraints",
            ErrorCategory::Processing => "Re-run with --verbose for details",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::Timeout { operation, seconds } => {
                format!("{} did not finish within {} seconds", operation, seconds)
            }
            EtlError::HttpStatus { status, .. } => {
                format!("The partner server answered with HTTP {}", status)
            }
            EtlError::MissingConfigError { field } => {
                format!("Configuration value '{}' is required", field)
            }
            other => other.to_string(),
        }
    }
}
