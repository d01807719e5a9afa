use crate::adapters::http::PartnerApiSettings;
use crate::adapters::server::ServerSettings;
use crate::core::archive::ArchiveSettings;
use crate::core::orchestrator::OrchestratorSettings;
use crate::core::trust::TrustSettings;
use crate::domain::model::Category;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_path, validate_positive_number, validate_range, validate_secret, validate_url,
    Validate,
};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "feed-sync.toml";

static ENV_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env placeholder pattern"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub partner_api: PartnerApiConfig,
    #[serde(default)]
    pub sync: SyncSection,
    #[serde(default)]
    pub trust: TrustConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerApiConfig {
    pub programmes_url: String,
    pub feed_catalog_url: String,
    pub feed_archive_url: String,
    pub api_token: String,
    pub feed_api_key: String,
    #[serde(default = "default_platform_prefix")]
    pub platform_prefix: String,
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,
    #[serde(default = "default_catalog_timeout")]
    pub catalog_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSection {
    #[serde(default = "default_partner_delay")]
    pub partner_delay_ms: u64,
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: u64,
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
    #[serde(default = "default_max_archive_mb")]
    pub max_archive_mb: u64,
    pub temp_dir: Option<String>,
    #[serde(default)]
    pub only_partners: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustConfig {
    #[serde(default = "default_price_band")]
    pub price_band: f64,
    #[serde(default = "default_noise_threshold")]
    pub noise_price_threshold: f64,
    /// category slug → median price
    #[serde(default)]
    pub category_medians: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub ingest_api_key: String,
    #[serde(default)]
    pub cron_secret: String,
    pub scheduler_header: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_output_path")]
    pub output_path: String,
}

fn default_platform_prefix() -> String {
    "awin".to_string()
}

fn default_columns() -> Vec<String> {
    [
        "aw_deep_link",
        "product_name",
        "description",
        "search_price",
        "currency",
        "merchant_image_url",
        "merchant_category",
        "category_name",
        "merchant_product_id",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect()
}

fn default_catalog_timeout() -> u64 {
    30
}

fn default_partner_delay() -> u64 {
    2000
}

fn default_checkpoint_every() -> u64 {
    100
}

fn default_download_timeout() -> u64 {
    300
}

fn default_max_archive_mb() -> u64 {
    512
}

fn default_price_band() -> f64 {
    0.15
}

fn default_noise_threshold() -> f64 {
    20.0
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_output_path() -> String {
    "./output".to_string()
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            partner_delay_ms: default_partner_delay(),
            checkpoint_every: default_checkpoint_every(),
            download_timeout_secs: default_download_timeout(),
            max_archive_mb: default_max_archive_mb(),
            temp_dir: None,
            only_partners: Vec::new(),
        }
    }
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            price_band: default_price_band(),
            noise_price_threshold: default_noise_threshold(),
            category_medians: BTreeMap::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            ingest_api_key: String::new(),
            cron_secret: String::new(),
            scheduler_header: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
        }
    }
}

/// TOML 浮點數經由字串轉成 Decimal，保留設定檔上寫的精確值
fn to_decimal(field: &str, value: f64) -> Result<Decimal> {
    Decimal::from_str(&value.to_string()).map_err(|e| EtlError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

impl SyncConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${FEED_API_KEY})；未設定的變數保留原樣，交給驗證報錯
    fn substitute_env_vars(content: &str) -> String {
        ENV_PLACEHOLDER
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn partner_api_settings(&self) -> PartnerApiSettings {
        PartnerApiSettings {
            programmes_url: self.partner_api.programmes_url.clone(),
            feed_catalog_url: self.partner_api.feed_catalog_url.clone(),
            feed_archive_url: self.partner_api.feed_archive_url.clone(),
            api_token: self.partner_api.api_token.clone(),
            feed_api_key: self.partner_api.feed_api_key.clone(),
            columns: self.partner_api.columns.clone(),
            timeout: Duration::from_secs(self.partner_api.catalog_timeout_secs),
        }
    }

    pub fn archive_settings(&self) -> ArchiveSettings {
        ArchiveSettings {
            download_timeout: Duration::from_secs(self.sync.download_timeout_secs),
            max_archive_bytes: self.sync.max_archive_mb * 1024 * 1024,
            checkpoint_every: self.sync.checkpoint_every,
            temp_dir: self.sync.temp_dir.as_ref().map(PathBuf::from),
        }
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            platform_prefix: self.partner_api.platform_prefix.clone(),
            partner_delay: Duration::from_millis(self.sync.partner_delay_ms),
            only_partners: self.sync.only_partners.clone(),
        }
    }

    pub fn trust_settings(&self) -> Result<TrustSettings> {
        let mut category_medians = HashMap::new();
        for (slug, median) in &self.trust.category_medians {
            let field = format!("trust.category_medians.{}", slug);
            let category =
                Category::from_str(slug).map_err(|reason| EtlError::InvalidConfigValueError {
                    field: field.clone(),
                    value: slug.clone(),
                    reason,
                })?;
            category_medians.insert(category, to_decimal(&field, *median)?);
        }

        Ok(TrustSettings {
            price_band: to_decimal("trust.price_band", self.trust.price_band)?,
            noise_price_threshold: to_decimal(
                "trust.noise_price_threshold",
                self.trust.noise_price_threshold,
            )?,
            category_medians,
        })
    }

    pub fn server_settings(&self) -> ServerSettings {
        ServerSettings {
            ingest_api_key: self.server.ingest_api_key.clone(),
            cron_secret: self.server.cron_secret.clone(),
            scheduler_header: self
                .server
                .scheduler_header
                .as_ref()
                .map(|h| h.to_ascii_lowercase()),
        }
    }

    /// Secrets only needed by `serve`.
    pub fn validate_server(&self) -> Result<()> {
        validate_secret("server.ingest_api_key", &self.server.ingest_api_key)?;
        validate_secret("server.cron_secret", &self.server.cron_secret)?;
        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(EtlError::InvalidConfigValueError {
                field: "server.bind".to_string(),
                value: self.server.bind.clone(),
                reason: "expected host:port".to_string(),
            });
        }
        Ok(())
    }
}

impl Validate for SyncConfig {
    fn validate(&self) -> Result<()> {
        let api = &self.partner_api;
        validate_url("partner_api.programmes_url", &api.programmes_url)?;
        validate_url("partner_api.feed_catalog_url", &api.feed_catalog_url)?;
        validate_url("partner_api.feed_archive_url", &api.feed_archive_url)?;
        validate_secret("partner_api.api_token", &api.api_token)?;
        validate_secret("partner_api.feed_api_key", &api.feed_api_key)?;
        validate_positive_number("partner_api.catalog_timeout_secs", api.catalog_timeout_secs, 1)?;
        if api.platform_prefix.trim().is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "partner_api.platform_prefix".to_string(),
            });
        }
        if api.columns.is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "partner_api.columns".to_string(),
            });
        }

        validate_positive_number("sync.checkpoint_every", self.sync.checkpoint_every, 1)?;
        validate_positive_number("sync.download_timeout_secs", self.sync.download_timeout_secs, 1)?;
        validate_positive_number("sync.max_archive_mb", self.sync.max_archive_mb, 1)?;
        if let Some(dir) = &self.sync.temp_dir {
            validate_path("sync.temp_dir", dir)?;
        }

        validate_range("trust.price_band", self.trust.price_band, 0.0, 1.0)?;
        if self.trust.price_band == 0.0 || self.trust.price_band == 1.0 {
            return Err(EtlError::InvalidConfigValueError {
                field: "trust.price_band".to_string(),
                value: self.trust.price_band.to_string(),
                reason: "band must lie strictly between 0 and 1".to_string(),
            });
        }
        if self.trust.noise_price_threshold < 0.0 {
            return Err(EtlError::InvalidConfigValueError {
                field: "trust.noise_price_threshold".to_string(),
                value: self.trust.noise_price_threshold.to_string(),
                reason: "threshold cannot be negative".to_string(),
            });
        }
        for (slug, median) in &self.trust.category_medians {
            if *median <= 0.0 {
                return Err(EtlError::InvalidConfigValueError {
                    field: format!("trust.category_medians.{}", slug),
                    value: median.to_string(),
                    reason: "median must be positive".to_string(),
                });
            }
        }
        self.trust_settings()?;

        validate_path("storage.output_path", &self.storage.output_path)?;
        Ok(())
    }
}
