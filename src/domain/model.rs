use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 聯盟行銷合作夥伴（programme）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub id: String,
    pub name: String,
    pub feed_api_identifier: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub id: String,
    pub partner_id: String,
    pub name: String,
    pub status: FeedStatus,
    pub item_count: u64,
}

/// One untyped feed row, keyed by lower-cased column name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    fields: HashMap<String, String>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut record = Self::new();
        for (key, value) in pairs {
            record.insert(key.as_ref(), value);
        }
        record
    }

    /// 從 JSON 物件建立；只保留純量欄位，巢狀結構與 null 會被忽略
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;
        let mut record = Self::new();
        for (key, value) in obj {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            record.insert(key, text);
        }
        Some(record)
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.fields
            .insert(key.trim().to_ascii_lowercase(), value.into());
    }

    /// First non-blank value among `keys`, trimmed.
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.fields.get(*k))
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.values().all(|v| v.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    TechElectronics,
    Fashion,
    HomeGarden,
    SportsLeisure,
    BabyKids,
    Movies,
    Books,
    Music,
    CollectiblesArt,
    Diy,
    Services,
    AgricultureIndustrial,
    CarsMotorcycles,
    RealEstate,
    BeautyPersonalCare,
    MotorAccessories,
    TravelExperiences,
    Others,
}

impl Category {
    pub const ALL: [Category; 18] = [
        Category::TechElectronics,
        Category::Fashion,
        Category::HomeGarden,
        Category::SportsLeisure,
        Category::BabyKids,
        Category::Movies,
        Category::Books,
        Category::Music,
        Category::CollectiblesArt,
        Category::Diy,
        Category::Services,
        Category::AgricultureIndustrial,
        Category::CarsMotorcycles,
        Category::RealEstate,
        Category::BeautyPersonalCare,
        Category::MotorAccessories,
        Category::TravelExperiences,
        Category::Others,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::TechElectronics => "tech-electronics",
            Category::Fashion => "fashion",
            Category::HomeGarden => "home-garden",
            Category::SportsLeisure => "sports-leisure",
            Category::BabyKids => "baby-kids",
            Category::Movies => "movies",
            Category::Books => "books",
            Category::Music => "music",
            Category::CollectiblesArt => "collectibles-art",
            Category::Diy => "diy",
            Category::Services => "services",
            Category::AgricultureIndustrial => "agriculture-industrial",
            Category::CarsMotorcycles => "cars-motorcycles",
            Category::RealEstate => "real-estate",
            Category::BeautyPersonalCare => "beauty-personal-care",
            Category::MotorAccessories => "motor-accessories",
            Category::TravelExperiences => "travel-experiences",
            Category::Others => "others",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| format!("unknown category slug: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceScore {
    Bargain,
    Fair,
    Expensive,
}

/// Catalog-ready product. `source_url` is the identity key across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedProduct {
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub currency: String,
    pub image_url: Option<String>,
    pub source_url: String,
    pub platform: String,
    pub category: Category,
    pub condition: String,
    pub price_score: Option<PriceScore>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Running,
    Success,
    Error,
    Banned,
    Suspicious,
    Timeout,
}

impl SyncStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SyncStatus::Running)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStatus::Running => "running",
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
            SyncStatus::Banned => "banned",
            SyncStatus::Suspicious => "suspicious",
            SyncStatus::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub id: Uuid,
    pub platform: String,
    pub status: SyncStatus,
    pub items_found: u64,
    pub items_added: u64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SyncLogEntry {
    pub fn running(platform: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            platform: platform.to_string(),
            status: SyncStatus::Running,
            items_found: 0,
            items_added: 0,
            error_message: None,
            created_at: Utc::now(),
        }
    }
}

/// Counters of one archive run. Per-row failures only ever bump these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessStats {
    pub processed: u64,
    pub added: u64,
    pub skipped: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub received: u64,
    pub inserted: u64,
    pub updated: u64,
    pub skipped_invalid: u64,
    pub skipped_wanted: u64,
    pub skipped_noise: u64,
    /// Store writes that failed; `errors` holds the first few messages.
    pub failed: u64,
    pub errors: Vec<String>,
}
