use crate::domain::model::{
    NormalizedProduct, Partner, SyncLogEntry, SyncStatus, UpsertOutcome,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
}

/// Affiliate network endpoints consumed by the sync.
#[async_trait]
pub trait PartnerApi: Send + Sync {
    /// Programmes the publisher has joined.
    async fn joined_partners(&self) -> Result<Vec<Partner>>;

    /// Raw delimited listing of every feed visible to the publisher.
    async fn feed_catalog(&self) -> Result<String>;

    fn feed_archive_url(&self, feed_id: &str) -> Result<String>;
}

/// External catalog store. Single-row operations are assumed atomic.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_by_source_url(&self, source_url: &str) -> Result<Option<NormalizedProduct>>;

    async fn insert(&self, product: &NormalizedProduct) -> Result<()>;

    async fn update_price(
        &self,
        source_url: &str,
        price: Decimal,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Conflict-safe upsert keyed on `source_url`: an existing row only gets
    /// `price` and `updated_at` refreshed.
    async fn upsert(&self, product: &NormalizedProduct) -> Result<UpsertOutcome>;
}

#[async_trait]
pub trait SyncLogStore: Send + Sync {
    /// Moves every `running` entry of `platform` to `error`. Returns how many moved.
    async fn fail_running(&self, platform: &str, message: &str) -> Result<usize>;

    async fn start(&self, platform: &str) -> Result<SyncLogEntry>;

    /// Progress counters; ignored once the entry left `running`.
    async fn record_progress(&self, id: Uuid, items_found: u64, items_added: u64) -> Result<()>;

    async fn finish(
        &self,
        id: Uuid,
        status: SyncStatus,
        items_found: u64,
        items_added: u64,
        error_message: Option<String>,
    ) -> Result<()>;

    async fn entries_for(&self, platform: &str) -> Result<Vec<SyncLogEntry>>;
}
