#![allow(dead_code)]

use async_trait::async_trait;
use catalog_feed_etl::adapters::http::{HttpPartnerApi, PartnerApiSettings};
use catalog_feed_etl::core::trust::{TrustEngine, TrustSettings};
use catalog_feed_etl::adapters::memory::InMemorySyncLog;
use catalog_feed_etl::domain::model::{
    Category, NormalizedProduct, SyncLogEntry, SyncStatus, UpsertOutcome,
};
use catalog_feed_etl::domain::ports::{CatalogStore, SyncLogStore};
use catalog_feed_etl::utils::error::{EtlError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;
use zip::write::{SimpleFileOptions, ZipWriter};

pub const FEED_HEADER: &str =
    "aw_deep_link,product_name,description,search_price,currency,merchant_image_url,merchant_category";

pub fn zip_of(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// A feed archive holding one `datafeed.csv` with the given rows under `FEED_HEADER`.
pub fn feed_zip(rows: &[String]) -> Vec<u8> {
    let mut csv = String::from(FEED_HEADER);
    csv.push('\n');
    for row in rows {
        csv.push_str(row);
        csv.push('\n');
    }
    zip_of(&[("datafeed.csv", csv.as_bytes())])
}

pub fn row(url: &str, title: &str, price: &str, category: &str) -> String {
    format!(
        "{},\"{}\",,{},EUR,https://img.example/{}.jpg,\"{}\"",
        url,
        title,
        price,
        title.len(),
        category
    )
}

pub fn trust_engine() -> Arc<TrustEngine> {
    let mut settings = TrustSettings::default();
    settings
        .category_medians
        .insert(Category::Books, Decimal::from(15));
    settings
        .category_medians
        .insert(Category::TechElectronics, Decimal::from(250));
    Arc::new(TrustEngine::new(settings))
}

pub fn partner_api(base_url: &str) -> Arc<HttpPartnerApi> {
    Arc::new(
        HttpPartnerApi::new(PartnerApiSettings {
            programmes_url: format!("{}/programmes", base_url),
            feed_catalog_url: format!("{}/datafeed/list", base_url),
            feed_archive_url: format!("{}/datafeed/download", base_url),
            api_token: "test-token".to_string(),
            feed_api_key: "test-key".to_string(),
            columns: vec!["aw_deep_link".to_string(), "product_name".to_string()],
            timeout: Duration::from_secs(5),
        })
        .unwrap(),
    )
}

/// Catalog store that rejects every write whose title contains "reject".
#[derive(Default)]
pub struct RejectingCatalog {
    pub writes: AtomicU64,
}

#[async_trait]
impl CatalogStore for RejectingCatalog {
    async fn find_by_source_url(&self, _source_url: &str) -> Result<Option<NormalizedProduct>> {
        Ok(None)
    }

    async fn insert(&self, product: &NormalizedProduct) -> Result<()> {
        self.upsert(product).await.map(|_| ())
    }

    async fn update_price(
        &self,
        _source_url: &str,
        _price: Decimal,
        _updated_at: DateTime<Utc>,
    ) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, product: &NormalizedProduct) -> Result<UpsertOutcome> {
        if product.title.contains("reject") {
            return Err(EtlError::store("violates check constraint products_title"));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(UpsertOutcome::Inserted)
    }
}

/// Sync log that remembers every progress write in arrival order.
#[derive(Default)]
pub struct RecordingSyncLog {
    pub inner: InMemorySyncLog,
    pub progress: Mutex<Vec<(u64, u64)>>,
}

#[async_trait]
impl SyncLogStore for RecordingSyncLog {
    async fn fail_running(&self, platform: &str, message: &str) -> Result<usize> {
        self.inner.fail_running(platform, message).await
    }

    async fn start(&self, platform: &str) -> Result<SyncLogEntry> {
        self.inner.start(platform).await
    }

    async fn record_progress(&self, id: Uuid, items_found: u64, items_added: u64) -> Result<()> {
        self.progress.lock().unwrap().push((items_found, items_added));
        self.inner.record_progress(id, items_found, items_added).await
    }

    async fn finish(
        &self,
        id: Uuid,
        status: SyncStatus,
        items_found: u64,
        items_added: u64,
        error_message: Option<String>,
    ) -> Result<()> {
        self.inner
            .finish(id, status, items_found, items_added, error_message)
            .await
    }

    async fn entries_for(&self, platform: &str) -> Result<Vec<SyncLogEntry>> {
        self.inner.entries_for(platform).await
    }
}

pub fn temp_dir_is_empty(dir: &std::path::Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}
