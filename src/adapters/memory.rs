use crate::domain::model::{NormalizedProduct, SyncLogEntry, SyncStatus, UpsertOutcome};
use crate::domain::ports::{CatalogStore, SyncLogStore};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// In-process catalog keyed by `source_url`, with JSON snapshots so the CLI
/// can carry the catalog between runs.
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    products: Arc<Mutex<HashMap<String, NormalizedProduct>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(data: &[u8]) -> Result<Self> {
        let products: Vec<NormalizedProduct> = serde_json::from_slice(data)?;
        let map = products
            .into_iter()
            .map(|p| (p.source_url.clone(), p))
            .collect();
        Ok(Self {
            products: Arc::new(Mutex::new(map)),
        })
    }

    pub async fn snapshot(&self) -> Result<Vec<u8>> {
        let products = self.products.lock().await;
        let mut rows: Vec<&NormalizedProduct> = products.values().collect();
        rows.sort_by(|a, b| a.source_url.cmp(&b.source_url));
        Ok(serde_json::to_vec_pretty(&rows)?)
    }

    pub async fn len(&self) -> usize {
        self.products.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.products.lock().await.is_empty()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn find_by_source_url(&self, source_url: &str) -> Result<Option<NormalizedProduct>> {
        Ok(self.products.lock().await.get(source_url).cloned())
    }

    async fn insert(&self, product: &NormalizedProduct) -> Result<()> {
        let mut products = self.products.lock().await;
        if products.contains_key(&product.source_url) {
            return Err(EtlError::store(format!(
                "duplicate source_url: {}",
                product.source_url
            )));
        }
        products.insert(product.source_url.clone(), product.clone());
        Ok(())
    }

    async fn update_price(
        &self,
        source_url: &str,
        price: Decimal,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut products = self.products.lock().await;
        let existing = products
            .get_mut(source_url)
            .ok_or_else(|| EtlError::store(format!("no product with source_url {}", source_url)))?;
        existing.price = price;
        existing.updated_at = updated_at;
        Ok(())
    }

    async fn upsert(&self, product: &NormalizedProduct) -> Result<UpsertOutcome> {
        let mut products = self.products.lock().await;
        match products.get_mut(&product.source_url) {
            Some(existing) => {
                existing.price = product.price;
                existing.updated_at = product.updated_at;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                products.insert(product.source_url.clone(), product.clone());
                Ok(UpsertOutcome::Inserted)
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemorySyncLog {
    entries: Arc<Mutex<Vec<SyncLogEntry>>>,
}

impl InMemorySyncLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(data: &[u8]) -> Result<Self> {
        let entries: Vec<SyncLogEntry> = serde_json::from_slice(data)?;
        Ok(Self {
            entries: Arc::new(Mutex::new(entries)),
        })
    }

    pub async fn snapshot(&self) -> Result<Vec<u8>> {
        let entries = self.entries.lock().await;
        Ok(serde_json::to_vec_pretty(&*entries)?)
    }

    pub async fn all(&self) -> Vec<SyncLogEntry> {
        self.entries.lock().await.clone()
    }

    /// Inserts an entry as is; used to seed state left by an earlier process.
    pub async fn push(&self, entry: SyncLogEntry) {
        self.entries.lock().await.push(entry);
    }
}

#[async_trait]
impl SyncLogStore for InMemorySyncLog {
    async fn fail_running(&self, platform: &str, message: &str) -> Result<usize> {
        let mut entries = self.entries.lock().await;
        let mut moved = 0;
        for entry in entries
            .iter_mut()
            .filter(|e| e.platform == platform && e.status == SyncStatus::Running)
        {
            entry.status = SyncStatus::Error;
            entry.error_message = Some(message.to_string());
            moved += 1;
        }
        Ok(moved)
    }

    async fn start(&self, platform: &str) -> Result<SyncLogEntry> {
        let mut entries = self.entries.lock().await;
        if entries
            .iter()
            .any(|e| e.platform == platform && e.status == SyncStatus::Running)
        {
            return Err(EtlError::store(format!(
                "platform {} already has a running sync log",
                platform
            )));
        }
        let entry = SyncLogEntry::running(platform);
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn record_progress(&self, id: Uuid, items_found: u64, items_added: u64) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries
            .iter_mut()
            .find(|e| e.id == id && e.status == SyncStatus::Running)
        {
            entry.items_found = items_found;
            entry.items_added = items_added;
        }
        Ok(())
    }

    async fn finish(
        &self,
        id: Uuid,
        status: SyncStatus,
        items_found: u64,
        items_added: u64,
        error_message: Option<String>,
    ) -> Result<()> {
        if !status.is_terminal() {
            return Err(EtlError::store("a sync log can only finish in a terminal status"));
        }
        let mut entries = self.entries.lock().await;
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| EtlError::store(format!("unknown sync log {}", id)))?;
        entry.status = status;
        entry.items_found = items_found;
        entry.items_added = items_added;
        entry.error_message = error_message;
        Ok(())
    }

    async fn entries_for(&self, platform: &str) -> Result<Vec<SyncLogEntry>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .iter()
            .filter(|e| e.platform == platform)
            .cloned()
            .collect())
    }
}
