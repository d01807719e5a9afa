use crate::adapters::memory::{InMemoryCatalog, InMemorySyncLog};
use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Snapshot file names under the storage root.
pub const CATALOG_SNAPSHOT: &str = "catalog.json";
pub const SYNC_LOG_SNAPSHOT: &str = "sync_logs.json";

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.full_path(path)).await?)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // 先寫暫存檔再改名，避免中斷時留下半個快照
        let staging = full_path.with_extension("tmp");
        tokio::fs::write(&staging, data).await?;
        tokio::fs::rename(&staging, &full_path).await?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> bool {
        tokio::fs::try_exists(self.full_path(path))
            .await
            .unwrap_or(false)
    }
}

/// In-memory stores backed by JSON snapshots on local storage.
pub struct SnapshotStore {
    storage: LocalStorage,
    catalog: Arc<InMemoryCatalog>,
    logs: Arc<InMemorySyncLog>,
}

impl SnapshotStore {
    /// Loads existing snapshots; missing files start empty.
    pub async fn open(storage: LocalStorage) -> Result<Self> {
        let catalog = if storage.exists(CATALOG_SNAPSHOT).await {
            InMemoryCatalog::from_snapshot(&storage.read_file(CATALOG_SNAPSHOT).await?)?
        } else {
            InMemoryCatalog::new()
        };
        let logs = if storage.exists(SYNC_LOG_SNAPSHOT).await {
            InMemorySyncLog::from_snapshot(&storage.read_file(SYNC_LOG_SNAPSHOT).await?)?
        } else {
            InMemorySyncLog::new()
        };
        tracing::debug!(
            "Loaded {} catalog rows from {:?}",
            catalog.len().await,
            storage.base_path
        );

        Ok(Self {
            storage,
            catalog: Arc::new(catalog),
            logs: Arc::new(logs),
        })
    }

    pub fn catalog(&self) -> Arc<InMemoryCatalog> {
        Arc::clone(&self.catalog)
    }

    pub fn logs(&self) -> Arc<InMemorySyncLog> {
        Arc::clone(&self.logs)
    }

    pub async fn save(&self) -> Result<()> {
        self.storage
            .write_file(CATALOG_SNAPSHOT, &self.catalog.snapshot().await?)
            .await?;
        self.storage
            .write_file(SYNC_LOG_SNAPSHOT, &self.logs.snapshot().await?)
            .await?;
        tracing::info!("💾 Snapshots written to {:?}", self.storage.base_path);
        Ok(())
    }
}
