pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::SyncConfig;

pub use adapters::storage::{LocalStorage, SnapshotStore};
pub use core::{
    archive::ArchiveStreamProcessor, ingest::IngestService, orchestrator::SyncOrchestrator,
    trust::TrustEngine,
};
pub use utils::error::{EtlError, Result};
