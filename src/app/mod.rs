//! Wiring: builds the services from a validated configuration.

use crate::adapters::http::HttpPartnerApi;
use crate::adapters::storage::{LocalStorage, SnapshotStore};
use crate::config::SyncConfig;
use crate::core::ingest::IngestService;
use crate::core::orchestrator::SyncOrchestrator;
use crate::core::trust::TrustEngine;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use std::sync::Arc;

/// Platform recorded for batch submissions that do not name one.
pub const SUBMISSION_PLATFORM: &str = "api";

pub struct App {
    pub orchestrator: Arc<SyncOrchestrator>,
    pub ingest: Arc<IngestService>,
    pub snapshots: Arc<SnapshotStore>,
}

impl App {
    pub async fn from_config(config: &SyncConfig, monitor: Arc<SystemMonitor>) -> Result<Self> {
        let snapshots = Arc::new(
            SnapshotStore::open(LocalStorage::new(&config.storage.output_path)).await?,
        );
        let trust = Arc::new(TrustEngine::new(config.trust_settings()?));
        tracing::debug!(
            "Trust: price band ±{}, noise below {}, {} category medians",
            trust.settings().price_band,
            trust.settings().noise_price_threshold,
            trust.settings().category_medians.len()
        );
        let api = Arc::new(HttpPartnerApi::new(config.partner_api_settings())?);

        let orchestrator = SyncOrchestrator::new(
            api,
            snapshots.catalog(),
            snapshots.logs(),
            trust.clone(),
            config.archive_settings(),
            config.orchestrator_settings(),
        )
        .with_monitor(monitor);
        let ingest = IngestService::new(snapshots.catalog(), trust, SUBMISSION_PLATFORM);

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            ingest: Arc::new(ingest),
            snapshots,
        })
    }
}
