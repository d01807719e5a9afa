use crate::core::archive::{ArchiveSettings, ArchiveStreamProcessor, FeedJob};
use crate::core::feed_locator::FeedLocator;
use crate::core::trust::TrustEngine;
use crate::domain::model::{Feed, Partner, ProcessStats, SyncStatus};
use crate::domain::ports::{CatalogStore, PartnerApi, SyncLogStore};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

pub const STALE_RUN_MESSAGE: &str = "interrupted by new sync or timeout";

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub platform_prefix: String,
    pub partner_delay: Duration,
    /// Partner names (or ids) to sync; empty means every joined partner.
    pub only_partners: Vec<String>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            platform_prefix: "awin".to_string(),
            partner_delay: Duration::from_millis(2000),
            only_partners: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    NoActiveFeed,
    Completed(ProcessStats),
    Failed { status: SyncStatus, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct PartnerReport {
    pub partner: Partner,
    pub platform: String,
    pub feed_id: Option<String>,
    pub outcome: RunOutcome,
}

/// What a run would do, without downloading anything.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedSync {
    pub partner: Partner,
    pub platform: String,
    pub feed: Option<Feed>,
}

pub fn platform_key(prefix: &str, partner: &Partner) -> String {
    format!("{}-{}", prefix, partner.name)
}

fn wanted(partner: &Partner, only: &[String]) -> bool {
    only.is_empty()
        || only
            .iter()
            .any(|o| o.eq_ignore_ascii_case(&partner.name) || *o == partner.id)
}

pub struct SyncOrchestrator {
    api: Arc<dyn PartnerApi>,
    logs: Arc<dyn SyncLogStore>,
    locator: FeedLocator,
    processor: ArchiveStreamProcessor,
    settings: OrchestratorSettings,
    monitor: Arc<SystemMonitor>,
}

impl SyncOrchestrator {
    pub fn new(
        api: Arc<dyn PartnerApi>,
        catalog: Arc<dyn CatalogStore>,
        logs: Arc<dyn SyncLogStore>,
        trust: Arc<TrustEngine>,
        archive: ArchiveSettings,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            locator: FeedLocator::new(api.clone()),
            processor: ArchiveStreamProcessor::new(archive, catalog, logs.clone(), trust),
            api,
            logs,
            settings,
            monitor: Arc::new(SystemMonitor::default()),
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<SystemMonitor>) -> Self {
        self.processor = self.processor.with_monitor(monitor.clone());
        self.monitor = monitor;
        self
    }

    async fn selected_partners(&self, only: &[String]) -> Result<Vec<Partner>> {
        let filter = if only.is_empty() {
            &self.settings.only_partners[..]
        } else {
            only
        };
        let partners = self.api.joined_partners().await?;
        let total = partners.len();
        let selected: Vec<Partner> = partners.into_iter().filter(|p| wanted(p, filter)).collect();
        tracing::info!("🤝 {} joined partners, {} selected", total, selected.len());
        Ok(selected)
    }

    /// Syncs every selected partner one after another. Only a failure to list
    /// the partners is returned as an error; partner failures end up in the
    /// reports.
    pub async fn run_all(&self, only: &[String]) -> Result<Vec<PartnerReport>> {
        let partners = self.selected_partners(only).await?;
        let mut reports = Vec::with_capacity(partners.len());

        for (index, partner) in partners.into_iter().enumerate() {
            if index > 0 && !self.settings.partner_delay.is_zero() {
                tokio::time::sleep(self.settings.partner_delay).await;
            }
            let platform = platform_key(&self.settings.platform_prefix, &partner);
            let span = tracing::info_span!("partner", name = %partner.name, platform = %platform);
            let report = self.run_partner(partner, platform).instrument(span).await;
            reports.push(report);
        }

        let completed = reports
            .iter()
            .filter(|r| matches!(r.outcome, RunOutcome::Completed(_)))
            .count();
        tracing::info!("✅ Sync finished: {}/{} partners completed", completed, reports.len());
        Ok(reports)
    }

    async fn run_partner(&self, partner: Partner, platform: String) -> PartnerReport {
        let mut report = PartnerReport {
            partner,
            platform,
            feed_id: None,
            outcome: RunOutcome::NoActiveFeed,
        };

        match self.logs.fail_running(&report.platform, STALE_RUN_MESSAGE).await {
            Ok(0) => {}
            Ok(n) => tracing::warn!("⚠️ Marked {} stale running sync log(s) as error", n),
            Err(e) => {
                tracing::error!("❌ Stale sync log cleanup failed: {}", e);
                report.outcome = RunOutcome::Failed {
                    status: e.sync_status(),
                    message: e.to_string(),
                };
                return report;
            }
        }

        let Some(feed) = self.locator.locate(&report.partner.feed_api_identifier).await else {
            tracing::warn!("⚠️ Skipping {}: no active feed", report.partner.name);
            return report;
        };
        report.feed_id = Some(feed.id.clone());

        let entry = match self.logs.start(&report.platform).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::error!("❌ Could not open sync log: {}", e);
                report.outcome = RunOutcome::Failed {
                    status: e.sync_status(),
                    message: e.to_string(),
                };
                return report;
            }
        };
        tracing::info!(
            "🚀 Syncing feed {} ('{}', ~{} items), log {}",
            feed.id,
            feed.name,
            feed.item_count,
            entry.id
        );

        let result = match self.api.feed_archive_url(&feed.id) {
            Ok(feed_url) => {
                let job = FeedJob {
                    feed_url,
                    partner_id: report.partner.id.clone(),
                    partner_name: report.partner.name.clone(),
                    platform: report.platform.clone(),
                    log_id: entry.id,
                };
                self.processor.process_feed(&job).await
            }
            Err(e) => Err(e),
        };

        report.outcome = match result {
            Ok(stats) => {
                self.finalize(entry.id, SyncStatus::Success, stats.processed, stats.added, None)
                    .await;
                RunOutcome::Completed(stats)
            }
            Err(e) => {
                let status = e.sync_status();
                let message = e.to_string();
                tracing::error!("❌ {} sync failed ({}): {}", report.partner.name, status, message);
                let (found, added) = self.last_progress(&report.platform, entry.id).await;
                self.finalize(entry.id, status, found, added, Some(message.clone()))
                    .await;
                RunOutcome::Failed { status, message }
            }
        };

        self.monitor
            .log_stats(&format!("partner {} done", report.partner.name));
        report
    }

    async fn last_progress(&self, platform: &str, id: Uuid) -> (u64, u64) {
        self.logs
            .entries_for(platform)
            .await
            .ok()
            .and_then(|entries| entries.into_iter().find(|e| e.id == id))
            .map(|e| (e.items_found, e.items_added))
            .unwrap_or((0, 0))
    }

    async fn finalize(
        &self,
        id: Uuid,
        status: SyncStatus,
        found: u64,
        added: u64,
        message: Option<String>,
    ) {
        if let Err(e) = self.logs.finish(id, status, found, added, message).await {
            tracing::error!("❌ Could not finalize sync log {}: {}", id, e);
        }
    }

    /// Dry run: joined partners and the feed each would sync.
    pub async fn plan(&self, only: &[String]) -> Result<Vec<PlannedSync>> {
        let partners = self.selected_partners(only).await?;
        let mut plan = Vec::with_capacity(partners.len());
        for partner in partners {
            let feed = self.locator.locate(&partner.feed_api_identifier).await;
            plan.push(PlannedSync {
                platform: platform_key(&self.settings.platform_prefix, &partner),
                partner,
                feed,
            });
        }
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partner(id: &str, name: &str) -> Partner {
        Partner {
            id: id.to_string(),
            name: name.to_string(),
            feed_api_identifier: id.to_string(),
        }
    }

    #[test]
    fn test_platform_key() {
        assert_eq!(platform_key("awin", &partner("1", "Fnac")), "awin-Fnac");
    }

    #[test]
    fn test_partner_filter() {
        let fnac = partner("101", "Fnac");
        assert!(wanted(&fnac, &[]));
        assert!(wanted(&fnac, &["fnac".to_string()]));
        assert!(wanted(&fnac, &["101".to_string()]));
        assert!(!wanted(&fnac, &["Zara".to_string()]));
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let json = serde_json::to_value(RunOutcome::Failed {
            status: SyncStatus::Timeout,
            message: "archive download timed out after 300s".to_string(),
        })
        .unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["status"], "timeout");
    }
}
