mod common;

use catalog_feed_etl::adapters::memory::{InMemoryCatalog, InMemorySyncLog};
use catalog_feed_etl::core::archive::ArchiveSettings;
use catalog_feed_etl::core::orchestrator::{
    OrchestratorSettings, RunOutcome, SyncOrchestrator, STALE_RUN_MESSAGE,
};
use catalog_feed_etl::domain::model::{SyncLogEntry, SyncStatus};
use catalog_feed_etl::domain::ports::SyncLogStore;
use catalog_feed_etl::utils::error::EtlError;
use common::*;
use httpmock::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const FEED_CATALOG: &str = "\
Advertiser ID,Advertiser Name,Membership Status,Feed ID,Feed Name,No of products
101,Fnac,active,9001,Fnac Libros,52000
101,Fnac,active,9002,Fnac General,12000
202,Decathlon,active,9100,Running,3000
303,Zara,inactive,9200,Default,1000
";

struct Harness {
    server: MockServer,
    temp: TempDir,
    catalog: Arc<InMemoryCatalog>,
    logs: Arc<InMemorySyncLog>,
}

impl Harness {
    async fn new() -> Self {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/programmes")
                    .query_param("relationship", "joined")
                    .header("authorization", "Bearer test-token");
                then.status(200).json_body(serde_json::json!([
                    {"id": 101, "name": "Fnac"},
                    {"id": 202, "name": "Decathlon"},
                    {"id": 303, "name": "Zara"}
                ]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/datafeed/list")
                    .query_param("apikey", "test-key");
                then.status(200).body(FEED_CATALOG);
            })
            .await;

        Self {
            server,
            temp: TempDir::new().unwrap(),
            catalog: Arc::new(InMemoryCatalog::new()),
            logs: Arc::new(InMemorySyncLog::new()),
        }
    }

    async fn feed(&self, feed_id: &str, status: u16, body: Vec<u8>) {
        let feed_id = feed_id.to_string();
        self.server
            .mock_async(move |when, then| {
                when.method(GET)
                    .path("/datafeed/download")
                    .query_param("fid", feed_id)
                    .query_param("format", "csv")
                    .query_param("compression", "zip");
                then.status(status).body(body);
            })
            .await;
    }

    fn orchestrator(&self, partner_delay: Duration) -> SyncOrchestrator {
        SyncOrchestrator::new(
            partner_api(&self.server.base_url()),
            self.catalog.clone(),
            self.logs.clone(),
            trust_engine(),
            ArchiveSettings {
                temp_dir: Some(self.temp.path().to_path_buf()),
                download_timeout: Duration::from_millis(500),
                ..ArchiveSettings::default()
            },
            OrchestratorSettings {
                platform_prefix: "awin".to_string(),
                partner_delay,
                only_partners: Vec::new(),
            },
        )
    }
}

fn fnac_feed() -> Vec<u8> {
    feed_zip(&[
        row("https://fnac.example/dune", "Dune", "9.99", "Libros > Ciencia ficción"),
        row("https://fnac.example/kindle", "Kindle Paperwhite", "149", "Electrónica > Lectores"),
    ])
}

fn decathlon_feed() -> Vec<u8> {
    feed_zip(&[
        row("https://decathlon.example/bici", "Bicicleta de montaña", "399", "Deportes > Ciclismo"),
        row("https://decathlon.example/esterilla", "Esterilla yoga", "12", "Deportes > Fitness"),
        row("https://decathlon.example/busco", "Busco bicicleta usada", "50", "Deportes"),
    ])
}

#[tokio::test]
async fn test_stale_running_log_is_failed_before_new_run() {
    let h = Harness::new().await;
    h.feed("9002", 200, fnac_feed()).await;

    let stale = SyncLogEntry::running("awin-Fnac");
    h.logs.push(stale.clone()).await;

    let reports = h
        .orchestrator(Duration::ZERO)
        .run_all(&["Fnac".to_string()])
        .await
        .unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].feed_id.as_deref(), Some("9002"));

    let entries = h.logs.entries_for("awin-Fnac").await.unwrap();
    assert_eq!(entries.len(), 2);

    let old = entries.iter().find(|e| e.id == stale.id).unwrap();
    assert_eq!(old.status, SyncStatus::Error);
    assert_eq!(old.error_message.as_deref(), Some(STALE_RUN_MESSAGE));

    let new = entries.iter().find(|e| e.id != stale.id).unwrap();
    assert_eq!(new.status, SyncStatus::Success);
    assert_eq!(new.items_found, 2);
    assert_eq!(new.items_added, 2);
    assert!(entries.iter().all(|e| e.status != SyncStatus::Running));
}

#[tokio::test]
async fn test_failing_partner_does_not_stop_the_next() {
    let h = Harness::new().await;
    h.feed("9002", 500, b"internal error".to_vec()).await;
    h.feed("9100", 200, decathlon_feed()).await;

    let reports = h.orchestrator(Duration::ZERO).run_all(&[]).await.unwrap();
    assert_eq!(reports.len(), 3);

    match &reports[0].outcome {
        RunOutcome::Failed { status, message } => {
            assert_eq!(*status, SyncStatus::Error);
            assert!(message.contains("500"));
            assert!(!message.contains("test-key"));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    match &reports[1].outcome {
        RunOutcome::Completed(stats) => {
            assert_eq!(stats.processed, 3);
            assert_eq!(stats.added, 2);
            assert_eq!(stats.skipped, 1);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(reports[2].outcome, RunOutcome::NoActiveFeed);

    let fnac = h.logs.entries_for("awin-Fnac").await.unwrap();
    assert_eq!(fnac.len(), 1);
    assert_eq!(fnac[0].status, SyncStatus::Error);
    assert!(fnac[0].error_message.is_some());

    let decathlon = h.logs.entries_for("awin-Decathlon").await.unwrap();
    assert_eq!(decathlon[0].status, SyncStatus::Success);

    // No feed, no log entry.
    assert!(h.logs.entries_for("awin-Zara").await.unwrap().is_empty());
    assert_eq!(h.catalog.len().await, 2);
    assert!(temp_dir_is_empty(h.temp.path()));
}

#[tokio::test]
async fn test_rate_limit_and_timeout_statuses() {
    let h = Harness::new().await;
    h.feed("9002", 429, Vec::new()).await;
    h.server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/datafeed/download")
                .query_param("fid", "9100");
            then.status(200).delay(Duration::from_secs(3)).body("late");
        })
        .await;

    let reports = h.orchestrator(Duration::ZERO).run_all(&[]).await.unwrap();

    let statuses: Vec<Option<SyncStatus>> = reports
        .iter()
        .map(|r| match &r.outcome {
            RunOutcome::Failed { status, .. } => Some(*status),
            _ => None,
        })
        .collect();
    assert_eq!(
        statuses,
        vec![Some(SyncStatus::Banned), Some(SyncStatus::Timeout), None]
    );

    let decathlon = h.logs.entries_for("awin-Decathlon").await.unwrap();
    assert_eq!(decathlon[0].status, SyncStatus::Timeout);
}

#[tokio::test]
async fn test_rerun_does_not_duplicate_catalog_rows() {
    let h = Harness::new().await;
    h.feed("9002", 200, fnac_feed()).await;
    let orchestrator = h.orchestrator(Duration::ZERO);

    orchestrator.run_all(&["Fnac".to_string()]).await.unwrap();
    orchestrator.run_all(&["fnac".to_string()]).await.unwrap();

    assert_eq!(h.catalog.len().await, 2);
    let entries = h.logs.entries_for("awin-Fnac").await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.status == SyncStatus::Success));
}

#[tokio::test]
async fn test_partners_run_sequentially_with_delay() {
    let h = Harness::new().await;
    h.feed("9002", 200, fnac_feed()).await;
    h.feed("9100", 200, decathlon_feed()).await;

    let started = Instant::now();
    let reports = h
        .orchestrator(Duration::from_millis(200))
        .run_all(&[])
        .await
        .unwrap();

    assert_eq!(reports.len(), 3);
    // two gaps between three partners
    assert!(started.elapsed() >= Duration::from_millis(400));
}

#[tokio::test]
async fn test_plan_does_not_download() {
    let h = Harness::new().await;
    let download = h
        .server
        .mock_async(|when, then| {
            when.method(GET).path("/datafeed/download");
            then.status(200);
        })
        .await;

    let plan = h.orchestrator(Duration::ZERO).plan(&[]).await.unwrap();
    assert_eq!(plan.len(), 3);
    assert_eq!(plan[0].platform, "awin-Fnac");
    assert_eq!(plan[0].feed.as_ref().map(|f| f.id.as_str()), Some("9002"));
    assert_eq!(plan[1].feed.as_ref().map(|f| f.id.as_str()), Some("9100"));
    assert!(plan[2].feed.is_none());
    download.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_partner_list_failure_is_returned() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/programmes");
            then.status(401);
        })
        .await;
    let temp = TempDir::new().unwrap();

    let orchestrator = SyncOrchestrator::new(
        partner_api(&server.base_url()),
        Arc::new(InMemoryCatalog::new()),
        Arc::new(InMemorySyncLog::new()),
        trust_engine(),
        ArchiveSettings {
            temp_dir: Some(temp.path().to_path_buf()),
            ..ArchiveSettings::default()
        },
        OrchestratorSettings::default(),
    );

    let err = orchestrator.run_all(&[]).await.unwrap_err();
    assert!(matches!(err, EtlError::HttpStatus { status: 401, .. }));
}
