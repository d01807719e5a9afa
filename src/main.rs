use anyhow::Context;
use catalog_feed_etl::adapters::server::{self, AppState};
use catalog_feed_etl::app::App;
use catalog_feed_etl::config::{CliConfig, Command, SyncConfig};
use catalog_feed_etl::core::orchestrator::{PartnerReport, RunOutcome};
use catalog_feed_etl::utils::error::{EtlError, ErrorSeverity};
use catalog_feed_etl::utils::monitor::SystemMonitor;
use catalog_feed_etl::utils::{logger, validation::Validate};
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 伺服器模式輸出 JSON 日誌
    match cli.command {
        Command::Serve => logger::init_server_logger(cli.verbose),
        Command::Sync { .. } => logger::init_cli_logger(cli.verbose),
    }
    tracing::info!("Starting catalog-feed-etl");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let result = run(cli).await;
    if let Err(e) = &result {
        let code = report_failure(e);
        if code > 0 {
            std::process::exit(code);
        }
    }
    Ok(())
}

async fn run(cli: CliConfig) -> anyhow::Result<()> {
    let config = SyncConfig::from_file(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    config.validate().context("validating configuration")?;

    let monitor = Arc::new(SystemMonitor::new(cli.monitor));
    if monitor.is_enabled() {
        tracing::info!("🔍 System monitoring enabled");
    }

    let app = App::from_config(&config, monitor.clone())
        .await
        .context("initialising services")?;

    match cli.command {
        Command::Sync { partners, dry_run } if dry_run => {
            let plan = app.orchestrator.plan(&partners).await?;
            for item in plan {
                match item.feed {
                    Some(feed) => println!(
                        "{:<32} feed {:<10} {:<40} {:>9} items",
                        item.platform, feed.id, feed.name, feed.item_count
                    ),
                    None => println!("{:<32} (no active feed)", item.platform),
                }
            }
        }
        Command::Sync { partners, .. } => {
            let reports = app.orchestrator.run_all(&partners).await?;
            app.snapshots
                .save()
                .await
                .context("writing catalog snapshots")?;
            print_summary(&reports);
            monitor.log_stats("sync complete");
        }
        Command::Serve => {
            config.validate_server().context("validating [server] section")?;
            let state = AppState::new(app.ingest, app.orchestrator, config.server_settings())
                .with_snapshots(app.snapshots);
            server::serve(&config.server.bind, state).await?;
        }
    }
    Ok(())
}

fn print_summary(reports: &[PartnerReport]) {
    for report in reports {
        match &report.outcome {
            RunOutcome::Completed(stats) => println!(
                "✅ {:<32} processed {:>8}  added {:>8}  skipped {:>8}  errors {:>6}",
                report.platform, stats.processed, stats.added, stats.skipped, stats.errors
            ),
            RunOutcome::NoActiveFeed => println!("⏭️  {:<32} no active feed", report.platform),
            RunOutcome::Failed { status, message } => {
                println!("❌ {:<32} {}: {}", report.platform, status, message)
            }
        }
    }
}

/// Logs the failure and returns the exit code for its severity.
fn report_failure(err: &anyhow::Error) -> i32 {
    let Some(e) = err.chain().find_map(|c| c.downcast_ref::<EtlError>()) else {
        tracing::error!("❌ {:#}", err);
        eprintln!("❌ {:#}", err);
        return 1;
    };

    tracing::error!(
        "❌ {:#} (Category: {:?}, Severity: {:?})",
        err,
        e.category(),
        e.severity()
    );
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}
