use clap::Parser;
use catalog_feed_etl::adapters::http::HttpPartnerApi;
use catalog_feed_etl::config::SyncConfig;
use catalog_feed_etl::core::archive::redact_url;
use catalog_feed_etl::core::feed_locator::{parse_feed_catalog, select_feed};
use catalog_feed_etl::domain::ports::PartnerApi;
use catalog_feed_etl::utils::{logger, validation::Validate};

#[derive(Parser)]
#[command(name = "inspect-feeds")]
#[command(about = "List every feed of the joined partners and mark the one a sync would pick")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "feed-sync.toml")]
    config: String,

    /// Only show this partner (name or id)
    #[arg(short, long)]
    partner: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let config = SyncConfig::from_file(&args.config)?;
    config.validate()?;
    let api = HttpPartnerApi::new(config.partner_api_settings())?;

    let partners = api.joined_partners().await?;
    let feeds = parse_feed_catalog(&api.feed_catalog().await?)?;
    println!("🔎 {} joined partners, {} feeds listed", partners.len(), feeds.len());

    for partner in &partners {
        if let Some(wanted) = &args.partner {
            if !wanted.eq_ignore_ascii_case(&partner.name) && *wanted != partner.id {
                continue;
            }
        }

        println!("\n{} (id {})", partner.name, partner.id);
        let selected = select_feed(&feeds, &partner.feed_api_identifier).map(|f| f.id.clone());
        let mut listed = 0;
        for feed in feeds.iter().filter(|f| f.partner_id == partner.feed_api_identifier) {
            listed += 1;
            let marker = if selected.as_deref() == Some(feed.id.as_str()) {
                "→"
            } else {
                " "
            };
            println!(
                "  {} {:<10} {:<40} {:<8} {:>9} items",
                marker,
                feed.id,
                feed.name,
                format!("{:?}", feed.status),
                feed.item_count
            );
        }
        if listed == 0 {
            println!("  (no feeds listed)");
        }
        if let Some(feed_id) = selected {
            println!("  download: {}", redact_url(&api.feed_archive_url(&feed_id)?));
        }
    }
    Ok(())
}
