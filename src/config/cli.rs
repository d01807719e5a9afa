use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::toml_config::DEFAULT_CONFIG_PATH;

#[derive(Debug, Clone, Parser)]
#[command(name = "catalog-feed-etl")]
#[command(about = "Affiliate feed ingestion with trust filtering and price scoring")]
#[command(version)]
pub struct CliConfig {
    /// TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU/memory usage at checkpoints")]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Sync joined partners' feeds into the catalog
    Sync {
        /// Only sync these partners (name or id); repeatable
        #[arg(short, long = "partner", value_name = "NAME")]
        partners: Vec<String>,

        /// List partners and the feed that would be synced, without downloading
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the HTTP server (batch ingest + scheduled sync trigger)
    Serve,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sync_with_partners() {
        let cli = CliConfig::try_parse_from([
            "catalog-feed-etl",
            "--config",
            "custom.toml",
            "-v",
            "sync",
            "--partner",
            "Fnac",
            "-p",
            "Zara",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        assert!(cli.verbose);
        assert!(!cli.monitor);
        match cli.command {
            Command::Sync { partners, dry_run } => {
                assert_eq!(partners, vec!["Fnac", "Zara"]);
                assert!(dry_run);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_default_config_path() {
        let cli = CliConfig::try_parse_from(["catalog-feed-etl", "serve"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(matches!(cli.command, Command::Serve));
    }
}
