//! Command-line surface for the inventory synchroniser.
//!
//! All pipeline logic lives in `pocket-inventory-core`; this module only
//! parses arguments, loads the config, wires the GitHub, image and post
//! collaborators together and reports the outcome.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pocket_inventory_core::assets::PngExporter;
use pocket_inventory_core::download::GithubArchiveDownloader;
use pocket_inventory_core::github::{GithubClient, GithubConfig};
use pocket_inventory_core::posts::JekyllPostWriter;
use pocket_inventory_core::sponsor::SponsorRules;
use pocket_inventory_core::synchronise::{self, SyncReport, Synchroniser};

use crate::load_config::load_config;

/// Keep an Analogue Pocket core inventory in sync with its source repositories.
#[derive(Parser)]
#[clap(
    name = "pocket-inventory",
    version,
    about = "Download Analogue Pocket core repositories and regenerate the site inventory"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synchronise every listed repository into the inventory, cache and posts
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync { config } => {
            let config = load_config(config)?;
            tracing::info!(command = "sync", "Starting synchronisation process");

            let github = GithubConfig::from_env(config.http_timeout());
            let acquirer = GithubArchiveDownloader::new(github.clone())?;
            let metadata = GithubClient::new(github)?;
            let exporter = PngExporter::new(config.icons_path(), config.platforms_path());
            let posts = JekyllPostWriter::new(config.posts_path());
            let sponsor = SponsorRules::new(config.sponsor_rules.clone());

            let synchroniser = Synchroniser {
                acquirer: &acquirer,
                metadata: &metadata,
                exporter: &exporter,
                posts: &posts,
                sponsor: &sponsor,
            };

            match synchronise::run(&config, &synchroniser).await {
                Ok(report) => {
                    tracing::info!(command = "sync", ?report, "Synchronisation complete");
                    println!("{}", summary(&report));
                    for failed in &report.repositories_failed {
                        println!("  failed: {} ({})", failed.repository, failed.error);
                    }
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "sync", error = %e, "Synchronisation failed");
                    Err(e.into())
                }
            }
        }
    }
}

fn summary(report: &SyncReport) -> String {
    format!(
        "Synchronised {} repositories ({} failed): {} new, {} updated, {} unchanged, {} skipped, {} failed cores",
        report.repositories_processed,
        report.repositories_failed.len(),
        report.cores_new,
        report.cores_updated,
        report.cores_unchanged,
        report.cores_skipped,
        report.cores_failed,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_every_counter() {
        let report = SyncReport {
            repositories_processed: 3,
            cores_new: 1,
            cores_updated: 2,
            cores_unchanged: 4,
            ..SyncReport::default()
        };
        let line = summary(&report);
        assert!(line.starts_with("Synchronised 3 repositories (0 failed)"));
        assert!(line.contains("1 new, 2 updated, 4 unchanged"));
    }

    #[test]
    fn parses_sync_subcommand() {
        let cli = Cli::try_parse_from(["pocket-inventory", "sync", "--config", "site.yml"]).unwrap();
        match cli.command {
            Commands::Sync { config } => assert_eq!(config, PathBuf::from("site.yml")),
        }
    }
}
