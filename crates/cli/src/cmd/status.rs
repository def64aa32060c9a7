//! Implementation of the `atomupd status` command.
//!
//! Builds the catalog from the configured pool and prints a per-track
//! summary plus every ingestion diagnostic, so an operator can see at a
//! glance what the server would offer and what it refused.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;

use atomupd_lib::catalog::Catalog;
use atomupd_lib::config::ServerConfig;
use atomupd_lib::scan::{scan_pool, CancelToken};

use crate::output::{track_stat, warn_file};

#[derive(Debug, Serialize)]
struct TrackSummary {
  track: String,
  images: usize,
  proposable: usize,
  skipped: usize,
  checkpoints: Vec<u32>,
}

#[derive(Debug, Serialize)]
struct StatusSummary {
  tracks: Vec<TrackSummary>,
  remote_info_files: usize,
  diagnostics: Vec<String>,
}

/// Execute the status command.
///
/// # Errors
///
/// Returns an error when the configuration is unusable or the pool root
/// cannot be scanned; individual broken manifests only show up as
/// diagnostics.
pub fn cmd_status(config_path: &Path, json: bool) -> Result<()> {
  let config = ServerConfig::load(config_path).context("Failed to load configuration")?;
  let outcome =
    scan_pool(&config.pool_dir, &CancelToken::new()).context("Failed to scan image pool")?;
  let remote_info_files = outcome.remote_info.len();
  let catalog = Catalog::build(&config, outcome);

  let summary = StatusSummary {
    tracks: catalog
      .tracks()
      .map(|track| TrackSummary {
        track: track.key.to_string(),
        images: track.images.len(),
        proposable: track.images.iter().filter(|i| i.is_proposable()).count(),
        skipped: track.images.iter().filter(|i| i.manifest.skip).count(),
        checkpoints: track.canonical_levels().into_iter().collect(),
      })
      .collect(),
    remote_info_files,
    diagnostics: catalog
      .diagnostics()
      .iter()
      .map(|d| format!("{}: {}", d.path.display(), d.reason))
      .collect(),
  };

  if json {
    let rendered =
      serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?;
    println!("{}", rendered);
    return Ok(());
  }

  if summary.tracks.is_empty() {
    println!("No tracks in the catalog.");
  } else {
    println!("Tracks:");
    for track in &summary.tracks {
      println!("  • {}", track.track.cyan());
      track_stat("images", track.images);
      track_stat("proposable", track.proposable);
      if track.skipped > 0 {
        track_stat("skipped", track.skipped);
      }
      if !track.checkpoints.is_empty() {
        let levels: Vec<String> = track.checkpoints.iter().map(u32::to_string).collect();
        track_stat("checkpoints", levels.join(", "));
      }
    }
  }

  if summary.remote_info_files > 0 {
    println!();
    println!(
      "  • remote-info.conf files in the pool: {}",
      summary.remote_info_files
    );
  }

  if !catalog.diagnostics().is_empty() {
    println!();
    for diagnostic in catalog.diagnostics() {
      warn_file(&diagnostic.path, &diagnostic.reason);
    }
  }

  Ok(())
}
