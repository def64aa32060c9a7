//! Implementation of the `atomupd export` command.
//!
//! Runs the static exporter: scans the pool, builds the catalog, and
//! writes the full answer tree under the output directory.

use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Context, Result};

use atomupd_lib::catalog::Catalog;
use atomupd_lib::config::ServerConfig;
use atomupd_lib::export::export_pool;
use atomupd_lib::scan::CancelToken;

use crate::output::{export_summary, fail_file, warn_file};

/// Execute the export command.
///
/// # Errors
///
/// Returns an error when the configuration is unusable, the pool cannot be
/// scanned, or any exported file failed its atomic rename.
pub fn cmd_export(config_path: &Path, output: &Path) -> Result<()> {
  let start = Instant::now();

  let config = ServerConfig::load(config_path).context("Failed to load configuration")?;
  let catalog =
    Catalog::from_pool(&config, &CancelToken::new()).context("Failed to scan image pool")?;

  for diagnostic in catalog.diagnostics() {
    warn_file(&diagnostic.path, &diagnostic.reason);
  }

  let report = export_pool(&catalog, &config, output).context("Failed to export answer tree")?;

  for failure in &report.failed {
    fail_file(&failure.path, &failure.reason);
  }

  if !report.is_complete() {
    bail!("{} of the export files failed to write", report.failed.len());
  }

  export_summary(report.written, output, start.elapsed());

  Ok(())
}
