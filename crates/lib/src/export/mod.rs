//! Static export of the full query answer tree.
//!
//! Enumerates every client state reachable from the catalog and writes the
//! selector's answer for each into a file tree mirroring the query URL
//! scheme, so the service can be served by any dumb file server:
//!
//! ```text
//! {out}/
//! ├── holo/steamos/amd64/steamdeck/stable/3.5.13/20240104.1.json
//! ├── holo/steamos/amd64/steamdeck/stable.json          # pristine fallback
//! ├── holo/steamos/amd64/steamdeck/stable.cp1.json      # checkpoint fallback
//! ├── holo/steamos/amd64/steamdeck/remote-info.conf
//! └── steamos/amd64/3.5.13/steamdeck/20240104.1.json    # legacy layout
//! ```
//!
//! Each file is written next to its final location and atomically renamed,
//! so a reader never observes a truncated answer.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, Track};
use crate::config::ServerConfig;
use crate::consts::REMOTE_INFO_FILENAME;
use crate::image::quote_path_component;
use crate::select::Selector;
use crate::update::Update;

/// Errors that abort an export before any file is written.
#[derive(Debug, Error)]
pub enum ExportError {
  /// The output root could not be created.
  #[error("failed to create output directory {path}: {source}")]
  CreateRoot {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// A single file that could not be written.
#[derive(Debug, Clone, Serialize)]
pub struct ExportFailure {
  pub path: PathBuf,
  pub reason: String,
}

/// What an export run produced.
#[derive(Debug, Default, Serialize)]
pub struct ExportReport {
  pub written: usize,
  pub failed: Vec<ExportFailure>,
}

impl ExportReport {
  /// An export as a whole succeeds when every rename succeeded.
  pub fn is_complete(&self) -> bool {
    self.failed.is_empty()
  }
}

/// Export the whole catalog under `output_root`.
///
/// Per track: one canonical file per image (skipped and bundle-less images
/// included, so every client stays resolvable), one pristine branch
/// fallback, and one fallback per canonical checkpoint level. Branchless
/// legacy tracks use the pre-branch layout; branched tracks additionally
/// emit it when `export_legacy` is set. `remote-info.conf` files are
/// written per variant directory when `write_remote_info` is set.
///
/// # Errors
///
/// Only an uncreatable output root is fatal; per-file problems end up in
/// the report.
pub fn export_pool(
  catalog: &Catalog,
  config: &ServerConfig,
  output_root: &Path,
) -> Result<ExportReport, ExportError> {
  fs::create_dir_all(output_root).map_err(|source| ExportError::CreateRoot {
    path: output_root.to_path_buf(),
    source,
  })?;

  let selector = Selector::new(catalog, config);
  let mut report = ExportReport::default();

  for track in catalog.tracks() {
    export_track(&selector, track, config, output_root, &mut report);
  }

  if config.write_remote_info {
    export_remote_info(catalog, config, output_root, &mut report);
  }

  info!(
    written = report.written,
    failed = report.failed.len(),
    "static export finished"
  );
  Ok(report)
}

fn export_track(
  selector: &Selector<'_>,
  track: &Track,
  config: &ServerConfig,
  output_root: &Path,
  report: &mut ExportReport,
) {
  let key = &track.key;
  debug!(track = %key, images = track.images.len(), "exporting track");

  for (index, image) in track.images.iter().enumerate() {
    let answer = selector.answer_at(track, Some(index), track.checkpoint_level_at(index));
    let manifest = &image.manifest;
    let version = quote_path_component(&manifest.version.to_string());
    let buildid = quote_path_component(&manifest.buildid.to_string());

    if let Some(branch) = &key.branch {
      let canonical = variant_dir(output_root, track)
        .join(quote_path_component(branch))
        .join(&version)
        .join(format!("{}.json", buildid));
      write_answer(&canonical, &answer, report);

      if config.export_legacy {
        write_answer(&legacy_path(output_root, track, &version, &buildid), &answer, report);
      }
    } else {
      write_answer(&legacy_path(output_root, track, &version, &buildid), &answer, report);
    }
  }

  let pristine = selector.answer_at(track, None, 0);

  if let Some(branch) = &key.branch {
    let branch_quoted = quote_path_component(branch);
    let variant_dir = variant_dir(output_root, track);

    write_answer(
      &variant_dir.join(format!("{}.json", branch_quoted)),
      &pristine,
      report,
    );

    for level in track.canonical_levels() {
      let answer = selector.answer_at(track, None, level);
      write_answer(
        &variant_dir.join(format!("{}.cp{}.json", branch_quoted, level)),
        &answer,
        report,
      );
    }
  } else {
    // Legacy clients look one level up from their build-id file.
    for image in &track.images {
      let version = quote_path_component(&image.manifest.version.to_string());
      let fallback = output_root
        .join(quote_path_component(&key.product))
        .join(quote_path_component(&key.arch))
        .join(&version)
        .join(format!("{}.json", quote_path_component(&key.variant)));
      write_answer(&fallback, &pristine, report);
    }
  }
}

/// `<release>/<product>/<arch>/<variant>` under the output root.
fn variant_dir(output_root: &Path, track: &Track) -> PathBuf {
  let key = &track.key;
  output_root
    .join(quote_path_component(&key.release))
    .join(quote_path_component(&key.product))
    .join(quote_path_component(&key.arch))
    .join(quote_path_component(&key.variant))
}

/// `<product>/<arch>/<version>/<variant>/<buildid>.json` under the output
/// root.
fn legacy_path(output_root: &Path, track: &Track, version: &str, buildid: &str) -> PathBuf {
  let key = &track.key;
  output_root
    .join(quote_path_component(&key.product))
    .join(quote_path_component(&key.arch))
    .join(version)
    .join(quote_path_component(&key.variant))
    .join(format!("{}.json", buildid))
}

fn write_answer(path: &Path, answer: &Update, report: &mut ExportReport) {
  let content = match answer.to_json() {
    Ok(content) => content,
    Err(e) => {
      report.failed.push(ExportFailure {
        path: path.to_path_buf(),
        reason: e.to_string(),
      });
      return;
    }
  };
  write_file(path, content.as_bytes(), report);
}

/// Write-then-rename, with one retry on transient I/O failure.
fn write_file(path: &Path, content: &[u8], report: &mut ExportReport) {
  match atomic_write(path, content).or_else(|_| atomic_write(path, content)) {
    Ok(()) => report.written += 1,
    Err(e) => {
      warn!(path = %path.display(), error = %e, "failed to write export file");
      report.failed.push(ExportFailure {
        path: path.to_path_buf(),
        reason: e.to_string(),
      });
    }
  }
}

fn atomic_write(path: &Path, content: &[u8]) -> Result<(), io::Error> {
  let parent = path
    .parent()
    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
  fs::create_dir_all(parent)?;

  let file_name = path
    .file_name()
    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
  let temp_path = parent.join(format!("{}.tmp", file_name.to_string_lossy()));
  fs::write(&temp_path, content)?;
  fs::rename(&temp_path, path)
}

/// Write one `remote-info.conf` per `(release, product, arch, variant)`
/// present in the catalog, listing the served variants and branches. The
/// file's location and content carry no branch, so branchless legacy
/// tracks get one too.
fn export_remote_info(
  catalog: &Catalog,
  config: &ServerConfig,
  output_root: &Path,
  report: &mut ExportReport,
) {
  let mut seen: std::collections::BTreeSet<PathBuf> = std::collections::BTreeSet::new();

  for track in catalog.tracks() {
    let dir = variant_dir(output_root, track);
    if !seen.insert(dir.clone()) {
      continue;
    }
    let content = remote_info_content(config);
    write_file(&dir.join(REMOTE_INFO_FILENAME), content.as_bytes(), report);
  }
}

/// INI content of `remote-info.conf`.
fn remote_info_content(config: &ServerConfig) -> String {
  format!(
    "[Server]\nVariants = {}\nBranches = {}\n",
    config.variants.join(";"),
    config.branches.join(";")
  )
}
