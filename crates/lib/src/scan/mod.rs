//! Image pool scanner.
//!
//! Walks the pool root looking for `*.manifest.json` files and pairs each
//! with the sibling artifacts that share its filename stem. The directory
//! layout itself carries no meaning; only filenames matter. Broken files
//! are reported as diagnostics and never abort the walk.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::consts::{CASYNC_STORE_EXT, MANIFEST_EXT, RAUC_BUNDLE_EXT, REMOTE_INFO_FILENAME};
use crate::manifest::Manifest;

/// Errors that abort a scan entirely.
#[derive(Debug, Error)]
pub enum ScanError {
  /// The pool root does not exist or is not a directory.
  #[error("image pool '{0}' is not a directory")]
  RootMissing(PathBuf),

  /// The scan was cancelled before it finished.
  #[error("scan cancelled")]
  Cancelled,
}

/// Cooperative cancellation flag for a running scan.
///
/// Clones share the flag; `cancel` makes the walk abort at the next
/// directory entry.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::Relaxed);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::Relaxed)
  }
}

/// A parsed manifest plus the artifacts found next to it.
#[derive(Debug, Clone)]
pub struct ScannedManifest {
  pub manifest: Manifest,
  pub manifest_path: PathBuf,
  /// The adjacent `.raucb` bundle, if present.
  pub bundle_path: Option<PathBuf>,
  /// The adjacent `.castr` chunk store, if present.
  pub store_path: Option<PathBuf>,
  /// Bundle path relative to the scan root, when the bundle exists.
  pub update_path: Option<String>,
}

/// A per-file problem encountered during the scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanDiagnostic {
  pub path: PathBuf,
  pub reason: String,
}

/// Everything a scan produced.
#[derive(Debug, Default)]
pub struct ScanOutcome {
  pub manifests: Vec<ScannedManifest>,
  /// Existing `remote-info.conf` files, surfaced for the exporter.
  pub remote_info: Vec<PathBuf>,
  pub diagnostics: Vec<ScanDiagnostic>,
}

/// Walk `root` and collect every manifest with its artifacts.
///
/// Symbolic links to directories are followed; walkdir's loop detection
/// turns cycles into per-entry diagnostics. `.castr` chunk stores are
/// pruned from the walk since their contents are opaque. Entries are
/// visited in filename order so diagnostics and first-seen resolution are
/// deterministic across hosts.
///
/// # Errors
///
/// Returns `ScanError::RootMissing` when `root` is not a directory and
/// `ScanError::Cancelled` when `cancel` fires mid-walk. Everything else is
/// a diagnostic in the outcome.
pub fn scan_pool(root: &Path, cancel: &CancelToken) -> Result<ScanOutcome, ScanError> {
  if !root.is_dir() {
    return Err(ScanError::RootMissing(root.to_path_buf()));
  }

  let mut outcome = ScanOutcome::default();

  let walker = WalkDir::new(root)
    .follow_links(true)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|entry| {
      // Chunk stores are directories full of chunks; nothing to scan.
      !(entry.file_type().is_dir()
        && entry
          .file_name()
          .to_str()
          .is_some_and(|name| name.ends_with(CASYNC_STORE_EXT)))
    });

  for entry in walker {
    if cancel.is_cancelled() {
      return Err(ScanError::Cancelled);
    }

    let entry = match entry {
      Ok(entry) => entry,
      Err(e) => {
        let path = e.path().map(Path::to_path_buf).unwrap_or_default();
        warn!(path = %path.display(), error = %e, "skipping unreadable pool entry");
        outcome.diagnostics.push(ScanDiagnostic {
          path,
          reason: e.to_string(),
        });
        continue;
      }
    };

    if !entry.file_type().is_file() {
      continue;
    }

    let Some(name) = entry.file_name().to_str() else {
      continue;
    };

    if name == REMOTE_INFO_FILENAME {
      outcome.remote_info.push(entry.path().to_path_buf());
      continue;
    }

    if !name.ends_with(MANIFEST_EXT) {
      continue;
    }

    match load_scanned(root, entry.path()) {
      Ok(scanned) => {
        debug!(path = %entry.path().display(), "manifest found");
        outcome.manifests.push(scanned);
      }
      Err(reason) => {
        warn!(path = %entry.path().display(), %reason, "skipping broken manifest");
        outcome.diagnostics.push(ScanDiagnostic {
          path: entry.path().to_path_buf(),
          reason,
        });
      }
    }
  }

  debug!(
    manifests = outcome.manifests.len(),
    diagnostics = outcome.diagnostics.len(),
    "pool scan complete"
  );
  Ok(outcome)
}

/// Parse one manifest file and look up its sibling artifacts.
fn load_scanned(root: &Path, manifest_path: &Path) -> Result<ScannedManifest, String> {
  let manifest = Manifest::from_file(manifest_path).map_err(|e| e.to_string())?;

  let stem = manifest_path
    .to_str()
    .ok_or_else(|| "non-UTF-8 manifest path".to_string())?
    .strip_suffix(MANIFEST_EXT)
    .ok_or_else(|| "not a manifest file".to_string())?
    .to_string();

  let bundle = PathBuf::from(format!("{}{}", stem, RAUC_BUNDLE_EXT));
  let bundle_path = bundle.is_file().then_some(bundle);

  let store = PathBuf::from(format!("{}{}", stem, CASYNC_STORE_EXT));
  let store_path = store.is_dir().then_some(store);

  let update_path = match &bundle_path {
    Some(bundle) => Some(
      bundle
        .strip_prefix(root)
        .map_err(|_| "bundle escapes the pool root".to_string())?
        .to_string_lossy()
        .into_owned(),
    ),
    None => None,
  };

  Ok(ScannedManifest {
    manifest,
    manifest_path: manifest_path.to_path_buf(),
    bundle_path,
    store_path,
    update_path,
  })
}
