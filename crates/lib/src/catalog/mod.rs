//! Catalog construction and hot-swap handle.
//!
//! The catalog groups accepted images into tracks keyed by
//! `(product, release, arch, variant, branch)` and keeps each track in
//! update order. It is built once per scan and never mutated; rebuilds
//! construct a fresh catalog and swap it into the [`CatalogHandle`] while
//! queries against the previous one finish undisturbed.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::image::Image;
use crate::scan::{scan_pool, CancelToken, ScanError, ScanOutcome, ScannedManifest};
use crate::version::{BuildId, ImageVersion};

/// Identity of a track.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TrackKey {
  pub product: String,
  pub release: String,
  pub arch: String,
  pub variant: String,
  /// `None` for legacy images that predate branches.
  pub branch: Option<String>,
}

impl fmt::Display for TrackKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}/{}/{}/{}/{}",
      self.product,
      self.release,
      self.arch,
      self.variant,
      self.branch.as_deref().unwrap_or("-")
    )
  }
}

/// A manifest the builder refused, with the reason why.
#[derive(Debug, Clone, Serialize)]
pub struct IngestDiagnostic {
  pub path: PathBuf,
  pub reason: String,
}

/// The images of one track, in update order.
#[derive(Debug, Clone)]
pub struct Track {
  pub key: TrackKey,
  pub images: Vec<Image>,
}

impl Track {
  /// Find the exact image a client descriptor points at.
  pub fn position_of(&self, version: &ImageVersion, buildid: &BuildId) -> Option<usize> {
    self
      .images
      .iter()
      .position(|image| image.manifest.version == *version && image.manifest.buildid == *buildid)
  }

  /// Checkpoint level of a client running the image at `index`: the
  /// maximum `introduces_checkpoint` over the track prefix up to and
  /// including that image.
  pub fn checkpoint_level_at(&self, index: usize) -> u32 {
    self.images[..=index]
      .iter()
      .map(|image| image.manifest.introduces_checkpoint)
      .max()
      .unwrap_or(0)
  }

  /// Canonical checkpoint levels present in this track, ascending.
  pub fn canonical_levels(&self) -> BTreeSet<u32> {
    self
      .images
      .iter()
      .filter(|image| {
        image.manifest.introduces_checkpoint > 0
          && !image.manifest.skip
          && !image.manifest.shadow_checkpoint
      })
      .map(|image| image.manifest.introduces_checkpoint)
      .collect()
  }

  /// Whether the track holds at least one non-skipped, non-shadow image.
  pub fn has_selectable_image(&self) -> bool {
    self
      .images
      .iter()
      .any(|image| !image.manifest.skip && !image.manifest.shadow_checkpoint)
  }
}

/// Read a lock, recovering from poisoning; the guarded value is only ever
/// replaced wholesale.
fn read_recover<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
  lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// All accepted tracks, plus the diagnostics gathered while building.
#[derive(Debug, Default)]
pub struct Catalog {
  tracks: BTreeMap<TrackKey, Track>,
  diagnostics: Vec<IngestDiagnostic>,
}

impl Catalog {
  /// Build a catalog from a scan, validating every manifest against the
  /// server policy.
  ///
  /// Individual rejections become diagnostics; only configuration problems
  /// are fatal, and those are caught before a scan ever runs.
  pub fn build(config: &ServerConfig, outcome: ScanOutcome) -> Self {
    let mut diagnostics: Vec<IngestDiagnostic> = outcome
      .diagnostics
      .into_iter()
      .map(|d| IngestDiagnostic {
        path: d.path,
        reason: d.reason,
      })
      .collect();

    // Group accepted images per track, preserving scan order so the
    // multiplicity pass below keeps the first-seen entry.
    let mut tracks: BTreeMap<TrackKey, Track> = BTreeMap::new();
    for scanned in outcome.manifests {
      match validate(config, &scanned) {
        Ok(key) => {
          let image = Image {
            manifest: scanned.manifest,
            manifest_path: scanned.manifest_path,
            bundle_path: scanned.bundle_path,
            store_path: scanned.store_path,
            update_path: scanned.update_path,
          };
          tracks
            .entry(key.clone())
            .or_insert_with(|| Track {
              key,
              images: Vec::new(),
            })
            .images
            .push(image);
        }
        Err(reason) => {
          warn!(path = %scanned.manifest_path.display(), %reason, "manifest rejected");
          diagnostics.push(IngestDiagnostic {
            path: scanned.manifest_path,
            reason,
          });
        }
      }
    }

    for track in tracks.values_mut() {
      enforce_multiplicity(track, &mut diagnostics);
      track.images.sort_by(|a, b| a.cmp_order(b));
    }

    debug!(
      tracks = tracks.len(),
      rejected = diagnostics.len(),
      "catalog built"
    );

    Self { tracks, diagnostics }
  }

  /// Scan the configured pool and build a catalog from it.
  ///
  /// # Errors
  ///
  /// Returns a `ScanError` when the pool root is missing or the scan was
  /// cancelled; per-manifest problems become diagnostics instead.
  pub fn from_pool(config: &ServerConfig, cancel: &CancelToken) -> Result<Self, ScanError> {
    let outcome = scan_pool(&config.pool_dir, cancel)?;
    Ok(Self::build(config, outcome))
  }

  pub fn tracks(&self) -> impl Iterator<Item = &Track> {
    self.tracks.values()
  }

  pub fn track(&self, key: &TrackKey) -> Option<&Track> {
    self.tracks.get(key)
  }

  pub fn diagnostics(&self) -> &[IngestDiagnostic] {
    &self.diagnostics
  }

  pub fn is_empty(&self) -> bool {
    self.tracks.is_empty()
  }

  /// The track of the smallest release strictly greater than
  /// `key.release` within the same `(product, arch, variant, branch)`,
  /// provided it has something selectable in it.
  pub fn next_release_track(&self, key: &TrackKey) -> Option<&Track> {
    self
      .tracks
      .values()
      .filter(|track| {
        track.key.product == key.product
          && track.key.arch == key.arch
          && track.key.variant == key.variant
          && track.key.branch == key.branch
          && track.key.release > key.release
          && track.has_selectable_image()
      })
      .min_by(|a, b| a.key.release.cmp(&b.key.release))
  }
}

/// Validate one scanned manifest against the server policy.
///
/// Rules run in order and the first failure wins, so diagnostics point at
/// the most fundamental problem.
fn validate(config: &ServerConfig, scanned: &ScannedManifest) -> Result<TrackKey, String> {
  let m = &scanned.manifest;

  for (field, value) in [
    ("product", &m.product),
    ("release", &m.release),
    ("variant", &m.variant),
    ("arch", &m.arch),
  ] {
    if value.is_empty() {
      return Err(format!("mandatory field '{}' is empty", field));
    }
  }

  if !config.products.contains(&m.product) {
    return Err(format!("product '{}' is not served", m.product));
  }
  if !config.releases.contains(&m.release) {
    return Err(format!("release '{}' is not served", m.release));
  }
  if !config.archs.contains(&m.arch) {
    return Err(format!("arch '{}' is not served", m.arch));
  }
  if !config.variants.contains(&m.variant) {
    return Err(format!("variant '{}' is not served", m.variant));
  }
  if let Some(branch) = &m.branch {
    if !config.branches.contains(branch) {
      return Err(format!("branch '{}' is not served", branch));
    }
  }

  if m.shadow_checkpoint && m.skip {
    return Err("shadow checkpoints cannot be skipped".to_string());
  }

  Ok(TrackKey {
    product: m.product.clone(),
    release: m.release.clone(),
    arch: m.arch.clone(),
    variant: m.variant.clone(),
    branch: m.branch.clone(),
  })
}

/// Enforce the per-level multiplicity invariant: at most one live
/// canonical and one live shadow per `introduces_checkpoint` value. The
/// first-seen image survives, later ones are discarded.
fn enforce_multiplicity(track: &mut Track, diagnostics: &mut Vec<IngestDiagnostic>) {
  let mut canonical_seen: HashSet<u32> = HashSet::new();
  let mut shadow_seen: HashSet<u32> = HashSet::new();

  track.images.retain(|image| {
    let m = &image.manifest;
    if m.introduces_checkpoint == 0 || m.skip {
      return true;
    }

    let seen = if m.shadow_checkpoint {
      &mut shadow_seen
    } else {
      &mut canonical_seen
    };

    if seen.insert(m.introduces_checkpoint) {
      true
    } else {
      let kind = if m.shadow_checkpoint { "shadow" } else { "canonical" };
      warn!(
        track = %track.key,
        level = m.introduces_checkpoint,
        path = %image.manifest_path.display(),
        "duplicate {} checkpoint discarded", kind
      );
      diagnostics.push(IngestDiagnostic {
        path: image.manifest_path.clone(),
        reason: format!(
          "duplicate {} checkpoint {} in track {}",
          kind, m.introduces_checkpoint, track.key
        ),
      });
      false
    }
  });
}

/// Shared, swappable reference to the current catalog.
///
/// Queries grab an `Arc` and keep using it even while a rebuild swaps in a
/// replacement. Rebuilds are serialized through [`CatalogHandle::rebuild_lock`].
#[derive(Debug, Clone)]
pub struct CatalogHandle {
  current: Arc<RwLock<Arc<Catalog>>>,
  rebuild: Arc<Mutex<()>>,
}

/// Errors from the handle; today only lock serialization.
#[derive(Debug, Error)]
pub enum HandleError {
  /// A rebuild is already running.
  #[error("a catalog rebuild is already in progress")]
  RebuildInProgress,
}

impl CatalogHandle {
  pub fn new(catalog: Catalog) -> Self {
    Self {
      current: Arc::new(RwLock::new(Arc::new(catalog))),
      rebuild: Arc::new(Mutex::new(())),
    }
  }

  /// The catalog to answer queries from right now.
  pub fn current(&self) -> Arc<Catalog> {
    read_recover(&self.current).clone()
  }

  /// Atomically replace the catalog. In-flight queries keep their `Arc`.
  pub fn swap(&self, catalog: Catalog) {
    let mut guard = self
      .current
      .write()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = Arc::new(catalog);
  }

  /// Serialize rebuilds: hold the guard for scan + build + swap.
  ///
  /// # Errors
  ///
  /// Returns `HandleError::RebuildInProgress` when another rebuild holds
  /// the guard.
  pub fn rebuild_lock(&self) -> Result<MutexGuard<'_, ()>, HandleError> {
    self
      .rebuild
      .try_lock()
      .map_err(|_| HandleError::RebuildInProgress)
  }
}
