//! Update candidate selection.
//!
//! Given a client descriptor and a catalog, the selector computes the
//! minimal ordered list of images the client must install to become up to
//! date. The policy is latest-only with mandatory checkpoint hops: plain
//! newer images collapse into the single latest reachable one, canonical
//! checkpoints along the way are emitted as intermediate hops, and shadow
//! checkpoints silently raise the client's level as they are crossed.

use serde::Deserialize;
use tracing::debug;

use crate::catalog::{Catalog, Track, TrackKey};
use crate::config::ServerConfig;
use crate::image::Image;
use crate::update::{Update, UpdateCandidate, UpdatePath};
use crate::version::{BuildId, ImageVersion};

/// What a client reports about itself when asking for updates.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientDescriptor {
  pub product: String,
  pub release: String,
  pub arch: String,
  pub variant: String,
  /// The branch the client wants to follow; `None` for legacy clients.
  #[serde(default)]
  pub branch: Option<String>,
  pub version: ImageVersion,
  pub buildid: BuildId,
  /// Self-reported checkpoint level, honored only when the image itself is
  /// unknown to the catalog. The level is never inferred.
  #[serde(default)]
  pub checkpoint: Option<u32>,
}

impl ClientDescriptor {
  pub fn track_key(&self) -> TrackKey {
    TrackKey {
      product: self.product.clone(),
      release: self.release.clone(),
      arch: self.arch.clone(),
      variant: self.variant.clone(),
      branch: self.branch.clone(),
    }
  }
}

/// Computes answers against one immutable catalog.
pub struct Selector<'a> {
  catalog: &'a Catalog,
  config: &'a ServerConfig,
}

impl<'a> Selector<'a> {
  pub fn new(catalog: &'a Catalog, config: &'a ServerConfig) -> Self {
    Self { catalog, config }
  }

  /// Answer a client query.
  ///
  /// An exact catalog match fixes the client's position and checkpoint
  /// level. Unknown clients fall back to the pristine answer for their
  /// tuple, or to the at-level answer when they report a checkpoint.
  pub fn query(&self, descriptor: &ClientDescriptor) -> Update {
    let key = descriptor.track_key();

    if let Some(track) = self.catalog.track(&key) {
      if let Some(index) = track.position_of(&descriptor.version, &descriptor.buildid) {
        let level = track.checkpoint_level_at(index);
        return self.answer_at(track, Some(index), level);
      }

      let level = descriptor.checkpoint.unwrap_or(0);
      debug!(
        track = %key,
        version = %descriptor.version,
        buildid = %descriptor.buildid,
        level,
        "unknown client image, serving fallback"
      );
      return self.answer_at(track, None, level);
    }

    debug!(track = %key, "no such track");
    Update::default()
  }

  /// Answer for a client sitting after `position` in `track` (or before
  /// the whole track for `None`) at checkpoint level `level`.
  ///
  /// This is the primitive the static exporter drives directly: canonical
  /// files use a concrete position, fallback files use `None` with level 0
  /// or a checkpoint level.
  pub fn answer_at(&self, track: &Track, position: Option<usize>, level: u32) -> Update {
    let minor = self.plan(track, position, level);

    let major = if self.config.enable_major {
      self
        .catalog
        .next_release_track(&track.key)
        .and_then(|next| self.plan(next, None, level))
    } else {
      None
    };

    Update { minor, major }
  }

  /// Run the checkpoint walk over one track and wrap the hops as wire
  /// candidates.
  fn plan(&self, track: &Track, position: Option<usize>, level: u32) -> Option<UpdatePath> {
    let upcoming = match position {
      Some(index) => &track.images[index + 1..],
      None => &track.images[..],
    };

    let candidates: Vec<UpdateCandidate> = plan_hops(upcoming, level)
      .into_iter()
      .filter_map(|image| {
        UpdateCandidate::from_image(image, self.config.default_update_branch.as_deref())
      })
      .collect();

    if candidates.is_empty() {
      None
    } else {
      Some(UpdatePath {
        release: track.key.release.clone(),
        candidates,
      })
    }
  }
}

/// One forward pass over the images above the client.
///
/// Maintains the virtual checkpoint level `c`, starting at the client's
/// level. Rules, in the order the images stream by:
///
/// - skip tombstones are invisible;
/// - a shadow whose `requires_checkpoint` is already met raises `c` to its
///   level and is never emitted;
/// - a canonical checkpoint above `c` that cannot be installed (level not
///   met, or bundle gone) is a hard barrier: nothing past it is offered;
/// - any other uninstallable image is jumped over;
/// - an installable canonical checkpoint above `c` becomes a mandatory hop
///   and raises `c`;
/// - the last installable image seen is the final target.
///
/// The result is at most one hop per checkpoint crossed plus the final
/// target, or nothing at all.
fn plan_hops(images: &[Image], level: u32) -> Vec<&Image> {
  let mut c = level;
  let mut hops: Vec<&Image> = Vec::new();
  let mut target: Option<&Image> = None;

  for image in images {
    let m = &image.manifest;

    if m.skip {
      continue;
    }

    if m.shadow_checkpoint {
      if m.requires_checkpoint <= c {
        c = c.max(m.introduces_checkpoint);
      }
      continue;
    }

    let installable = m.requires_checkpoint <= c && image.update_path.is_some();
    if !installable {
      if m.introduces_checkpoint > c {
        break;
      }
      continue;
    }

    if m.introduces_checkpoint > c {
      c = m.introduces_checkpoint;
      hops.push(image);
    }
    target = Some(image);
  }

  let Some(target) = target else {
    return Vec::new();
  };

  if !hops.last().is_some_and(|last| std::ptr::eq(*last, target)) {
    hops.push(target);
  }
  hops
}
