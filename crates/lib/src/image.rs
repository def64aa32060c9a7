//! An image: an accepted manifest plus its on-disk artifacts.
//!
//! Images are the unit the catalog orders and the selector proposes. The
//! ordering mixes two versioning schemes; see [`Image::cmp_order`].

use std::cmp::Ordering;
use std::path::PathBuf;

use crate::manifest::Manifest;

/// A validated manifest together with the artifacts found next to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
  pub manifest: Manifest,
  /// Absolute path of the manifest file.
  pub manifest_path: PathBuf,
  /// Absolute path of the adjacent `.raucb` bundle, if present.
  pub bundle_path: Option<PathBuf>,
  /// Absolute path of the adjacent `.castr` chunk store, if present.
  pub store_path: Option<PathBuf>,
  /// Bundle path relative to the scan root; `None` when the bundle is
  /// missing. Images without a bundle stay resolvable as client images but
  /// are never proposed as updates.
  pub update_path: Option<String>,
}

impl Image {
  /// Whether this image may be proposed as an update candidate.
  ///
  /// Skip tombstones, shadow checkpoints, and images whose bundle has been
  /// removed are resolvable but not proposable.
  pub fn is_proposable(&self) -> bool {
    !self.manifest.skip && !self.manifest.shadow_checkpoint && self.update_path.is_some()
  }

  /// Total order of images within a track.
  ///
  /// Versioned images compare by semantic version then build id. Snapshots
  /// compare by release codename then build id. Across schemes a snapshot
  /// wins only when its build date is strictly newer, which lets hotfix
  /// snapshots land after a versioned release in the same track. Remaining
  /// ties fall back to the manifest path so the order is deterministic.
  pub fn cmp_order(&self, other: &Image) -> Ordering {
    let a = &self.manifest;
    let b = &other.manifest;

    let primary = match (a.version.semantic(), b.version.semantic()) {
      (Some(va), Some(vb)) => va.cmp(vb).then_with(|| a.buildid.cmp(&b.buildid)),
      (None, None) => a
        .release
        .cmp(&b.release)
        .then_with(|| a.buildid.cmp(&b.buildid)),
      (None, Some(_)) => snapshot_vs_versioned(a, b),
      (Some(_), None) => snapshot_vs_versioned(b, a).reverse(),
    };

    primary.then_with(|| self.manifest_path.cmp(&other.manifest_path))
  }
}

/// Cross-scheme rule: the snapshot is newer only on a strictly greater
/// build date.
fn snapshot_vs_versioned(snapshot: &Manifest, versioned: &Manifest) -> Ordering {
  if snapshot.buildid.date > versioned.buildid.date {
    Ordering::Greater
  } else {
    Ordering::Less
  }
}

/// Quote one path component for the exported URL tree.
///
/// A leading `.` becomes `_` so no exported name is hidden, `/` becomes
/// `_`, and everything outside the RFC 3986 unreserved set is
/// percent-encoded.
pub fn quote_path_component(component: &str) -> String {
  let flattened = component.replace('/', "_");
  let visible = match flattened.strip_prefix('.') {
    Some(rest) => format!("_{}", rest),
    None => flattened,
  };

  let mut quoted = String::with_capacity(visible.len());
  for byte in visible.bytes() {
    match byte {
      b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
        quoted.push(byte as char);
      }
      _ => quoted.push_str(&format!("%{:02X}", byte)),
    }
  }
  quoted
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::version::{BuildId, ImageVersion};

  fn image(version: &str, buildid: &str, release: &str, path: &str) -> Image {
    let manifest = Manifest {
      product: "steamos".to_string(),
      release: release.to_string(),
      variant: "steamdeck".to_string(),
      branch: Some("stable".to_string()),
      arch: "amd64".to_string(),
      version: ImageVersion::parse(version).unwrap(),
      buildid: BuildId::parse(buildid).unwrap(),
      introduces_checkpoint: 0,
      requires_checkpoint: 0,
      shadow_checkpoint: false,
      skip: false,
      estimated_size: 0,
      default_update_branch: None,
    };
    Image {
      manifest,
      manifest_path: PathBuf::from(path),
      bundle_path: Some(PathBuf::from(path).with_extension("raucb")),
      store_path: None,
      update_path: Some("pool/img.raucb".to_string()),
    }
  }

  mod ordering {
    use super::*;

    #[test]
    fn versioned_by_semver_then_buildid() {
      let old = image("3.1", "20220401.1", "holo", "a");
      let new = image("3.2", "20220301", "holo", "b");
      assert_eq!(old.cmp_order(&new), Ordering::Less);

      let first = image("3.2", "20220411", "holo", "a");
      let second = image("3.2", "20220411.1", "holo", "b");
      assert_eq!(first.cmp_order(&second), Ordering::Less);
    }

    #[test]
    fn snapshots_by_release_then_buildid() {
      let brewmaster = image("snapshot", "20190201", "brewmaster", "a");
      let clockwerk = image("snapshot", "20180201", "clockwerk", "b");
      assert_eq!(brewmaster.cmp_order(&clockwerk), Ordering::Less);

      let older = image("snapshot", "20180101", "clockwerk", "a");
      assert_eq!(older.cmp_order(&clockwerk), Ordering::Less);
    }

    #[test]
    fn hotfix_snapshot_beats_older_versioned_release() {
      let versioned = image("3.5.13", "20240104.1", "holo", "a");
      let hotfix = image("snapshot", "20240110", "holo", "b");
      assert_eq!(hotfix.cmp_order(&versioned), Ordering::Greater);
      assert_eq!(versioned.cmp_order(&hotfix), Ordering::Less);
    }

    #[test]
    fn same_day_snapshot_loses_to_versioned() {
      let versioned = image("3.5.13", "20240104.1", "holo", "a");
      let snapshot = image("snapshot", "20240104", "holo", "b");
      assert_eq!(snapshot.cmp_order(&versioned), Ordering::Less);
      assert_eq!(versioned.cmp_order(&snapshot), Ordering::Greater);
    }

    #[test]
    fn equal_images_tie_break_on_path() {
      let a = image("3.2", "20220411", "holo", "a");
      let b = image("3.2", "20220411", "holo", "b");
      assert_eq!(a.cmp_order(&b), Ordering::Less);
      assert_eq!(a.cmp_order(&a), Ordering::Equal);
    }
  }

  mod proposable {
    use super::*;

    #[test]
    fn plain_image_is_proposable() {
      assert!(image("3.2", "20220411", "holo", "a").is_proposable());
    }

    #[test]
    fn skip_shadow_or_missing_bundle_are_not() {
      let mut skipped = image("3.2", "20220411", "holo", "a");
      skipped.manifest.skip = true;
      assert!(!skipped.is_proposable());

      let mut shadow = image("3.2", "20220411", "holo", "a");
      shadow.manifest.shadow_checkpoint = true;
      assert!(!shadow.is_proposable());

      let mut unbundled = image("3.2", "20220411", "holo", "a");
      unbundled.update_path = None;
      assert!(!unbundled.is_proposable());
    }
  }

  mod quoting {
    use super::*;

    #[test]
    fn plain_components_pass_through() {
      assert_eq!(quote_path_component("steamdeck"), "steamdeck");
      assert_eq!(quote_path_component("3.5.13"), "3.5.13");
    }

    #[test]
    fn leading_dot_becomes_underscore() {
      assert_eq!(quote_path_component(".hidden"), "_hidden");
    }

    #[test]
    fn slashes_and_reserved_bytes_are_escaped() {
      assert_eq!(quote_path_component("a/b"), "a_b");
      assert_eq!(quote_path_component("rc one"), "rc%20one");
    }
  }
}
