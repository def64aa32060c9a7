//! Image manifest schema and file I/O.
//!
//! Every image in the pool is described by a sibling `*.manifest.json`
//! file. The schema is explicit: mandatory fields are typed, optional
//! fields default, unknown keys are ignored, and a type mismatch is a
//! parse error surfaced as an ingestion diagnostic by the catalog builder.
//!
//! # Manifest Format
//!
//! ```json
//! {
//!   "product": "steamos",
//!   "release": "holo",
//!   "variant": "steamdeck",
//!   "branch": "stable",
//!   "arch": "amd64",
//!   "version": "3.5.13",
//!   "buildid": "20240104.1",
//!   "introduces_checkpoint": 1,
//!   "requires_checkpoint": 0,
//!   "shadow_checkpoint": false,
//!   "skip": false,
//!   "estimated_size": 0
//! }
//! ```

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::version::{BuildId, ImageVersion};

/// Errors from reading a manifest file.
#[derive(Debug, Error)]
pub enum ManifestError {
  /// Failed to read the manifest file.
  #[error("failed to read manifest: {0}")]
  Read(#[source] io::Error),

  /// Failed to parse the manifest JSON.
  #[error("failed to parse manifest: {0}")]
  Parse(#[source] serde_json::Error),

  /// Failed to serialize a manifest.
  #[error("failed to serialize manifest: {0}")]
  Serialize(#[source] serde_json::Error),
}

/// An image manifest as found in the pool.
///
/// Field order here is the canonical key order of serialized manifests and
/// of the `image` objects in query responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
  pub product: String,
  pub release: String,
  pub variant: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub branch: Option<String>,
  pub arch: String,
  pub version: ImageVersion,
  pub buildid: BuildId,
  #[serde(default, skip_serializing_if = "is_zero_u32")]
  pub introduces_checkpoint: u32,
  #[serde(default, skip_serializing_if = "is_zero_u32")]
  pub requires_checkpoint: u32,
  #[serde(default, skip_serializing_if = "is_false")]
  pub shadow_checkpoint: bool,
  #[serde(default, skip_serializing_if = "is_false")]
  pub skip: bool,
  #[serde(default, skip_serializing_if = "is_zero_u64")]
  pub estimated_size: u64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default_update_branch: Option<String>,
}

fn is_zero_u32(value: &u32) -> bool {
  *value == 0
}

fn is_zero_u64(value: &u64) -> bool {
  *value == 0
}

fn is_false(value: &bool) -> bool {
  !*value
}

impl Manifest {
  /// Parse a manifest from a JSON string.
  ///
  /// `x86_64` architectures are normalized to `amd64`, matching what image
  /// builds historically emitted.
  ///
  /// # Errors
  ///
  /// Returns `ManifestError::Parse` on malformed JSON, a missing mandatory
  /// field, or a type mismatch.
  pub fn from_json(content: &str) -> Result<Self, ManifestError> {
    let mut manifest: Manifest = serde_json::from_str(content).map_err(ManifestError::Parse)?;
    if manifest.arch == "x86_64" {
      manifest.arch = "amd64".to_string();
    }
    Ok(manifest)
  }

  /// Load a manifest from a file.
  ///
  /// # Errors
  ///
  /// Returns `ManifestError::Read` when the file cannot be read and
  /// `ManifestError::Parse` when it is not a valid manifest.
  pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
    let content = fs::read_to_string(path).map_err(ManifestError::Read)?;
    Self::from_json(&content)
  }

  /// Serialize to canonical 2-space indented JSON.
  pub fn to_json(&self) -> Result<String, ManifestError> {
    serde_json::to_string_pretty(self).map_err(ManifestError::Serialize)
  }

  /// Whether this image is a checkpoint (canonical or shadow).
  pub fn is_checkpoint(&self) -> bool {
    self.introduces_checkpoint > 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const FULL_MANIFEST: &str = r#"{
  "product": "steamos",
  "release": "holo",
  "variant": "steamdeck",
  "branch": "stable",
  "arch": "amd64",
  "version": "3.5.13",
  "buildid": "20240104.1",
  "introduces_checkpoint": 1,
  "requires_checkpoint": 0,
  "shadow_checkpoint": false,
  "skip": false,
  "estimated_size": 0
}"#;

  #[test]
  fn parses_full_manifest() {
    let manifest = Manifest::from_json(FULL_MANIFEST).unwrap();
    assert_eq!(manifest.product, "steamos");
    assert_eq!(manifest.branch.as_deref(), Some("stable"));
    assert_eq!(manifest.introduces_checkpoint, 1);
    assert!(!manifest.skip);
    assert!(manifest.is_checkpoint());
  }

  #[test]
  fn optional_fields_default() {
    let manifest = Manifest::from_json(
      r#"{
        "product": "steamos",
        "release": "holo",
        "variant": "steamdeck",
        "arch": "amd64",
        "version": "snapshot",
        "buildid": "20240104"
      }"#,
    )
    .unwrap();

    assert!(manifest.branch.is_none());
    assert_eq!(manifest.introduces_checkpoint, 0);
    assert_eq!(manifest.requires_checkpoint, 0);
    assert!(!manifest.shadow_checkpoint);
    assert!(!manifest.skip);
    assert_eq!(manifest.estimated_size, 0);
    assert!(manifest.version.is_snapshot());
  }

  #[test]
  fn unknown_keys_are_ignored() {
    let manifest = Manifest::from_json(
      r#"{
        "product": "steamos",
        "release": "holo",
        "variant": "steamdeck",
        "arch": "amd64",
        "version": "3.5.13",
        "buildid": "20240104",
        "some_future_field": true
      }"#,
    );
    assert!(manifest.is_ok());
  }

  #[test]
  fn missing_mandatory_field_is_error() {
    let result = Manifest::from_json(
      r#"{
        "product": "steamos",
        "release": "holo",
        "variant": "steamdeck",
        "arch": "amd64",
        "version": "3.5.13"
      }"#,
    );
    assert!(matches!(result, Err(ManifestError::Parse(_))));
  }

  #[test]
  fn type_mismatch_is_error() {
    let result = Manifest::from_json(
      r#"{
        "product": "steamos",
        "release": "holo",
        "variant": "steamdeck",
        "arch": "amd64",
        "version": "3.5.13",
        "buildid": "20240104",
        "introduces_checkpoint": "one"
      }"#,
    );
    assert!(matches!(result, Err(ManifestError::Parse(_))));
  }

  #[test]
  fn x86_64_normalizes_to_amd64() {
    let manifest = Manifest::from_json(
      r#"{
        "product": "steamos",
        "release": "holo",
        "variant": "steamdeck",
        "arch": "x86_64",
        "version": "3.5.13",
        "buildid": "20240104"
      }"#,
    )
    .unwrap();
    assert_eq!(manifest.arch, "amd64");
  }

  #[test]
  fn canonical_roundtrip_is_stable() {
    let manifest = Manifest::from_json(FULL_MANIFEST).unwrap();
    let serialized = manifest.to_json().unwrap();
    let reparsed = Manifest::from_json(&serialized).unwrap();
    assert_eq!(reparsed, manifest);
    // A second pass through the canonical form is byte-for-byte stable.
    assert_eq!(reparsed.to_json().unwrap(), serialized);
  }
}
