//! Wire types of a query response.
//!
//! An update answer lists the update paths possible for a client image:
//! `minor` for candidates within the client's release and `major` for
//! candidates in the next release. Both are optional and an empty answer
//! serializes as `{}`.

use serde::{Deserialize, Serialize};

use crate::image::Image;
use crate::version::{BuildId, ImageVersion};

/// The identity subset of a manifest carried inside a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateImage {
  pub product: String,
  pub release: String,
  pub variant: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub branch: Option<String>,
  pub arch: String,
  pub version: ImageVersion,
  pub buildid: BuildId,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default_update_branch: Option<String>,
}

/// One proposed update: an image plus the relative path of its bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateCandidate {
  pub image: CandidateImage,
  pub update_path: String,
  pub estimated_size: u64,
  #[serde(default, skip_serializing_if = "is_zero")]
  pub requires_checkpoint: u32,
  #[serde(default, skip_serializing_if = "is_zero")]
  pub introduces_checkpoint: u32,
  #[serde(default, skip_serializing_if = "is_false")]
  pub shadow_checkpoint: bool,
}

fn is_zero(value: &u32) -> bool {
  *value == 0
}

fn is_false(value: &bool) -> bool {
  !*value
}

impl UpdateCandidate {
  /// Build a candidate from a catalog image.
  ///
  /// Returns `None` when the image has no bundle on disk; such images are
  /// never proposed. The server-configured default update branch, if any,
  /// is injected into the image object.
  pub fn from_image(image: &Image, default_update_branch: Option<&str>) -> Option<Self> {
    let update_path = image.update_path.clone()?;
    let manifest = &image.manifest;

    Some(Self {
      image: CandidateImage {
        product: manifest.product.clone(),
        release: manifest.release.clone(),
        variant: manifest.variant.clone(),
        branch: manifest.branch.clone(),
        arch: manifest.arch.clone(),
        version: manifest.version.clone(),
        buildid: manifest.buildid,
        default_update_branch: manifest
          .default_update_branch
          .clone()
          .or_else(|| default_update_branch.map(str::to_string)),
      },
      update_path,
      estimated_size: manifest.estimated_size,
      requires_checkpoint: manifest.requires_checkpoint,
      introduces_checkpoint: manifest.introduces_checkpoint,
      shadow_checkpoint: manifest.shadow_checkpoint,
    })
  }
}

/// The candidates a client must install, in order, within one release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePath {
  pub release: String,
  pub candidates: Vec<UpdateCandidate>,
}

/// A complete query answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Update {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub minor: Option<UpdatePath>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub major: Option<UpdatePath>,
}

impl Update {
  /// Whether the answer proposes nothing.
  pub fn is_empty(&self) -> bool {
    self.minor.is_none() && self.major.is_none()
  }

  /// Serialize to the wire format: UTF-8, 2-space indent, declaration key
  /// order. The empty answer is `{}`.
  pub fn to_json(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_update_serializes_as_empty_object() {
    let update = Update::default();
    assert!(update.is_empty());
    assert_eq!(update.to_json().unwrap(), "{}");
  }

  #[test]
  fn zero_checkpoint_fields_are_omitted() {
    let candidate = UpdateCandidate {
      image: CandidateImage {
        product: "steamos".to_string(),
        release: "holo".to_string(),
        variant: "steamdeck".to_string(),
        branch: Some("stable".to_string()),
        arch: "amd64".to_string(),
        version: ImageVersion::parse("3.5.13").unwrap(),
        buildid: BuildId::parse("20240104.1").unwrap(),
        default_update_branch: None,
      },
      update_path: "steamdeck/20240104.1/img.raucb".to_string(),
      estimated_size: 0,
      requires_checkpoint: 0,
      introduces_checkpoint: 0,
      shadow_checkpoint: false,
    };

    let json = serde_json::to_string(&candidate).unwrap();
    assert!(!json.contains("requires_checkpoint"));
    assert!(!json.contains("introduces_checkpoint"));
    assert!(!json.contains("shadow_checkpoint"));
    assert!(json.contains("\"estimated_size\":0"));
  }

  #[test]
  fn update_json_roundtrip() {
    let update = Update {
      minor: Some(UpdatePath {
        release: "holo".to_string(),
        candidates: vec![UpdateCandidate {
          image: CandidateImage {
            product: "steamos".to_string(),
            release: "holo".to_string(),
            variant: "steamdeck".to_string(),
            branch: None,
            arch: "amd64".to_string(),
            version: ImageVersion::parse("3.5.13").unwrap(),
            buildid: BuildId::parse("20240104.1").unwrap(),
            default_update_branch: None,
          },
          update_path: "steamdeck/img.raucb".to_string(),
          estimated_size: 1024,
          requires_checkpoint: 1,
          introduces_checkpoint: 2,
          shadow_checkpoint: false,
        }],
      }),
      major: None,
    };

    let json = update.to_json().unwrap();
    assert!(json.contains("\"minor\""));
    assert!(!json.contains("\"major\""));

    let back: Update = serde_json::from_str(&json).unwrap();
    assert_eq!(back, update);
  }
}
