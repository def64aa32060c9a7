//! Server policy configuration.
//!
//! The server refuses to start without a valid configuration: the allow
//! lists decide which manifests may enter the catalog, and the release
//! list order is semantically meaningful (releases are compared by ASCII
//! codename, so an unsorted list is almost certainly a typo).
//!
//! # Config Format
//!
//! ```toml
//! pool_dir = "/srv/images"
//! products = ["steamos"]
//! releases = ["holo"]
//! variants = ["steamdeck", "steamdeck-beta"]
//! branches = ["stable", "rc", "beta", "main"]
//! archs = ["amd64"]
//!
//! default_update_branch = "stable"
//! enable_major = false
//! export_legacy = false
//! write_remote_info = true
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors that make a configuration unusable. All of these are fatal at
/// startup.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// Failed to read the configuration file.
  #[error("failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// Failed to parse the configuration file.
  #[error("failed to parse config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  /// An allow-list is empty.
  #[error("config field '{0}' must list at least one value")]
  EmptyList(&'static str),

  /// The release list is not in ascending ASCII order.
  #[error("releases must be listed in ascending order, got {0:?}")]
  UnsortedReleases(Vec<String>),
}

/// The server policy: pool location, allow-lists, and feature flags.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  /// Root directory of the image pool.
  pub pool_dir: PathBuf,
  /// Allowed `product` values.
  pub products: Vec<String>,
  /// Allowed `release` codenames, ascending.
  pub releases: Vec<String>,
  /// Allowed `variant` values.
  pub variants: Vec<String>,
  /// Allowed `branch` values. Manifests without a branch are legacy images
  /// and are accepted regardless of this list.
  pub branches: Vec<String>,
  /// Allowed `arch` values.
  pub archs: Vec<String>,

  /// Branch injected into proposed candidates as `default_update_branch`.
  #[serde(default)]
  pub default_update_branch: Option<String>,
  /// Whether the selector probes the next release for a `major` answer.
  #[serde(default)]
  pub enable_major: bool,
  /// Whether the exporter also writes the pre-branch URL layout.
  #[serde(default)]
  pub export_legacy: bool,
  /// Whether the exporter writes `remote-info.conf` files.
  #[serde(default)]
  pub write_remote_info: bool,
}

impl ServerConfig {
  /// Load and validate a configuration file.
  ///
  /// # Errors
  ///
  /// Returns a `ConfigError` when the file cannot be read or parsed, when
  /// an allow-list is empty, or when the release list is unsorted.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;

    let config: ServerConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    config.validate()?;
    Ok(config)
  }

  /// Validate allow-lists and release ordering.
  pub fn validate(&self) -> Result<(), ConfigError> {
    for (name, list) in [
      ("products", &self.products),
      ("releases", &self.releases),
      ("variants", &self.variants),
      ("branches", &self.branches),
      ("archs", &self.archs),
    ] {
      if list.is_empty() {
        return Err(ConfigError::EmptyList(name));
      }
    }

    if !self.releases.windows(2).all(|pair| pair[0] <= pair[1]) {
      return Err(ConfigError::UnsortedReleases(self.releases.clone()));
    }

    Ok(())
  }
}
