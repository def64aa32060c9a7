//! Version and build-id value types.
//!
//! Images carry two identifiers: a `version` that is either a semantic
//! version or the literal `snapshot`, and a `buildid` in ISO-8601 basic
//! date format with an optional increment (`YYYYMMDD[.N]`).

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::SNAPSHOT_VERSION;

/// Errors from parsing a `version` field.
#[derive(Debug, Error)]
pub enum VersionError {
  /// The string is neither `snapshot` nor a parseable semantic version.
  #[error("invalid version '{text}': {message}")]
  Invalid { text: String, message: String },
}

/// Errors from parsing a `buildid` field.
#[derive(Debug, Error)]
pub enum BuildIdError {
  /// More than one `.` separator.
  #[error("build id '{0}' should match YYYYMMDD[.N]")]
  Malformed(String),

  /// The date part is not a valid calendar date.
  #[error("build id '{0}' has an invalid date")]
  BadDate(String),

  /// The increment is not a non-negative integer.
  #[error("build id '{0}' has an invalid increment")]
  BadIncrement(String),
}

/// The version scheme of an image.
///
/// Date-based snapshot images carry the literal token `snapshot` instead of
/// a semantic version; they are ordered by build id alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ImageVersion {
  Snapshot,
  Semantic(semver::Version),
}

impl ImageVersion {
  /// Parse a `version` field.
  ///
  /// Accepts the literal `snapshot`, a full `MAJOR.MINOR.PATCH[-pre]`, and
  /// the shorthand `MAJOR[.MINOR]` with missing components read as zero.
  ///
  /// # Errors
  ///
  /// Returns `VersionError::Invalid` for anything else.
  pub fn parse(text: &str) -> Result<Self, VersionError> {
    if text == SNAPSHOT_VERSION {
      return Ok(Self::Snapshot);
    }
    parse_semantic(text).map(Self::Semantic)
  }

  /// Whether this is a snapshot version.
  pub fn is_snapshot(&self) -> bool {
    matches!(self, Self::Snapshot)
  }

  /// The semantic version, if any.
  pub fn semantic(&self) -> Option<&semver::Version> {
    match self {
      Self::Snapshot => None,
      Self::Semantic(v) => Some(v),
    }
  }
}

impl fmt::Display for ImageVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Snapshot => f.write_str(SNAPSHOT_VERSION),
      Self::Semantic(v) => write!(f, "{}", v),
    }
  }
}

impl FromStr for ImageVersion {
  type Err = VersionError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl TryFrom<String> for ImageVersion {
  type Error = VersionError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    Self::parse(&value)
  }
}

impl From<ImageVersion> for String {
  fn from(value: ImageVersion) -> Self {
    value.to_string()
  }
}

/// Parse a semantic version, padding `MAJOR[.MINOR]` shorthands with zeros.
fn parse_semantic(text: &str) -> Result<semver::Version, VersionError> {
  if let Ok(version) = semver::Version::parse(text) {
    return Ok(version);
  }

  // Shorthands like "3.1" or "3.1-beta" lack components; pad the numeric
  // part and retry.
  let (numeric, suffix) = match text.find(['-', '+']) {
    Some(idx) => text.split_at(idx),
    None => (text, ""),
  };

  let padded = match numeric.bytes().filter(|b| *b == b'.').count() {
    0 => format!("{}.0.0{}", numeric, suffix),
    1 => format!("{}.0{}", numeric, suffix),
    _ => text.to_string(),
  };

  semver::Version::parse(&padded).map_err(|e| VersionError::Invalid {
    text: text.to_string(),
    message: e.to_string(),
  })
}

/// A build id: a calendar date plus an optional increment.
///
/// Ordered by `(date, increment)`. The increment defaults to zero and is
/// only printed when non-zero, so `20240104.0` normalizes to `20240104`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BuildId {
  pub date: NaiveDate,
  pub incr: u32,
}

impl BuildId {
  /// Parse a `YYYYMMDD[.N]` build id.
  ///
  /// # Errors
  ///
  /// Returns a `BuildIdError` when the shape, the calendar date, or the
  /// increment is invalid.
  pub fn parse(text: &str) -> Result<Self, BuildIdError> {
    let mut fields = text.split('.');

    let date_part = fields.next().unwrap_or_default();
    let incr = match fields.next() {
      None => 0,
      Some(part) => part
        .parse::<u32>()
        .map_err(|_| BuildIdError::BadIncrement(text.to_string()))?,
    };

    if fields.next().is_some() {
      return Err(BuildIdError::Malformed(text.to_string()));
    }

    let date = NaiveDate::parse_from_str(date_part, "%Y%m%d")
      .map_err(|_| BuildIdError::BadDate(text.to_string()))?;

    Ok(Self { date, incr })
  }
}

impl fmt::Display for BuildId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.incr > 0 {
      write!(f, "{}.{}", self.date.format("%Y%m%d"), self.incr)
    } else {
      write!(f, "{}", self.date.format("%Y%m%d"))
    }
  }
}

impl FromStr for BuildId {
  type Err = BuildIdError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl TryFrom<String> for BuildId {
  type Error = BuildIdError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    Self::parse(&value)
  }
}

impl From<BuildId> for String {
  fn from(value: BuildId) -> Self {
    value.to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  mod image_version {
    use super::*;

    #[test]
    fn parses_snapshot_literal() {
      let version = ImageVersion::parse("snapshot").unwrap();
      assert!(version.is_snapshot());
      assert_eq!(version.to_string(), "snapshot");
    }

    #[test]
    fn parses_full_semantic() {
      let version = ImageVersion::parse("3.5.13").unwrap();
      assert_eq!(version.semantic().unwrap(), &semver::Version::new(3, 5, 13));
      assert_eq!(version.to_string(), "3.5.13");
    }

    #[test]
    fn pads_shorthand_versions() {
      assert_eq!(ImageVersion::parse("3.1").unwrap().to_string(), "3.1.0");
      assert_eq!(ImageVersion::parse("3").unwrap().to_string(), "3.0.0");
    }

    #[test]
    fn pads_shorthand_with_prerelease() {
      let version = ImageVersion::parse("3.1-beta").unwrap();
      assert_eq!(version.to_string(), "3.1.0-beta");
    }

    #[test]
    fn prerelease_sorts_below_release() {
      let pre = ImageVersion::parse("3.5.0-rc1").unwrap();
      let rel = ImageVersion::parse("3.5.0").unwrap();
      assert!(pre.semantic().unwrap() < rel.semantic().unwrap());
    }

    #[test]
    fn rejects_garbage() {
      assert!(ImageVersion::parse("not-a-version").is_err());
      assert!(ImageVersion::parse("").is_err());
    }

    #[test]
    fn json_roundtrip() {
      let version = ImageVersion::parse("3.5.13").unwrap();
      let json = serde_json::to_string(&version).unwrap();
      assert_eq!(json, "\"3.5.13\"");
      let back: ImageVersion = serde_json::from_str(&json).unwrap();
      assert_eq!(back, version);
    }
  }

  mod build_id {
    use super::*;

    #[test]
    fn parses_date_only() {
      let id = BuildId::parse("20181105").unwrap();
      assert_eq!(id.incr, 0);
      assert_eq!(id.to_string(), "20181105");
    }

    #[test]
    fn parses_date_with_increment() {
      let id = BuildId::parse("20190211.1").unwrap();
      assert_eq!(id.incr, 1);
      assert_eq!(id.to_string(), "20190211.1");
    }

    #[test]
    fn zero_increment_normalizes() {
      let id = BuildId::parse("20190211.0").unwrap();
      assert_eq!(id, BuildId::parse("20190211").unwrap());
      assert_eq!(id.to_string(), "20190211");
    }

    #[test]
    fn rejects_extra_fields() {
      assert!(matches!(
        BuildId::parse("20190211.1.2"),
        Err(BuildIdError::Malformed(_))
      ));
    }

    #[test]
    fn rejects_bad_calendar_date() {
      assert!(matches!(
        BuildId::parse("20190231"),
        Err(BuildIdError::BadDate(_))
      ));
      assert!(matches!(BuildId::parse("2019"), Err(BuildIdError::BadDate(_))));
    }

    #[test]
    fn rejects_negative_increment() {
      assert!(matches!(
        BuildId::parse("20190211.-1"),
        Err(BuildIdError::BadIncrement(_))
      ));
    }

    #[test]
    fn orders_by_date_then_increment() {
      let a = BuildId::parse("20220401").unwrap();
      let b = BuildId::parse("20220401.2").unwrap();
      let c = BuildId::parse("20220402").unwrap();
      assert!(a < b);
      assert!(b < c);
    }

    #[test]
    fn json_roundtrip() {
      let id = BuildId::parse("20240104.1").unwrap();
      let json = serde_json::to_string(&id).unwrap();
      assert_eq!(json, "\"20240104.1\"");
      let back: BuildId = serde_json::from_str(&json).unwrap();
      assert_eq!(back, id);
    }
  }
}
