//! Terminal output helpers for the atomupd CLI.
//!
//! Status and export share how per-file problems, track statistics, and
//! run summaries are rendered; the helpers here keep them consistent.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use owo_colors::{OwoColorize, Stream};

/// A per-file problem the catalog or scanner tolerated (broken manifest,
/// rejected tuple, duplicate checkpoint).
pub fn warn_file(path: &Path, reason: &str) {
  let line = format!("{}: {}", path.display(), reason);
  eprintln!(
    "⚠ {}",
    line.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

/// A per-file failure that makes the whole command fail, e.g. an export
/// file whose atomic rename did not go through.
pub fn fail_file(path: &Path, reason: &str) {
  let line = format!("{}: {}", path.display(), reason);
  eprintln!("✗ {}", line.if_supports_color(Stream::Stderr, |s| s.red()));
}

/// An indented `label: value` line under a track heading.
pub fn track_stat(label: &str, value: impl fmt::Display) {
  println!(
    "    {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

/// Closing line of a successful export run.
pub fn export_summary(written: usize, output: &Path, elapsed: Duration) {
  println!(
    "{} Exported {} files to {} in {}",
    "✓".if_supports_color(Stream::Stdout, |s| s.green()),
    written,
    output
      .display()
      .if_supports_color(Stream::Stdout, |s| s.cyan()),
    format_elapsed(elapsed)
  );
}

/// Compact elapsed time: milliseconds below one second, seconds with one
/// decimal above.
fn format_elapsed(elapsed: Duration) -> String {
  if elapsed.as_secs() == 0 {
    format!("{}ms", elapsed.subsec_millis())
  } else {
    format!("{:.1}s", elapsed.as_secs_f64())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn elapsed_switches_units_at_one_second() {
    assert_eq!(format_elapsed(Duration::from_millis(8)), "8ms");
    assert_eq!(format_elapsed(Duration::from_millis(999)), "999ms");
    assert_eq!(format_elapsed(Duration::from_millis(2500)), "2.5s");
    assert_eq!(format_elapsed(Duration::from_secs(90)), "90.0s");
  }
}
