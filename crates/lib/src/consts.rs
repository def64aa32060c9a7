//! Well-known file names and extensions of the image pool.

/// Extension of image manifest files found in the pool.
pub const MANIFEST_EXT: &str = ".manifest.json";

/// Extension of the RAUC bundle sitting next to a manifest.
pub const RAUC_BUNDLE_EXT: &str = ".raucb";

/// Extension of the casync chunk store directory sitting next to a manifest.
pub const CASYNC_STORE_EXT: &str = ".castr";

/// Per-variant configuration file served to clients.
pub const REMOTE_INFO_FILENAME: &str = "remote-info.conf";

/// The literal version token carried by date-based snapshot images.
pub const SNAPSHOT_VERSION: &str = "snapshot";
