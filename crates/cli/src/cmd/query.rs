//! Implementation of the `atomupd query` command.
//!
//! Answers a single client query against a freshly built catalog and
//! prints the wire JSON on stdout, exactly as a client would receive it.

use std::path::Path;

use anyhow::{Context, Result};

use atomupd_lib::catalog::Catalog;
use atomupd_lib::config::ServerConfig;
use atomupd_lib::scan::CancelToken;
use atomupd_lib::select::{ClientDescriptor, Selector};
use atomupd_lib::version::{BuildId, ImageVersion};

/// The client descriptor as given on the command line.
pub struct QueryArgs {
  pub product: String,
  pub release: String,
  pub arch: String,
  pub variant: String,
  pub branch: Option<String>,
  pub version: String,
  pub buildid: String,
  pub checkpoint: Option<u32>,
}

/// Execute the query command.
///
/// # Errors
///
/// Returns an error when the configuration is unusable, the pool cannot be
/// scanned, or the descriptor fields do not parse. An unknown client is
/// not an error; it gets the fallback answer.
pub fn cmd_query(config_path: &Path, args: QueryArgs) -> Result<()> {
  let config = ServerConfig::load(config_path).context("Failed to load configuration")?;
  let catalog =
    Catalog::from_pool(&config, &CancelToken::new()).context("Failed to scan image pool")?;

  let descriptor = ClientDescriptor {
    product: args.product,
    release: args.release,
    arch: args.arch,
    variant: args.variant,
    branch: args.branch,
    version: ImageVersion::parse(&args.version).context("Invalid --version")?,
    buildid: BuildId::parse(&args.buildid).context("Invalid --buildid")?,
    checkpoint: args.checkpoint,
  };

  let update = Selector::new(&catalog, &config).query(&descriptor);
  println!("{}", update.to_json().context("Failed to serialize answer")?);

  Ok(())
}
