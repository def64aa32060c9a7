//! atomupd: operator CLI for the image update service.
//!
//! Provides the `atomupd` command with subcommands:
//! - `atomupd status -c server.toml` - Show the catalog built from the pool
//! - `atomupd query -c server.toml ...` - Answer one client query as JSON
//! - `atomupd export -c server.toml -o DIR` - Write the static answer tree

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod cmd;
mod output;

#[derive(Parser)]
#[command(name = "atomupd")]
#[command(author, version, about = "Update selection for atomic OS image pools")]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Show the catalog built from the image pool
  Status {
    /// Path to the server configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
  },

  /// Answer one client query and print the update JSON
  Query {
    /// Path to the server configuration file
    #[arg(short, long)]
    config: PathBuf,

    #[arg(long)]
    product: String,

    #[arg(long)]
    release: String,

    #[arg(long)]
    arch: String,

    #[arg(long)]
    variant: String,

    /// Branch the client follows; omit for legacy clients
    #[arg(long)]
    branch: Option<String>,

    /// Client version ("snapshot" or a semantic version)
    #[arg(long)]
    version: String,

    /// Client build id (YYYYMMDD[.N])
    #[arg(long)]
    buildid: String,

    /// Checkpoint level the client reports about itself
    #[arg(long)]
    checkpoint: Option<u32>,
  },

  /// Write the static answer tree for a plain file server
  Export {
    /// Path to the server configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Output directory for the exported tree
    #[arg(short, long)]
    output: PathBuf,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  // Logs go to stderr so `query` can pipe clean JSON to stdout.
  let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
  FmtSubscriber::builder()
    .with_max_level(level)
    .with_target(false)
    .without_time()
    .with_writer(std::io::stderr)
    .init();

  match cli.command {
    Commands::Status { config, json } => cmd::cmd_status(&config, json),
    Commands::Query {
      config,
      product,
      release,
      arch,
      variant,
      branch,
      version,
      buildid,
      checkpoint,
    } => cmd::cmd_query(
      &config,
      cmd::QueryArgs {
        product,
        release,
        arch,
        variant,
        branch,
        version,
        buildid,
        checkpoint,
      },
    ),
    Commands::Export { config, output } => cmd::cmd_export(&config, &output),
  }
}
