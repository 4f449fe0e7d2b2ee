//! Ensemble: inspect, validate and persist schema-file aggregates.
//!
//! # Usage
//!
//! ```text
//! ensemble check <schema> [--json]
//! ensemble validate <schema> --input <attrs.json> [--context <ctx>] [--json]
//! ensemble save <schema> --input <attrs.json> [--store <dir>] [--force] [--json]
//! ```
//!
//! `<schema>` is a path to a YAML schema file or the name of one under
//! `~/.ensemble/schemas/`.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{check::CheckArgs, save::SaveArgs, validate::ValidateArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "ensemble",
    version,
    about = "Validate and persist aggregates of related records",
    long_about = None,
)]
struct Cli {
    /// Log debug output to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load a schema file and show its slots and dependencies.
    Check(CheckArgs),

    /// Build an aggregate from JSON attributes and validate every slot.
    Validate(ValidateArgs),

    /// Build an aggregate from JSON attributes and save it to a record store.
    Save(SaveArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Check(args) => args.run(),
        Commands::Validate(args) => args.run(),
        Commands::Save(args) => args.run(),
    }
}

/// `RUST_LOG` wins unless `--verbose` is given; the default is `warn`.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
