//! PFX CLI - Check, format and convert effect scripts
//!
//! # Commands
//!
//! - `pfx check` - Parse a script and report its diagnostics
//! - `pfx fmt` - Parse a script and write it back in canonical form
//! - `pfx encode` - Write every component of a script as a binary blob
//! - `pfx decode` - Read a component blob and print its script
//!
//! # Usage
//!
//! ```bash
//! # Report errors and warnings, exit code 1 on errors
//! pfx check effects/explosion.pfx
//!
//! # Rewrite a script in place
//! pfx fmt effects/explosion.pfx -o effects/explosion.pfx
//!
//! # Dump the binary records of every component
//! pfx encode effects/explosion.pfx -o build/
//!
//! # Print a particles record as script
//! pfx decode build/sparks.particles.bin --keyword particles
//! ```
//!
//! # Configuration (pfx.toml)
//!
//! ```toml
//! [registry]
//! files = ["reg_file.txt", "reg_property.txt"]
//!
//! [parsing]
//! fast_parsing = false
//! ```

mod check;
mod decode;
mod encode;
mod fmt;
mod script;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pfx_effects::{PfxConfig, config};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// PFX CLI - Check, format and convert effect scripts
#[derive(Parser)]
#[command(name = "pfx")]
#[command(about = "Check, format and convert PFX effect scripts")]
#[command(version)]
struct Cli {
    /// Config file to use instead of the platform pfx.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Extra name registry file, loaded after the configured ones
    #[arg(long = "registry", global = true)]
    registries: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a script and report its diagnostics
    Check(check::CheckArgs),

    /// Parse a script and write it back in canonical form
    Fmt(fmt::FmtArgs),

    /// Write every component of a script as `<name>.<keyword>.bin`
    Encode(encode::EncodeArgs),

    /// Read a component blob and print its script
    Decode(decode::DecodeArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Check(args) => check::execute(args, &config),
        Commands::Fmt(args) => fmt::execute(args, &config),
        Commands::Encode(args) => encode::execute(args, &config),
        Commands::Decode(args) => decode::execute(args),
    }
}

/// Load the config file and every name registry it or the command line lists
fn load_config(cli: &Cli) -> Result<PfxConfig> {
    let mut config = match &cli.config {
        Some(path) => PfxConfig::load_from(path)?,
        None => config::load(),
    };
    config.registry.files.extend(cli.registries.iter().cloned());

    let names = config
        .load_registries()
        .context("Failed to load name registries")?;
    debug!(names, "registries ready");
    Ok(config)
}
