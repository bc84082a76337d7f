//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

/// facelink — coordinator for a distributed face-recognition pipeline.
#[derive(Debug, Parser)]
#[command(name = "facelink", version, about)]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long)]
    pub config: PathBuf,

    /// Override the configured listen address.
    #[arg(long)]
    pub addr: Option<String>,

    /// Override the configured listen port.
    #[arg(long)]
    pub port: Option<u16>,
}
