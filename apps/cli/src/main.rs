//! `hpcxfer` entry point.

mod app;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about = "File transfers through an HPC gateway")]
pub struct Cli {
    /// Configuration file (default: ~/.config/hpcxfer/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload a local file; large files go through object storage.
    Upload {
        local: PathBuf,
        remote: String,
        /// Wait for the transfer job to finish.
        #[arg(long)]
        wait: bool,
    },
    /// Download a remote file.
    Download { remote: String, local: PathBuf },
    /// Wait for a transfer job to finish.
    Wait { job_id: i64 },
    /// Copy a remote path.
    Cp {
        source: String,
        target: String,
        #[arg(long)]
        wait: bool,
    },
    /// Move a remote path.
    Mv {
        source: String,
        target: String,
        #[arg(long)]
        wait: bool,
    },
    /// Delete a remote path.
    Rm {
        path: String,
        #[arg(long)]
        wait: bool,
    },
    /// Cancel a scheduler job.
    Cancel { job_id: i64 },
    /// Upload a random file, download it again and compare checksums.
    SelfTest {
        /// Payload size in MiB.
        #[arg(long, default_value_t = 5)]
        size_mb: u64,
        /// Remote file used for the round trip.
        #[arg(long)]
        remote: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let config = config::Config::load(&config_path)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(cli.command, config))
}
