//! Wires configuration, credentials and clients into a transfer
//! orchestrator and runs one command.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use hpcxfer_auth::{ClientCredentialsProvider, Credentials, TokenCache};
use hpcxfer_gateway::{GatewayClient, GatewayConfig, StorageClient};
use hpcxfer_large_transfer::{TransferEvent, TransferOrchestrator};
use hpcxfer_transfer::calculate_file_checksum;
use rand::RngCore;
use tracing::{debug, info, warn};

use crate::Command;
use crate::config::Config;

const MIB: u64 = 1024 * 1024;

/// Runs `command` until it finishes or Ctrl-C cancels it.
pub async fn run(command: Command, config: Config) -> anyhow::Result<()> {
    let mut orchestrator = build_orchestrator(&config)?;

    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("SIGINT received, cancelling transfer");
            cancel.cancel();
        }
    });

    if let Some(mut events) = orchestrator.take_events() {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                log_event(&event);
            }
        });
    }

    execute(&orchestrator, command).await
}

fn build_orchestrator(config: &Config) -> anyhow::Result<TransferOrchestrator> {
    if config.system.is_empty() {
        bail!("no target system configured (set `system` in the configuration file)");
    }

    let credentials = Credentials::load(&config.credentials_file).with_context(|| {
        format!(
            "failed to load credentials from {}",
            config.credentials_file.display()
        )
    })?;
    let tokens = Arc::new(TokenCache::new(Box::new(ClientCredentialsProvider::new(
        credentials,
    )?)));

    let mut gateway_config = GatewayConfig::new(&config.gateway_url, &config.system);
    gateway_config.small_file_limit = config.small_file_limit;
    let gateway = Arc::new(GatewayClient::new(gateway_config, Arc::clone(&tokens))?);
    let storage = Arc::new(StorageClient::new()?);

    Ok(TransferOrchestrator::new(gateway, storage, tokens)
        .with_account(config.account.clone())
        .with_poll_config(config.poll_config())
        .with_upload_options(config.upload_options()))
}

async fn execute(orchestrator: &TransferOrchestrator, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Upload {
            local,
            remote,
            wait,
        } => match orchestrator.upload(&local, &remote, wait).await? {
            Some(job_id) if wait => info!(job_id, remote = %remote, "upload finished"),
            Some(job_id) => info!(job_id, remote = %remote, "upload accepted, job still running"),
            None => info!(remote = %remote, "upload finished"),
        },
        Command::Download { remote, local } => {
            let bytes = orchestrator.download(&remote, &local).await?;
            info!(bytes, local = %local.display(), "download finished");
        }
        Command::Wait { job_id } => {
            orchestrator.wait_for_job(job_id).await?;
            info!(job_id, "job completed");
        }
        Command::Cp {
            source,
            target,
            wait,
        } => {
            let job = if wait {
                orchestrator.copy_and_wait(&source, &target).await?
            } else {
                orchestrator.copy(&source, &target).await?
            };
            info!(job_id = job.job_id, "copy submitted");
        }
        Command::Mv {
            source,
            target,
            wait,
        } => {
            let job = if wait {
                orchestrator.move_path_and_wait(&source, &target).await?
            } else {
                orchestrator.move_path(&source, &target).await?
            };
            info!(job_id = job.job_id, "move submitted");
        }
        Command::Rm { path, wait } => {
            let job = if wait {
                orchestrator.remove_and_wait(&path).await?
            } else {
                orchestrator.remove(&path).await?
            };
            info!(job_id = job.job_id, "delete submitted");
        }
        Command::Cancel { job_id } => orchestrator.cancel_job(job_id).await?,
        Command::SelfTest { size_mb, remote } => {
            self_test(orchestrator, size_mb, &remote).await?;
        }
    }
    Ok(())
}

/// Uploads a random payload, downloads it back and compares SHA-256.
async fn self_test(
    orchestrator: &TransferOrchestrator,
    size_mb: u64,
    remote: &str,
) -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let source = dir.path().join("payload.bin");
    let roundtrip = dir.path().join("roundtrip.bin");

    let size = size_mb * MIB;
    write_random_file(source.clone(), size).await?;
    let expected = checksum(source.clone()).await?;
    info!(size, checksum = %expected, "payload generated");

    let job_id = orchestrator.upload(&source, remote, true).await?;
    debug!(?job_id, "payload uploaded");

    orchestrator.download(remote, &roundtrip).await?;
    let actual = checksum(roundtrip).await?;

    if actual != expected {
        bail!("checksum mismatch: uploaded {expected}, downloaded {actual}");
    }
    info!(checksum = %actual, "self-test passed");
    Ok(())
}

async fn write_random_file(path: PathBuf, size: u64) -> anyhow::Result<()> {
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let mut file = std::io::BufWriter::new(std::fs::File::create(&path)?);
        let mut rng = rand::thread_rng();
        let mut chunk = vec![0u8; MIB as usize];
        let mut left = size;
        while left > 0 {
            let n = left.min(MIB) as usize;
            rng.fill_bytes(&mut chunk[..n]);
            file.write_all(&chunk[..n])?;
            left -= n as u64;
        }
        file.flush()?;
        Ok(())
    })
    .await?
}

async fn checksum(path: PathBuf) -> anyhow::Result<String> {
    let digest = tokio::task::spawn_blocking(move || calculate_file_checksum(&path)).await??;
    Ok(digest)
}

fn log_event(event: &TransferEvent) {
    match event {
        TransferEvent::PlanReceived { job_id, parts } => {
            info!(job_id, parts, "transfer plan received")
        }
        TransferEvent::PartUploaded { part, total, bytes } => {
            info!(part, total, bytes, "part uploaded")
        }
        TransferEvent::PartFailed { part, error } => warn!(part, %error, "part failed"),
        TransferEvent::CompletionSent { parts } => info!(parts, "completion sent"),
        TransferEvent::JobPolled { job_id, state } => {
            debug!(job_id, state = state.as_deref().unwrap_or("NOT_FOUND"), "job polled")
        }
        TransferEvent::Downloading { job_id, dest } => {
            info!(job_id, dest = %dest.display(), "downloading")
        }
        TransferEvent::Done { job_id } => debug!(job_id, "transfer done"),
        TransferEvent::Failed { error } => debug!(%error, "transfer failed"),
    }
}
