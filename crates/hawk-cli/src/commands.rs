use std::io::Write;

use color_eyre::{eyre::bail, Result};
use hawk_service::{HawkAuthService, ServiceConfig};
use tracing::{info, warn};

use crate::cli::Command;

/// How a store command finished; `NotFound` maps to exit status 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    NotFound,
}

/// Build the service from config, connect, run one command and disconnect.
pub async fn run(config: ServiceConfig, command: &Command) -> Result<Outcome> {
    let service = HawkAuthService::from_config(config)?;
    service.start().await?;
    let result = execute(&service, command, &mut std::io::stdout()).await;
    if let Err(err) = service.stop().await {
        warn!("failed to stop credential service: {err}");
    }
    result
}

/// Run a store-backed command against a started service.
pub async fn execute<W: Write>(
    service: &HawkAuthService,
    command: &Command,
    out: &mut W,
) -> Result<Outcome> {
    match command {
        Command::Create => {
            let credential = service.create_credentials().await?;
            writeln!(out, "{}", serde_json::to_string_pretty(&credential)?)?;
        }
        Command::Get { id } => match service.get_credentials(id).await? {
            Some(credential) => {
                writeln!(out, "{}", serde_json::to_string_pretty(&credential)?)?;
            }
            None => {
                writeln!(out, "credential {id} not found")?;
                return Ok(Outcome::NotFound);
            }
        },
        Command::Delete { id } => {
            service.delete_credentials(id).await?;
            writeln!(out, "deleted {id}")?;
        }
        Command::DeleteMany { ids } => {
            let removed = service.delete_multi_credentials(ids).await?;
            info!(requested = ids.len(), removed = removed.len(), "batch delete finished");
            for id in &removed {
                writeln!(out, "deleted {id}")?;
            }
        }
        Command::Health => {
            run_health(service).await?;
            writeln!(out, "Store ({}): ok", service.store_name())?;
        }
        Command::Version | Command::Config(_) => {
            bail!("{command:?} does not use the credential store")
        }
    }
    Ok(Outcome::Done)
}

/// Issue a throwaway credential, read it back, revoke it and confirm it is gone.
async fn run_health(service: &HawkAuthService) -> Result<()> {
    let probe = service.create_credentials().await?;
    let round_trip = service.get_credentials(&probe.id).await?;
    service.delete_credentials(&probe.id).await?;

    if round_trip.as_ref() != Some(&probe) {
        bail!("store round-trip returned a different credential");
    }
    if service.get_credentials(&probe.id).await?.is_some() {
        bail!("credential {} still present after delete", probe.id);
    }
    Ok(())
}
