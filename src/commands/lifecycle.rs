use anyhow::Result;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::config::LoadedConfig;
use crate::orchestrator::{LifecycleManager, StartReport};
use crate::ui::{status, summary};

use super::docker_runtime;

pub async fn start(config_file: Option<&Path>, cancel: CancellationToken) -> Result<()> {
    let loaded = LoadedConfig::load(config_file)?;
    let runtime = docker_runtime(&loaded)?;
    let manager = LifecycleManager::new(&loaded, &runtime, cancel);
    let report = manager.start_all().await?;
    finish(report)
}

pub async fn stop(config_file: Option<&Path>) -> Result<()> {
    let loaded = LoadedConfig::load(config_file)?;
    let runtime = docker_runtime(&loaded)?;
    let manager = LifecycleManager::new(&loaded, &runtime, CancellationToken::new());
    let outcomes = manager.stop_all().await?;
    let stopped = outcomes
        .iter()
        .filter(|(_, o)| *o == crate::orchestrator::StopOutcome::Stopped)
        .count();
    status::success(&format!(
        "stack '{}' stopped ({} service(s) were running)",
        loaded.config.project.name, stopped
    ));
    Ok(())
}

pub async fn restart(config_file: Option<&Path>, cancel: CancellationToken) -> Result<()> {
    let loaded = LoadedConfig::load(config_file)?;
    let runtime = docker_runtime(&loaded)?;
    let manager = LifecycleManager::new(&loaded, &runtime, cancel);
    let report = manager.restart().await?;
    finish(report)
}

/// Print the outcome table and surface a database failure as the command's error.
fn finish(report: StartReport) -> Result<()> {
    summary::print_start_report(&report);
    if let Some(Err(e)) = report.database {
        if e.is_fatal() {
            return Err(e.into());
        }
        status::warn(&e.to_string());
    }
    status::success("stack started");
    Ok(())
}
