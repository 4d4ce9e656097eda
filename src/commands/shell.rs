use anyhow::{bail, Context, Result};
use std::path::Path;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::config::model::ServiceKind;
use crate::config::LoadedConfig;
use crate::docker::ContainerRuntime;
use crate::error::StackError;
use crate::orchestrator::LifecycleManager;

/// Open an interactive `sh` inside a running container service.
pub async fn run(config_file: Option<&Path>, service: &str) -> Result<()> {
    let loaded = LoadedConfig::load(config_file)?;
    let svc = super::find_service(&loaded, service)?;
    if svc.kind != ServiceKind::Container {
        bail!(StackError::Precondition(format!(
            "'{}' is a process service; shell needs a container",
            svc.name
        )));
    }

    let runtime = super::docker_runtime(&loaded)?;
    runtime.ensure_available().await?;
    let manager = LifecycleManager::new(&loaded, &runtime, CancellationToken::new());
    let container = manager.resolve_container(svc).await.ok_or_else(|| {
        StackError::Precondition(format!("'{}' has no container; run `stackctl start`", svc.name))
    })?;
    if !runtime.is_running(&container).await? {
        bail!(StackError::Precondition(format!(
            "container {} for '{}' is not running",
            container, svc.name
        )));
    }

    let status = Command::new("docker")
        .args(["exec", "-it", &container, "sh"])
        .status()
        .await
        .context("running docker exec")?;
    if !status.success() {
        std::process::exit(status.code().unwrap_or(1));
    }
    Ok(())
}
