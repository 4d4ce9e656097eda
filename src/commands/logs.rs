use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::compose::lifecycle::compose_logs;
use crate::config::model::ServiceKind;
use crate::config::LoadedConfig;
use crate::ui::status;

/// Follow logs in the foreground until interrupted. Container services go
/// through `docker compose logs -f`, process services through `tail -F` on
/// their log files.
pub async fn run(config_file: Option<&Path>, service: Option<&str>) -> Result<()> {
    let loaded = LoadedConfig::load(config_file)?;
    let project = super::compose_project(&loaded);

    if let Some(name) = service {
        let svc = super::find_service(&loaded, name)?;
        return match svc.kind {
            ServiceKind::Container => compose_logs(&project, Some(svc.compose_name())).await,
            ServiceKind::Process => {
                tail_files(&[loaded.logs_dir().join(format!("{}.log", svc.name))]).await
            }
        };
    }

    let process_logs = process_log_files(&loaded);
    let has_containers = loaded.config.container_count() > 0;
    match (has_containers, process_logs.is_empty()) {
        (false, true) => {
            status::warn("no services have logs yet");
            Ok(())
        }
        (true, true) => compose_logs(&project, None).await,
        (false, false) => tail_files(&process_logs).await,
        (true, false) => {
            // Whichever side fails first drops the other, which kills its child.
            tokio::try_join!(tail_files(&process_logs), compose_logs(&project, None))?;
            Ok(())
        }
    }
}

fn process_log_files(loaded: &LoadedConfig) -> Vec<PathBuf> {
    loaded
        .config
        .services
        .iter()
        .filter(|s| s.kind == ServiceKind::Process)
        .map(|s| loaded.logs_dir().join(format!("{}.log", s.name)))
        .filter(|p| p.exists())
        .collect()
}

async fn tail_files(files: &[PathBuf]) -> Result<()> {
    if let Some(missing) = files.iter().find(|f| !f.exists()) {
        bail!("no log file at {}; has the service been started?", missing.display());
    }
    let status = Command::new("tail")
        .args(["-F", "-n", "100"])
        .args(files)
        .kill_on_drop(true)
        .status()
        .await
        .context("running tail")?;
    if !status.success() {
        bail!("tail exited with {}", status);
    }
    Ok(())
}
