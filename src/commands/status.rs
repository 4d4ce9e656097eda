use anyhow::Result;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::config::LoadedConfig;
use crate::orchestrator::LifecycleManager;
use crate::ui::summary;

pub async fn run(config_file: Option<&Path>) -> Result<()> {
    let loaded = LoadedConfig::load(config_file)?;
    let runtime = super::docker_runtime(&loaded)?;
    let manager = LifecycleManager::new(&loaded, &runtime, CancellationToken::new());
    let statuses = manager.status_all().await;
    summary::print_status(&loaded.config.project.name, &statuses);
    Ok(())
}
