use anyhow::Result;
use std::path::Path;

use crate::config::LoadedConfig;
use crate::health;
use crate::ui::summary;

/// One-shot report. Unhealthy services never fail the command.
pub async fn run(config_file: Option<&Path>) -> Result<()> {
    let loaded = LoadedConfig::load(config_file)?;
    let runtime = super::docker_runtime(&loaded)?;
    let report = health::check_all(&loaded, &runtime).await;
    for unhealthy in report.iter().filter_map(|s| s.as_error()) {
        tracing::debug!("{}", unhealthy);
    }
    summary::print_health(&report);
    Ok(())
}
