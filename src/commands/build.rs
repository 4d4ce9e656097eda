use anyhow::Result;
use chrono::Utc;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::config::LoadedConfig;
use crate::pipeline::DeployPipeline;
use crate::ui::status;

pub async fn run(config_file: Option<&Path>, cancel: CancellationToken) -> Result<()> {
    let loaded = LoadedConfig::load(config_file)?;
    let runtime = super::docker_runtime(&loaded)?;
    let mut pipeline = DeployPipeline::new(&loaded, &runtime, cancel, Utc::now());

    status::info(&format!(
        "deploying '{}' as version {}",
        loaded.config.project.name,
        pipeline.version()
    ));
    let report = pipeline.run().await?;

    for artifact in &report.artifacts {
        status::info(&format!(
            "{}: {}:{{{}}}",
            artifact.service,
            artifact.image,
            artifact.tags.all().join(",")
        ));
    }
    Ok(())
}
