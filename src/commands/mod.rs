pub mod build;
pub mod clean;
pub mod doctor;
pub mod health;
pub mod install;
pub mod lifecycle;
pub mod logs;
pub mod shell;
pub mod status;
pub mod validate;

use anyhow::Result;

use crate::compose::ComposeProject;
use crate::config::LoadedConfig;
use crate::docker::DockerRuntime;

pub(crate) fn compose_project(loaded: &LoadedConfig) -> ComposeProject {
    ComposeProject::new(
        &loaded.compose_file(),
        &loaded.config.project.name,
        loaded.env_file().as_deref(),
    )
}

pub(crate) fn docker_runtime(loaded: &LoadedConfig) -> Result<DockerRuntime> {
    DockerRuntime::new(compose_project(loaded))
}

/// Look up a service by name, suggesting the closest match on a typo.
pub(crate) fn find_service<'a>(
    loaded: &'a LoadedConfig,
    name: &str,
) -> Result<&'a crate::config::model::ServiceConfig> {
    if let Some(svc) = loaded.config.service(name) {
        return Ok(svc);
    }
    let names = loaded.config.service_names();
    let suggestion = names
        .iter()
        .map(|n| (strsim::jaro_winkler(name, n), n))
        .filter(|(score, _)| *score > 0.8)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, n)| format!(" (did you mean `{}`?)", n))
        .unwrap_or_default();
    anyhow::bail!(
        "unknown service '{}'{}; available: {}",
        name,
        suggestion,
        names.join(", ")
    )
}
