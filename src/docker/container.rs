use anyhow::{Context, Result};
use bollard::query_parameters::InspectContainerOptions;
use bollard::Docker;

/// Whether the container exists and is in the running state.
/// A missing container is simply not running.
pub async fn is_container_running(docker: &Docker, container: &str) -> Result<bool> {
    match docker
        .inspect_container(container, None::<InspectContainerOptions>)
        .await
    {
        Ok(info) => Ok(info
            .state
            .and_then(|state| state.running)
            .unwrap_or(false)),
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        }) => Ok(false),
        Err(e) => Err(e).with_context(|| format!("inspecting container {}", container)),
    }
}
