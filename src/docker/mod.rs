pub mod container;
pub mod exec;
pub mod image;

use std::future::Future;

use anyhow::{Context, Result};
use bollard::Docker;

use crate::compose::{self, ComposeProject, ComposeService};
use crate::error::StackError;

pub use exec::ExecOutput;
pub use image::{BuildRequest, ImageTags};

/// Everything the lifecycle manager and deploy pipeline need from the
/// container runtime. Commands are typed argv lists end to end.
pub trait ContainerRuntime {
    /// Fail with a precondition error when the daemon is unreachable.
    fn ensure_available(&self) -> impl Future<Output = Result<()>>;

    fn build_image(&self, request: &BuildRequest) -> impl Future<Output = Result<()>>;

    fn compose_up(
        &self,
        services: &[String],
        env: &[(String, String)],
    ) -> impl Future<Output = Result<()>>;

    fn compose_down(&self, remove_volumes: bool) -> impl Future<Output = Result<()>>;

    fn compose_stop(&self, services: &[String]) -> impl Future<Output = Result<()>>;

    fn compose_ps(&self) -> impl Future<Output = Result<Vec<ComposeService>>>;

    fn is_running(&self, container: &str) -> impl Future<Output = Result<bool>>;

    fn exec(&self, container: &str, argv: Vec<String>) -> impl Future<Output = Result<ExecOutput>>;
}

/// `docker` CLI for builds and compose, bollard for exec and inspect.
pub struct DockerRuntime {
    docker: Docker,
    project: ComposeProject,
}

impl DockerRuntime {
    /// Create the client. No connection is made until the first call.
    pub fn new(project: ComposeProject) -> Result<Self> {
        let docker =
            Docker::connect_with_local_defaults().context("connecting to Docker daemon")?;
        Ok(Self { docker, project })
    }
}

impl ContainerRuntime for DockerRuntime {
    async fn ensure_available(&self) -> Result<()> {
        self.docker.ping().await.map_err(|e| {
            StackError::Precondition(format!(
                "Cannot connect to Docker daemon. Is Docker running? ({})",
                e
            ))
        })?;
        Ok(())
    }

    async fn build_image(&self, request: &BuildRequest) -> Result<()> {
        image::build_image(request).await
    }

    async fn compose_up(&self, services: &[String], env: &[(String, String)]) -> Result<()> {
        compose::lifecycle::compose_up(&self.project, services, env).await
    }

    async fn compose_down(&self, remove_volumes: bool) -> Result<()> {
        compose::lifecycle::compose_down(&self.project, remove_volumes).await
    }

    async fn compose_stop(&self, services: &[String]) -> Result<()> {
        compose::lifecycle::compose_stop(&self.project, services).await
    }

    async fn compose_ps(&self) -> Result<Vec<ComposeService>> {
        compose::lifecycle::compose_ps(&self.project).await
    }

    async fn is_running(&self, container: &str) -> Result<bool> {
        container::is_container_running(&self.docker, container).await
    }

    async fn exec(&self, container: &str, argv: Vec<String>) -> Result<ExecOutput> {
        exec::run_argv(&self.docker, container, argv).await
    }
}
