//! Build images, redeploy the compose stack, initialize the schema and
//! verify the result.
//!
//! A run is a straight line through [`DeployPhase`]s. Any error moves the
//! run to `Failed` and is returned; there is no resume, the operator simply
//! runs `build` again.

pub mod phase;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::LoadedConfig;
use crate::docker::{BuildRequest, ContainerRuntime, ImageTags};
use crate::error::StackError;
use crate::orchestrator::LifecycleManager;
use crate::ready::RetryPolicy;
use crate::ui::status;

pub use phase::{DeployPhase, IllegalTransition, PhaseTracker};

/// Substring in psql output that marks an already-applied schema file.
const DUPLICATE_KEY: &str = "duplicate key";

/// An image produced by the build phase.
#[derive(Debug, Clone)]
pub struct BuildArtifact {
    pub service: String,
    pub image: String,
    pub tags: ImageTags,
    pub built_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct DeployReport {
    pub version: String,
    pub artifacts: Vec<BuildArtifact>,
    pub running: usize,
    pub required: usize,
    pub phases: Vec<DeployPhase>,
}

pub struct DeployPipeline<'a, R> {
    loaded: &'a LoadedConfig,
    runtime: &'a R,
    policy: RetryPolicy,
    cancel: CancellationToken,
    tags: ImageTags,
    tracker: PhaseTracker,
}

impl<'a, R: ContainerRuntime> DeployPipeline<'a, R> {
    /// `now` fixes the image tags and the version for the whole run.
    pub fn new(
        loaded: &'a LoadedConfig,
        runtime: &'a R,
        cancel: CancellationToken,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            loaded,
            runtime,
            policy: RetryPolicy::from(&loaded.config.readiness),
            cancel,
            tags: ImageTags::at(now),
            tracker: PhaseTracker::new(),
        }
    }

    pub fn phase(&self) -> DeployPhase {
        self.tracker.current()
    }

    pub fn phases(&self) -> Vec<DeployPhase> {
        self.tracker.phases()
    }

    /// The version stamped on this run (`YYYYMMDD-HHMMSS`).
    pub fn version(&self) -> &str {
        &self.tags.timestamp
    }

    pub async fn run(&mut self) -> Result<DeployReport> {
        match self.run_phases().await {
            Ok(report) => Ok(report),
            Err(e) => {
                let failed_in = self.tracker.current();
                self.tracker.fail();
                status::error(&format!("deploy failed during {}: {:#}", failed_in, e));
                Err(e)
            }
        }
    }

    fn advance(&mut self, to: DeployPhase) -> Result<()> {
        self.tracker.advance(to)?;
        status::header(&format!("[{}]", to));
        Ok(())
    }

    async fn run_phases(&mut self) -> Result<DeployReport> {
        self.runtime.ensure_available().await?;

        status::header(&format!("[{}]", DeployPhase::Building));
        let artifacts = self.build_all().await?;
        self.write_version_marker()?;

        self.advance(DeployPhase::Deploying)?;
        self.deploy().await?;
        self.settle().await?;

        self.advance(DeployPhase::AwaitingDb)?;
        self.await_database().await?;

        self.advance(DeployPhase::SchemaInit)?;
        self.init_schema().await?;

        self.advance(DeployPhase::Verifying)?;
        let (running, required) = self.verify().await?;

        self.tracker.advance(DeployPhase::Done)?;
        status::success(&format!(
            "deployed version {} ({}/{} services running)",
            self.tags.timestamp, running, required
        ));

        Ok(DeployReport {
            version: self.tags.timestamp.clone(),
            artifacts,
            running,
            required,
            phases: self.tracker.phases(),
        })
    }

    fn build_requests(&self) -> Vec<BuildRequest> {
        let version_var = &self.loaded.config.project.version_var;
        self.loaded
            .config
            .services
            .iter()
            .filter_map(|svc| {
                let build = svc.build.as_ref()?;
                let context = self.loaded.root.join(&build.context);
                Some(BuildRequest {
                    service: svc.name.clone(),
                    image: build.image.clone(),
                    dockerfile: context.join(&build.dockerfile),
                    context,
                    tags: self.tags.clone(),
                    build_args: vec![(version_var.clone(), self.tags.timestamp.clone())],
                })
            })
            .collect()
    }

    /// Build every image in declaration order. The first failure stops the run.
    async fn build_all(&self) -> Result<Vec<BuildArtifact>> {
        let requests = self.build_requests();
        if requests.is_empty() {
            status::warn("no services declare a build section");
        }
        let mut artifacts = Vec::with_capacity(requests.len());
        for request in requests {
            status::info(&format!(
                "building {} ({})",
                request.service,
                request.references().join(", ")
            ));
            self.runtime.build_image(&request).await.map_err(|e| {
                StackError::BuildFailure {
                    service: request.service.clone(),
                    reason: format!("{:#}", e),
                }
            })?;
            status::success(&format!("built {}", request.image));
            artifacts.push(BuildArtifact {
                service: request.service,
                image: request.image,
                tags: request.tags,
                built_at: Utc::now(),
            });
        }
        Ok(artifacts)
    }

    fn write_version_marker(&self) -> Result<()> {
        let path = self.loaded.version_file();
        std::fs::write(&path, format!("{}\n", self.tags.timestamp))
            .with_context(|| format!("writing version marker {}", path.display()))?;
        info!(version = %self.tags.timestamp, path = %path.display(), "version marker written");
        Ok(())
    }

    async fn deploy(&self) -> Result<()> {
        status::info("stopping the running stack");
        self.runtime.compose_down(false).await?;
        let env = [(
            self.loaded.config.project.version_var.clone(),
            self.tags.timestamp.clone(),
        )];
        status::info(&format!("starting the stack at version {}", self.tags.timestamp));
        self.runtime.compose_up(&[], &env).await?;
        Ok(())
    }

    async fn settle(&self) -> Result<()> {
        let settle = self.loaded.config.deploy.settle;
        if settle.is_zero() {
            return Ok(());
        }
        status::progress(&format!("letting services settle for {:?}", settle));
        tokio::select! {
            _ = self.cancel.cancelled() => bail!(StackError::Cancelled("deploy".to_string())),
            _ = tokio::time::sleep(settle) => Ok(()),
        }
    }

    fn lifecycle(&self) -> LifecycleManager<'a, R> {
        LifecycleManager::new(self.loaded, self.runtime, self.cancel.clone())
            .with_policy(self.policy.clone())
    }

    async fn await_database(&self) -> Result<()> {
        let Some(db) = self.loaded.config.database() else {
            debug!("no database service, nothing to wait for");
            return Ok(());
        };
        let readiness = self.lifecycle().wait_for(db).await?;
        status::success(&format!(
            "database '{}' ready after {} attempt(s)",
            db.name, readiness.attempts
        ));
        Ok(())
    }

    async fn init_schema(&self) -> Result<()> {
        let Some(schema) = &self.loaded.config.schema else {
            debug!("no schema section, skipping");
            return Ok(());
        };
        let svc = self.loaded.config.service(&schema.service).ok_or_else(|| {
            StackError::Precondition(format!("schema service '{}' is not defined", schema.service))
        })?;
        let container = self
            .lifecycle()
            .resolve_container(svc)
            .await
            .unwrap_or_else(|| svc.compose_name().to_string());

        for file in &schema.files {
            let argv = psql_argv(&schema.user, &schema.database, file);
            status::info(&format!("applying {} in {}", file, container));
            let out = self.runtime.exec(&container, argv).await?;
            match classify_schema_result(out.exit_code, &out.output) {
                SchemaResult::Applied => status::success(&format!("applied {}", file)),
                SchemaResult::AlreadyApplied => status::warn(&format!(
                    "{} already applied (duplicate key), continuing",
                    file
                )),
                SchemaResult::Failed => bail!(StackError::SchemaInit {
                    file: file.clone(),
                    reason: format!(
                        "psql exited with {}: {}",
                        out.exit_code,
                        out.output.trim()
                    ),
                }),
            }
        }
        Ok(())
    }

    async fn verify(&self) -> Result<(usize, usize)> {
        let required = self
            .loaded
            .config
            .deploy
            .min_running
            .unwrap_or_else(|| self.loaded.config.container_count());
        let running = self
            .runtime
            .compose_ps()
            .await?
            .iter()
            .filter(|s| s.is_running())
            .count();
        if running < required {
            bail!(
                "only {} of the required {} services are running",
                running,
                required
            );
        }
        Ok((running, required))
    }
}

fn psql_argv(user: &str, database: &str, file: &str) -> Vec<String> {
    [
        "psql",
        "-v",
        "ON_ERROR_STOP=1",
        "-U",
        user,
        "-d",
        database,
        "-f",
        file,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchemaResult {
    Applied,
    AlreadyApplied,
    Failed,
}

fn classify_schema_result(exit_code: i64, output: &str) -> SchemaResult {
    if exit_code == 0 {
        SchemaResult::Applied
    } else if output.contains(DUPLICATE_KEY) {
        SchemaResult::AlreadyApplied
    } else {
        SchemaResult::Failed
    }
}
