pub mod ports;
pub mod process;
pub mod state;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::model::{ServiceConfig, ServiceKind};
use crate::config::LoadedConfig;
use crate::docker::ContainerRuntime;
use crate::error::StackError;
use crate::platform;
use crate::ready::probe::ServiceProbe;
use crate::ready::{wait_until_ready, Readiness, RetryPolicy};
use crate::ui::status;

use state::{HandleTarget, LifecycleHandle, LockedRegistry, Registry};

/// Grace period between SIGTERM and SIGKILL when stopping a process.
pub const STOP_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum StartOutcome {
    Started,
    /// The port was already bound or the container was already up.
    AlreadyRunning(String),
    /// Not attempted because the database never became ready.
    Skipped,
    Failed(anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopped,
    Unknown(String),
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Running => write!(f, "running"),
            RunState::Stopped => write!(f, "stopped"),
            RunState::Unknown(reason) => write!(f, "unknown ({})", reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceStatus {
    pub name: String,
    pub kind: ServiceKind,
    pub state: RunState,
    pub pid: Option<u32>,
    pub container: Option<String>,
    pub port: Option<u16>,
}

/// What `start_all` did, service by service, in launch order.
#[derive(Debug, Default)]
pub struct StartReport {
    pub outcomes: Vec<(String, StartOutcome)>,
    pub database: Option<Result<Readiness, StackError>>,
}

impl StartReport {
    pub fn outcome(&self, service: &str) -> Option<&StartOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == service)
            .map(|(_, outcome)| outcome)
    }

    /// The fatal database failure, if any.
    pub fn database_failure(&self) -> Option<&StackError> {
        match &self.database {
            Some(Err(e)) => Some(e),
            _ => None,
        }
    }
}

/// Starts, stops and inspects the services of one stack.
///
/// Launch order:
///   1. the database-role service, then a readiness wait on it
///   2. every other service in declaration order, sequentially
///
/// Failures past step 1 are warnings; a database that never becomes ready
/// skips the services that require it.
pub struct LifecycleManager<'a, R> {
    loaded: &'a LoadedConfig,
    runtime: &'a R,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl<'a, R: ContainerRuntime> LifecycleManager<'a, R> {
    pub fn new(loaded: &'a LoadedConfig, runtime: &'a R, cancel: CancellationToken) -> Self {
        Self {
            loaded,
            runtime,
            policy: RetryPolicy::from(&loaded.config.readiness),
            cancel,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn service(&self, name: &str) -> Result<&'a ServiceConfig> {
        self.loaded.config.service(name).ok_or_else(|| {
            anyhow::anyhow!(
                "unknown service '{}' (available: {:?})",
                name,
                self.loaded.config.service_names()
            )
        })
    }

    fn log_file(&self, svc: &ServiceConfig) -> PathBuf {
        self.loaded.logs_dir().join(format!("{}.log", svc.name))
    }

    fn lock(&self) -> Result<LockedRegistry> {
        LockedRegistry::open(&self.loaded.logs_dir())
    }

    fn has_containers(&self) -> bool {
        self.loaded.config.container_count() > 0
    }

    /// Container name for a container-kind service: explicit config, then
    /// the registry, then whatever compose reports for the service.
    pub async fn resolve_container(&self, svc: &ServiceConfig) -> Option<String> {
        if let Some(name) = &svc.container {
            return Some(name.clone());
        }
        if let Some(HandleTarget::Container { container }) =
            Registry::load(&self.loaded.logs_dir()).get(&svc.name).map(|h| &h.target)
        {
            return Some(container.clone());
        }
        match self.runtime.compose_ps().await {
            Ok(services) => services
                .into_iter()
                .find(|s| s.service == svc.compose_name())
                .map(|s| s.name),
            Err(e) => {
                debug!(service = %svc.name, error = %e, "compose ps failed");
                None
            }
        }
    }

    // -----------------------------------------------------------------
    // start
    // -----------------------------------------------------------------

    /// Start one service, leaving others alone.
    pub async fn start(&self, name: &str) -> Result<StartOutcome> {
        let svc = self.service(name)?;
        let mut registry = self.lock()?;
        let outcome = self.start_locked(&mut registry, svc).await;
        registry.commit()?;
        Ok(outcome)
    }

    /// Start every service: database first, then the rest in order.
    pub async fn start_all(&self) -> Result<StartReport> {
        let mut registry = self.lock()?;
        self.start_all_locked(&mut registry).await
    }

    async fn start_all_locked(&self, registry: &mut LockedRegistry) -> Result<StartReport> {
        if self.has_containers() {
            self.runtime.ensure_available().await?;
        }

        let mut report = StartReport::default();

        if let Some(db) = self.loaded.config.database() {
            status::info(&format!("starting database '{}'", db.name));
            let outcome = self.start_locked(registry, db).await;
            registry.commit()?;
            let readiness = match &outcome {
                StartOutcome::Failed(e) => Err(StackError::Precondition(format!(
                    "database '{}' failed to start: {:#}",
                    db.name, e
                ))),
                _ => self.wait_for(db).await,
            };
            match &readiness {
                Ok(r) => status::success(&format!(
                    "database '{}' ready after {} attempt(s)",
                    db.name, r.attempts
                )),
                Err(e) => status::error(&e.to_string()),
            }
            report.outcomes.push((db.name.clone(), outcome));
            report.database = Some(readiness);
        }

        let db_ready = !report.database_failure().is_some_and(StackError::is_fatal);

        for svc in self.loaded.config.services.iter().filter(|s| !s.is_database()) {
            if self.cancel.is_cancelled() {
                warn!("start cancelled");
                break;
            }
            if svc.requires_database && !db_ready {
                status::warn(&format!(
                    "skipping '{}': database is not ready",
                    svc.name
                ));
                report.outcomes.push((svc.name.clone(), StartOutcome::Skipped));
                continue;
            }
            status::info(&format!("starting '{}'", svc.name));
            let outcome = self.start_locked(registry, svc).await;
            if let StartOutcome::Failed(e) = &outcome {
                status::warn(&format!("'{}' failed to start: {:#}", svc.name, e));
            }
            registry.commit()?;
            report.outcomes.push((svc.name.clone(), outcome));
        }

        Ok(report)
    }

    async fn start_locked(&self, registry: &mut LockedRegistry, svc: &ServiceConfig) -> StartOutcome {
        if let Some(port) = svc.port {
            if let Some(conflict) = ports::port_conflict(&svc.name, port) {
                info!("{}", conflict);
                status::success(&format!(
                    "'{}' already running on port {}",
                    svc.name, port
                ));
                return StartOutcome::AlreadyRunning(conflict.to_string());
            }
        }

        let result = match svc.kind {
            ServiceKind::Process => self.launch_process(registry, svc).await,
            ServiceKind::Container => self.launch_container(registry, svc).await,
        };
        match result {
            Ok(outcome) => outcome,
            Err(e) => StartOutcome::Failed(e),
        }
    }

    async fn launch_process(
        &self,
        registry: &mut LockedRegistry,
        svc: &ServiceConfig,
    ) -> Result<StartOutcome> {
        if let Some(pid) = registry.get(&svc.name).and_then(LifecycleHandle::pid) {
            if platform::is_process_alive(pid) {
                status::success(&format!("'{}' already running (pid {})", svc.name, pid));
                return Ok(StartOutcome::AlreadyRunning(format!("pid {}", pid)));
            }
            debug!(service = %svc.name, pid, "dropping stale handle");
            registry.remove(&svc.name);
        }

        let command = svc.command.as_deref().ok_or_else(|| {
            StackError::Precondition(format!("process service '{}' has no command", svc.name))
        })?;
        let workdir = self.loaded.service_dir(svc.dir.as_deref());
        let log_file = self.log_file(svc);
        let pid = process::spawn_detached(&svc.name, command, &workdir, &svc.env, &log_file).await?;

        registry.insert(LifecycleHandle::process(&svc.name, pid, &log_file));
        status::success(&format!(
            "'{}' started (pid {}, log {})",
            svc.name,
            pid,
            log_file.display()
        ));
        Ok(StartOutcome::Started)
    }

    async fn launch_container(
        &self,
        registry: &mut LockedRegistry,
        svc: &ServiceConfig,
    ) -> Result<StartOutcome> {
        if let Some(container) = self.resolve_container(svc).await {
            if self.runtime.is_running(&container).await.unwrap_or(false) {
                registry.insert(LifecycleHandle::container(&svc.name, &container));
                status::success(&format!("'{}' already running ({})", svc.name, container));
                return Ok(StartOutcome::AlreadyRunning(container));
            }
        }

        self.runtime
            .compose_up(&[svc.compose_name().to_string()], &[])
            .await?;

        let container = self
            .resolve_container(svc)
            .await
            .unwrap_or_else(|| svc.compose_name().to_string());
        registry.insert(LifecycleHandle::container(&svc.name, &container));
        status::success(&format!("'{}' started ({})", svc.name, container));
        Ok(StartOutcome::Started)
    }

    /// Poll the service's probe under the configured retry policy.
    pub async fn wait_for(&self, svc: &ServiceConfig) -> Result<Readiness, StackError> {
        let container = match svc.kind {
            ServiceKind::Container => self.resolve_container(svc).await,
            ServiceKind::Process => None,
        };
        let Some(probe) = ServiceProbe::for_service(
            svc,
            container,
            self.loaded.service_dir(svc.dir.as_deref()),
            self.loaded.config.health.timeout,
            self.runtime,
        ) else {
            status::warn(&format!(
                "'{}' has no health check or port; assuming ready",
                svc.name
            ));
            return Ok(Readiness {
                attempts: 0,
                elapsed: Duration::ZERO,
            });
        };
        status::progress(&format!(
            "waiting for '{}' ({}), up to {} attempts over {}",
            svc.name,
            probe.describe(),
            self.policy.attempts(),
            humantime::format_duration(self.policy.worst_case_wait())
        ));
        wait_until_ready(&probe, &self.policy, &self.cancel).await
    }

    // -----------------------------------------------------------------
    // stop
    // -----------------------------------------------------------------

    pub async fn stop(&self, name: &str) -> Result<StopOutcome> {
        let svc = self.service(name)?;
        let mut registry = self.lock()?;
        let outcome = self.stop_locked(&mut registry, svc).await;
        registry.commit()?;
        outcome
    }

    /// Stop every service in reverse declaration order. Individual failures
    /// are warnings.
    pub async fn stop_all(&self) -> Result<Vec<(String, StopOutcome)>> {
        let mut registry = self.lock()?;
        self.stop_all_locked(&mut registry).await
    }

    async fn stop_all_locked(
        &self,
        registry: &mut LockedRegistry,
    ) -> Result<Vec<(String, StopOutcome)>> {
        let mut outcomes = Vec::new();
        for svc in self.loaded.config.services.iter().rev() {
            match self.stop_locked(registry, svc).await {
                Ok(outcome) => outcomes.push((svc.name.clone(), outcome)),
                Err(e) => status::warn(&format!("failed to stop '{}': {:#}", svc.name, e)),
            }
            registry.commit()?;
        }
        Ok(outcomes)
    }

    async fn stop_locked(
        &self,
        registry: &mut LockedRegistry,
        svc: &ServiceConfig,
    ) -> Result<StopOutcome> {
        match svc.kind {
            ServiceKind::Process => {
                let Some(handle) = registry.remove(&svc.name) else {
                    debug!(service = %svc.name, "no handle, nothing to stop");
                    return Ok(StopOutcome::NotRunning);
                };
                let Some(pid) = handle.pid() else {
                    return Ok(StopOutcome::NotRunning);
                };
                if !platform::is_process_alive(pid) {
                    debug!(service = %svc.name, pid, "recorded process already gone");
                    return Ok(StopOutcome::NotRunning);
                }
                platform::terminate_pid(pid, STOP_GRACE).await;
                status::success(&format!("stopped '{}' (pid {})", svc.name, pid));
                Ok(StopOutcome::Stopped)
            }
            ServiceKind::Container => {
                let container = self.resolve_container(svc).await;
                registry.remove(&svc.name);
                let Some(container) = container else {
                    return Ok(StopOutcome::NotRunning);
                };
                if !self.runtime.is_running(&container).await? {
                    return Ok(StopOutcome::NotRunning);
                }
                self.runtime
                    .compose_stop(&[svc.compose_name().to_string()])
                    .await?;
                status::success(&format!("stopped '{}' ({})", svc.name, container));
                Ok(StopOutcome::Stopped)
            }
        }
    }

    /// Stop then start, holding the registry lock across both.
    pub async fn restart(&self) -> Result<StartReport> {
        let mut registry = self.lock()?;
        self.stop_all_locked(&mut registry).await?;
        self.start_all_locked(&mut registry).await
    }

    /// Stop everything, remove containers and volumes, forget every handle
    /// and delete the process logs. Runtime errors are warnings so a dead
    /// daemon does not block cleaning up local processes.
    pub async fn clean(&self) -> Result<()> {
        let mut registry = self.lock()?;
        self.stop_all_locked(&mut registry).await?;

        if self.has_containers() {
            match self.runtime.compose_down(true).await {
                Ok(()) => status::success("removed containers and volumes"),
                Err(e) => status::warn(&format!("compose down failed: {:#}", e)),
            }
        }

        registry.clear()?;
        let removed = remove_logs(&self.loaded.logs_dir())?;
        status::success(&format!("removed {} log file(s)", removed));
        Ok(())
    }

    // -----------------------------------------------------------------
    // status
    // -----------------------------------------------------------------

    pub async fn status(&self, svc: &ServiceConfig) -> ServiceStatus {
        let registry = Registry::load(&self.loaded.logs_dir());
        match svc.kind {
            ServiceKind::Process => {
                let pid = registry.get(&svc.name).and_then(LifecycleHandle::pid);
                let state = match pid {
                    Some(pid) if platform::is_process_alive(pid) => RunState::Running,
                    _ => RunState::Stopped,
                };
                ServiceStatus {
                    name: svc.name.clone(),
                    kind: svc.kind,
                    state,
                    pid,
                    container: None,
                    port: svc.port,
                }
            }
            ServiceKind::Container => {
                let container = self.resolve_container(svc).await;
                let state = match &container {
                    None => RunState::Stopped,
                    Some(name) => match self.runtime.is_running(name).await {
                        Ok(true) => RunState::Running,
                        Ok(false) => RunState::Stopped,
                        Err(e) => RunState::Unknown(format!("{:#}", e)),
                    },
                };
                ServiceStatus {
                    name: svc.name.clone(),
                    kind: svc.kind,
                    state,
                    pid: None,
                    container,
                    port: svc.port,
                }
            }
        }
    }

    pub async fn status_all(&self) -> Vec<ServiceStatus> {
        let mut statuses = Vec::with_capacity(self.loaded.config.services.len());
        for svc in &self.loaded.config.services {
            statuses.push(self.status(svc).await);
        }
        statuses
    }
}

fn remove_logs(dir: &std::path::Path) -> Result<usize> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    let mut removed = 0;
    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "log") {
            std::fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}
