//! One-shot health report across every configured service.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::config::model::ServiceKind;
use crate::config::LoadedConfig;
use crate::docker::ContainerRuntime;
use crate::error::StackError;
use crate::ready::probe::ServiceProbe;
use crate::ready::ReadinessProbe;

#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub service: String,
    pub healthy: bool,
    pub checked_at: DateTime<Utc>,
    pub detail: String,
}

impl HealthStatus {
    /// The informational error for an unhealthy service.
    pub fn as_error(&self) -> Option<StackError> {
        (!self.healthy).then(|| StackError::HealthCheck {
            service: self.service.clone(),
            reason: self.detail.clone(),
        })
    }
}

/// Probe each service exactly once, in declaration order. Never fails: an
/// unreachable runtime just marks container services unhealthy.
pub async fn check_all<R: ContainerRuntime>(
    loaded: &LoadedConfig,
    runtime: &R,
) -> Vec<HealthStatus> {
    let timeout = loaded.config.health.timeout;
    let mut containers = None;
    let mut report = Vec::with_capacity(loaded.config.services.len());

    for svc in &loaded.config.services {
        let container = match svc.kind {
            ServiceKind::Process => None,
            ServiceKind::Container => {
                if containers.is_none() {
                    containers = Some(runtime.compose_ps().await.unwrap_or_default());
                }
                svc.container.clone().or_else(|| {
                    containers.as_ref().and_then(|list| {
                        list.iter()
                            .find(|c| c.service == svc.compose_name())
                            .map(|c| c.name.clone())
                    })
                })
            }
        };

        let probe = ServiceProbe::for_service(
            svc,
            container,
            loaded.service_dir(svc.dir.as_deref()),
            timeout,
            runtime,
        );
        let (healthy, detail) = match probe {
            None => (false, "no health check or port configured".to_string()),
            Some(probe) => check_once(&probe, timeout).await,
        };
        tracing::debug!(service = %svc.name, healthy, %detail, "health probe");
        report.push(HealthStatus {
            service: svc.name.clone(),
            healthy,
            checked_at: Utc::now(),
            detail,
        });
    }
    report
}

async fn check_once<R: ContainerRuntime>(
    probe: &ServiceProbe<'_, R>,
    timeout: Duration,
) -> (bool, String) {
    match tokio::time::timeout(timeout, probe.check()).await {
        Ok(Ok(())) => (true, probe.describe()),
        Ok(Err(e)) => (false, format!("{:#}", e)),
        Err(_) => (false, format!("timed out after {:?}", timeout)),
    }
}

pub fn healthy_count(report: &[HealthStatus]) -> usize {
    report.iter().filter(|s| s.healthy).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::fake::FakeRuntime;
    use std::net::TcpListener;
    use tempfile::TempDir;

    fn loaded(dir: &TempDir, services: &str) -> LoadedConfig {
        let source = format!("[project]\nname = \"docstack\"\n\n{}", services);
        LoadedConfig {
            config: toml::from_str(&source).unwrap(),
            path: dir.path().join("stackctl.toml"),
            root: dir.path().to_path_buf(),
        }
    }

    #[tokio::test]
    async fn all_down_reports_every_service_unhealthy() {
        let dir = TempDir::new().unwrap();
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let cfg = loaded(
            &dir,
            &format!(
                r#"
[[services]]
name = "api"
kind = "process"
command = "serve"
port = {port}

[[services]]
name = "worker"
kind = "process"
command = "work"
"#
            ),
        );
        let rt = FakeRuntime::default();
        let report = check_all(&cfg, &rt).await;
        assert_eq!(report.len(), 2);
        assert_eq!(healthy_count(&report), 0);
        assert!(report[1].detail.contains("no health check"));
        assert!(matches!(
            report[0].as_error(),
            Some(StackError::HealthCheck { .. })
        ));
        assert!(!report[0].as_error().unwrap().is_fatal());
    }

    #[tokio::test]
    async fn one_attempt_per_service() {
        let dir = TempDir::new().unwrap();
        let cfg = loaded(
            &dir,
            r#"
[[services]]
name = "database"
kind = "container"
role = "database"
container = "docstack-db"
health = { type = "cmd", command = ["pg_isready"] }
"#,
        );
        let rt = FakeRuntime::default();
        rt.queue_exec(1, "rejecting connections");
        let report = check_all(&cfg, &rt).await;
        assert!(!report[0].healthy);
        assert_eq!(rt.calls(), vec!["exec docstack-db pg_isready"]);
    }

    #[tokio::test]
    async fn listening_port_is_healthy() {
        let dir = TempDir::new().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let cfg = loaded(
            &dir,
            &format!(
                "[[services]]\nname = \"api\"\nkind = \"process\"\ncommand = \"serve\"\nport = {port}\n"
            ),
        );
        let rt = FakeRuntime::default();
        let report = check_all(&cfg, &rt).await;
        assert!(report[0].healthy);
        assert_eq!(healthy_count(&report), 1);
    }
}
