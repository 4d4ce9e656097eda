use anyhow::{bail, Context, Result};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::model::{HealthCheck, ServiceConfig, ServiceKind};
use crate::docker::ContainerRuntime;
use crate::ready::ReadinessProbe;

/// Where a command check runs.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandLocation {
    Host { dir: PathBuf },
    Container { name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProbeKind {
    /// Any HTTP response counts as up; only connect errors and timeouts fail.
    Http { url: String },
    Tcp { port: u16 },
    Command {
        argv: Vec<String>,
        location: CommandLocation,
    },
}

/// A single-shot check against one service.
pub struct ServiceProbe<'a, R> {
    service: String,
    kind: ProbeKind,
    timeout: Duration,
    runtime: &'a R,
}

impl<'a, R: ContainerRuntime> ServiceProbe<'a, R> {
    pub fn new(service: &str, kind: ProbeKind, timeout: Duration, runtime: &'a R) -> Self {
        Self {
            service: service.to_string(),
            kind,
            timeout,
            runtime,
        }
    }

    /// Build the probe for a service from its `health` config. Services
    /// without one fall back to a TCP check on their port, and services with
    /// neither have nothing to probe.
    pub fn for_service(
        svc: &ServiceConfig,
        container: Option<String>,
        workdir: PathBuf,
        timeout: Duration,
        runtime: &'a R,
    ) -> Option<Self> {
        let kind = match &svc.health {
            Some(HealthCheck::Http { url }) => ProbeKind::Http { url: url.clone() },
            Some(HealthCheck::Tcp { port }) => ProbeKind::Tcp {
                port: port.or(svc.port)?,
            },
            Some(HealthCheck::Cmd { command }) => {
                let location = match svc.kind {
                    ServiceKind::Process => CommandLocation::Host { dir: workdir },
                    ServiceKind::Container => CommandLocation::Container {
                        name: container.unwrap_or_else(|| svc.compose_name().to_string()),
                    },
                };
                ProbeKind::Command {
                    argv: command.clone(),
                    location,
                }
            }
            None => ProbeKind::Tcp { port: svc.port? },
        };
        Some(Self::new(&svc.name, kind, timeout, runtime))
    }

    pub fn kind(&self) -> &ProbeKind {
        &self.kind
    }

    /// Short human description, e.g. `GET http://…` or `tcp :5432`.
    pub fn describe(&self) -> String {
        match &self.kind {
            ProbeKind::Http { url } => format!("GET {}", url),
            ProbeKind::Tcp { port } => format!("tcp :{}", port),
            ProbeKind::Command { argv, location } => match location {
                CommandLocation::Host { .. } => argv.join(" "),
                CommandLocation::Container { name } => format!("{} (in {})", argv.join(" "), name),
            },
        }
    }

    async fn run(&self) -> Result<()> {
        match &self.kind {
            ProbeKind::Http { url } => {
                let client = reqwest::Client::builder()
                    .timeout(self.timeout)
                    .build()
                    .context("building HTTP client")?;
                let response = client.get(url).send().await.context("HTTP check")?;
                tracing::debug!(service = %self.service, status = %response.status(), "http probe answered");
                Ok(())
            }
            ProbeKind::Tcp { port } => {
                tokio::time::timeout(
                    self.timeout,
                    tokio::net::TcpStream::connect((Ipv4Addr::LOCALHOST, *port)),
                )
                .await
                .context("TCP connect timed out")?
                .context("TCP connect failed")?;
                Ok(())
            }
            ProbeKind::Command { argv, location } => {
                let Some((program, args)) = argv.split_first() else {
                    bail!("empty check command");
                };
                match location {
                    CommandLocation::Host { dir } => {
                        let status = tokio::time::timeout(
                            self.timeout,
                            tokio::process::Command::new(program)
                                .args(args)
                                .current_dir(dir)
                                .stdin(std::process::Stdio::null())
                                .stdout(std::process::Stdio::null())
                                .stderr(std::process::Stdio::null())
                                .kill_on_drop(true)
                                .status(),
                        )
                        .await
                        .context("check command timed out")?
                        .with_context(|| format!("running {}", program))?;
                        if !status.success() {
                            bail!("'{}' exited with {}", argv.join(" "), status);
                        }
                        Ok(())
                    }
                    CommandLocation::Container { name } => {
                        let out = tokio::time::timeout(
                            self.timeout,
                            self.runtime.exec(name, argv.clone()),
                        )
                        .await
                        .context("check command timed out")??;
                        if !out.success() {
                            bail!(
                                "'{}' exited with code {} in {}",
                                argv.join(" "),
                                out.exit_code,
                                name
                            );
                        }
                        Ok(())
                    }
                }
            }
        }
    }
}

impl<R: ContainerRuntime> ReadinessProbe for ServiceProbe<'_, R> {
    fn target(&self) -> &str {
        &self.service
    }

    async fn check(&self) -> Result<()> {
        self.run().await
    }
}
