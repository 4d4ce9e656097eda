use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use super::ComposeProject;

/// Represents a service reported by `docker compose ps --format json`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ComposeService {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Service")]
    pub service: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(default, rename = "Health")]
    pub health: String,
}

impl ComposeService {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

fn compose_command(project: &ComposeProject) -> Command {
    let mut cmd = Command::new("docker");
    cmd.args(project.base_args());
    cmd
}

async fn run_checked(mut cmd: Command, what: &str) -> Result<()> {
    let output = cmd
        .output()
        .await
        .with_context(|| format!("running docker compose {}", what))?;
    if !output.status.success() {
        bail!(
            "docker compose {} failed: {}",
            what,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

/// Run `docker compose up -d` for the given services (all when empty).
/// `env` is added to the compose process environment for `${VAR}` substitution.
pub async fn compose_up(
    project: &ComposeProject,
    services: &[String],
    env: &[(String, String)],
) -> Result<()> {
    let mut cmd = compose_command(project);
    cmd.args(["up", "-d"]);
    cmd.args(services);
    cmd.envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    debug!(?services, "docker compose up");
    run_checked(cmd, "up").await
}

/// Run `docker compose down --remove-orphans`, optionally dropping volumes.
pub async fn compose_down(project: &ComposeProject, remove_volumes: bool) -> Result<()> {
    let mut cmd = compose_command(project);
    cmd.args(["down", "--remove-orphans"]);
    if remove_volumes {
        cmd.arg("--volumes");
    }
    run_checked(cmd, "down").await
}

/// Run `docker compose stop` for the given services.
pub async fn compose_stop(project: &ComposeProject, services: &[String]) -> Result<()> {
    let mut cmd = compose_command(project);
    cmd.arg("stop");
    cmd.args(services);
    run_checked(cmd, "stop").await
}

/// Run `docker compose ps --format json` and parse the output.
pub async fn compose_ps(project: &ComposeProject) -> Result<Vec<ComposeService>> {
    let mut cmd = compose_command(project);
    cmd.args(["ps", "--all", "--format", "json"]);
    let output = cmd.output().await.context("running docker compose ps")?;

    if !output.status.success() {
        bail!(
            "docker compose ps failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    parse_ps_output(&String::from_utf8_lossy(&output.stdout))
}

/// Stream `docker compose logs -f [service]` to the terminal until interrupted.
pub async fn compose_logs(project: &ComposeProject, service: Option<&str>) -> Result<()> {
    let mut cmd = compose_command(project);
    cmd.args(["logs", "-f", "--tail", "100"]).kill_on_drop(true);
    if let Some(svc) = service {
        cmd.arg(svc);
    }
    let status = cmd.status().await.context("running docker compose logs")?;
    if !status.success() {
        bail!("docker compose logs exited with {}", status);
    }
    Ok(())
}

/// `docker compose ps --format json` prints either a JSON array or one
/// object per line depending on the compose version.
pub fn parse_ps_output(stdout: &str) -> Result<Vec<ComposeService>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if let Ok(services) = serde_json::from_str::<Vec<ComposeService>>(trimmed) {
        return Ok(services);
    }

    let mut services = Vec::new();
    for line in trimmed.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let svc: ComposeService =
            serde_json::from_str(line).context("parsing docker compose ps output")?;
        services.push(svc);
    }

    Ok(services)
}
