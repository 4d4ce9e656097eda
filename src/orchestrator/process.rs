use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, info};

use crate::platform;

/// How long a freshly spawned process must survive before it counts as started.
pub const STARTUP_GRACE: Duration = Duration::from_millis(500);

/// Launch `command` through the user's shell, detached into its own process
/// group, with stdout and stderr appended to `log_file`. Returns the PID.
///
/// A process that exits non-zero within [`STARTUP_GRACE`] is reported as a
/// failed start.
pub async fn spawn_detached(
    service: &str,
    command: &str,
    workdir: &Path,
    env: &BTreeMap<String, String>,
    log_file: &Path,
) -> Result<u32> {
    if !workdir.is_dir() {
        bail!(crate::error::StackError::Precondition(format!(
            "working directory {} for '{}' does not exist",
            workdir.display(),
            service
        )));
    }
    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let stdout = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("opening log file {}", log_file.display()))?;
    let stderr = stdout
        .try_clone()
        .context("duplicating log file handle")?;

    info!(
        service = %service,
        "spawning: {} {:?}",
        platform::shell_name(),
        command,
    );

    let mut cmd = platform::shell_command(command);
    cmd.current_dir(workdir)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr));
    platform::configure_detached(&mut cmd);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to spawn service {}", service))?;
    let pid = child
        .id()
        .with_context(|| format!("service {} exited before reporting a pid", service))?;
    debug!(service = %service, pid, "child spawned");

    tokio::time::sleep(STARTUP_GRACE).await;
    if let Some(status) = child.try_wait().context("polling child status")? {
        if !status.success() {
            bail!(
                "'{}' exited with {} right after launch (see {})",
                service,
                status,
                log_file.display()
            );
        }
        debug!(service = %service, "process finished during startup grace");
    }

    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::test_commands;
    use tempfile::tempdir;

    #[tokio::test]
    async fn output_goes_to_log_file() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("logs").join("api.log");
        let env = BTreeMap::from([("GREETING".to_string(), "hello-from-env".to_string())]);

        let pid = spawn_detached("api", "echo $GREETING", dir.path(), &env, &log)
            .await
            .unwrap();
        assert!(pid > 0);

        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.contains("hello-from-env"), "log was: {content:?}");
    }

    #[tokio::test]
    async fn immediate_failure_is_reported() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("bad.log");
        let err = spawn_detached(
            "bad",
            test_commands::exit_failure(),
            dir.path(),
            &BTreeMap::new(),
            &log,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("right after launch"), "{err:#}");
    }

    #[tokio::test]
    async fn long_running_process_stays_alive() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("sleep.log");
        let pid = spawn_detached(
            "sleeper",
            test_commands::sleep_long(),
            dir.path(),
            &BTreeMap::new(),
            &log,
        )
        .await
        .unwrap();

        assert!(platform::is_process_alive(pid));
        assert!(platform::terminate_pid(pid, Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn missing_workdir_is_precondition_failure() {
        let dir = tempdir().unwrap();
        let err = spawn_detached(
            "api",
            test_commands::exit_success(),
            &dir.path().join("nope"),
            &BTreeMap::new(),
            &dir.path().join("api.log"),
        )
        .await
        .unwrap_err();
        assert!(err.downcast_ref::<crate::error::StackError>().is_some());
    }
}
