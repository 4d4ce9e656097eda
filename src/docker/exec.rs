use anyhow::{anyhow, Context, Result};
use bollard::exec::{StartExecOptions, StartExecResults};
use bollard::models::ExecConfig;
use bollard::Docker;
use futures_util::TryStreamExt;

/// Exit code and combined stdout/stderr of a finished exec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i64,
    pub output: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run `argv` in `container` and wait for it to exit. The argv reaches the
/// daemon as a list; no shell inside the container parses it.
pub async fn run_argv(docker: &Docker, container: &str, argv: Vec<String>) -> Result<ExecOutput> {
    let program = argv
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("empty command for {}", container))?;

    let exec = docker
        .create_exec(
            container,
            ExecConfig {
                cmd: Some(argv),
                attach_stdout: Some(true),
                attach_stderr: Some(true),
                ..Default::default()
            },
        )
        .await
        .with_context(|| format!("preparing `{}` in {}", program, container))?;

    let started = docker
        .start_exec(&exec.id, None::<StartExecOptions>)
        .await
        .with_context(|| format!("starting `{}` in {}", program, container))?;
    let output = match started {
        StartExecResults::Attached { output, .. } => output
            .map_ok(|chunk| chunk.to_string())
            .try_collect::<Vec<_>>()
            .await
            .with_context(|| format!("reading output of `{}`", program))?
            .concat(),
        StartExecResults::Detached => String::new(),
    };

    let exit_code = docker
        .inspect_exec(&exec.id)
        .await
        .with_context(|| format!("inspecting `{}` in {}", program, container))?
        .exit_code
        .ok_or_else(|| anyhow!("`{}` in {} reported no exit code", program, container))?;

    Ok(ExecOutput { exit_code, output })
}
