use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::config::LoadedConfig;
use crate::orchestrator::LifecycleManager;
use crate::ui::status;

/// Destroy containers, volumes, processes and logs. Asks first unless `yes`.
pub async fn run(config_file: Option<&Path>, yes: bool) -> Result<()> {
    let loaded = LoadedConfig::load(config_file)?;

    if !yes {
        let prompt = format!(
            "This removes all containers, volumes, processes and logs of '{}'. Continue? [y/N] ",
            loaded.config.project.name
        );
        // Blocking stdin read off the runtime so Ctrl+C can still end the command.
        let confirmed = tokio::task::spawn_blocking(move || {
            confirm(&prompt, std::io::stdin().lock(), std::io::stdout())
        })
        .await
        .context("confirmation prompt")??;
        if !confirmed {
            status::info("aborted, nothing was removed");
            return Ok(());
        }
    }

    let runtime = super::docker_runtime(&loaded)?;
    let manager = LifecycleManager::new(&loaded, &runtime, CancellationToken::new());
    manager.clean().await?;
    status::success(&format!("stack '{}' cleaned", loaded.config.project.name));
    Ok(())
}

/// Print `prompt` and read one answer. Only `y`/`yes` confirm; EOF declines.
pub fn confirm(prompt: &str, mut input: impl BufRead, mut out: impl Write) -> Result<bool> {
    write!(out, "{}", prompt)?;
    out.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer).context("reading confirmation")?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}
