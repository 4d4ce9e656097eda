use anyhow::Result;
use std::path::Path;

use crate::config::LoadedConfig;
use crate::platform;
use crate::ui::status;

/// How many install commands ran, and how many of them failed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InstallSummary {
    pub ran: usize,
    pub failed: usize,
}

pub async fn run(config_file: Option<&Path>) -> Result<()> {
    let loaded = LoadedConfig::load(config_file)?;
    let summary = install_all(&loaded).await;

    if summary.ran == 0 {
        status::info("no services declare an install command");
    } else if summary.failed > 0 {
        status::warn(&format!(
            "{} of {} install(s) failed",
            summary.failed, summary.ran
        ));
    }
    Ok(())
}

/// Run every service's `install` command in its working directory. A failed
/// install is a warning; the remaining services are still installed.
pub async fn install_all(loaded: &LoadedConfig) -> InstallSummary {
    let mut summary = InstallSummary::default();

    for svc in &loaded.config.services {
        let Some(install) = &svc.install else {
            continue;
        };
        summary.ran += 1;
        let dir = loaded.service_dir(svc.dir.as_deref());
        status::info(&format!("installing '{}': {}", svc.name, install));

        let result = platform::shell_command(install)
            .current_dir(&dir)
            .envs(&svc.env)
            .status()
            .await;
        match result {
            Ok(s) if s.success() => status::success(&format!("'{}' installed", svc.name)),
            Ok(s) => {
                summary.failed += 1;
                status::warn(&format!("install for '{}' exited with {}", svc.name, s));
            }
            Err(e) => {
                summary.failed += 1;
                status::warn(&format!(
                    "could not run install for '{}' in {}: {}",
                    svc.name,
                    dir.display(),
                    e
                ));
            }
        }
    }

    summary
}
