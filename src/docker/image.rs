use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tokio::process::Command;

/// The three tags every built image receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTags {
    /// `YYYYMMDD`
    pub date: String,
    /// always `latest`
    pub latest: String,
    /// `YYYYMMDD-HHMMSS`, doubles as the stack version
    pub timestamp: String,
}

impl ImageTags {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            date: now.format("%Y%m%d").to_string(),
            latest: "latest".to_string(),
            timestamp: now.format("%Y%m%d-%H%M%S").to_string(),
        }
    }

    pub fn all(&self) -> [&str; 3] {
        [&self.date, &self.latest, &self.timestamp]
    }
}

/// One `docker build` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildRequest {
    pub service: String,
    pub image: String,
    pub context: PathBuf,
    pub dockerfile: PathBuf,
    pub tags: ImageTags,
    pub build_args: Vec<(String, String)>,
}

impl BuildRequest {
    /// Fully qualified `image:tag` references, in tag order.
    pub fn references(&self) -> Vec<String> {
        self.tags
            .all()
            .iter()
            .map(|tag| format!("{}:{}", self.image, tag))
            .collect()
    }

    pub fn docker_args(&self) -> Vec<String> {
        let mut args = vec![
            "build".to_string(),
            "-f".to_string(),
            self.dockerfile.to_string_lossy().to_string(),
        ];
        for reference in self.references() {
            args.push("-t".to_string());
            args.push(reference);
        }
        for (key, value) in &self.build_args {
            args.push("--build-arg".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(self.context.to_string_lossy().to_string());
        args
    }
}

/// Run `docker build`, streaming its output to the terminal.
pub async fn build_image(request: &BuildRequest) -> Result<()> {
    tracing::debug!(service = %request.service, args = ?request.docker_args(), "docker build");
    let status = Command::new("docker")
        .args(request.docker_args())
        .status()
        .await
        .context("running docker build")?;
    if !status.success() {
        bail!(
            "docker build exited with {}",
            status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "a signal".to_string())
        );
    }
    Ok(())
}
