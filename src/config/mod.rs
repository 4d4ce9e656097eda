pub mod model;
pub mod resolve;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

use model::StackConfig;

/// Read and parse a config file, returning the parsed config alongside the
/// raw source for diagnostics.
pub fn load_config(path: &Path) -> anyhow::Result<(StackConfig, String)> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
    let config: StackConfig = toml::from_str(&source)
        .map_err(|e| anyhow::anyhow!("Failed to parse config file {}: {}", path.display(), e))?;
    Ok((config, source))
}

/// A parsed, validated config together with the directory it lives in.
/// Relative paths in the config resolve against `root`.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: StackConfig,
    pub path: PathBuf,
    pub root: PathBuf,
}

impl LoadedConfig {
    /// Resolve, load and validate the config in one step.
    pub fn load(cli_file: Option<&Path>) -> anyhow::Result<Self> {
        let path = resolve::resolve_config(cli_file)?;
        let (config, source) = load_config(&path)?;

        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| resolve::CONFIG_FILE.to_string());

        if let Err(errors) = validate::validate(&config, &source, &filename) {
            let mut msg = String::from("Configuration errors:\n");
            for err in &errors {
                msg.push_str(&format!("  - {}\n", err));
            }
            bail!("{}", msg.trim_end());
        }

        let root = path
            .parent()
            .map(Path::to_path_buf)
            .context("config file has no parent directory")?;

        Ok(Self { config, path, root })
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(&self.config.project.logs_dir)
    }

    pub fn compose_file(&self) -> PathBuf {
        self.root.join(&self.config.project.compose_file)
    }

    pub fn env_file(&self) -> Option<PathBuf> {
        self.config
            .project
            .env_file
            .as_ref()
            .map(|f| self.root.join(f))
    }

    pub fn version_file(&self) -> PathBuf {
        self.root.join(&self.config.project.version_file)
    }

    /// Working directory for a service, relative to the config root.
    pub fn service_dir(&self, dir: Option<&str>) -> PathBuf {
        match dir {
            Some(d) => self.root.join(d),
            None => self.root.clone(),
        }
    }
}
