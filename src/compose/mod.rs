pub mod lifecycle;

use std::path::{Path, PathBuf};

pub use lifecycle::ComposeService;

/// The compose file and project name every `docker compose` call targets.
#[derive(Debug, Clone)]
pub struct ComposeProject {
    pub file: PathBuf,
    pub project_name: String,
    pub env_file: Option<PathBuf>,
}

impl ComposeProject {
    pub fn new(file: &Path, project_name: &str, env_file: Option<&Path>) -> Self {
        Self {
            file: file.to_path_buf(),
            project_name: project_name.to_string(),
            env_file: env_file.map(Path::to_path_buf),
        }
    }

    /// Leading `compose -f <file> -p <name> [--env-file <f>]` arguments.
    pub fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "compose".to_string(),
            "-f".to_string(),
            self.file.to_string_lossy().to_string(),
            "-p".to_string(),
            self.project_name.clone(),
        ];
        if let Some(env_file) = &self.env_file {
            args.push("--env-file".to_string());
            args.push(env_file.to_string_lossy().to_string());
        }
        args
    }
}
