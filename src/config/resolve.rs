use std::path::{Path, PathBuf};

use crate::error::StackError;

pub const CONFIG_FILE: &str = "stackctl.toml";

/// Walk up the directory tree from `start`, checking for `filename` at each level.
/// Returns the full path to the file if found, or None if the root is reached
/// without finding it.
pub fn find_config(start: &Path, filename: &str) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(filename);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Resolve the config file path. An explicit `cli_file` must exist; otherwise
/// search upward from the current directory for `stackctl.toml`.
pub fn resolve_config(cli_file: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(path) = cli_file {
        if path.is_file() {
            return Ok(path.canonicalize()?);
        }
        return Err(StackError::Precondition(format!(
            "Config file not found: {}",
            path.display()
        ))
        .into());
    }

    let cwd = std::env::current_dir()?;
    find_config(&cwd, CONFIG_FILE).ok_or_else(|| {
        StackError::Precondition(format!(
            "No {} found in {} or any parent directory",
            CONFIG_FILE,
            cwd.display()
        ))
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn config_in_current_dir_found() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join(CONFIG_FILE);
        fs::write(&config_path, "").unwrap();

        let result = find_config(tmp.path(), CONFIG_FILE);
        assert_eq!(result, Some(config_path));
    }

    #[test]
    fn config_in_grandparent_found() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join(CONFIG_FILE);
        fs::write(&config_path, "").unwrap();

        let grandchild = tmp.path().join("api").join("src");
        fs::create_dir_all(&grandchild).unwrap();

        let result = find_config(&grandchild, CONFIG_FILE);
        assert_eq!(result, Some(config_path));
    }

    #[test]
    fn cli_file_valid_path() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("custom.toml");
        fs::write(&config_path, "").unwrap();

        let result = resolve_config(Some(&config_path)).unwrap();
        assert_eq!(result, config_path.canonicalize().unwrap());
    }

    #[test]
    fn cli_file_missing_is_precondition_failure() {
        let missing = Path::new("/tmp/definitely_not_here_stackctl.toml");
        let err = resolve_config(Some(missing)).unwrap_err();
        let stack_err = err.downcast_ref::<StackError>().unwrap();
        assert!(matches!(stack_err, StackError::Precondition(_)));
        assert!(err.to_string().contains("Config file not found"));
    }
}
