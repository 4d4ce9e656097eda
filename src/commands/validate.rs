use anyhow::Result;
use owo_colors::OwoColorize;
use std::path::Path;

use crate::config;
use crate::config::model::ServiceKind;
use crate::config::resolve::{resolve_config, CONFIG_FILE};
use crate::config::validate::validate;

pub fn run(config_file: Option<&Path>) -> Result<()> {
    let config_path = resolve_config(config_file)?;

    let (config, source) = config::load_config(&config_path)?;

    let filename = config_path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| CONFIG_FILE.to_string());

    match validate(&config, &source, &filename) {
        Ok(()) => {
            let processes = config
                .services
                .iter()
                .filter(|s| s.kind == ServiceKind::Process)
                .count();
            println!(
                "  {} {} is valid ({} process, {} container services)",
                "\u{2713}".green(),
                filename,
                processes,
                config.container_count(),
            );
            Ok(())
        }
        Err(errors) => {
            for err in errors {
                let report: miette::Report = err.into();
                eprintln!("{:?}", report);
            }
            std::process::exit(1);
        }
    }
}
