use anyhow::Result;
use std::path::Path;
use std::process::Command;

use crate::config::LoadedConfig;
use crate::orchestrator::ports::check_all_ports;
use crate::ui::status;

const CHECKS: &[(&str, &str, &[&str])] = &[
    ("docker", "docker", &["--version"]),
    ("docker compose", "docker", &["compose", "version"]),
    ("curl", "curl", &["--version"]),
];

pub fn run(config_file: Option<&Path>) -> Result<()> {
    status::header("stackctl doctor");
    println!();

    let mut all_ok = true;
    for (name, bin, args) in CHECKS {
        match Command::new(bin).args(*args).output() {
            Ok(output) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                // Some tools print their version to stderr
                let version = if stdout.trim().is_empty() {
                    String::from_utf8_lossy(&output.stderr).to_string()
                } else {
                    stdout.to_string()
                };
                let first = version.lines().next().unwrap_or_default().trim().to_string();
                status::success(&format!("{:<16} {}", name, first));
            }
            _ => {
                status::warn(&format!("{:<16} not found", name));
                all_ok = false;
            }
        }
    }

    println!();
    if all_ok {
        status::success("All dependencies found.");
    } else {
        status::warn("Some dependencies are missing. Container services and builds need docker and docker compose.");
    }

    // Port report only when a config is reachable; doctor works without one.
    if let Ok(loaded) = LoadedConfig::load(config_file) {
        println!();
        let bound = check_all_ports(&loaded.config);
        if bound.is_empty() {
            status::info("no configured port is currently bound");
        }
        for conflict in bound {
            status::info(&conflict.to_string());
        }
    }
    Ok(())
}
