#![allow(dead_code)]
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestProject {
    pub dir: TempDir,
    pub config_path: PathBuf,
}

impl TestProject {
    pub fn new(config_toml: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("stackctl.toml");
        std::fs::write(&config_path, config_toml).unwrap();
        Self { dir, config_path }
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.dir.path().join("logs")
    }

    /// Parsed `logs/registry.json`, or `Null` when absent.
    pub fn registry(&self) -> serde_json::Value {
        std::fs::read_to_string(self.logs_dir().join("registry.json"))
            .ok()
            .and_then(|c| serde_json::from_str(&c).ok())
            .unwrap_or(serde_json::Value::Null)
    }

    pub fn pid_of(&self, service: &str) -> Option<u32> {
        self.registry()["handles"][service]["pid"]
            .as_u64()
            .map(|p| p as u32)
    }
}

pub fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

pub fn stackctl() -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("stackctl").unwrap();
    cmd.env_remove("STACKCTL_CONFIG");
    cmd
}

pub async fn wait_for_port(port: u16, timeout: std::time::Duration) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    false
}

pub async fn wait_for_port_release(port: u16, timeout: std::time::Duration) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if TcpListener::bind(("127.0.0.1", port)).is_ok() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    false
}

/// Remove a compose project's containers and volumes directly, in case a
/// test failed before `stackctl clean` ran.
pub fn docker_cleanup(project: &TestProject, name: &str) {
    let _ = std::process::Command::new("docker")
        .args(["compose", "-f"])
        .arg(project.dir.path().join("docker-compose.yml"))
        .args(["-p", name, "down", "--volumes", "--remove-orphans"])
        .output();
}

pub fn docker_available() -> bool {
    std::process::Command::new("docker")
        .args(["info"])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// PIDs whose command line contains `needle`. Zombies have an empty one.
pub fn processes_mentioning(needle: &str) -> Vec<u32> {
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter_map(|e| e.file_name().to_str()?.parse::<u32>().ok())
        .filter(|pid| {
            std::fs::read(format!("/proc/{}/cmdline", pid))
                .map(|c| String::from_utf8_lossy(&c).contains(needle))
                .unwrap_or(false)
        })
        .collect()
}
