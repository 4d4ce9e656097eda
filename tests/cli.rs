//! Command-line behavior that needs no container runtime: process-only
//! stacks, argument handling and exit codes.

mod common;

use common::*;
use predicates::prelude::*;
use std::io::Read;
use std::net::TcpListener;
use std::process::Stdio;
use std::time::{Duration, Instant};

fn process_stack(port: u16) -> String {
    format!(
        r#"
[project]
name = "cli-test"

[readiness]
max_attempts = 2
delay = "100ms"

[health]
timeout = "1s"

[[services]]
name = "api"
kind = "process"
command = "sleep 60"
port = {port}
"#
    )
}

#[test]
fn unknown_command_exits_non_zero() {
    stackctl()
        .arg("frobnicate")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("frobnicate"));
}

#[test]
fn help_exits_zero() {
    stackctl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("health"));
    stackctl().arg("help").assert().success();
}

#[test]
fn shell_without_service_exits_one() {
    stackctl().arg("shell").assert().code(1);
}

#[test]
fn missing_config_is_an_error() {
    let dir = assert_fs::TempDir::new().unwrap();
    stackctl()
        .current_dir(dir.path())
        .arg("status")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("stackctl.toml"));
}

#[test]
fn clean_answered_no_changes_nothing() {
    let project = TestProject::new(&process_stack(free_port()));
    std::fs::create_dir_all(project.logs_dir()).unwrap();
    std::fs::write(project.logs_dir().join("api.log"), "keep me").unwrap();

    stackctl()
        .args(["clean", "-f"])
        .arg(&project.config_path)
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing was removed"));

    assert!(project.logs_dir().join("api.log").exists());
}

#[test]
fn interrupt_at_clean_prompt_exits_130() {
    let project = TestProject::new(&process_stack(free_port()));
    std::fs::create_dir_all(project.logs_dir()).unwrap();
    std::fs::write(project.logs_dir().join("api.log"), "keep me").unwrap();

    let mut child = std::process::Command::new(env!("CARGO_BIN_EXE_stackctl"))
        .args(["clean", "-f"])
        .arg(&project.config_path)
        .env_remove("STACKCTL_CONFIG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let mut stdout = child.stdout.take().unwrap();
    let mut seen = String::new();
    let mut buf = [0u8; 256];
    while !seen.contains("[y/N]") {
        let n = stdout.read(&mut buf).unwrap();
        assert!(n > 0, "exited before prompting: {:?}", seen);
        seen.push_str(&String::from_utf8_lossy(&buf[..n]));
    }

    nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(child.id() as i32),
        nix::sys::signal::Signal::SIGINT,
    )
    .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() > deadline {
            let _ = child.kill();
            panic!("clean kept waiting for an answer after Ctrl+C");
        }
        std::thread::sleep(Duration::from_millis(50));
    };
    assert_eq!(status.code(), Some(130));
    assert!(project.logs_dir().join("api.log").exists());
}

#[test]
fn start_exits_one_when_database_never_ready() {
    let (db_port, api_port) = (free_port(), free_port());
    let project = TestProject::new(&format!(
        r#"
[project]
name = "cli-db"

[readiness]
max_attempts = 2
delay = "100ms"

[[services]]
name = "database"
kind = "process"
role = "database"
command = "sleep 60"
health = {{ type = "tcp", port = {db_port} }}

[[services]]
name = "api"
kind = "process"
command = "sleep 60"
port = {api_port}
"#
    ));
    let config = project.config_path.clone();

    stackctl()
        .args(["start", "-f"])
        .arg(&config)
        .timeout(Duration::from_secs(30))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("skipping 'api'"))
        .stderr(predicate::str::contains("not ready after 2 attempts"));

    assert!(project.pid_of("database").is_some());
    assert_eq!(project.pid_of("api"), None);

    stackctl().args(["stop", "-f"]).arg(&config).assert().success();
}

#[test]
fn failed_logs_leaves_no_tail_behind() {
    let project = TestProject::new(
        r#"
[project]
name = "cli-logs"
compose_file = "missing-compose.yml"

[[services]]
name = "database"
kind = "container"
role = "database"

[[services]]
name = "api"
kind = "process"
command = "sleep 60"
"#,
    );
    std::fs::create_dir_all(project.logs_dir()).unwrap();
    let log = project.logs_dir().join("api.log");
    std::fs::write(&log, "line\n").unwrap();

    stackctl()
        .args(["logs", "-f"])
        .arg(&project.config_path)
        .timeout(Duration::from_secs(30))
        .assert()
        .failure();

    let log = log.to_string_lossy().to_string();
    let deadline = Instant::now() + Duration::from_secs(2);
    while !processes_mentioning(&log).is_empty() {
        assert!(
            Instant::now() < deadline,
            "tail still running: {:?}",
            processes_mentioning(&log)
        );
        std::thread::sleep(Duration::from_millis(50));
    }
}

#[test]
fn health_on_a_stopped_stack_exits_zero() {
    let project = TestProject::new(&process_stack(free_port()));
    stackctl()
        .args(["health", "-f"])
        .arg(&project.config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("0/1 healthy"));
}

#[test]
fn start_with_bound_port_leaves_registry_untouched() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let project = TestProject::new(&process_stack(port));

    stackctl()
        .args(["start", "-f"])
        .arg(&project.config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("already running"));

    assert_eq!(project.pid_of("api"), None);
    assert!(!project.logs_dir().join("api.log").exists());
}

#[test]
fn start_then_stop_twice() {
    let project = TestProject::new(&process_stack(free_port()));
    let config = project.config_path.clone();

    stackctl().args(["start", "-f"]).arg(&config).assert().success();
    let pid = project.pid_of("api").expect("pid recorded");

    stackctl()
        .args(["status", "-f"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("pid {}", pid)));

    stackctl().args(["stop", "-f"]).arg(&config).assert().success();
    assert_eq!(project.pid_of("api"), None);

    stackctl().args(["stop", "-f"]).arg(&config).assert().success();
    assert_eq!(project.pid_of("api"), None);
}

#[test]
fn config_from_environment() {
    let project = TestProject::new(&process_stack(free_port()));
    stackctl()
        .env("STACKCTL_CONFIG", &project.config_path)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn invalid_config_reports_diagnostics() {
    let project = TestProject::new(
        r#"
[project]
name = "broken"

[[services]]
name = "api"
kind = "process"
command = "serve"
port = 8000

[[services]]
name = "web"
kind = "process"
command = "serve"
port = 8000
"#,
    );
    stackctl()
        .args(["validate", "-f"])
        .arg(&project.config_path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("port 8000"));
}

#[test]
fn completions_mention_the_binary() {
    stackctl()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stackctl"));
}
