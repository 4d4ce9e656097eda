use crate::common::*;
use predicates::prelude::*;
use std::time::Duration;

fn stack(name: &str, db_port: u16, api_port: u16) -> TestProject {
    let project = TestProject::new(&format!(
        r#"
[project]
name = "{name}"

[readiness]
max_attempts = 30
delay = "1s"

[[services]]
name = "database"
kind = "container"
role = "database"
compose_service = "db"
port = {db_port}
health = {{ type = "cmd", command = ["pg_isready", "-h", "127.0.0.1", "-U", "postgres"] }}

[[services]]
name = "api"
kind = "process"
command = "python3 -m http.server {api_port}"
port = {api_port}
health = {{ type = "http", url = "http://127.0.0.1:{api_port}/" }}
"#
    ));
    std::fs::write(
        project.dir.path().join("docker-compose.yml"),
        format!(
            r#"
services:
  db:
    image: postgres:16-alpine
    environment:
      POSTGRES_PASSWORD: postgres
    ports:
      - "{db_port}:5432"
"#
        ),
    )
    .unwrap();
    project
}

#[tokio::test]
async fn database_first_then_process_then_clean() {
    if !docker_available() {
        eprintln!("Skipping: Docker not available");
        return;
    }

    let (db_port, api_port) = (free_port(), free_port());
    let project = stack("stackctl-it-lifecycle", db_port, api_port);
    let config = project.config_path.clone();

    stackctl()
        .args(["start", "-f"])
        .arg(&config)
        .timeout(Duration::from_secs(120))
        .assert()
        .success()
        .stdout(predicate::str::contains("database 'database' ready"));

    assert!(wait_for_port(api_port, Duration::from_secs(10)).await);
    assert!(project.pid_of("api").is_some());
    assert_eq!(
        project.registry()["handles"]["database"]["kind"].as_str(),
        Some("container")
    );

    stackctl()
        .args(["health", "-f"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("2/2 healthy"));

    // Second start is a no-op for the running process
    let pid = project.pid_of("api");
    stackctl()
        .args(["start", "-f"])
        .arg(&config)
        .timeout(Duration::from_secs(120))
        .assert()
        .success();
    assert_eq!(project.pid_of("api"), pid);

    stackctl()
        .args(["clean", "--yes", "-f"])
        .arg(&config)
        .timeout(Duration::from_secs(60))
        .assert()
        .success();

    assert!(wait_for_port_release(api_port, Duration::from_secs(10)).await);
    assert!(wait_for_port_release(db_port, Duration::from_secs(10)).await);
    assert_eq!(project.registry(), serde_json::Value::Null);

    docker_cleanup(&project, "stackctl-it-lifecycle");
}

#[tokio::test]
async fn shell_refuses_process_services() {
    let project = stack("stackctl-it-shell", free_port(), free_port());
    stackctl()
        .args(["shell", "api", "-f"])
        .arg(&project.config_path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("process service"));
}
