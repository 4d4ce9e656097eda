use crate::common::*;
use predicates::prelude::*;
use std::time::Duration;

const NAME: &str = "stackctl-it-deploy";

fn deploy_stack(dockerfile: &str) -> TestProject {
    let db_port = free_port();
    let project = TestProject::new(&format!(
        r#"
[project]
name = "{NAME}"

[readiness]
max_attempts = 30
delay = "1s"

[deploy]
settle = "1s"

[schema]
service = "database"
database = "postgres"
files = ["/schema/schema.sql"]

[[services]]
name = "database"
kind = "container"
role = "database"
compose_service = "db"
health = {{ type = "cmd", command = ["pg_isready", "-h", "127.0.0.1", "-U", "postgres"] }}

[[services]]
name = "app"
kind = "container"
build = {{ image = "stackctl-it/app", context = "app" }}
"#
    ));
    let dir = project.dir.path();
    std::fs::create_dir_all(dir.join("app")).unwrap();
    std::fs::create_dir_all(dir.join("schema")).unwrap();
    std::fs::write(dir.join("app/Dockerfile"), dockerfile).unwrap();
    std::fs::write(
        dir.join("schema/schema.sql"),
        "CREATE TABLE IF NOT EXISTS seed (id int primary key);\nINSERT INTO seed VALUES (1);\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("docker-compose.yml"),
        format!(
            r#"
services:
  db:
    image: postgres:16-alpine
    environment:
      POSTGRES_PASSWORD: postgres
    ports:
      - "{db_port}:5432"
    volumes:
      - pgdata:/var/lib/postgresql/data
      - ./schema:/schema:ro
  app:
    image: stackctl-it/app:latest
    environment:
      APP_VERSION: ${{APP_VERSION}}
volumes:
  pgdata:
"#
        ),
    )
    .unwrap();
    project
}

const GOOD_DOCKERFILE: &str = "FROM alpine:3.20\nARG APP_VERSION\nCMD [\"sleep\", \"3600\"]\n";

#[tokio::test]
async fn build_deploys_and_tolerates_reapplied_schema() {
    if !docker_available() {
        eprintln!("Skipping: Docker not available");
        return;
    }
    let project = deploy_stack(GOOD_DOCKERFILE);
    let config = project.config_path.clone();

    stackctl()
        .args(["build", "-f"])
        .arg(&config)
        .timeout(Duration::from_secs(300))
        .assert()
        .success();

    let version = std::fs::read_to_string(project.dir.path().join(".stack-version")).unwrap();
    let version = version.trim();
    assert_eq!(version.len(), "YYYYMMDD-HHMMSS".len());

    let tagged = std::process::Command::new("docker")
        .args(["image", "inspect", &format!("stackctl-it/app:{}", version)])
        .output()
        .unwrap();
    assert!(tagged.status.success());

    // The seed row already exists: the second run hits a duplicate key and carries on
    stackctl()
        .args(["build", "-f"])
        .arg(&config)
        .timeout(Duration::from_secs(300))
        .assert()
        .success()
        .stdout(predicate::str::contains("duplicate key"));

    docker_cleanup(&project, NAME);
}

#[tokio::test]
async fn failed_build_leaves_stack_alone() {
    if !docker_available() {
        eprintln!("Skipping: Docker not available");
        return;
    }
    let project = deploy_stack("FROM alpine:3.20\nRUN exit 3\n");

    stackctl()
        .args(["build", "-f"])
        .arg(&project.config_path)
        .timeout(Duration::from_secs(300))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("image build for 'app' failed"));

    assert!(!project.dir.path().join(".stack-version").exists());
}
