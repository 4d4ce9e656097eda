use serde::{de, Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct StackConfig {
    pub project: ProjectConfig,
    #[serde(default)]
    pub readiness: ReadinessConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub deploy: DeployConfig,
    #[serde(default)]
    pub schema: Option<SchemaConfig>,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

fn default_logs_dir() -> String {
    "logs".to_string()
}

fn default_compose_file() -> String {
    "docker-compose.yml".to_string()
}

fn default_version_file() -> String {
    ".stack-version".to_string()
}

fn default_version_var() -> String {
    "APP_VERSION".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,
    #[serde(default = "default_compose_file")]
    pub compose_file: String,
    #[serde(default)]
    pub env_file: Option<String>,
    #[serde(default = "default_version_file")]
    pub version_file: String,
    #[serde(default = "default_version_var")]
    pub version_var: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

fn default_max_attempts() -> u32 {
    30
}

fn default_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ReadinessConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_delay", deserialize_with = "human_duration")]
    pub delay: Duration,
    #[serde(default)]
    pub backoff: BackoffKind,
    #[serde(default = "default_max_delay", deserialize_with = "human_duration")]
    pub max_delay: Duration,
    #[serde(default, deserialize_with = "optional_human_duration")]
    pub timeout: Option<Duration>,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay: default_delay(),
            backoff: BackoffKind::Fixed,
            max_delay: default_max_delay(),
            timeout: None,
        }
    }
}

fn default_health_timeout() -> Duration {
    Duration::from_secs(5)
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HealthConfig {
    #[serde(default = "default_health_timeout", deserialize_with = "human_duration")]
    pub timeout: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            timeout: default_health_timeout(),
        }
    }
}

fn default_settle() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DeployConfig {
    #[serde(default = "default_settle", deserialize_with = "human_duration")]
    pub settle: Duration,
    /// Minimum number of running compose services for a deploy to count as
    /// successful. Defaults to every container-kind service.
    #[serde(default)]
    pub min_running: Option<usize>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            settle: default_settle(),
            min_running: None,
        }
    }
}

fn default_schema_user() -> String {
    "postgres".to_string()
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SchemaConfig {
    pub service: String,
    #[serde(default = "default_schema_user")]
    pub user: String,
    pub database: String,
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Process,
    Container,
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceKind::Process => write!(f, "process"),
            ServiceKind::Container => write!(f, "container"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceRole {
    Database,
    #[default]
    App,
}

fn default_requires_database() -> bool {
    true
}

/// Static description of one service in the stack.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServiceConfig {
    pub name: String,
    pub kind: ServiceKind,
    #[serde(default)]
    pub role: ServiceRole,
    /// Shell command for process services.
    #[serde(default)]
    pub command: Option<String>,
    /// Working directory for `command` and `install`, relative to the config file.
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Service name inside the compose file for container services.
    #[serde(default)]
    pub compose_service: Option<String>,
    /// Explicit container name; compose resolves it when unset.
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub health: Option<HealthCheck>,
    #[serde(default)]
    pub install: Option<String>,
    #[serde(default)]
    pub build: Option<BuildConfig>,
    #[serde(default = "default_requires_database")]
    pub requires_database: bool,
}

impl ServiceConfig {
    pub fn is_database(&self) -> bool {
        self.role == ServiceRole::Database
    }

    /// The compose service name, falling back to the service name.
    pub fn compose_name(&self) -> &str {
        self.compose_service.as_deref().unwrap_or(&self.name)
    }
}

fn default_dockerfile() -> String {
    "Dockerfile".to_string()
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BuildConfig {
    pub image: String,
    pub context: String,
    #[serde(default = "default_dockerfile")]
    pub dockerfile: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum HealthCheck {
    #[serde(rename = "http")]
    Http { url: String },
    #[serde(rename = "tcp")]
    Tcp {
        #[serde(default)]
        port: Option<u16>,
    },
    #[serde(rename = "cmd")]
    Cmd { command: Vec<String> },
}

fn human_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(de::Error::custom)
}

fn optional_human_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|s| humantime::parse_duration(&s).map_err(de::Error::custom))
        .transpose()
}

impl StackConfig {
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn database(&self) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.is_database())
    }

    pub fn service_names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.name.clone()).collect()
    }

    pub fn container_count(&self) -> usize {
        self.services
            .iter()
            .filter(|s| s.kind == ServiceKind::Container)
            .count()
    }
}
