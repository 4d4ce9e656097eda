// The miette/thiserror derive macros generate code that triggers false
// positive unused_assignments warnings on enum variant fields.
#![allow(unused_assignments)]

use std::collections::BTreeMap;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::config::model::{HealthCheck, ServiceKind, StackConfig};

// ---------------------------------------------------------------------------
// ConfigDiagnostic: miette-powered validation error
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigDiagnostic {
    #[error("service name `{name}` is declared {count} times")]
    #[diagnostic(code(stackctl::duplicate_service))]
    DuplicateService {
        #[source_code]
        src: NamedSource<String>,
        #[label("declared again here")]
        span: SourceSpan,
        name: String,
        count: usize,
    },

    #[error("port {port} is used by multiple services: {services:?}")]
    #[diagnostic(code(stackctl::duplicate_port))]
    DuplicatePort {
        #[source_code]
        src: NamedSource<String>,
        #[label("duplicate port")]
        span: SourceSpan,
        port: u16,
        services: Vec<String>,
    },

    #[error("more than one service has role `database`: {services:?}")]
    #[diagnostic(
        code(stackctl::multiple_databases),
        help("startup ordering waits on exactly one database service")
    )]
    MultipleDatabases {
        #[source_code]
        src: NamedSource<String>,
        #[label("second database")]
        span: SourceSpan,
        services: Vec<String>,
    },

    #[error("process service `{service}` has no command")]
    #[diagnostic(code(stackctl::missing_command))]
    MissingCommand {
        #[source_code]
        src: NamedSource<String>,
        #[label("add a `command` for this service")]
        span: SourceSpan,
        service: String,
    },

    #[error("service `{service}` has an empty health command")]
    #[diagnostic(code(stackctl::empty_health_command))]
    EmptyHealthCommand {
        #[source_code]
        src: NamedSource<String>,
        #[label("command is empty")]
        span: SourceSpan,
        service: String,
    },

    #[error("tcp health check for `{service}` has no port")]
    #[diagnostic(
        code(stackctl::tcp_without_port),
        help("set `port` on the service or inside the health check")
    )]
    TcpWithoutPort {
        #[source_code]
        src: NamedSource<String>,
        #[label("no port to connect to")]
        span: SourceSpan,
        service: String,
    },

    #[error("schema service `{service}` does not exist")]
    #[diagnostic(code(stackctl::unknown_schema_service))]
    UnknownSchemaService {
        #[source_code]
        src: NamedSource<String>,
        #[label("unknown service")]
        span: SourceSpan,
        #[help]
        advice: String,
        service: String,
    },

    #[error("schema service `{service}` must be a container service")]
    #[diagnostic(code(stackctl::schema_not_container))]
    SchemaNotContainer {
        #[source_code]
        src: NamedSource<String>,
        #[label("schema files are applied with an exec into this container")]
        span: SourceSpan,
        service: String,
    },

    #[error("readiness.max_attempts must be at least 1")]
    #[diagnostic(code(stackctl::zero_attempts))]
    ZeroAttempts {
        #[source_code]
        src: NamedSource<String>,
        #[label("zero attempts")]
        span: SourceSpan,
    },

    #[error("deploy.min_running is {min_running} but only {containers} container services are declared")]
    #[diagnostic(code(stackctl::unreachable_threshold))]
    UnreachableThreshold {
        #[source_code]
        src: NamedSource<String>,
        #[label("threshold can never be met")]
        span: SourceSpan,
        min_running: usize,
        containers: usize,
    },
}

// ---------------------------------------------------------------------------
// Source span helpers
// ---------------------------------------------------------------------------

/// Find the byte span of the `nth` occurrence of `name = "<service>"`.
fn find_service_span(source: &str, service: &str, nth: usize) -> SourceSpan {
    let needles = [
        format!("name = \"{}\"", service),
        format!("name=\"{}\"", service),
    ];
    for needle in &needles {
        if let Some((pos, _)) = source.match_indices(needle.as_str()).nth(nth) {
            let value_start = pos + needle.len() - service.len() - 1;
            return (value_start, service.len()).into();
        }
    }
    if let Some(pos) = source.find(service) {
        return (pos, service.len()).into();
    }
    (0, 0).into()
}

/// Find the byte span of `key = value` for a field inside a service block.
fn find_service_field_span(source: &str, service: &str, field: &str) -> SourceSpan {
    let start = find_service_span(source, service, 0).offset();
    let rest = &source[start..];
    let block_end = rest.find("[[").unwrap_or(rest.len());
    for prefix in [format!("{} =", field), format!("{}=", field)] {
        if let Some(rel) = rest[..block_end].find(&prefix) {
            let abs = start + rel;
            let line_len = source[abs..].find('\n').unwrap_or(source.len() - abs);
            return (abs, line_len).into();
        }
    }
    find_service_span(source, service, 0)
}

/// Find the byte span of a key inside a top-level `[section]` table.
fn find_section_field_span(source: &str, section: &str, field: &str) -> SourceSpan {
    let header = format!("[{}]", section);
    let start = source.find(&header).unwrap_or(0);
    let rest = &source[start..];
    if let Some(rel) = rest.find(field) {
        let abs = start + rel;
        let line_len = source[abs..].find('\n').unwrap_or(source.len() - abs);
        return (abs, line_len).into();
    }
    (start, header.len().min(source.len() - start)).into()
}

// ---------------------------------------------------------------------------
// Similarity suggestions
// ---------------------------------------------------------------------------

fn find_closest_match<'a>(name: &str, candidates: &'a [String]) -> Option<&'a str> {
    let mut best: Option<(&str, f64)> = None;
    for candidate in candidates {
        let score = strsim::jaro_winkler(name, candidate);
        if score >= 0.8 && best.is_none_or(|(_, s)| score > s) {
            best = Some((candidate.as_str(), score));
        }
    }
    best.map(|(name, _)| name)
}

// ---------------------------------------------------------------------------
// Main validation function
// ---------------------------------------------------------------------------

pub fn validate(
    config: &StackConfig,
    source: &str,
    filename: &str,
) -> Result<(), Vec<ConfigDiagnostic>> {
    let mut errors = Vec::new();
    let src = NamedSource::new(filename, source.to_string());

    let mut name_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for svc in &config.services {
        *name_counts.entry(svc.name.as_str()).or_default() += 1;
    }
    for (name, count) in &name_counts {
        if *count > 1 {
            errors.push(ConfigDiagnostic::DuplicateService {
                src: src.clone(),
                span: find_service_span(source, name, 1),
                name: name.to_string(),
                count: *count,
            });
        }
    }

    let mut ports: BTreeMap<u16, Vec<String>> = BTreeMap::new();
    for svc in &config.services {
        if let Some(port) = svc.port {
            ports.entry(port).or_default().push(svc.name.clone());
        }
    }
    for (port, services) in ports {
        if services.len() > 1 {
            errors.push(ConfigDiagnostic::DuplicatePort {
                src: src.clone(),
                span: find_service_field_span(source, &services[1], "port"),
                port,
                services,
            });
        }
    }

    let databases: Vec<String> = config
        .services
        .iter()
        .filter(|s| s.is_database())
        .map(|s| s.name.clone())
        .collect();
    if databases.len() > 1 {
        errors.push(ConfigDiagnostic::MultipleDatabases {
            src: src.clone(),
            span: find_service_field_span(source, &databases[1], "role"),
            services: databases,
        });
    }

    for svc in &config.services {
        if svc.kind == ServiceKind::Process
            && svc.command.as_deref().is_none_or(|c| c.trim().is_empty())
        {
            errors.push(ConfigDiagnostic::MissingCommand {
                src: src.clone(),
                span: find_service_span(source, &svc.name, 0),
                service: svc.name.clone(),
            });
        }

        match &svc.health {
            Some(HealthCheck::Cmd { command }) if command.is_empty() => {
                errors.push(ConfigDiagnostic::EmptyHealthCommand {
                    src: src.clone(),
                    span: find_service_field_span(source, &svc.name, "health"),
                    service: svc.name.clone(),
                });
            }
            Some(HealthCheck::Tcp { port: None }) if svc.port.is_none() => {
                errors.push(ConfigDiagnostic::TcpWithoutPort {
                    src: src.clone(),
                    span: find_service_field_span(source, &svc.name, "health"),
                    service: svc.name.clone(),
                });
            }
            _ => {}
        }
    }

    if let Some(schema) = &config.schema {
        match config.service(&schema.service) {
            None => {
                let available = config.service_names();
                let advice = match find_closest_match(&schema.service, &available) {
                    Some(s) => format!("did you mean `{}`?", s),
                    None => format!("available services: {:?}", available),
                };
                errors.push(ConfigDiagnostic::UnknownSchemaService {
                    src: src.clone(),
                    span: find_section_field_span(source, "schema", "service"),
                    advice,
                    service: schema.service.clone(),
                });
            }
            Some(svc) if svc.kind != ServiceKind::Container => {
                errors.push(ConfigDiagnostic::SchemaNotContainer {
                    src: src.clone(),
                    span: find_section_field_span(source, "schema", "service"),
                    service: schema.service.clone(),
                });
            }
            Some(_) => {}
        }
    }

    if config.readiness.max_attempts == 0 {
        errors.push(ConfigDiagnostic::ZeroAttempts {
            src: src.clone(),
            span: find_section_field_span(source, "readiness", "max_attempts"),
        });
    }

    if let Some(min_running) = config.deploy.min_running {
        let containers = config.container_count();
        if min_running > containers {
            errors.push(ConfigDiagnostic::UnreachableThreshold {
                src: src.clone(),
                span: find_section_field_span(source, "deploy", "min_running"),
                min_running,
                containers,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(source: &str) -> Result<(), Vec<ConfigDiagnostic>> {
        let config: StackConfig = toml::from_str(source).unwrap();
        validate(&config, source, "stackctl.toml")
    }

    const VALID: &str = r#"
[project]
name = "docstack"

[schema]
service = "database"
database = "app"
files = ["/schema/init.sql"]

[[services]]
name = "database"
kind = "container"
role = "database"
port = 5432
health = { type = "cmd", command = ["pg_isready"] }

[[services]]
name = "api"
kind = "process"
command = "python main.py"
port = 8000
health = { type = "tcp" }
"#;

    #[test]
    fn valid_config_passes() {
        assert!(check(VALID).is_ok());
    }

    #[test]
    fn duplicate_ports_detected() {
        let source = r#"
[project]
name = "p"

[[services]]
name = "api"
kind = "process"
command = "a"
port = 8000

[[services]]
name = "rag"
kind = "process"
command = "b"
port = 8000
"#;
        let errors = check(source).unwrap_err();
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            ConfigDiagnostic::DuplicatePort { port, services, .. } => {
                assert_eq!(*port, 8000);
                assert_eq!(services, &vec!["api".to_string(), "rag".to_string()]);
            }
            other => panic!("unexpected diagnostic: {other:?}"),
        }
    }

    #[test]
    fn duplicate_names_and_missing_command_collected() {
        let source = r#"
[project]
name = "p"

[[services]]
name = "api"
kind = "process"

[[services]]
name = "api"
kind = "container"
"#;
        let errors = check(source).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigDiagnostic::DuplicateService { count: 2, .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigDiagnostic::MissingCommand { .. })));
    }

    #[test]
    fn two_databases_rejected() {
        let source = r#"
[project]
name = "p"

[[services]]
name = "pg"
kind = "container"
role = "database"

[[services]]
name = "pg2"
kind = "container"
role = "database"
"#;
        let errors = check(source).unwrap_err();
        assert!(matches!(
            errors[0],
            ConfigDiagnostic::MultipleDatabases { .. }
        ));
    }

    #[test]
    fn unknown_schema_service_suggests_close_match() {
        let source = VALID.replace("service = \"database\"", "service = \"databse\"");
        let errors = check(&source).unwrap_err();
        match &errors[0] {
            ConfigDiagnostic::UnknownSchemaService { advice, .. } => {
                assert!(advice.contains("database"), "advice was: {advice}");
            }
            other => panic!("unexpected diagnostic: {other:?}"),
        }
    }

    #[test]
    fn tcp_check_without_port_rejected() {
        let source = r#"
[project]
name = "p"

[[services]]
name = "ocr"
kind = "process"
command = "ocr-server"
health = { type = "tcp" }
"#;
        let errors = check(source).unwrap_err();
        assert!(matches!(errors[0], ConfigDiagnostic::TcpWithoutPort { .. }));
    }

    #[test]
    fn unreachable_threshold_and_zero_attempts() {
        let source = r#"
[project]
name = "p"

[readiness]
max_attempts = 0

[deploy]
min_running = 3

[[services]]
name = "database"
kind = "container"
"#;
        let errors = check(source).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigDiagnostic::ZeroAttempts { .. })));
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigDiagnostic::UnreachableThreshold {
                min_running: 3,
                containers: 1,
                ..
            }
        )));
    }

    #[test]
    fn diagnostics_implement_miette_diagnostic() {
        let source = VALID.replace("port = 8000", "port = 5432");
        let errors = check(&source).unwrap_err();
        for err in &errors {
            let diag: &dyn miette::Diagnostic = err;
            assert!(diag.code().is_some());
        }
    }
}
