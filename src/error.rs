use std::time::Duration;

use thiserror::Error;

/// Failure classes surfaced by the stack lifecycle.
///
/// `PortConflict` and `HealthCheck` are informational: callers log them and
/// carry on. The rest abort the operation that raised them.
#[derive(Debug, Error)]
pub enum StackError {
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("port {port} for '{service}' is already bound{}", owner_suffix(.owner))]
    PortConflict {
        service: String,
        port: u16,
        owner: Option<String>,
    },

    #[error("'{target}' was not ready after {attempts} attempts ({elapsed:?})")]
    ReadinessTimeout {
        target: String,
        attempts: u32,
        elapsed: Duration,
    },

    #[error("image build for '{service}' failed: {reason}")]
    BuildFailure { service: String, reason: String },

    #[error("health check for '{service}' failed: {reason}")]
    HealthCheck { service: String, reason: String },

    #[error("schema file '{file}' failed: {reason}")]
    SchemaInit { file: String, reason: String },

    #[error("cancelled while waiting for '{0}'")]
    Cancelled(String),
}

fn owner_suffix(owner: &Option<String>) -> String {
    match owner {
        Some(owner) => format!(" by {}", owner),
        None => String::new(),
    }
}

impl StackError {
    /// Whether the failure should halt the enclosing operation.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            StackError::PortConflict { .. } | StackError::HealthCheck { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_conflict_message_names_owner() {
        let err = StackError::PortConflict {
            service: "api".to_string(),
            port: 8000,
            owner: Some("uvicorn (PID 42)".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "port 8000 for 'api' is already bound by uvicorn (PID 42)"
        );
        assert!(!err.is_fatal());
    }

    #[test]
    fn readiness_timeout_is_fatal() {
        let err = StackError::ReadinessTimeout {
            target: "database".to_string(),
            attempts: 30,
            elapsed: Duration::from_secs(58),
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("30 attempts"));
    }

    #[test]
    fn health_check_is_informational() {
        let err = StackError::HealthCheck {
            service: "ocr".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(!err.is_fatal());
    }
}
