use chrono::{DateTime, Utc};
use thiserror::Error;

/// Stages of one build/deploy run. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployPhase {
    Building,
    Deploying,
    AwaitingDb,
    SchemaInit,
    Verifying,
    Done,
    Failed,
}

impl DeployPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployPhase::Building => "building",
            DeployPhase::Deploying => "deploying",
            DeployPhase::AwaitingDb => "awaiting-db",
            DeployPhase::SchemaInit => "schema-init",
            DeployPhase::Verifying => "verifying",
            DeployPhase::Done => "done",
            DeployPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeployPhase::Done | DeployPhase::Failed)
    }

    /// The phase that follows on success.
    pub fn next(&self) -> Option<DeployPhase> {
        match self {
            DeployPhase::Building => Some(DeployPhase::Deploying),
            DeployPhase::Deploying => Some(DeployPhase::AwaitingDb),
            DeployPhase::AwaitingDb => Some(DeployPhase::SchemaInit),
            DeployPhase::SchemaInit => Some(DeployPhase::Verifying),
            DeployPhase::Verifying => Some(DeployPhase::Done),
            DeployPhase::Done | DeployPhase::Failed => None,
        }
    }

    pub fn can_transition_to(&self, to: DeployPhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == DeployPhase::Failed || self.next() == Some(to)
    }
}

impl std::fmt::Display for DeployPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal deploy transition {from} -> {to}")]
pub struct IllegalTransition {
    pub from: DeployPhase,
    pub to: DeployPhase,
}

/// Current phase plus the time each phase was entered.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    history: Vec<(DeployPhase, DateTime<Utc>)>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            history: vec![(DeployPhase::Building, Utc::now())],
        }
    }

    pub fn current(&self) -> DeployPhase {
        self.history
            .last()
            .map(|(phase, _)| *phase)
            .unwrap_or(DeployPhase::Building)
    }

    pub fn advance(&mut self, to: DeployPhase) -> Result<(), IllegalTransition> {
        let from = self.current();
        if !from.can_transition_to(to) {
            return Err(IllegalTransition { from, to });
        }
        tracing::debug!(%from, %to, "deploy phase");
        self.history.push((to, Utc::now()));
        Ok(())
    }

    /// Move to `Failed` unless already terminal.
    pub fn fail(&mut self) {
        if !self.current().is_terminal() {
            self.history.push((DeployPhase::Failed, Utc::now()));
        }
    }

    pub fn phases(&self) -> Vec<DeployPhase> {
        self.history.iter().map(|(phase, _)| *phase).collect()
    }
}
