use thiserror::Error;

use crate::domain::entity::EntityId;

// Failures reported by the automation transport.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DriverError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("method unavailable: {0}")]
    MethodUnavailable(String),
    #[error("timed out after {timeout_secs:.1}s waiting for {what}")]
    Timeout { what: String, timeout_secs: f64 },
    #[error("transport failure: {0}")]
    Transport(String),
}

// Why a kill was never confirmed before the engagement deadline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KillFailure {
    #[error(
        "enemy count from engine never dropped below {initial_count}; aim offset may be off or the match respawns enemies"
    )]
    CountNeverDropped { initial_count: usize },
    #[error("last enemy id={last_enemy_id}; no other player was found after it")]
    NoNextTarget { last_enemy_id: EntityId },
}

// Scenario-level failures: each names the stage and what was last observed.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("{stage}: {detail}")]
    NotFound { stage: &'static str, detail: String },
    #[error("{stage}: timed out: {detail}")]
    Timeout { stage: &'static str, detail: String },
    #[error("{stage}: assertion failed: {detail}")]
    Assertion { stage: &'static str, detail: String },
    #[error("kill not confirmed within {timeout_secs}s: {failure}")]
    KillNotConfirmed { timeout_secs: u64, failure: KillFailure },
    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl ScenarioError {
    pub fn not_found(stage: &'static str, detail: impl Into<String>) -> Self {
        ScenarioError::NotFound {
            stage,
            detail: detail.into(),
        }
    }

    pub fn timeout(stage: &'static str, detail: impl Into<String>) -> Self {
        ScenarioError::Timeout {
            stage,
            detail: detail.into(),
        }
    }

    pub fn assertion(stage: &'static str, detail: impl Into<String>) -> Self {
        ScenarioError::Assertion {
            stage,
            detail: detail.into(),
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            ScenarioError::NotFound { stage, .. }
            | ScenarioError::Timeout { stage, .. }
            | ScenarioError::Assertion { stage, .. } => stage,
            ScenarioError::KillNotConfirmed { .. } => "aim_shoot_kill",
            ScenarioError::Driver(_) => "driver",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kill_failure_messages_distinguish_the_two_modes() {
        let count = ScenarioError::KillNotConfirmed {
            timeout_secs: 180,
            failure: KillFailure::CountNeverDropped { initial_count: 3 },
        };
        assert!(count.to_string().contains("never dropped below 3"));

        let target = ScenarioError::KillNotConfirmed {
            timeout_secs: 180,
            failure: KillFailure::NoNextTarget { last_enemy_id: 42 },
        };
        assert!(target.to_string().contains("last enemy id=42"));
        assert!(target.to_string().starts_with("kill not confirmed within 180s"));
    }

    #[test]
    fn kill_failure_is_an_error_on_its_own() {
        let failure: &dyn std::error::Error = &KillFailure::CountNeverDropped { initial_count: 2 };
        assert!(failure.to_string().starts_with("enemy count from engine never dropped below 2"));
        assert!(failure.source().is_none());
    }

    #[test]
    fn driver_errors_convert_into_scenario_errors() {
        let err: ScenarioError = DriverError::Transport("socket closed".into()).into();
        assert_eq!(err.stage(), "driver");
        assert_eq!(err.to_string(), "transport failure: socket closed");
    }
}
