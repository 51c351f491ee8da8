use campaign_core::SagaStatus;

use crate::error::{OrchestratorError, Result};

pub struct SagaStateMachine;

impl SagaStateMachine {
    pub fn validate_transition(from: &SagaStatus, to: &SagaStatus) -> Result<()> {
        let allowed = Self::allowed_transitions(from);

        if allowed.contains(to) {
            Ok(())
        } else {
            Err(OrchestratorError::InvalidTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }

    fn allowed_transitions(from: &SagaStatus) -> Vec<SagaStatus> {
        match from {
            SagaStatus::Pending => vec![SagaStatus::Executing],
            SagaStatus::Executing => vec![SagaStatus::Completed, SagaStatus::Compensating],
            SagaStatus::Compensating => vec![SagaStatus::Failed],
            SagaStatus::Completed | SagaStatus::Failed => vec![],
        }
    }

    pub fn can_transition(from: &SagaStatus, to: &SagaStatus) -> bool {
        Self::validate_transition(from, to).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        assert!(SagaStateMachine::can_transition(
            &SagaStatus::Pending,
            &SagaStatus::Executing
        ));
        assert!(SagaStateMachine::can_transition(
            &SagaStatus::Executing,
            &SagaStatus::Completed
        ));
    }

    #[test]
    fn test_failure_goes_through_compensation() {
        assert!(SagaStateMachine::can_transition(
            &SagaStatus::Executing,
            &SagaStatus::Compensating
        ));
        assert!(SagaStateMachine::can_transition(
            &SagaStatus::Compensating,
            &SagaStatus::Failed
        ));
        assert!(!SagaStateMachine::can_transition(
            &SagaStatus::Executing,
            &SagaStatus::Failed
        ));
    }

    #[test]
    fn test_terminal_states() {
        for terminal in [SagaStatus::Completed, SagaStatus::Failed] {
            assert!(!SagaStateMachine::can_transition(
                &terminal,
                &SagaStatus::Executing
            ));
        }
        let err =
            SagaStateMachine::validate_transition(&SagaStatus::Completed, &SagaStatus::Pending)
                .unwrap_err();
        assert!(err.to_string().contains("completed"));
    }
}
