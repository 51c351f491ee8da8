use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Plan generation failed: {0}")]
    Planning(String),

    #[error("Step {step} timed out after {timeout_ms}ms")]
    StepTimeout { step: String, timeout_ms: u64 },

    #[error("Step {step} failed: {reason}")]
    StepExecution { step: String, reason: String },

    #[error("Saga {saga_id} gave up on step {step} after {attempts} attempts: {source}")]
    SagaExhausted {
        saga_id: Uuid,
        step: String,
        attempts: u32,
        source: Box<OrchestratorError>,
    },

    /// Logged and recorded on the saga; never returned from execution.
    #[error("Compensation of step {step} failed: {reason}")]
    Compensation { step: String, reason: String },

    #[error("Event delivery failed: {0}")]
    EventDelivery(#[from] events::EventError),

    #[error("Saga not found: {0}")]
    SagaNotFound(Uuid),

    #[error("Invalid saga transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Session context error: {0}")]
    Context(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl OrchestratorError {
    pub fn step_failed(step: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StepExecution {
            step: step.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error ended a saga (as opposed to failing before one existed)
    pub fn is_saga_fatal(&self) -> bool {
        matches!(self, Self::SagaExhausted { .. })
    }

    /// Event type suffix used in lifecycle failure events
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Planning(_) => "planning",
            Self::StepTimeout { .. } => "step_timeout",
            Self::StepExecution { .. } => "step_execution",
            Self::SagaExhausted { .. } => "saga_exhausted",
            Self::Compensation { .. } => "compensation",
            Self::EventDelivery(_) => "event_delivery",
            Self::SagaNotFound(_) => "saga_not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Context(_) => "context",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Http(_) => "http",
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
