use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 300_000;
pub const DEFAULT_STEP_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema, Hash)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum SagaStatus {
    #[default]
    Pending,
    Executing,
    Compensating,
    Completed,
    Failed,
}

impl SagaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Executing => "executing",
            Self::Compensating => "compensating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "executing" => Some(Self::Executing),
            "compensating" => Some(Self::Compensating),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Compensated,
}

/// Result of rolling back a single step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CompensationOutcome {
    #[default]
    NotRequired,
    Succeeded,
    Failed { error: String },
}

/// Snapshot of one saga step.
///
/// The unit of work and its compensation live in the executor; this
/// record only carries the observable state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct SagaStepRecord {
    pub id: Uuid,
    pub name: String,
    pub timeout_ms: u64,
    pub retry_count: u32,
    pub max_retries: u32,
    /// Total invocations of the step's action
    pub attempts: u32,
    pub status: StepStatus,
    pub compensation: CompensationOutcome,
}

impl SagaStepRecord {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            timeout_ms: DEFAULT_STEP_TIMEOUT_MS,
            retry_count: 0,
            max_retries: DEFAULT_STEP_MAX_RETRIES,
            attempts: 0,
            status: StepStatus::default(),
            compensation: CompensationOutcome::default(),
        }
    }
}

/// Immutable view of a saga handed out by status queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct SagaSnapshot {
    pub id: Uuid,
    pub tenant_id: String,
    pub session_id: String,
    pub plan_id: Option<Uuid>,
    pub steps: Vec<SagaStepRecord>,
    /// Index of the step currently (or last) being worked on
    pub current_state: usize,
    pub status: SagaStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl SagaSnapshot {
    pub fn new(tenant_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            session_id: session_id.into(),
            plan_id: None,
            steps: Vec::new(),
            current_state: 0,
            status: SagaStatus::default(),
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn completed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Completed | StepStatus::Compensated))
            .count()
    }
}
