use campaign_core::{
    Action, CompensationOutcome, ExecutionPlan, SagaSnapshot, SagaStatus, SagaStepRecord,
    StepStatus, DEFAULT_STEP_MAX_RETRIES, DEFAULT_STEP_TIMEOUT_MS,
};
use events::{event_types, EventBus};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::state_machine::SagaStateMachine;
use super::step::{SagaStep, StepAction, StepContext};
use super::store::SagaStore;
use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SagaConfig {
    pub default_timeout_ms: u64,
    pub default_max_retries: u32,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_STEP_TIMEOUT_MS,
            default_max_retries: DEFAULT_STEP_MAX_RETRIES,
        }
    }
}

/// A saga ready to run: its observable record plus the executable steps.
///
/// Owned by whoever executes it, so a running saga has exactly one writer.
#[derive(Debug)]
pub struct Saga {
    snapshot: SagaSnapshot,
    steps: Vec<SagaStep>,
}

impl Saga {
    pub fn id(&self) -> Uuid {
        self.snapshot.id
    }

    pub fn snapshot(&self) -> &SagaSnapshot {
        &self.snapshot
    }

    pub fn steps(&self) -> &[SagaStep] {
        &self.steps
    }
}

/// Runs sagas step by step with timeout, retry and reverse-order compensation.
#[derive(Clone)]
pub struct SagaExecutor {
    store: Arc<dyn SagaStore>,
    event_bus: Option<EventBus>,
    config: SagaConfig,
}

impl SagaExecutor {
    pub fn new(store: Arc<dyn SagaStore>, config: SagaConfig) -> Self {
        Self {
            store,
            event_bus: None,
            config,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(&self) -> &SagaConfig {
        &self.config
    }

    /// Register a saga over `steps` in `pending` state.
    pub async fn create_saga(
        &self,
        tenant_id: &str,
        session_id: &str,
        steps: Vec<SagaStep>,
    ) -> Result<Saga> {
        let mut snapshot = SagaSnapshot::new(tenant_id, session_id);
        snapshot.steps = steps
            .iter()
            .map(|step| {
                let mut record = SagaStepRecord::new(step.id, step.name.clone());
                record.timeout_ms = duration_ms(step.timeout);
                record.max_retries = step.max_retries;
                record
            })
            .collect();

        self.store.save(&snapshot).await?;
        info!(
            saga_id = %snapshot.id,
            tenant_id = %tenant_id,
            steps = steps.len(),
            "Saga created"
        );

        Ok(Saga { snapshot, steps })
    }

    /// One step per plan action, in plan order, with the configured defaults.
    ///
    /// `build` supplies the action and compensation for each plan action.
    pub async fn create_from_plan<F>(&self, plan: &ExecutionPlan, build: F) -> Result<Saga>
    where
        F: Fn(&Action) -> (Arc<dyn StepAction>, Arc<dyn StepAction>),
    {
        let steps = plan
            .actions
            .iter()
            .map(|action| {
                let (run, compensate) = build(action);
                SagaStep::new(action.action_type.as_str(), run, compensate)
                    .with_id(action.id)
                    .with_timeout(Duration::from_millis(self.config.default_timeout_ms))
                    .with_max_retries(self.config.default_max_retries)
            })
            .collect();

        let mut saga = self
            .create_saga(&plan.tenant_id, &plan.session_id, steps)
            .await?;
        saga.snapshot.plan_id = Some(plan.id);
        self.store.save(&saga.snapshot).await?;
        Ok(saga)
    }

    /// Run every step in order.
    ///
    /// A step failing past its retry budget rolls back the completed steps
    /// in reverse order and returns [`OrchestratorError::SagaExhausted`].
    /// The store refusing a save while steps run is fatal in the same way,
    /// since progress that cannot be recorded cannot be trusted.
    pub async fn execute(&self, mut saga: Saga) -> Result<SagaSnapshot> {
        self.transition(&mut saga.snapshot, SagaStatus::Executing)
            .await?;
        info!(saga_id = %saga.id(), steps = saga.steps.len(), "Saga started");
        self.announce(event_types::SAGA_STARTED, &saga.snapshot, json!({}))
            .await;

        let mut outputs: Vec<Value> = Vec::with_capacity(saga.steps.len());

        for index in 0..saga.steps.len() {
            let step = saga.steps[index].clone();
            saga.snapshot.current_state = index;
            saga.snapshot.steps[index].status = StepStatus::Running;
            if let Err(e) = self.persist(&mut saga.snapshot).await {
                saga.snapshot.steps[index].status = StepStatus::Failed;
                return Err(self.compensate(saga, index, &step.name, outputs, e, 0).await);
            }

            loop {
                let record = &mut saga.snapshot.steps[index];
                record.attempts += 1;
                let attempts = record.attempts;
                let ctx = StepContext {
                    saga_id: saga.snapshot.id,
                    step_id: step.id,
                    step_name: step.name.clone(),
                    step_index: index,
                    attempt: attempts,
                    cancel: CancellationToken::new(),
                    previous: outputs.last().cloned(),
                };

                match run_with_timeout(&step, step.action.as_ref(), ctx).await {
                    Ok(output) => {
                        record.retry_count = 0;
                        record.status = StepStatus::Completed;
                        debug!(saga_id = %saga.snapshot.id, step = %step.name, "Step completed");
                        outputs.push(output);
                        if let Err(e) = self.persist(&mut saga.snapshot).await {
                            let done = index + 1;
                            return Err(self
                                .compensate(saga, done, &step.name, outputs, e, attempts)
                                .await);
                        }
                        break;
                    }
                    Err(e) if record.retry_count < step.max_retries => {
                        record.retry_count += 1;
                        warn!(
                            saga_id = %saga.snapshot.id,
                            step = %step.name,
                            retry_count = record.retry_count,
                            max_retries = step.max_retries,
                            error = %e,
                            "Step failed, retrying"
                        );
                        if let Err(e) = self.persist(&mut saga.snapshot).await {
                            saga.snapshot.steps[index].status = StepStatus::Failed;
                            return Err(self
                                .compensate(saga, index, &step.name, outputs, e, attempts)
                                .await);
                        }
                    }
                    Err(e) => {
                        record.status = StepStatus::Failed;
                        error!(
                            saga_id = %saga.snapshot.id,
                            step = %step.name,
                            attempts,
                            error = %e,
                            "Step exhausted its retries"
                        );
                        return Err(self
                            .compensate(saga, index, &step.name, outputs, e, attempts)
                            .await);
                    }
                }
            }
        }

        saga.snapshot.current_state = saga.steps.len().saturating_sub(1);
        if let Err(e) = self
            .transition(&mut saga.snapshot, SagaStatus::Completed)
            .await
        {
            let done = saga.steps.len();
            let last = saga
                .steps
                .last()
                .map(|step| step.name.clone())
                .unwrap_or_default();
            return Err(self.compensate(saga, done, &last, outputs, e, 0).await);
        }
        info!(saga_id = %saga.id(), "Saga completed");
        self.announce(
            event_types::SAGA_COMPLETED,
            &saga.snapshot,
            json!({ "steps": saga.steps.len() }),
        )
        .await;

        Ok(saga.snapshot)
    }

    /// Undo steps `completed - 1 ..= 0` and mark the saga failed.
    ///
    /// Compensation and store errors are logged and never stop the rollback.
    async fn compensate(
        &self,
        mut saga: Saga,
        completed: usize,
        failed_step: &str,
        outputs: Vec<Value>,
        cause: OrchestratorError,
        attempts: u32,
    ) -> OrchestratorError {
        let saga_id = saga.snapshot.id;

        self.record_rollback_state(&mut saga.snapshot, SagaStatus::Compensating)
            .await;
        warn!(
            saga_id = %saga_id,
            failed_step = %failed_step,
            to_compensate = completed,
            "Compensating saga"
        );

        for index in (0..completed).rev() {
            let step = saga.steps[index].clone();
            saga.snapshot.current_state = index;
            let ctx = StepContext {
                saga_id,
                step_id: step.id,
                step_name: step.name.clone(),
                step_index: index,
                attempt: 1,
                cancel: CancellationToken::new(),
                previous: outputs.get(index).cloned(),
            };

            let record = &mut saga.snapshot.steps[index];
            match run_with_timeout(&step, step.compensation.as_ref(), ctx).await {
                Ok(_) => {
                    record.status = StepStatus::Compensated;
                    record.compensation = CompensationOutcome::Succeeded;
                    debug!(saga_id = %saga_id, step = %step.name, "Step compensated");
                }
                Err(e) => {
                    let failure = OrchestratorError::Compensation {
                        step: step.name.clone(),
                        reason: e.to_string(),
                    };
                    error!(saga_id = %saga_id, error = %failure, "Compensation failed, continuing rollback");
                    record.compensation = CompensationOutcome::Failed {
                        error: e.to_string(),
                    };
                }
            }
            if let Err(e) = self.persist(&mut saga.snapshot).await {
                error!(saga_id = %saga_id, error = %e, "Could not persist compensation progress");
            }
        }

        saga.snapshot.error = Some(cause.to_string());
        self.record_rollback_state(&mut saga.snapshot, SagaStatus::Failed)
            .await;
        self.announce(
            event_types::SAGA_FAILED,
            &saga.snapshot,
            json!({ "step": failed_step, "error": cause.to_string() }),
        )
        .await;

        OrchestratorError::SagaExhausted {
            saga_id,
            step: failed_step.to_string(),
            attempts,
            source: Box::new(cause),
        }
    }

    /// Status change during rollback; it stands even if the store rejects it.
    async fn record_rollback_state(&self, snapshot: &mut SagaSnapshot, to: SagaStatus) {
        if let Err(e) = self.transition(snapshot, to).await {
            error!(saga_id = %snapshot.id, to = to.as_str(), error = %e, "Could not record saga state");
            if SagaStateMachine::can_transition(&snapshot.status, &to) {
                snapshot.status = to;
            }
        }
    }

    /// Current snapshot of a saga; later progress does not affect the copy.
    pub async fn get_saga_status(&self, saga_id: Uuid) -> Result<SagaSnapshot> {
        self.store
            .get(saga_id)
            .await?
            .ok_or(OrchestratorError::SagaNotFound(saga_id))
    }

    pub async fn get_tenant_sagas(&self, tenant_id: &str) -> Result<Vec<SagaSnapshot>> {
        self.store.list_by_tenant(tenant_id).await
    }

    async fn transition(&self, snapshot: &mut SagaSnapshot, to: SagaStatus) -> Result<()> {
        SagaStateMachine::validate_transition(&snapshot.status, &to)?;
        debug!(
            saga_id = %snapshot.id,
            from = snapshot.status.as_str(),
            to = to.as_str(),
            "Saga transition"
        );
        let from = std::mem::replace(&mut snapshot.status, to);
        if let Err(e) = self.persist(snapshot).await {
            snapshot.status = from;
            return Err(e);
        }
        Ok(())
    }

    async fn persist(&self, snapshot: &mut SagaSnapshot) -> Result<()> {
        snapshot.touch();
        self.store.save(snapshot).await
    }

    async fn announce(&self, event_type: &str, snapshot: &SagaSnapshot, extra: Value) {
        let Some(bus) = &self.event_bus else {
            return;
        };

        let mut payload = json!({
            "sagaId": snapshot.id,
            "planId": snapshot.plan_id,
            "status": snapshot.status.as_str(),
            "currentState": snapshot.current_state,
        });
        if let (Some(base), Value::Object(extra)) = (payload.as_object_mut(), extra) {
            base.extend(extra);
        }

        let event = bus
            .event(event_type, &snapshot.tenant_id)
            .with_session(&snapshot.session_id)
            .with_payload(payload);
        if let Err(e) = bus.publish(event).await {
            warn!(saga_id = %snapshot.id, event_type, error = %e, "Failed to publish saga event");
        }
    }
}

impl std::fmt::Debug for SagaExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SagaExecutor")
            .field("config", &self.config)
            .field("event_bus", &self.event_bus.is_some())
            .finish()
    }
}

/// Race `action` against the step's timeout.
///
/// On timeout the attempt's token is cancelled and the action future dropped.
async fn run_with_timeout(
    step: &SagaStep,
    action: &dyn StepAction,
    ctx: StepContext,
) -> Result<Value> {
    let cancel = ctx.cancel.clone();

    tokio::select! {
        result = action.run(ctx) => result.map_err(|e| as_step_error(&step.name, e)),
        _ = tokio::time::sleep(step.timeout) => {
            cancel.cancel();
            Err(OrchestratorError::StepTimeout {
                step: step.name.clone(),
                timeout_ms: duration_ms(step.timeout),
            })
        }
    }
}

fn as_step_error(step: &str, error: OrchestratorError) -> OrchestratorError {
    match error {
        e @ (OrchestratorError::StepExecution { .. } | OrchestratorError::StepTimeout { .. }) => e,
        other => OrchestratorError::step_failed(step, other.to_string()),
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
