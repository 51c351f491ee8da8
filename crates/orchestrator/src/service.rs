//! Request-level composition: context, signal, plan, saga and lifecycle events.

use campaign_core::{ConversationMessage, ResourceRequirements, SagaSnapshot};
use chrono::{DateTime, Utc};
use events::{event_types, EventBus};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::agents::{emotion_for, AgentInvoker, AgentStep};
use crate::context::ContextStore;
use crate::error::{OrchestratorError, Result};
use crate::planner::TaskPlanner;
use crate::saga::SagaExecutor;
use crate::signal::{SignalExtractor, SignalInput};

/// Inbound campaign request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct PlanningRequest {
    pub message: Option<String>,
    pub tenant_id: String,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub platforms: Option<Vec<String>>,
    pub engagement_rate: Option<f64>,
    pub audience_size: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct PlanningOutcome {
    pub session_id: String,
    pub plan_id: Uuid,
    pub saga_id: Uuid,
    pub actions_count: usize,
    pub confidence_score: f64,
    pub estimated_completion: DateTime<Utc>,
    pub resource_requirements: ResourceRequirements,
    pub risks: Vec<String>,
}

/// Drives one request from free text to an executed saga.
pub struct PlanningOrchestrator {
    planner: TaskPlanner,
    executor: SagaExecutor,
    contexts: Arc<dyn ContextStore>,
    agents: Arc<dyn AgentInvoker>,
    extractor: SignalExtractor,
    event_bus: EventBus,
}

impl PlanningOrchestrator {
    pub fn new(
        planner: TaskPlanner,
        executor: SagaExecutor,
        contexts: Arc<dyn ContextStore>,
        agents: Arc<dyn AgentInvoker>,
        event_bus: EventBus,
    ) -> Result<Self> {
        Ok(Self {
            planner,
            executor,
            contexts,
            agents,
            extractor: SignalExtractor::new()?,
            event_bus,
        })
    }

    pub fn planner(&self) -> &TaskPlanner {
        &self.planner
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Plan and run the campaign described by `request`.
    ///
    /// Any failure is announced as `ORCHESTRATION_FAILED` and returned,
    /// including a request rejected for lacking a tenant.
    pub async fn process_with_planning(&self, request: PlanningRequest) -> Result<PlanningOutcome> {
        let tenant_id = request.tenant_id.trim().to_string();
        let session_id = request
            .session_id
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let result = if tenant_id.is_empty() {
            Err(OrchestratorError::InvalidRequest(
                "tenantId is required".to_string(),
            ))
        } else {
            self.run(&session_id, request).await
        };

        match result {
            Ok(outcome) => {
                info!(
                    tenant_id = %tenant_id,
                    session_id = %session_id,
                    plan_id = %outcome.plan_id,
                    saga_id = %outcome.saga_id,
                    "Orchestration completed"
                );
                self.announce(
                    event_types::ORCHESTRATION_COMPLETED,
                    &tenant_id,
                    &session_id,
                    json!({
                        "planId": outcome.plan_id,
                        "sagaId": outcome.saga_id,
                        "actionsCount": outcome.actions_count,
                        "confidenceScore": outcome.confidence_score,
                    }),
                )
                .await;
                Ok(outcome)
            }
            Err(e) => {
                error!(
                    tenant_id = %tenant_id,
                    session_id = %session_id,
                    kind = e.kind(),
                    error = %e,
                    "Orchestration failed"
                );
                self.announce(
                    event_types::ORCHESTRATION_FAILED,
                    &tenant_id,
                    &session_id,
                    json!({
                        "error": e.to_string(),
                        "kind": e.kind(),
                        "timestamp": Utc::now(),
                    }),
                )
                .await;
                Err(e)
            }
        }
    }

    async fn run(&self, session_id: &str, request: PlanningRequest) -> Result<PlanningOutcome> {
        let tenant_id = request.tenant_id.as_str();
        let message = request.message.clone().unwrap_or_default();

        let context = match self.contexts.get_context(tenant_id, session_id).await? {
            Some(context) => context,
            None => {
                self.contexts
                    .create_context(tenant_id, session_id, request.user_id.as_deref())
                    .await?
            }
        };
        if !message.is_empty() {
            self.contexts
                .add_conversation_message(tenant_id, session_id, ConversationMessage::user(&message))
                .await?;
        }

        let user_id = request
            .user_id
            .clone()
            .or(context.user_id)
            .unwrap_or_else(|| "anonymous".to_string());
        let signal = self.extractor.extract(&SignalInput {
            tenant_id: tenant_id.to_string(),
            session_id: session_id.to_string(),
            user_id,
            message,
            platforms: request.platforms.clone(),
            engagement_rate: request.engagement_rate,
            audience_size: request.audience_size,
        });

        let generated = self.planner.generate_plan(&signal).await?;
        let plan = &generated.plan;

        let emotion = emotion_for(signal.sentiment_score);
        let saga = self
            .executor
            .create_from_plan(plan, |action| {
                AgentStep::pair(
                    self.agents.clone(),
                    action,
                    session_id,
                    &signal.platforms,
                    emotion,
                )
            })
            .await?;
        let saga_id = saga.id();
        self.executor.execute(saga).await?;

        let summary = format!(
            "Executed plan {} with {} actions (confidence {:.2})",
            plan.id,
            plan.actions.len(),
            generated.confidence_score
        );
        self.contexts
            .add_conversation_message(tenant_id, session_id, ConversationMessage::assistant(summary))
            .await?;

        Ok(PlanningOutcome {
            session_id: session_id.to_string(),
            plan_id: plan.id,
            saga_id,
            actions_count: plan.actions.len(),
            confidence_score: generated.confidence_score,
            estimated_completion: plan.estimated_completion,
            resource_requirements: generated.resource_requirements.clone(),
            risks: generated.risks.clone(),
        })
    }

    pub async fn get_saga_status(&self, saga_id: Uuid) -> Result<SagaSnapshot> {
        self.executor.get_saga_status(saga_id).await
    }

    pub async fn get_tenant_sagas(&self, tenant_id: &str) -> Result<Vec<SagaSnapshot>> {
        self.executor.get_tenant_sagas(tenant_id).await
    }

    async fn announce(
        &self,
        event_type: &str,
        tenant_id: &str,
        session_id: &str,
        payload: serde_json::Value,
    ) {
        let event = self
            .event_bus
            .event(event_type, tenant_id)
            .with_session(session_id)
            .with_payload(payload);
        if let Err(e) = self.event_bus.publish(event).await {
            warn!(event_type, error = %e, "Failed to publish orchestration event");
        }
    }
}
