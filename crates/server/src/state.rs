use async_trait::async_trait;
use events::{
    event_types, handler_fn, DeadLetter, DeadLetterHandler, EventBus, HandlerResult,
    InMemoryTransport, SubscriptionOptions,
};
use orchestrator::{
    invoker_from_config, AgentInvoker, InMemoryContextStore, InMemorySagaStore,
    OrchestratorError, PlanningOrchestrator, SagaExecutor, TaskPlanner,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AppConfig;

struct DeadLetterLog;

#[async_trait]
impl DeadLetterHandler for DeadLetterLog {
    async fn handle(&self, letter: DeadLetter) -> HandlerResult {
        warn!(
            event_id = %letter.original_event.id,
            event_type = %letter.original_event.event_type,
            reason = %letter.failure_reason,
            "Dead letter received"
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PlanningOrchestrator>,
    pub event_bus: EventBus,
}

impl AppState {
    /// Wire the engine from configuration, calling agents as configured.
    pub fn from_config(config: &AppConfig) -> Result<Self, OrchestratorError> {
        let agents = invoker_from_config(&config.agents)?;
        Self::with_agents(config, agents)
    }

    pub fn with_agents(
        config: &AppConfig,
        agents: Arc<dyn AgentInvoker>,
    ) -> Result<Self, OrchestratorError> {
        let event_bus = EventBus::new(
            Arc::new(InMemoryTransport::new()),
            config.events.bus_config(),
        );
        let planner = TaskPlanner::new(config.planner.clone()).with_event_bus(event_bus.clone());
        let executor = SagaExecutor::new(Arc::new(InMemorySagaStore::new()), config.saga.clone())
            .with_event_bus(event_bus.clone());
        let orchestrator = PlanningOrchestrator::new(
            planner,
            executor,
            Arc::new(InMemoryContextStore::new()),
            agents,
            event_bus.clone(),
        )?;

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            event_bus,
        })
    }

    /// Log orchestration outcomes and dead letters as they happen.
    pub async fn start_event_logging(&self, concurrency: usize) -> Result<(), OrchestratorError> {
        self.event_bus
            .subscribe(
                "ORCHESTRATION_*",
                handler_fn(|event| async move {
                    if event.event_type == event_types::ORCHESTRATION_FAILED {
                        warn!(
                            tenant_id = %event.tenant_id,
                            session_id = ?event.session_id,
                            error = %event.payload["error"],
                            "Orchestration failed"
                        );
                    } else {
                        info!(
                            tenant_id = %event.tenant_id,
                            session_id = ?event.session_id,
                            event_type = %event.event_type,
                            "Orchestration event"
                        );
                    }
                    Ok(())
                }),
                SubscriptionOptions::default()
                    .with_concurrency(concurrency)
                    .without_dead_letter(),
            )
            .await?;

        self.event_bus
            .subscribe_dead_letters(Arc::new(DeadLetterLog))
            .await?;

        Ok(())
    }
}
