use async_trait::async_trait;
use campaign_core::{ActionType, SagaStatus, StepStatus};
use events::{event_types, handler_fn, Event, EventBus, SubscriptionOptions};
use orchestrator::{
    AgentInvoker, AgentRequest, ContextStore, InMemoryContextStore, InMemorySagaStore,
    LocalAgentRunner, OrchestratorError, PlannerConfig, PlanningOrchestrator, PlanningRequest,
    SagaConfig, SagaExecutor, TaskPlanner,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Invoker that rejects one action type and records every call.
struct RejectingAgents {
    rejected: ActionType,
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl AgentInvoker for RejectingAgents {
    async fn invoke(&self, _agent: &str, request: &AgentRequest) -> orchestrator::Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("run:{}", request.action_type));
        if request.action_type == self.rejected {
            return Err(OrchestratorError::step_failed(
                request.action_type.as_str(),
                "agent rejected the request",
            ));
        }
        Ok(json!({ "ok": true }))
    }

    async fn compensate(&self, _agent: &str, request: &AgentRequest) -> orchestrator::Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("undo:{}", request.action_type));
        Ok(Value::Null)
    }
}

struct Harness {
    orchestrator: PlanningOrchestrator,
    contexts: Arc<InMemoryContextStore>,
    lifecycle: mpsc::Receiver<Event>,
}

async fn harness(agents: Arc<dyn AgentInvoker>) -> Harness {
    let bus = EventBus::in_memory();
    let (tx, lifecycle) = mpsc::channel(16);
    bus.subscribe(
        "ORCHESTRATION_*",
        handler_fn(move |event| {
            let tx = tx.clone();
            async move {
                tx.send(event).await.ok();
                Ok(())
            }
        }),
        SubscriptionOptions::default(),
    )
    .await
    .unwrap();

    let contexts = Arc::new(InMemoryContextStore::new());
    let executor = SagaExecutor::new(
        Arc::new(InMemorySagaStore::new()),
        SagaConfig {
            default_timeout_ms: 2_000,
            default_max_retries: 1,
        },
    )
    .with_event_bus(bus.clone());
    let planner = TaskPlanner::new(PlannerConfig::default()).with_event_bus(bus.clone());
    let orchestrator =
        PlanningOrchestrator::new(planner, executor, contexts.clone(), agents, bus).unwrap();

    Harness {
        orchestrator,
        contexts,
        lifecycle,
    }
}

async fn next_event(rx: &mut mpsc::Receiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("lifecycle event")
        .expect("channel open")
}

fn request(message: &str) -> PlanningRequest {
    PlanningRequest {
        message: Some(message.to_string()),
        tenant_id: "tenant-a".to_string(),
        session_id: Some("session-1".to_string()),
        user_id: Some("user-1".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_successful_orchestration() {
    let mut h = harness(Arc::new(LocalAgentRunner)).await;
    let mut req = request("Launch an amazing workout video campaign on tiktok");
    req.audience_size = Some(15_000);
    req.engagement_rate = Some(0.07);

    let outcome = h.orchestrator.process_with_planning(req).await.unwrap();

    assert_eq!(outcome.actions_count, 5);
    assert!((outcome.confidence_score - 0.90).abs() < 1e-9);
    assert_eq!(outcome.resource_requirements.execution_time, 1110);

    let saga = h.orchestrator.get_saga_status(outcome.saga_id).await.unwrap();
    assert_eq!(saga.status, SagaStatus::Completed);
    assert_eq!(saga.plan_id, Some(outcome.plan_id));
    assert_eq!(saga.current_state, 4);

    let context = h
        .contexts
        .get_context("tenant-a", "session-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(context.history.len(), 2);
    assert!(context.history[1].content.contains(&outcome.plan_id.to_string()));

    let event = next_event(&mut h.lifecycle).await;
    assert_eq!(event.event_type, event_types::ORCHESTRATION_COMPLETED);
    assert_eq!(event.payload["sagaId"], json!(outcome.saga_id));
}

#[tokio::test]
async fn test_failed_step_rolls_back_and_reports() {
    let agents = Arc::new(RejectingAgents {
        rejected: ActionType::SchedulePost,
        calls: Mutex::new(Vec::new()),
    });
    let mut h = harness(agents.clone()).await;

    let err = h
        .orchestrator
        .process_with_planning(request("quick food photo post"))
        .await
        .unwrap_err();

    assert!(err.is_saga_fatal());
    // GENERATE_CONTENT, OPTIMIZE_TIMING, then SCHEDULE_POST twice before rollback
    assert_eq!(
        *agents.calls.lock().unwrap(),
        vec![
            "run:GENERATE_CONTENT",
            "run:OPTIMIZE_TIMING",
            "run:SCHEDULE_POST",
            "run:SCHEDULE_POST",
            "undo:OPTIMIZE_TIMING",
            "undo:GENERATE_CONTENT",
        ]
    );

    let sagas = h.orchestrator.get_tenant_sagas("tenant-a").await.unwrap();
    assert_eq!(sagas.len(), 1);
    assert_eq!(sagas[0].status, SagaStatus::Failed);
    assert_eq!(sagas[0].steps[2].status, StepStatus::Failed);
    assert_eq!(sagas[0].steps[2].attempts, 2);

    let event = next_event(&mut h.lifecycle).await;
    assert_eq!(event.event_type, event_types::ORCHESTRATION_FAILED);
    assert!(event.payload["error"]
        .as_str()
        .unwrap()
        .contains("agent rejected the request"));
    assert!(event.payload["timestamp"].is_string());
}

#[tokio::test]
async fn test_planning_error_surfaces_before_saga() {
    let mut h = harness(Arc::new(LocalAgentRunner)).await;
    let mut req = request("anything");
    req.engagement_rate = Some(4.0);

    let err = h.orchestrator.process_with_planning(req).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::Planning(_)));
    assert!(h
        .orchestrator
        .get_tenant_sagas("tenant-a")
        .await
        .unwrap()
        .is_empty());
    let event = next_event(&mut h.lifecycle).await;
    assert_eq!(event.event_type, event_types::ORCHESTRATION_FAILED);
    assert_eq!(event.payload["kind"], json!("planning"));
}

#[tokio::test]
async fn test_missing_tenant_is_rejected() {
    let mut h = harness(Arc::new(LocalAgentRunner)).await;

    let err = h
        .orchestrator
        .process_with_planning(PlanningRequest::default())
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::InvalidRequest(_)));
    let event = next_event(&mut h.lifecycle).await;
    assert_eq!(event.event_type, event_types::ORCHESTRATION_FAILED);
    assert_eq!(event.payload["kind"], json!("invalid_request"));
    assert_eq!(event.tenant_id, "");
}

#[tokio::test]
async fn test_session_id_generated_when_absent() {
    let h = harness(Arc::new(LocalAgentRunner)).await;
    let mut req = request("hello");
    req.session_id = None;

    let outcome = h.orchestrator.process_with_planning(req).await.unwrap();

    assert!(!outcome.session_id.is_empty());
    assert!(h
        .contexts
        .get_context("tenant-a", &outcome.session_id)
        .await
        .unwrap()
        .is_some());
}
