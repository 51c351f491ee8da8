//! Task planner: turns a [`SignalAnalysis`] into a sequenced, costed
//! [`ExecutionPlan`].

pub mod rules;
mod sequence;

pub use sequence::sequence;

use campaign_core::{
    ExecutionPlan, PlanGenerationResult, PlanMetadata, PlanStatus, ResourceRequirements,
    SignalAnalysis,
};
use chrono::{Duration, Utc};
use events::{event_types, EventBus};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};

pub const DEFAULT_BASE_COST: f64 = 10.0;

fn default_surcharges() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("analytics".to_string(), 2.0),
        ("content".to_string(), 5.0),
        ("video".to_string(), 15.0),
        ("scheduling".to_string(), 1.0),
    ])
}

/// Cost table used for resource estimates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlannerConfig {
    /// Charged once per action
    pub base_cost: f64,
    /// Charged once per distinct agent the plan needs
    pub agent_surcharges: BTreeMap<String, f64>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            base_cost: DEFAULT_BASE_COST,
            agent_surcharges: default_surcharges(),
        }
    }
}

impl PlannerConfig {
    fn surcharge(&self, agent: &str) -> f64 {
        self.agent_surcharges.get(agent).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskPlanner {
    config: PlannerConfig,
    event_bus: Option<EventBus>,
}

impl TaskPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            config,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Build a plan without side effects.
    pub fn build_plan(&self, signal: &SignalAnalysis) -> Result<PlanGenerationResult> {
        signal
            .validate()
            .map_err(|e| OrchestratorError::Planning(e.to_string()))?;

        let actions = sequence(rules::derive_actions(signal))?;
        let action_count = actions.len();

        let execution_time: u64 = actions.iter().map(|a| a.estimated_duration).sum();
        let required_agents: Vec<String> = actions
            .iter()
            .flat_map(|a| a.required_agents.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let estimated_cost = self.config.base_cost * action_count as f64
            + required_agents
                .iter()
                .map(|agent| self.config.surcharge(agent))
                .sum::<f64>();

        let (confidence_score, confidence_factors) = rules::confidence(signal, action_count);
        let risks = rules::risks(signal, action_count);

        let created_at = Utc::now();
        let completion_offset = i64::try_from(execution_time).unwrap_or(i64::MAX);
        let estimated_completion = created_at
            .checked_add_signed(Duration::seconds(completion_offset))
            .unwrap_or(created_at);

        let plan = ExecutionPlan {
            id: Uuid::new_v4(),
            tenant_id: signal.tenant_id.clone(),
            session_id: signal.session_id.clone(),
            user_id: signal.user_id.clone(),
            created_at,
            estimated_completion,
            actions,
            priority: rules::plan_priority(signal),
            status: PlanStatus::Draft,
            metadata: PlanMetadata { confidence_factors },
        };

        debug!(
            plan_id = %plan.id,
            actions = action_count,
            confidence = confidence_score,
            "Plan built"
        );

        Ok(PlanGenerationResult {
            plan,
            confidence_score,
            resource_requirements: ResourceRequirements {
                estimated_cost,
                required_agents,
                execution_time,
            },
            risks,
        })
    }

    /// Build a plan and announce it on the event bus.
    ///
    /// A failed announcement is logged; the plan is still returned.
    pub async fn generate_plan(&self, signal: &SignalAnalysis) -> Result<PlanGenerationResult> {
        let result = self.build_plan(signal)?;

        info!(
            plan_id = %result.plan.id,
            tenant_id = %result.plan.tenant_id,
            actions = result.plan.actions.len(),
            confidence = result.confidence_score,
            "Generated execution plan"
        );

        if let Some(bus) = &self.event_bus {
            let event = bus
                .event(event_types::PLAN_GENERATED, &result.plan.tenant_id)
                .with_session(&result.plan.session_id)
                .with_payload(json!({
                    "planId": result.plan.id,
                    "actionsCount": result.plan.actions.len(),
                    "confidenceScore": result.confidence_score,
                    "estimatedCost": result.resource_requirements.estimated_cost,
                }));
            if let Err(e) = bus.publish(event).await {
                warn!(plan_id = %result.plan.id, error = %e, "Failed to publish plan event");
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_core::{ActionType, CompetitionLevel};
    use events::{handler_fn, SubscriptionOptions};
    use std::time::Duration as StdDuration;
    use tokio::sync::mpsc;

    fn example_signal() -> SignalAnalysis {
        SignalAnalysis::new("tenant-a", "session-1", "user-1")
            .with_audience_size(15_000)
            .with_engagement_rate(0.07)
            .with_content_types(vec!["video".to_string()])
            .with_platforms(vec!["tiktok".to_string()])
            .with_competition(CompetitionLevel::Low)
            .with_sentiment(0.3)
    }

    #[test]
    fn test_example_signal_plan() {
        let result = TaskPlanner::default().build_plan(&example_signal()).unwrap();
        let plan = &result.plan;

        assert_eq!(plan.actions.len(), 5);
        for action_type in [
            ActionType::AnalyzeAudience,
            ActionType::CreateVideo,
            ActionType::GenerateContent,
            ActionType::OptimizeTiming,
            ActionType::SchedulePost,
        ] {
            assert_eq!(plan.count_of(action_type), 1);
        }
        assert!((result.confidence_score - 0.90).abs() < 1e-9);
        assert_eq!(plan.priority, 5);
        assert_eq!(result.resource_requirements.execution_time, 1110);
        assert_eq!(
            result.resource_requirements.required_agents,
            vec!["analytics", "content", "scheduling", "video"]
        );
        // 5 actions * 10 + analytics 2 + content 5 + scheduling 1 + video 15
        assert!((result.resource_requirements.estimated_cost - 73.0).abs() < 1e-9);
        assert!(result.risks.contains(&"complex_execution".to_string()));
        assert_eq!(
            (plan.estimated_completion - plan.created_at).num_seconds(),
            1110
        );
    }

    #[test]
    fn test_schedule_follows_timing() {
        let result = TaskPlanner::default().build_plan(&example_signal()).unwrap();
        let actions = &result.plan.actions;

        let timing = actions
            .iter()
            .position(|a| a.action_type == ActionType::OptimizeTiming)
            .unwrap();
        let schedule = actions
            .iter()
            .position(|a| a.action_type == ActionType::SchedulePost)
            .unwrap();

        assert!(timing < schedule);
        assert!(actions[schedule].priority > actions[timing].priority);
        assert_eq!(actions[0].action_type, ActionType::AnalyzeAudience);
    }

    #[test]
    fn test_execution_time_is_sum_of_durations() {
        let planner = TaskPlanner::default();
        for audience in [0, 4_999, 5_001, 20_000] {
            let signal = SignalAnalysis::new("t", "s", "u").with_audience_size(audience);
            let result = planner.build_plan(&signal).unwrap();
            let total: u64 = result
                .plan
                .actions
                .iter()
                .map(|a| a.estimated_duration)
                .sum();
            assert_eq!(result.resource_requirements.execution_time, total);
            assert!((0.0..=1.0).contains(&result.confidence_score));
            assert!((1..=5).contains(&result.plan.priority));
        }
    }

    #[test]
    fn test_custom_cost_table() {
        let planner = TaskPlanner::new(PlannerConfig {
            base_cost: 1.0,
            agent_surcharges: BTreeMap::from([("scheduling".to_string(), 100.0)]),
        });
        let signal = SignalAnalysis::new("t", "s", "u").with_competition(CompetitionLevel::High);

        let result = planner.build_plan(&signal).unwrap();

        // OPTIMIZE_TIMING + SCHEDULE_POST; analytics has no surcharge here
        assert!((result.resource_requirements.estimated_cost - 102.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_signal_is_planning_error() {
        let signal = SignalAnalysis::new("t", "s", "u").with_engagement_rate(1.5);

        let err = TaskPlanner::default().build_plan(&signal).unwrap_err();

        assert!(matches!(err, OrchestratorError::Planning(_)));
    }

    #[tokio::test]
    async fn test_generate_plan_publishes_event() {
        let bus = EventBus::in_memory();
        let (tx, mut rx) = mpsc::channel(4);
        bus.subscribe(
            event_types::PLAN_GENERATED,
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
        let planner = TaskPlanner::default().with_event_bus(bus);

        let result = planner.generate_plan(&example_signal()).await.unwrap();

        let event = tokio::time::timeout(StdDuration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.tenant_id, "tenant-a");
        assert_eq!(event.payload["planId"], json!(result.plan.id));
        assert_eq!(event.payload["actionsCount"], json!(5));
    }

    #[tokio::test]
    async fn test_generate_plan_survives_closed_bus() {
        let bus = EventBus::in_memory();
        bus.shutdown().await;
        let planner = TaskPlanner::default().with_event_bus(bus);

        let result = planner.generate_plan(&example_signal()).await;

        assert!(result.is_ok());
    }
}
