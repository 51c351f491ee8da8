use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

pub const MIN_ACTION_PRIORITY: u8 = 1;
pub const MAX_ACTION_PRIORITY: u8 = 10;
pub const MIN_PLAN_PRIORITY: u8 = 1;
pub const MAX_PLAN_PRIORITY: u8 = 5;

/// Kinds of work an execution plan can contain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    AnalyzeAudience,
    CreateVideo,
    GenerateContent,
    OptimizeTiming,
    SchedulePost,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnalyzeAudience => "ANALYZE_AUDIENCE",
            Self::CreateVideo => "CREATE_VIDEO",
            Self::GenerateContent => "GENERATE_CONTENT",
            Self::OptimizeTiming => "OPTIMIZE_TIMING",
            Self::SchedulePost => "SCHEDULE_POST",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ANALYZE_AUDIENCE" => Some(Self::AnalyzeAudience),
            "CREATE_VIDEO" => Some(Self::CreateVideo),
            "GENERATE_CONTENT" => Some(Self::GenerateContent),
            "OPTIMIZE_TIMING" => Some(Self::OptimizeTiming),
            "SCHEDULE_POST" => Some(Self::SchedulePost),
            _ => None,
        }
    }

    /// Path segment used when dispatching to an agent service.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::AnalyzeAudience => "analyze-audience",
            Self::CreateVideo => "create-video",
            Self::GenerateContent => "generate-content",
            Self::OptimizeTiming => "optimize-timing",
            Self::SchedulePost => "schedule-post",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Compensated,
}

/// One unit of planned work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// 1 (runs first) to 10
    pub priority: u8,
    /// Seconds
    pub estimated_duration: u64,
    pub required_agents: Vec<String>,
    pub dependencies: Vec<Uuid>,
    #[schema(value_type = Object)]
    #[cfg_attr(feature = "typescript", ts(type = "Record<string, unknown>"))]
    pub parameters: BTreeMap<String, serde_json::Value>,
    pub status: ActionStatus,
}

impl Action {
    pub fn new(action_type: ActionType, priority: u8, estimated_duration: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            action_type,
            priority: priority.clamp(MIN_ACTION_PRIORITY, MAX_ACTION_PRIORITY),
            estimated_duration,
            required_agents: Vec::new(),
            dependencies: Vec::new(),
            parameters: BTreeMap::new(),
            status: ActionStatus::default(),
        }
    }

    pub fn with_agents<I, S>(mut self, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_agents = agents.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dependency(mut self, id: Uuid) -> Self {
        self.dependencies.push(id);
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Draft,
    Executing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct PlanMetadata {
    pub confidence_factors: Vec<String>,
}

/// Ordered, dependency-resolved list of actions for one session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    pub id: Uuid,
    pub tenant_id: String,
    pub session_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub estimated_completion: DateTime<Utc>,
    pub actions: Vec<Action>,
    /// 1 to 5
    pub priority: u8,
    pub status: PlanStatus,
    pub metadata: PlanMetadata,
}

impl ExecutionPlan {
    pub fn action(&self, id: Uuid) -> Option<&Action> {
        self.actions.iter().find(|a| a.id == id)
    }

    pub fn count_of(&self, action_type: ActionType) -> usize {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .count()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    pub estimated_cost: f64,
    pub required_agents: Vec<String>,
    /// Seconds
    pub execution_time: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct PlanGenerationResult {
    pub plan: ExecutionPlan,
    pub confidence_score: f64,
    pub resource_requirements: ResourceRequirements,
    pub risks: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_type_round_trip_names() {
        assert_eq!(ActionType::CreateVideo.as_str(), "CREATE_VIDEO");
        assert_eq!(
            ActionType::parse("SCHEDULE_POST"),
            Some(ActionType::SchedulePost)
        );
        assert_eq!(ActionType::parse("schedule_post"), None);

        let json = serde_json::to_string(&ActionType::OptimizeTiming).unwrap();
        assert_eq!(json, "\"OPTIMIZE_TIMING\"");
    }

    #[test]
    fn test_action_priority_is_clamped() {
        assert_eq!(Action::new(ActionType::SchedulePost, 0, 10).priority, 1);
        assert_eq!(Action::new(ActionType::SchedulePost, 42, 10).priority, 10);
    }

    #[test]
    fn test_action_serializes_type_field() {
        let action = Action::new(ActionType::GenerateContent, 2, 300)
            .with_agents(["content"])
            .with_parameter("topics", serde_json::json!(["ai"]));

        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "GENERATE_CONTENT");
        assert_eq!(json["estimatedDuration"], 300);
        assert_eq!(json["requiredAgents"][0], "content");
        assert_eq!(json["status"], "pending");
    }
}
