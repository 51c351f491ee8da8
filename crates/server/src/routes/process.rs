use axum::extract::State;
use axum::Json;
use orchestrator::{PlanningOutcome, PlanningRequest};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{AppError, ErrorResponse};
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub outcome: PlanningOutcome,
}

#[utoipa::path(
    post,
    path = "/api/orchestrator/process",
    request_body = PlanningRequest,
    responses(
        (status = 200, description = "Plan generated and executed", body = ProcessResponse),
        (status = 400, description = "Invalid request or signal", body = ErrorResponse),
        (status = 502, description = "A plan step failed and was rolled back", body = ErrorResponse)
    ),
    tag = "orchestrator"
)]
pub async fn process_request(
    State(state): State<AppState>,
    Json(payload): Json<PlanningRequest>,
) -> Result<Json<ProcessResponse>, AppError> {
    let outcome = state.orchestrator.process_with_planning(payload).await?;

    Ok(Json(ProcessResponse {
        success: true,
        message: format!(
            "Executed {} actions with confidence {:.2}",
            outcome.actions_count, outcome.confidence_score
        ),
        outcome,
    }))
}
