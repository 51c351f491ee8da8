use axum::extract::State;
use axum::Json;
use campaign_core::{PlanGenerationResult, SignalAnalysis};

use crate::error::{AppError, ErrorResponse};
use crate::state::AppState;

/// Plan a signal analysis without executing or announcing it.
#[utoipa::path(
    post,
    path = "/api/plans/preview",
    request_body = SignalAnalysis,
    responses(
        (status = 200, description = "Generated plan", body = PlanGenerationResult),
        (status = 400, description = "Signal out of range", body = ErrorResponse)
    ),
    tag = "plans"
)]
pub async fn preview_plan(
    State(state): State<AppState>,
    Json(signal): Json<SignalAnalysis>,
) -> Result<Json<PlanGenerationResult>, AppError> {
    let result = state.orchestrator.planner().build_plan(&signal)?;
    Ok(Json(result))
}
