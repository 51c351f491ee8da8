use axum::extract::{Path, State};
use axum::Json;
use campaign_core::SagaSnapshot;
use uuid::Uuid;

use crate::error::{AppError, ErrorResponse};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/sagas/{id}",
    params(("id" = Uuid, Path, description = "Saga id")),
    responses(
        (status = 200, description = "Saga snapshot", body = SagaSnapshot),
        (status = 404, description = "Unknown saga", body = ErrorResponse)
    ),
    tag = "sagas"
)]
pub async fn get_saga(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SagaSnapshot>, AppError> {
    let saga = state.orchestrator.get_saga_status(id).await?;
    Ok(Json(saga))
}

#[utoipa::path(
    get,
    path = "/api/tenants/{tenant_id}/sagas",
    params(("tenant_id" = String, Path, description = "Tenant id")),
    responses(
        (status = 200, description = "Sagas of the tenant, oldest first", body = Vec<SagaSnapshot>)
    ),
    tag = "sagas"
)]
pub async fn list_tenant_sagas(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<Vec<SagaSnapshot>>, AppError> {
    let sagas = state.orchestrator.get_tenant_sagas(&tenant_id).await?;
    Ok(Json(sagas))
}
