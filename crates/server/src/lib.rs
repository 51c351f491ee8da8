pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Campaign Orchestrator API",
        version = "0.1.0",
        description = "Plans campaigns from signal analyses and runs them as compensating sagas"
    ),
    paths(
        routes::health_check,
        routes::process_request,
        routes::preview_plan,
        routes::get_saga,
        routes::list_tenant_sagas,
        routes::event_stats,
    ),
    components(schemas(
        routes::HealthResponse,
        routes::ProcessResponse,
        error::ErrorResponse,
        orchestrator::PlanningRequest,
        orchestrator::PlanningOutcome,
        campaign_core::SignalAnalysis,
        campaign_core::CompetitionLevel,
        campaign_core::PlanGenerationResult,
        campaign_core::ExecutionPlan,
        campaign_core::Action,
        campaign_core::ActionType,
        campaign_core::ActionStatus,
        campaign_core::PlanStatus,
        campaign_core::PlanMetadata,
        campaign_core::ResourceRequirements,
        campaign_core::SagaSnapshot,
        campaign_core::SagaStepRecord,
        campaign_core::SagaStatus,
        campaign_core::StepStatus,
        campaign_core::CompensationOutcome,
        events::EventBusStats,
    )),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "orchestrator", description = "Plan and execute campaign requests"),
        (name = "plans", description = "Plan generation without execution"),
        (name = "sagas", description = "Saga status queries"),
        (name = "events", description = "Event bus statistics"),
    )
)]
pub struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", ApiDoc::openapi()))
        .route("/health", get(routes::health_check))
        .route("/api/orchestrator/process", post(routes::process_request))
        .route("/api/plans/preview", post(routes::preview_plan))
        .route("/api/sagas/{id}", get(routes::get_saga))
        .route(
            "/api/tenants/{tenant_id}/sagas",
            get(routes::list_tenant_sagas),
        )
        .route("/api/events/stats", get(routes::event_stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
