use axum::extract::State;
use axum::Json;
use events::EventBusStats;

use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/events/stats",
    responses(
        (status = 200, description = "Event bus counters", body = EventBusStats)
    ),
    tag = "events"
)]
pub async fn event_stats(State(state): State<AppState>) -> Json<EventBusStats> {
    Json(state.event_bus.stats().await)
}
