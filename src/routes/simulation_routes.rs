use axum::{
    Router,
    routing::{get, post},
};

use crate::controllers::simulation_controller::{
    get_library, get_plant_simulation, health, list_plants, simulate_adhoc, simulate_plant,
};
use crate::shared_state::SharedState;

/// Build the `/api/*` sub-router.
/// Handlers extract `State<AppState>` and/or `State<Arc<ServiceConfig>>` via
/// `FromRef<SharedState>`, so a single `.with_state(shared)` covers both.
pub fn api_routes(shared: SharedState) -> Router {
    Router::new()
        .route("/health",                  get(health))
        .route("/plants",                  get(list_plants))
        .route("/plants/{id}/simulate",    post(simulate_plant))
        .route("/plants/{id}/simulation",  get(get_plant_simulation))
        .route("/simulate",                post(simulate_adhoc))
        .route("/library",                 get(get_library))
        .with_state(shared)
}
