use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use crate::error::SimError;
use crate::models::api::{
    ErrorResponse, HealthResponse, LibraryResponse, PlantSimulationRequest, PlantSummary, SimulationRequest,
    SimulationResult,
};
use crate::models::location::Location;
use crate::models::parameters::ParameterLibrary;
use crate::models::simulation_config::SimulationConfig;
use crate::models::table::TimeSeries2D;
use crate::services::pv_simulation::simulate;
use crate::shared_state::AppState;
use crate::weather::{WeatherFrame, WeatherInput};

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: message.into() })).into_response()
}

fn simulation_error(err: &SimError) -> Response {
    let status = if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    error_body(status, err.to_string())
}

/// Runs the synchronous pipeline on the blocking pool.
async fn run_simulation(
    locations: Vec<Location>,
    weather: WeatherFrame,
    config: SimulationConfig,
    library: Arc<ParameterLibrary>,
) -> Result<TimeSeries2D, Response> {
    let task = tokio::task::spawn_blocking(move || {
        simulate(locations, &WeatherInput::Frame(weather), &config, &library, None)
    });
    match task.await {
        Ok(Ok(table)) => Ok(table),
        Ok(Err(e)) => {
            warn!(error = %e, "Simulation rejected");
            Err(simulation_error(&e))
        }
        Err(e) => {
            error!(error = %e, "Simulation task failed");
            Err(error_body(StatusCode::INTERNAL_SERVER_ERROR, "simulation task failed"))
        }
    }
}

/// GET /api/health
/// Service liveness
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>, State(config): State<Arc<ServiceConfig>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now(),
        plants: config.plants.len(),
        cached_results: state.result_count(),
    })
}

/// GET /api/plants
/// List all configured plants
///
/// Returns every plant from the service configuration with its locations.
#[utoipa::path(
    get,
    path = "/api/plants",
    responses(
        (status = 200, description = "List of configured plants", body = Vec<PlantSummary>)
    )
)]
pub async fn list_plants(State(config): State<Arc<ServiceConfig>>) -> impl IntoResponse {
    let plants: Vec<PlantSummary> = config.plants.iter().map(PlantSummary::from).collect();
    Json(plants)
}

/// POST /api/plants/{id}/simulate
/// Simulate a configured plant
///
/// Runs the plant's configuration against the posted weather frame and keeps
/// the result as the plant's latest simulation.
#[utoipa::path(
    post,
    path = "/api/plants/{id}/simulate",
    params(
        ("id" = String, Path, description = "Unique Plant ID")
    ),
    request_body = PlantSimulationRequest,
    responses(
        (status = 200, description = "Simulated output", body = SimulationResult),
        (status = 400, description = "Invalid configuration, locations or weather", body = ErrorResponse),
        (status = 404, description = "Plant not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn simulate_plant(
    Path(id): Path<String>,
    State(state): State<AppState>,
    State(config): State<Arc<ServiceConfig>>,
    Json(request): Json<PlantSimulationRequest>,
) -> Response {
    let Some(plant) = config.plant(&id) else {
        return error_body(StatusCode::NOT_FOUND, "Plant not found");
    };
    let sim_config = plant.simulation_config(&config.simulation).clone();
    let capacity_factor = sim_config.total_system_capacity.is_none();

    match run_simulation(plant.locations.clone(), request.weather, sim_config, state.library.clone()).await {
        Ok(table) => {
            let result = SimulationResult::from_table(Some(id.clone()), &table, capacity_factor);
            info!(plant = %id, steps = result.times.len(), "Plant simulated");
            state.set_result(&id, result.clone());
            (StatusCode::OK, Json(result)).into_response()
        }
        Err(response) => response,
    }
}

/// GET /api/plants/{id}/simulation
/// Latest simulation of a plant
#[utoipa::path(
    get,
    path = "/api/plants/{id}/simulation",
    params(
        ("id" = String, Path, description = "Unique Plant ID")
    ),
    responses(
        (status = 200, description = "Most recent simulated output", body = SimulationResult),
        (status = 404, description = "Plant not found or not simulated yet", body = ErrorResponse)
    )
)]
pub async fn get_plant_simulation(
    Path(id): Path<String>,
    State(state): State<AppState>,
    State(config): State<Arc<ServiceConfig>>,
) -> Response {
    if config.plant(&id).is_none() {
        return error_body(StatusCode::NOT_FOUND, "Plant not found");
    }
    match state.get_result(&id) {
        Some(result) => (StatusCode::OK, Json(result)).into_response(),
        None => error_body(StatusCode::NOT_FOUND, "Plant has not been simulated yet"),
    }
}

/// POST /api/simulate
/// Ad-hoc simulation
///
/// Simulates arbitrary locations with the posted weather. Options missing from
/// the request fall back to the service-wide defaults.
#[utoipa::path(
    post,
    path = "/api/simulate",
    request_body = SimulationRequest,
    responses(
        (status = 200, description = "Simulated output", body = SimulationResult),
        (status = 400, description = "Invalid configuration, locations or weather", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn simulate_adhoc(
    State(state): State<AppState>,
    State(config): State<Arc<ServiceConfig>>,
    Json(request): Json<SimulationRequest>,
) -> Response {
    let sim_config = request.config.unwrap_or_else(|| config.simulation.clone());
    let capacity_factor = sim_config.total_system_capacity.is_none();

    match run_simulation(request.locations, request.weather, sim_config, state.library.clone()).await {
        Ok(table) => (StatusCode::OK, Json(SimulationResult::from_table(None, &table, capacity_factor))).into_response(),
        Err(response) => response,
    }
}

/// GET /api/library
/// Available module and inverter parameter sets
#[utoipa::path(
    get,
    path = "/api/library",
    responses(
        (status = 200, description = "Module and inverter names", body = LibraryResponse)
    )
)]
pub async fn get_library(State(state): State<AppState>) -> impl IntoResponse {
    Json(LibraryResponse::from(state.library.as_ref()))
}
