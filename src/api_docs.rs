use utoipa::OpenApi;

use crate::controllers::simulation_controller;
use crate::models::api;
use crate::models::location::Location;
use crate::weather::{Interpolation, WeatherFrame};

#[derive(OpenApi)]
#[openapi(
    paths(
        simulation_controller::health,
        simulation_controller::list_plants,
        simulation_controller::simulate_plant,
        simulation_controller::get_plant_simulation,
        simulation_controller::simulate_adhoc,
        simulation_controller::get_library
    ),
    components(
        schemas(
            Location,
            WeatherFrame,
            Interpolation,
            api::PlantSummary,
            api::PlantSimulationRequest,
            api::SimulationRequest,
            api::SimulationResult,
            api::LibraryEntry,
            api::LibraryResponse,
            api::HealthResponse,
            api::ErrorResponse
        )
    ),
    tags(
        (name = "pv-reanalysis-sim", description = "PV Power Simulation API")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/health",
            "/api/plants",
            "/api/plants/{id}/simulate",
            "/api/plants/{id}/simulation",
            "/api/simulate",
            "/api/library",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing path {}", path);
        }
    }
}
