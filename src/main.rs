use std::net::SocketAddr;

use axum::{Router, response::Html, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use utoipa::OpenApi;
use utoipa_scalar::Scalar;

use pv_reanalysis_sim::api_docs::ApiDoc;
use pv_reanalysis_sim::config::ServiceConfig;
use pv_reanalysis_sim::logging;
use pv_reanalysis_sim::routes::simulation_routes::api_routes;
use pv_reanalysis_sim::shared_state::{AppState, SharedState};

#[tokio::main]
async fn main() {
    logging::init();

    // 1. Load configuration
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config = match ServiceConfig::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(path = %config_path, error = %e, "Failed to load configuration");
            return;
        }
    };
    info!(plants = config.plants.len(), "Configuration loaded");

    // 2. Parameter library
    let library = match config.parameter_library() {
        Ok(lib) => lib,
        Err(e) => {
            error!(error = %e, "Failed to load parameter library");
            return;
        }
    };
    info!(
        modules = library.modules.len(),
        inverters = library.inverters.len(),
        "Parameter library ready"
    );

    // 3. Shared state
    let server_port = config.server.port;
    let shared = SharedState::new(AppState::new(library), config);

    // 4. Start Axum HTTP server
    let app = Router::new()
        .nest("/api", api_routes(shared))
        .route("/scalar", get(|| async {
            Html(Scalar::new(ApiDoc::openapi()).to_html())
        }))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], server_port));
    info!("API Server listening on http://{}", addr);
    info!("Scalar UI: http://{}/scalar", addr);

    if let Err(e) = axum_server::bind(addr).serve(app.into_make_service()).await {
        error!(error = %e, "HTTP server stopped");
    }
}
