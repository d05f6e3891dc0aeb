use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use axum::extract::FromRef;

use crate::config::ServiceConfig;
use crate::models::api::SimulationResult;
use crate::models::parameters::ParameterLibrary;

#[derive(Clone, Debug)]
pub struct AppState {
    /// Map of plant_id to its latest simulation
    pub results: Arc<RwLock<HashMap<String, SimulationResult>>>,
    /// Module and inverter parameters, fixed at startup
    pub library: Arc<ParameterLibrary>,
}

impl AppState {
    pub fn new(library: ParameterLibrary) -> Self {
        Self {
            results: Arc::new(RwLock::new(HashMap::new())),
            library: Arc::new(library),
        }
    }

    pub fn set_result(&self, plant_id: &str, result: SimulationResult) {
        if let Ok(mut map) = self.results.write() {
            map.insert(plant_id.to_string(), result);
        }
    }

    pub fn get_result(&self, plant_id: &str) -> Option<SimulationResult> {
        self.results.read().ok().and_then(|map| map.get(plant_id).cloned())
    }

    pub fn result_count(&self) -> usize {
        self.results.read().map(|map| map.len()).unwrap_or(0)
    }
}

/// Router state. Handlers pull `State<AppState>` or `State<Arc<ServiceConfig>>`
/// out of it through `FromRef`.
#[derive(Clone, Debug)]
pub struct SharedState {
    pub app: AppState,
    pub config: Arc<ServiceConfig>,
}

impl SharedState {
    pub fn new(app: AppState, config: ServiceConfig) -> Self {
        Self { app, config: Arc::new(config) }
    }
}

impl FromRef<SharedState> for AppState {
    fn from_ref(shared: &SharedState) -> Self {
        shared.app.clone()
    }
}

impl FromRef<SharedState> for Arc<ServiceConfig> {
    fn from_ref(shared: &SharedState) -> Self {
        shared.config.clone()
    }
}
