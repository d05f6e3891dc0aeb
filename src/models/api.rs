use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::PlantConfig;
use crate::models::location::Location;
use crate::models::parameters::{InverterParameters, ModuleParameters, ParameterLibrary};
use crate::models::simulation_config::SimulationConfig;
use crate::models::table::TimeSeries2D;
use crate::weather::WeatherFrame;

// ─── Requests ────────────────────────────────────────────────────────────────

/// Weather for a configured plant, one column per plant location in config order.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PlantSimulationRequest {
    pub weather: WeatherFrame,
}

/// Locations, weather and options for a one-off run.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SimulationRequest {
    pub locations: Vec<Location>,
    pub weather: WeatherFrame,
    /// Simulation options; the service default applies when omitted.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub config: Option<SimulationConfig>,
}

// ─── Responses ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlantSummary {
    pub id: String,
    pub name: String,
    pub locations: Vec<Location>,
    /// Whether the plant overrides the service-wide simulation options.
    pub custom_config: bool,
}

impl From<&PlantConfig> for PlantSummary {
    fn from(plant: &PlantConfig) -> Self {
        Self {
            id: plant.id.clone(),
            name: plant.name.clone(),
            locations: plant.locations.clone(),
            custom_config: plant.simulation.is_some(),
        }
    }
}

/// Simulated output for every (timestep, location) pair.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SimulationResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plant_id: Option<String>,
    pub computed_at: DateTime<Utc>,
    /// True when `values` are capacity factors, false when scaled by a total capacity.
    pub capacity_factor: bool,
    pub times: Vec<DateTime<Utc>>,
    /// Deduplicated locations, one per column of `values`.
    pub locations: Vec<Location>,
    /// `[time][location]`
    pub values: Vec<Vec<f64>>,
    /// Sum over locations for each timestep.
    pub totals: Vec<f64>,
}

impl SimulationResult {
    pub fn from_table(plant_id: Option<String>, table: &TimeSeries2D, capacity_factor: bool) -> Self {
        let values: Vec<Vec<f64>> = (0..table.n_times()).map(|t| table.row(t).to_vec()).collect();
        let totals = values.iter().map(|row| row.iter().sum()).collect();
        Self {
            plant_id,
            computed_at: Utc::now(),
            capacity_factor,
            times: table.times().to_vec(),
            locations: table.locations().as_slice().to_vec(),
            values,
            totals,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LibraryEntry {
    pub name: String,
    /// `sapm` / `cec` for modules, `sandia` / `adr` for inverters.
    pub kind: String,
    /// Nameplate DC power of a module (W); absent for inverters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rated_power: Option<f64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LibraryResponse {
    pub modules: Vec<LibraryEntry>,
    pub inverters: Vec<LibraryEntry>,
}

impl From<&ParameterLibrary> for LibraryResponse {
    fn from(library: &ParameterLibrary) -> Self {
        let modules = library
            .modules
            .iter()
            .map(|(name, module)| LibraryEntry {
                name: name.clone(),
                kind: match module {
                    ModuleParameters::Sapm(_) => "sapm",
                    ModuleParameters::Cec(_) => "cec",
                }
                .to_string(),
                rated_power: Some(module.rated_power()),
            })
            .collect();
        let inverters = library
            .inverters
            .iter()
            .map(|(name, inverter)| LibraryEntry {
                name: name.clone(),
                kind: match inverter {
                    InverterParameters::Sandia(_) => "sandia",
                    InverterParameters::Adr(_) => "adr",
                }
                .to_string(),
                rated_power: None,
            })
            .collect();
        Self { modules, inverters }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub plants: usize,
    pub cached_results: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::location::LocationSet;
    use chrono::TimeZone;
    use std::sync::Arc;

    #[test]
    fn test_result_rows_and_totals() {
        let t0 = Utc.with_ymd_and_hms(2021, 3, 1, 12, 0, 0).unwrap();
        let times: Arc<[DateTime<Utc>]> = vec![t0, t0 + chrono::Duration::hours(1)].into();
        let locs = Arc::new(LocationSet::new([Location::new(1.0, 2.0).unwrap(), Location::new(3.0, 4.0).unwrap()]));
        let table = TimeSeries2D::from_values(times, locs, vec![0.1, 0.2, 0.3, 0.4]).unwrap();

        let result = SimulationResult::from_table(Some("p1".into()), &table, true);
        assert_eq!(result.values, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
        assert!((result.totals[1] - 0.7).abs() < 1e-12, "totals {:?}", result.totals);
        assert_eq!(result.locations.len(), 2);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["plant_id"], "p1");
        assert_eq!(json["values"][0][1], 0.2);
    }

    #[test]
    fn test_library_listing_kinds() {
        let listing = LibraryResponse::from(&ParameterLibrary::builtin());
        let cec = listing.modules.iter().find(|m| m.name == "Canadian_Solar_CS5P_220M").unwrap();
        assert_eq!(cec.kind, "cec");
        assert!(cec.rated_power.unwrap() > 200.0, "rated power {:?}", cec.rated_power);
        assert!(listing.inverters.iter().any(|i| i.kind == "adr"));
        assert!(listing.inverters.iter().all(|i| i.rated_power.is_none()));
    }

    #[test]
    fn test_request_config_is_optional() {
        let body = r#"{
            "locations": [{ "lon": 10.0, "lat": 45.0 }],
            "weather": { "times": [], "ghi": [], "windspeed": [], "pressure": [], "air_temp": [] }
        }"#;
        let req: SimulationRequest = serde_json::from_str(body).unwrap();
        assert!(req.config.is_none());
        assert_eq!(req.locations.len(), 1);
    }
}
