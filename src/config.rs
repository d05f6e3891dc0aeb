use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::error::{Result, SimError};
use crate::models::location::Location;
use crate::models::parameters::ParameterLibrary;
use crate::models::simulation_config::SimulationConfig;

fn default_port() -> u16 {
    3000
}

/// Top-level service configuration, read from `config.json`.
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Extra module/inverter parameter sets merged over the built-in ones.
    #[serde(default)]
    pub library: Option<PathBuf>,
    /// Options used by plants that carry none of their own, and by ad-hoc
    /// requests that omit `config`.
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub plants: Vec<PlantConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlantConfig {
    pub id: String,
    pub name: String,
    pub locations: Vec<Location>,
    #[serde(default)]
    pub simulation: Option<SimulationConfig>,
}

impl PlantConfig {
    /// The plant's own options, or `fallback` when it has none.
    pub fn simulation_config<'a>(&'a self, fallback: &'a SimulationConfig) -> &'a SimulationConfig {
        self.simulation.as_ref().unwrap_or(fallback)
    }
}

impl ServiceConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: ServiceConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for plant in &self.plants {
            if !seen.insert(plant.id.as_str()) {
                return Err(SimError::config(format!("duplicate plant id '{}'", plant.id)));
            }
            if plant.locations.is_empty() {
                return Err(SimError::InvalidLocation(format!("plant '{}' has no locations", plant.id)));
            }
        }
        Ok(())
    }

    pub fn plant(&self, id: &str) -> Option<&PlantConfig> {
        self.plants.iter().find(|p| p.id == id)
    }

    /// Built-in parameter sets, overlaid with the configured library file if any.
    pub fn parameter_library(&self) -> Result<ParameterLibrary> {
        let builtin = ParameterLibrary::builtin();
        match &self.library {
            Some(path) => {
                let extra = ParameterLibrary::load(path)?;
                info!(
                    path = %path.display(),
                    modules = extra.modules.len(),
                    inverters = extra.inverters.len(),
                    "Loaded parameter library"
                );
                Ok(builtin.merge(extra))
            }
            None => Ok(builtin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::simulation_config::{GenerationModel, TrackingMode};

    const SAMPLE: &str = r#"{
        "server": { "port": 8080 },
        "simulation": { "loss": 0.1 },
        "plants": [
            {
                "id": "rhine",
                "name": "Rhine Valley",
                "locations": [{ "lon": 7.6, "lat": 47.6 }, { "lon": 7.7, "lat": 47.7, "elevation": 250.0 }]
            },
            {
                "id": "atacama",
                "name": "Atacama",
                "locations": [{ "lon": -69.9, "lat": -24.1 }],
                "simulation": { "tracking": "single-axis", "generation_model": "sapm", "module": "Canadian_Solar_CS5P_220M___2009_" }
            }
        ]
    }"#;

    #[test]
    fn test_load_sample_config() {
        let config = ServiceConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.plants.len(), 2);
        assert!((config.simulation.loss - 0.1).abs() < 1e-12);

        let rhine = config.plant("rhine").unwrap();
        assert_eq!(rhine.locations[1].elevation(), Some(250.0));
        let effective = rhine.simulation_config(&config.simulation);
        assert!((effective.loss - 0.1).abs() < 1e-12, "plant without options uses the service default");

        let atacama = config.plant("atacama").unwrap().simulation_config(&config.simulation);
        assert_eq!(atacama.tracking, TrackingMode::SingleAxis);
        assert_eq!(atacama.generation_model, GenerationModel::Sapm);
        assert_eq!(atacama.loss, 0.0, "plant options replace the default wholesale");
        assert!(config.plant("missing").is_none());
    }

    #[test]
    fn test_shipped_config_parses() {
        let config = ServiceConfig::from_json(include_str!("../config.json")).unwrap();
        assert!(!config.plants.is_empty());
        let lib = config.parameter_library().unwrap();
        for plant in &config.plants {
            let sim = plant.simulation_config(&config.simulation);
            let module = match &sim.module {
                crate::models::simulation_config::ModuleSpec::Named(name) => name.as_str(),
                _ => continue,
            };
            assert!(lib.module(module).is_ok(), "plant {} names unknown module {}", plant.id, module);
        }
    }

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = ServiceConfig::from_json("{}").unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(config.plants.is_empty());
        assert!(config.library.is_none());
        let lib = config.parameter_library().unwrap();
        assert!(lib.module("Canadian_Solar_CS5P_220M").is_ok());
    }

    #[test]
    fn test_rejects_duplicate_and_empty_plants() {
        let dup = r#"{ "plants": [
            { "id": "a", "name": "A", "locations": [{ "lon": 0.0, "lat": 0.0 }] },
            { "id": "a", "name": "B", "locations": [{ "lon": 1.0, "lat": 1.0 }] }
        ] }"#;
        assert!(matches!(ServiceConfig::from_json(dup), Err(SimError::Configuration(_))));

        let empty = r#"{ "plants": [ { "id": "a", "name": "A", "locations": [] } ] }"#;
        assert!(matches!(ServiceConfig::from_json(empty), Err(SimError::InvalidLocation(_))));

        let bad_lat = r#"{ "plants": [ { "id": "a", "name": "A", "locations": [{ "lon": 0.0, "lat": 95.0 }] } ] }"#;
        assert!(ServiceConfig::from_json(bad_lat).is_err(), "latitude out of range must fail to parse");
    }

    #[test]
    fn test_unknown_simulation_option_is_rejected() {
        let bad = r#"{ "simulation": { "tilt_angle": 30 } }"#;
        assert!(matches!(ServiceConfig::from_json(bad), Err(SimError::Json(_))));
    }

    #[test]
    fn test_missing_library_file_is_io_error() {
        let config = ServiceConfig::from_json(r#"{ "library": "/nonexistent/library.json" }"#).unwrap();
        assert!(matches!(config.parameter_library(), Err(SimError::Io(_))));
    }
}
