//! End-to-end PV simulation: options and locations in, power per
//! (time, location) out.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::error::{Result, SimError};
use crate::models::location::{LocationInput, LocationSet, TerrainSampler};
use crate::models::parameters::ParameterLibrary;
use crate::models::simulation_config::SimulationConfig;
use crate::models::table::TimeSeries2D;
use crate::services::decomposition::decompose;
use crate::services::generation::PvGenerator;
use crate::services::plane_of_array::PlaneOfArrayProjector;
use crate::services::solar_geometry::SolarGeometryCache;
use crate::weather::{Interpolation, WeatherInput};

/// A simulation whose options have been validated and broadcast over its
/// locations. Nothing here depends on weather.
#[derive(Debug, Clone)]
pub struct PvSimulation {
    locations: Arc<LocationSet>,
    elevation: Vec<f64>,
    projector: PlaneOfArrayProjector,
    generator: PvGenerator,
    total_capacity: Option<Vec<f64>>,
    interpolation: Interpolation,
    frank_correction: bool,
    albedo: f64,
    delta_t: f64,
}

impl PvSimulation {
    /// Validates every option and resolves the per-location values. Fails
    /// before any weather is touched.
    pub fn prepare(
        locations: impl Into<LocationInput>,
        config: &SimulationConfig,
        library: &ParameterLibrary,
        terrain: Option<&dyn TerrainSampler>,
    ) -> Result<Self> {
        config.validate()?;
        let locations = Arc::new(LocationSet::from_input(locations)?);
        if locations.is_empty() {
            return Err(SimError::InvalidLocation("no locations given".to_string()));
        }

        let generator = PvGenerator::from_config(config, library)?;
        let elevation = config.elevation.resolve(&locations, terrain)?;
        let projector = PlaneOfArrayProjector::from_config(config, &locations, &elevation)?;
        let total_capacity = config
            .total_system_capacity
            .as_ref()
            .map(|c| c.resolve(locations.count(), "total_system_capacity"))
            .transpose()?;

        Ok(Self {
            locations,
            elevation,
            projector,
            generator,
            total_capacity,
            interpolation: config.interpolation,
            frank_correction: config.frank_correction,
            albedo: config.albedo,
            delta_t: config.delta_t,
        })
    }

    pub fn locations(&self) -> &Arc<LocationSet> {
        &self.locations
    }

    pub fn elevation(&self) -> &[f64] {
        &self.elevation
    }

    pub fn generator(&self) -> &PvGenerator {
        &self.generator
    }

    /// Runs the model chain. Output is a capacity factor, or absolute power
    /// when a total system capacity was configured; it never contains NaN.
    #[instrument(skip_all, fields(locations = self.locations.count()))]
    pub fn run(&self, weather: &WeatherInput<'_>) -> Result<TimeSeries2D> {
        let weather = weather.extract(&self.locations, self.interpolation)?;
        let times = weather.ghi.shared_times();
        info!(timesteps = times.len(), locations = self.locations.count(), "Simulating PV generation");

        let geometry = SolarGeometryCache::new(self.delta_t).positions(
            &times,
            &self.locations,
            &self.elevation,
            &weather.pressure,
            &weather.air_temp,
        )?;
        let irradiance = decompose(&weather, &geometry, self.frank_correction);
        let albedo = match &weather.albedo {
            Some(albedo) => albedo.clone(),
            None => TimeSeries2D::filled(times, self.locations.clone(), self.albedo),
        };
        let poa = self.projector.project(&geometry, &irradiance, &albedo);

        let output = self.generator.generate(
            &poa,
            &geometry,
            &weather.windspeed,
            &weather.air_temp,
            &weather.pressure,
            self.total_capacity.as_deref(),
        );
        info!(peak = output.max(), "PV simulation finished");
        Ok(output)
    }
}

/// Validates `config`, then simulates every location against `weather`.
pub fn simulate(
    locations: impl Into<LocationInput>,
    weather: &WeatherInput<'_>,
    config: &SimulationConfig,
    library: &ParameterLibrary,
    terrain: Option<&dyn TerrainSampler>,
) -> Result<TimeSeries2D> {
    PvSimulation::prepare(locations, config, library, terrain)?.run(weather)
}
