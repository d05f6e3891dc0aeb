//! Plane-of-array irradiance to power: cell temperature, DC model, optional
//! inverter, derate and normalisation.

use tracing::{debug, instrument};

use crate::error::{Result, SimError};
use crate::models::parameters::{
    AdrInverter, CecModule, InverterParameters, ModuleParameters, ParameterLibrary, SandiaInverter, SapmModule,
};
use crate::models::simulation_config::{
    AirmassModel, GenerationModel, InverterModel, InverterSpec, ModuleSpec, SimulationConfig,
};
use crate::models::table::TimeSeries2D;
use crate::physics::atmosphere::{absolute_airmass, relative_airmass};
use crate::physics::cell_temperature::{CellTempCoefficients, sapm_cell_temperature};
use crate::physics::single_diode::calcparams_desoto;
use crate::physics::{inverter, sapm};
use crate::services::plane_of_array::PlaneOfArray;
use crate::services::solar_geometry::SolarGeometry;

/// DC model with the module parameters it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum DcGeneration {
    /// Sandia Array Performance Model.
    Empirical { module: SapmModule, airmass_model: AirmassModel },
    /// De Soto single-diode model.
    Physical { module: CecModule },
}

impl DcGeneration {
    pub fn rated_power(&self) -> f64 {
        match self {
            DcGeneration::Empirical { module, .. } => module.rated_power(),
            DcGeneration::Physical { module } => module.rated_power(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InverterStage {
    Sandia(SandiaInverter),
    Driesse(AdrInverter),
}

impl InverterStage {
    fn ac_power(&self, v_dc: f64, p_dc: f64) -> f64 {
        match self {
            InverterStage::Sandia(inv) => inverter::sandia(v_dc, p_dc, inv),
            InverterStage::Driesse(inv) => inverter::adr(v_dc, p_dc, inv),
        }
    }
}

/// Maximum power operating point of one module (V, W).
#[derive(Debug, Clone)]
pub struct DcOutput {
    pub voltage: TimeSeries2D,
    pub power: TimeSeries2D,
}

/// The configured module, inverter and mounting of a PV system.
#[derive(Debug, Clone)]
pub struct PvGenerator {
    dc: DcGeneration,
    inverter: Option<InverterStage>,
    racking: CellTempCoefficients,
    modules_per_string: f64,
    strings_per_inverter: f64,
    loss: f64,
}

impl PvGenerator {
    pub fn new(dc: DcGeneration, racking: CellTempCoefficients) -> Self {
        Self {
            dc,
            inverter: None,
            racking,
            modules_per_string: 1.0,
            strings_per_inverter: 1.0,
            loss: 0.0,
        }
    }

    pub fn with_inverter(mut self, inverter: Option<InverterStage>) -> Self {
        self.inverter = inverter;
        self
    }

    pub fn with_strings(mut self, modules_per_string: u32, strings_per_inverter: u32) -> Self {
        self.modules_per_string = modules_per_string as f64;
        self.strings_per_inverter = strings_per_inverter as f64;
        self
    }

    pub fn with_loss(mut self, loss: f64) -> Self {
        self.loss = loss;
        self
    }

    /// Looks the module and inverter up in `library` and checks that they
    /// match the requested models.
    pub fn from_config(config: &SimulationConfig, library: &ParameterLibrary) -> Result<Self> {
        let module = match &config.module {
            ModuleSpec::Named(name) => library.module(name)?.clone(),
            ModuleSpec::Parameters(params) => params.clone(),
        };
        let dc = match (config.generation_model, module) {
            (GenerationModel::Sapm, ModuleParameters::Sapm(module)) => DcGeneration::Empirical {
                module,
                airmass_model: config.airmass_model,
            },
            (GenerationModel::SingleDiode, ModuleParameters::Cec(module)) => DcGeneration::Physical { module },
            (model, _) => {
                return Err(SimError::config(format!(
                    "module parameters do not fit the {:?} generation model",
                    model
                )));
            }
        };

        let inverter = match &config.inverter {
            None => None,
            Some(spec) => {
                let params = match spec {
                    InverterSpec::Named(name) => library.inverter(name)?.clone(),
                    InverterSpec::Parameters(params) => params.clone(),
                };
                Some(match (config.inverter_model, params) {
                    (InverterModel::Sandia, InverterParameters::Sandia(inv)) => InverterStage::Sandia(inv),
                    (InverterModel::Driesse, InverterParameters::Adr(inv)) => InverterStage::Driesse(inv),
                    (model, _) => {
                        return Err(SimError::config(format!(
                            "inverter parameters do not fit the {:?} inverter model",
                            model
                        )));
                    }
                })
            }
        };

        Ok(Self::new(dc, config.racking_model.coefficients())
            .with_inverter(inverter)
            .with_strings(config.modules_per_string, config.strings_per_inverter)
            .with_loss(config.loss))
    }

    pub fn dc_model(&self) -> &DcGeneration {
        &self.dc
    }

    pub fn inverter(&self) -> Option<&InverterStage> {
        self.inverter.as_ref()
    }

    /// Rated power of a single module at standard test conditions (W).
    pub fn module_capacity(&self) -> f64 {
        self.dc.rated_power()
    }

    /// Sandia cell temperature (°C).
    pub fn cell_temperature(&self, poa: &PlaneOfArray, wind_speed: &TimeSeries2D, air_temp: &TimeSeries2D) -> TimeSeries2D {
        poa.global
            .zip3_map(wind_speed, air_temp, |e, ws, ta| sapm_cell_temperature(e, ws, ta, self.racking))
    }

    /// Module operating point. Cells without light produce zero.
    pub fn dc(
        &self,
        poa: &PlaneOfArray,
        geometry: &SolarGeometry,
        pressure: &TimeSeries2D,
        temp_cell: &TimeSeries2D,
    ) -> DcOutput {
        let n = poa.global.values().len();
        let (mut voltage, mut power) = (Vec::with_capacity(n), Vec::with_capacity(n));
        match &self.dc {
            DcGeneration::Empirical { module, airmass_model } => {
                for i in 0..n {
                    let am = absolute_airmass(
                        relative_airmass(geometry.apparent_zenith.values()[i], *airmass_model),
                        pressure.values()[i],
                    );
                    let ee = sapm::effective_irradiance(
                        poa.direct.values()[i],
                        poa.diffuse.values()[i],
                        am,
                        poa.surface.aoi.values()[i],
                        module,
                    );
                    let out = sapm::sapm(ee, temp_cell.values()[i], module);
                    voltage.push(out.v_mp);
                    power.push(out.p_mp);
                }
            }
            DcGeneration::Physical { module } => {
                for i in 0..n {
                    let irradiance = poa.global.values()[i];
                    if irradiance > 0.0 {
                        let out = calcparams_desoto(irradiance, temp_cell.values()[i], module).max_power_point();
                        voltage.push(out.v_mp);
                        power.push(out.p_mp);
                    } else {
                        voltage.push(0.0);
                        power.push(0.0);
                    }
                }
            }
        }
        DcOutput {
            voltage: poa.global.with_values(voltage),
            power: poa.global.with_values(power),
        }
    }

    /// AC power of one module's share of the inverter (W), or the DC power
    /// when no inverter is configured.
    pub fn ac(&self, dc: &DcOutput) -> TimeSeries2D {
        let Some(inverter) = &self.inverter else {
            return dc.power.clone();
        };
        let modules = self.modules_per_string * self.strings_per_inverter;
        dc.voltage.zip_map(&dc.power, |v, p| {
            inverter.ac_power(v * self.modules_per_string, p * modules) / modules
        })
    }

    /// Applies the derate and converts module power to capacity factor, or
    /// to absolute output when a per-location capacity is given. Undefined
    /// and negative values become zero.
    pub fn finalize(&self, power: &TimeSeries2D, total_capacity: Option<&[f64]>) -> TimeSeries2D {
        let scale = (1.0 - self.loss) / self.module_capacity();
        power.map_indexed(|_, j, p| {
            let mut out = p * scale;
            if let Some(capacity) = total_capacity {
                out *= capacity[j];
            }
            if out.is_nan() || out < 0.0 { 0.0 } else { out }
        })
    }

    /// Cell temperature, DC, AC and finalisation in sequence.
    #[instrument(skip_all, fields(inverter = self.inverter.is_some()))]
    pub fn generate(
        &self,
        poa: &PlaneOfArray,
        geometry: &SolarGeometry,
        wind_speed: &TimeSeries2D,
        air_temp: &TimeSeries2D,
        pressure: &TimeSeries2D,
        total_capacity: Option<&[f64]>,
    ) -> TimeSeries2D {
        let temp_cell = self.cell_temperature(poa, wind_speed, air_temp);
        let dc = self.dc(poa, geometry, pressure, &temp_cell);
        let ac = self.ac(&dc);
        debug!(max_dc = dc.power.max(), max_ac = ac.max(), "Converted irradiance to power");
        self.finalize(&ac, total_capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::location::{Location, LocationSet};
    use crate::models::simulation_config::RackingModel;
    use crate::services::plane_of_array::SurfaceOrientation;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Arc;

    fn axes(n_times: usize) -> (Arc<[DateTime<Utc>]>, Arc<LocationSet>) {
        let t0 = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap();
        let times: Vec<_> = (0..n_times).map(|h| t0 + chrono::Duration::hours(h as i64)).collect();
        (times.into(), Arc::new(LocationSet::new([Location::new(0.0, 0.0).unwrap()])))
    }

    /// Flat plane under the given (direct, diffuse) pairs with the sun at
    /// `zenith` degrees.
    fn plane(cells: &[(f64, f64)], zenith: f64) -> (PlaneOfArray, SolarGeometry) {
        let (times, locs) = axes(cells.len());
        let rows = |f: &dyn Fn(&(f64, f64)) -> f64| {
            TimeSeries2D::from_row_values(times.clone(), locs.clone(), &cells.iter().map(f).collect::<Vec<_>>())
        };
        let filled = |v| TimeSeries2D::filled(times.clone(), locs.clone(), v);
        let poa = PlaneOfArray {
            surface: SurfaceOrientation { surface_tilt: filled(0.0), surface_azimuth: filled(180.0), aoi: filled(zenith) },
            global: rows(&|c| c.0 + c.1),
            direct: rows(&|c| c.0),
            diffuse: rows(&|c| c.1),
        };
        let geometry = SolarGeometry {
            apparent_zenith: filled(zenith),
            azimuth: filled(180.0),
            apparent_elevation: filled(90.0 - zenith),
        };
        (poa, geometry)
    }

    fn generator(model: GenerationModel, inverter: Option<&str>) -> PvGenerator {
        let config = SimulationConfig {
            module: ModuleSpec::Named(match model {
                GenerationModel::Sapm => "Canadian_Solar_CS5P_220M___2009_".to_string(),
                GenerationModel::SingleDiode => "Canadian_Solar_CS5P_220M".to_string(),
            }),
            generation_model: model,
            inverter: inverter.map(|n| InverterSpec::Named(n.to_string())),
            ..SimulationConfig::default()
        };
        PvGenerator::from_config(&config, &ParameterLibrary::builtin()).unwrap()
    }

    #[test]
    fn test_single_diode_at_reference_conditions() {
        let pv = generator(GenerationModel::SingleDiode, None);
        let (poa, geometry) = plane(&[(1000.0, 0.0), (0.0, 0.0)], 0.0);
        let temp = poa.global.map(|_| 25.0);
        let dc = pv.dc(&poa, &geometry, &poa.global.map(|_| 101325.0), &temp);
        assert!((dc.power.get(0, 0) - 219.96).abs() < 0.1, "p_mp {}", dc.power.get(0, 0));
        assert_eq!(dc.power.get(1, 0), 0.0);
        let cf = pv.finalize(&pv.ac(&dc), None);
        assert!((cf.get(0, 0) - 1.0).abs() < 0.001, "cf {}", cf.get(0, 0));
    }

    #[test]
    fn test_sapm_at_reference_conditions() {
        let pv = generator(GenerationModel::Sapm, None);
        // Zenith 48.2° gives an absolute airmass near 1.5 at sea level.
        let (poa, geometry) = plane(&[(900.0, 100.0), (0.0, 0.0)], 48.2);
        let temp = poa.global.map(|_| 25.0);
        let dc = pv.dc(&poa, &geometry, &poa.global.map(|_| 101325.0), &temp);
        let rated = pv.module_capacity();
        assert!((dc.power.get(0, 0) / rated - 1.0).abs() < 0.05, "p {}", dc.power.get(0, 0));
        assert_eq!(dc.power.get(1, 0), 0.0);
    }

    #[test]
    fn test_night_tare_is_clamped() {
        let pv = generator(GenerationModel::SingleDiode, Some("ABB__MICRO_0_25_I_OUTD_US_208__208V_"));
        let (poa, geometry) = plane(&[(0.0, 0.0), (800.0, 100.0)], 30.0);
        let out = pv.generate(
            &poa,
            &geometry,
            &poa.global.map(|_| 1.0),
            &poa.global.map(|_| 25.0),
            &poa.global.map(|_| 101325.0),
            None,
        );
        assert_eq!(out.get(0, 0), 0.0);
        assert!(out.get(1, 0) > 0.5 && out.get(1, 0) < 1.0, "cf {}", out.get(1, 0));
    }

    #[test]
    fn test_inverter_scales_back_to_one_module() {
        let config = SimulationConfig {
            inverter: Some(InverterSpec::Named("Ablerex_Electronics_ES_2200_US_240".to_string())),
            inverter_model: InverterModel::Driesse,
            modules_per_string: 8,
            strings_per_inverter: 1,
            ..SimulationConfig::default()
        };
        let string = PvGenerator::from_config(&config, &ParameterLibrary::builtin()).unwrap();
        assert!(matches!(string.inverter(), Some(InverterStage::Driesse(_))));

        let (poa, geometry) = plane(&[(800.0, 100.0)], 30.0);
        let temp = poa.global.map(|_| 40.0);
        let dc = string.dc(&poa, &geometry, &poa.global.map(|_| 101325.0), &temp);
        let ac = string.ac(&dc);
        let ratio = ac.get(0, 0) / dc.power.get(0, 0);
        assert!(ratio > 0.9 && ratio < 1.0, "efficiency {}", ratio);
    }

    #[test]
    fn test_mismatched_parameters_are_rejected() {
        let lib = ParameterLibrary::builtin();
        let config = SimulationConfig { generation_model: GenerationModel::Sapm, ..SimulationConfig::default() };
        assert!(matches!(PvGenerator::from_config(&config, &lib), Err(SimError::Configuration(_))));
        let config = SimulationConfig {
            inverter: Some(InverterSpec::Named("Ablerex_Electronics_ES_2200_US_240".to_string())),
            inverter_model: InverterModel::Sandia,
            ..SimulationConfig::default()
        };
        assert!(matches!(PvGenerator::from_config(&config, &lib), Err(SimError::Configuration(_))));
        let config = SimulationConfig {
            inverter: Some(InverterSpec::Named("nope".to_string())),
            ..SimulationConfig::default()
        };
        assert!(PvGenerator::from_config(&config, &lib).is_err());
    }

    #[test]
    fn test_finalize_scales_and_cleans() {
        let pv = generator(GenerationModel::SingleDiode, None).with_loss(0.1);
        let (times, _) = axes(1);
        let locs = Arc::new(LocationSet::new([
            Location::new(0.0, 0.0).unwrap(),
            Location::new(1.0, 0.0).unwrap(),
            Location::new(2.0, 0.0).unwrap(),
        ]));
        let rated = pv.module_capacity();
        let power = TimeSeries2D::from_values(times, locs, vec![rated, f64::NAN, -5.0]).unwrap();
        let cf = pv.finalize(&power, None);
        assert!((cf.get(0, 0) - 0.9).abs() < 1e-12);
        assert_eq!(&cf.row(0)[1..], &[0.0, 0.0]);
        let absolute = pv.finalize(&power, Some(&[5000.0, 1.0, 1.0]));
        assert!((absolute.get(0, 0) - 4500.0).abs() < 1e-9);
    }

    #[test]
    fn test_racking_changes_temperature() {
        let (poa, _) = plane(&[(800.0, 100.0)], 30.0);
        let wind = poa.global.map(|_| 2.0);
        let air = poa.global.map(|_| 20.0);
        let open = generator(GenerationModel::SingleDiode, None);
        let mut roof = open.clone();
        roof.racking = RackingModel::Preset("insulated_back_polymerback".parse().unwrap()).coefficients();
        let t_open = open.cell_temperature(&poa, &wind, &air).get(0, 0);
        let t_roof = roof.cell_temperature(&poa, &wind, &air).get(0, 0);
        assert!(t_roof > t_open, "{} vs {}", t_roof, t_open);
    }
}
