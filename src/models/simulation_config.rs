use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{LocationResolutionError, Result, SimError};
use crate::models::location::{DEFAULT_PRECISION, Location, LocationSet, TerrainSampler};
use crate::models::parameters::{InverterParameters, ModuleParameters};
use crate::physics::cell_temperature::{CellTempCoefficients, RackingPreset};
use crate::weather::Interpolation;

/// Implements case-insensitive `FromStr` for an option enum; unknown values
/// are configuration errors.
macro_rules! option_from_str {
    ($ty:ident, $what:literal, { $($text:literal => $variant:ident),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = SimError;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($ty::$variant),)+
                    other => Err(SimError::config(format!(
                        "{} parameter '{}' not understood", $what, other
                    ))),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackingMode {
    #[default]
    Fixed,
    SingleAxis,
}
option_from_str!(TrackingMode, "tracking", { "fixed" => Fixed, "single-axis" => SingleAxis });

/// DC model: empirical SAPM or the physical single-diode equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationModel {
    Sapm,
    #[default]
    SingleDiode,
}
option_from_str!(GenerationModel, "generationModel", { "sapm" => Sapm, "single-diode" => SingleDiode });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InverterModel {
    #[default]
    Sandia,
    #[serde(alias = "adr")]
    Driesse,
}
option_from_str!(InverterModel, "inverterModel", { "sandia" => Sandia, "driesse" => Driesse, "adr" => Driesse });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CellTempModel {
    #[default]
    Sandia,
    Noct,
}
option_from_str!(CellTempModel, "cellTempModel", { "sandia" => Sandia, "noct" => Noct });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AirmassModel {
    #[default]
    KastenYoung1989,
    Kasten1966,
}
option_from_str!(AirmassModel, "airMassModel", {
    "kastenyoung1989" => KastenYoung1989,
    "kasten1966" => Kasten1966,
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranspositionModel {
    #[default]
    HayDavies,
    Isotropic,
}
option_from_str!(TranspositionModel, "transpositionModel", {
    "haydavies" => HayDavies,
    "isotropic" => Isotropic,
});

/// Mounting category for the cell temperature model.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RackingModel {
    Preset(RackingPreset),
    Custom(CellTempCoefficients),
    Triple([f64; 3]),
}

impl Default for RackingModel {
    fn default() -> Self {
        RackingModel::Preset(RackingPreset::OpenRackCellGlassback)
    }
}

impl RackingModel {
    pub fn coefficients(&self) -> CellTempCoefficients {
        match *self {
            RackingModel::Preset(p) => p.coefficients(),
            RackingModel::Custom(c) => c,
            RackingModel::Triple([a, b, delta_t]) => CellTempCoefficients { a, b, delta_t },
        }
    }
}

impl FromStr for RackingModel {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(RackingModel::Preset(s.parse()?))
    }
}

// ─── Per-location options ────────────────────────────────────────────────────

pub type TiltFn = Arc<dyn Fn(&Location, f64) -> f64 + Send + Sync>;

/// Module tilt, or the tracker axis tilt when tracking.
#[derive(Clone, Deserialize)]
#[serde(try_from = "TiltSpec")]
pub enum TiltPolicy {
    Uniform(f64),
    PerLocation(Vec<f64>),
    Latitude,
    HalfLatitude,
    /// Tilt from (location, elevation).
    Function(TiltFn),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TiltSpec {
    Number(f64),
    List(Vec<f64>),
    Directive(String),
}

impl TryFrom<TiltSpec> for TiltPolicy {
    type Error = SimError;

    fn try_from(spec: TiltSpec) -> Result<Self> {
        match spec {
            TiltSpec::Number(v) => Ok(TiltPolicy::Uniform(v)),
            TiltSpec::List(v) => Ok(TiltPolicy::PerLocation(v)),
            TiltSpec::Directive(d) => d.parse(),
        }
    }
}

impl FromStr for TiltPolicy {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "latitude" => Ok(TiltPolicy::Latitude),
            "half-latitude" => Ok(TiltPolicy::HalfLatitude),
            other => other
                .parse::<f64>()
                .map(TiltPolicy::Uniform)
                .map_err(|_| SimError::config(format!("tilt directive '{}' not recognized", s))),
        }
    }
}

impl fmt::Debug for TiltPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TiltPolicy::Uniform(v) => f.debug_tuple("Uniform").field(v).finish(),
            TiltPolicy::PerLocation(v) => f.debug_tuple("PerLocation").field(v).finish(),
            TiltPolicy::Latitude => write!(f, "Latitude"),
            TiltPolicy::HalfLatitude => write!(f, "HalfLatitude"),
            TiltPolicy::Function(_) => write!(f, "Function(..)"),
        }
    }
}

impl Default for TiltPolicy {
    fn default() -> Self {
        TiltPolicy::Latitude
    }
}

/// A scalar applied to every location, or one value per location.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PerLocationValue {
    Uniform(f64),
    PerLocation(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KeyedElevation {
    pub lon: f64,
    pub lat: f64,
    pub elevation: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ElevationSpec {
    Uniform(f64),
    PerLocation(Vec<f64>),
    /// Values matched to locations by coordinates; each location must match exactly one value.
    Keyed(Vec<KeyedElevation>),
    /// Terrain raster sampled through a `TerrainSampler`.
    Raster(PathBuf),
}

impl Default for ElevationSpec {
    fn default() -> Self {
        ElevationSpec::Uniform(300.0)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ModuleSpec {
    Named(String),
    Parameters(ModuleParameters),
}

impl Default for ModuleSpec {
    fn default() -> Self {
        ModuleSpec::Named("Canadian_Solar_CS5P_220M".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InverterSpec {
    Named(String),
    Parameters(InverterParameters),
}

// ─── Broadcasting ────────────────────────────────────────────────────────────

impl PerLocationValue {
    /// One value per location, in set order.
    pub fn resolve(&self, count: usize, what: &str) -> Result<Vec<f64>> {
        match self {
            PerLocationValue::Uniform(v) => Ok(vec![*v; count]),
            PerLocationValue::PerLocation(values) if values.len() == count => Ok(values.clone()),
            PerLocationValue::PerLocation(values) => Err(SimError::shape(what, count, values.len())),
        }
    }
}

impl TiltPolicy {
    /// Tilt of every location in degrees, in [-90, 90]. Latitude-derived
    /// tilts keep the sign of the latitude: a negative tilt faces the
    /// opposite azimuth, so southern sites face the equator under the
    /// default azimuth of 180.
    pub fn resolve(&self, locations: &LocationSet, elevation: &[f64]) -> Result<Vec<f64>> {
        let tilts = match self {
            TiltPolicy::Uniform(v) => vec![*v; locations.count()],
            TiltPolicy::PerLocation(values) => {
                if values.len() != locations.count() {
                    return Err(SimError::shape("tilt", locations.count(), values.len()));
                }
                values.clone()
            }
            TiltPolicy::Latitude => locations.iter().map(|l| l.lat()).collect(),
            TiltPolicy::HalfLatitude => locations.iter().map(|l| l.lat() / 2.0).collect(),
            TiltPolicy::Function(f) => locations
                .iter()
                .zip(elevation)
                .map(|(loc, &elev)| f(loc, elev))
                .collect(),
        };
        if let Some(bad) = tilts.iter().find(|t| !(-90.0..=90.0).contains(*t)) {
            return Err(SimError::config(format!("tilt must lie in [-90, 90], got {}", bad)));
        }
        Ok(tilts)
    }
}

impl ElevationSpec {
    /// Exactly one elevation (m) per location, in set order.
    ///
    /// A single number is only a fallback: locations that carry their own
    /// elevation keep it. Keyed values must match each location exactly once.
    pub fn resolve(&self, locations: &LocationSet, terrain: Option<&dyn TerrainSampler>) -> Result<Vec<f64>> {
        let resolved = match self {
            ElevationSpec::Uniform(v) => locations.iter().map(|l| l.elevation().unwrap_or(*v)).collect(),
            ElevationSpec::PerLocation(values) => {
                if values.len() != locations.count() {
                    return Err(LocationResolutionError::ElevationCountMismatch {
                        expected: locations.count(),
                        actual: values.len(),
                    }
                    .into());
                }
                values.clone()
            }
            ElevationSpec::Keyed(entries) => {
                let mut resolved = Vec::with_capacity(locations.count());
                for loc in locations {
                    let key = loc.key(DEFAULT_PRECISION);
                    let mut matches = entries.iter().filter(|e| {
                        Location::new(e.lon, e.lat).is_ok_and(|l| l.key(DEFAULT_PRECISION) == key)
                    });
                    match (matches.next(), matches.next()) {
                        (Some(entry), None) => resolved.push(entry.elevation),
                        _ => return Err(LocationResolutionError::AmbiguousElevation(*loc).into()),
                    }
                }
                resolved
            }
            ElevationSpec::Raster(path) => {
                let sampler = terrain.ok_or_else(|| {
                    SimError::config(format!(
                        "elevation raster '{}' given but no terrain sampler is configured",
                        path.display()
                    ))
                })?;
                let values = sampler.sample(path, locations)?;
                if values.len() != locations.count() {
                    return Err(LocationResolutionError::ElevationCountMismatch {
                        expected: locations.count(),
                        actual: values.len(),
                    }
                    .into());
                }
                values
            }
        };
        if let Some((loc, _)) = locations.iter().zip(&resolved).find(|(_, e)| !e.is_finite()) {
            return Err(LocationResolutionError::AmbiguousElevation(*loc).into());
        }
        Ok(resolved)
    }
}

// ─── SimulationConfig ────────────────────────────────────────────────────────

/// Every user-facing option of a PV simulation run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    pub module: ModuleSpec,
    pub inverter: Option<InverterSpec>,
    pub tilt: TiltPolicy,
    pub azimuth: PerLocationValue,
    pub elevation: ElevationSpec,
    pub tracking: TrackingMode,
    pub racking_model: RackingModel,
    pub cell_temp_model: CellTempModel,
    pub generation_model: GenerationModel,
    pub inverter_model: InverterModel,
    pub airmass_model: AirmassModel,
    pub transposition_model: TranspositionModel,
    pub interpolation: Interpolation,
    /// Flat derate applied to the final output, in [0, 1).
    pub loss: f64,
    pub modules_per_string: u32,
    pub strings_per_inverter: u32,
    pub tracking_gcr: f64,
    pub tracking_max_angle: f64,
    pub tracking_backtrack: bool,
    pub frank_correction: bool,
    /// Absent: output is a capacity factor. Otherwise output is in the unit of this value.
    pub total_system_capacity: Option<PerLocationValue>,
    /// Albedo used when the weather carries none.
    pub albedo: f64,
    /// TT − UT for the solar position algorithm (seconds).
    pub delta_t: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            module: ModuleSpec::default(),
            inverter: None,
            tilt: TiltPolicy::default(),
            azimuth: PerLocationValue::Uniform(180.0),
            elevation: ElevationSpec::default(),
            tracking: TrackingMode::default(),
            racking_model: RackingModel::default(),
            cell_temp_model: CellTempModel::default(),
            generation_model: GenerationModel::default(),
            inverter_model: InverterModel::default(),
            airmass_model: AirmassModel::default(),
            transposition_model: TranspositionModel::default(),
            interpolation: Interpolation::Bilinear,
            loss: 0.0,
            modules_per_string: 1,
            strings_per_inverter: 1,
            tracking_gcr: 2.0 / 7.0,
            tracking_max_angle: 60.0,
            tracking_backtrack: true,
            frank_correction: false,
            total_system_capacity: None,
            albedo: 0.2,
            delta_t: 67.0,
        }
    }
}

impl SimulationConfig {
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Checks every option that does not depend on the locations or weather.
    pub fn validate(&self) -> Result<()> {
        if self.cell_temp_model == CellTempModel::Noct {
            return Err(SimError::UnsupportedModel(
                "the NOCT cell temperature model is not implemented".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.loss) {
            return Err(SimError::config(format!("loss must lie in [0, 1), got {}", self.loss)));
        }
        if self.modules_per_string == 0 || self.strings_per_inverter == 0 {
            return Err(SimError::config("modules_per_string and strings_per_inverter must be at least 1"));
        }
        if !(self.albedo.is_finite() && (0.0..=1.0).contains(&self.albedo)) {
            return Err(SimError::config(format!("albedo must lie in [0, 1], got {}", self.albedo)));
        }
        if !self.delta_t.is_finite() {
            return Err(SimError::config("delta_t must be finite"));
        }
        if self.tracking == TrackingMode::SingleAxis {
            if !(self.tracking_gcr > 0.0 && self.tracking_gcr <= 1.0) {
                return Err(SimError::config(format!(
                    "tracking_gcr must lie in (0, 1], got {}",
                    self.tracking_gcr
                )));
            }
            if !(self.tracking_max_angle > 0.0 && self.tracking_max_angle <= 90.0) {
                return Err(SimError::config(format!(
                    "tracking_max_angle must lie in (0, 90], got {}",
                    self.tracking_max_angle
                )));
            }
        }
        if let PerLocationValue::Uniform(a) = self.azimuth {
            if !a.is_finite() {
                return Err(SimError::config("azimuth must be finite"));
            }
        }
        if let TiltPolicy::Uniform(t) = self.tilt {
            if !(-90.0..=90.0).contains(&t) {
                return Err(SimError::config(format!("tilt must lie in [-90, 90], got {}", t)));
            }
        }
        Ok(())
    }
}
