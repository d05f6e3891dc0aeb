//! Solar position per (time, location), computed once per 0.1° / 100 m cell.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use solar_positioning::{RefractionCorrection, spa};
use tracing::{debug, instrument};

use crate::error::{LocationResolutionError, Result, SimError};
use crate::models::location::{Location, LocationSet};
use crate::models::table::TimeSeries2D;

/// Grid cell used to share solar positions between nearby locations:
/// longitude and latitude in tenths of a degree, elevation in hundreds of
/// metres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuantizedKey {
    lon_tenths: i64,
    lat_tenths: i64,
    elevation_hundreds: i64,
}

impl QuantizedKey {
    pub fn new(loc: &Location, elevation: f64) -> Self {
        Self {
            lon_tenths: (loc.lon() * 10.0).round() as i64,
            lat_tenths: (loc.lat() * 10.0).round() as i64,
            elevation_hundreds: (elevation / 100.0).round() as i64,
        }
    }

    pub fn lon(&self) -> f64 {
        self.lon_tenths as f64 / 10.0
    }

    pub fn lat(&self) -> f64 {
        self.lat_tenths as f64 / 10.0
    }

    pub fn elevation(&self) -> f64 {
        self.elevation_hundreds as f64 * 100.0
    }
}

/// Sun position for one quantized cell over the whole time index.
#[derive(Debug, Clone, PartialEq)]
pub struct SolarPositionSeries {
    pub apparent_zenith: Vec<f64>,
    pub azimuth: Vec<f64>,
    pub apparent_elevation: Vec<f64>,
}

/// Sun position tables aligned with the simulation grid (degrees).
#[derive(Debug, Clone)]
pub struct SolarGeometry {
    pub apparent_zenith: TimeSeries2D,
    pub azimuth: TimeSeries2D,
    pub apparent_elevation: TimeSeries2D,
}

/// Per-call cache of solar positions keyed by [`QuantizedKey`].
#[derive(Debug)]
pub struct SolarGeometryCache {
    delta_t: f64,
    entries: HashMap<QuantizedKey, Arc<SolarPositionSeries>>,
}

impl SolarGeometryCache {
    pub fn new(delta_t: f64) -> Self {
        Self { delta_t, entries: HashMap::new() }
    }

    /// Number of distinct cells computed so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Solar position for every location. Locations sharing a quantized key
    /// get the series computed for the first of them, refraction-corrected
    /// with that location's pressure (Pa) and air temperature (°C).
    #[instrument(skip_all, fields(locations = locations.count(), timesteps = times.len()))]
    pub fn positions(
        &mut self,
        times: &Arc<[DateTime<Utc>]>,
        locations: &Arc<LocationSet>,
        elevation: &[f64],
        pressure: &TimeSeries2D,
        air_temp: &TimeSeries2D,
    ) -> Result<SolarGeometry> {
        if elevation.len() != locations.count() {
            return Err(LocationResolutionError::ElevationCountMismatch {
                expected: locations.count(),
                actual: elevation.len(),
            }
            .into());
        }

        let mut series = Vec::with_capacity(locations.count());
        for (j, (loc, &elev)) in locations.iter().zip(elevation).enumerate() {
            if !elev.is_finite() {
                return Err(LocationResolutionError::AmbiguousElevation(*loc).into());
            }
            let key = QuantizedKey::new(loc, elev);
            let entry = match self.entries.get(&key) {
                Some(found) => found.clone(),
                None => {
                    let computed = Arc::new(solar_position_series(
                        times,
                        key,
                        self.delta_t,
                        &pressure.column(j),
                        &air_temp.column(j),
                    )?);
                    self.entries.insert(key, computed.clone());
                    computed
                }
            };
            series.push(entry);
        }
        debug!(unique = self.entries.len(), "Solar positions resolved");

        let column = |pick: fn(&SolarPositionSeries) -> &Vec<f64>| -> Vec<Vec<f64>> {
            series.iter().map(|s| pick(s).clone()).collect()
        };
        Ok(SolarGeometry {
            apparent_zenith: TimeSeries2D::from_columns(
                times.clone(),
                locations.clone(),
                &column(|s| &s.apparent_zenith),
            ),
            azimuth: TimeSeries2D::from_columns(times.clone(), locations.clone(), &column(|s| &s.azimuth)),
            apparent_elevation: TimeSeries2D::from_columns(
                times.clone(),
                locations.clone(),
                &column(|s| &s.apparent_elevation),
            ),
        })
    }
}

/// Runs the NREL SPA at the centre of a quantized cell for every timestep.
pub fn solar_position_series(
    times: &[DateTime<Utc>],
    key: QuantizedKey,
    delta_t: f64,
    pressure: &[f64],
    air_temp: &[f64],
) -> Result<SolarPositionSeries> {
    let n = times.len();
    let mut out = SolarPositionSeries {
        apparent_zenith: Vec::with_capacity(n),
        azimuth: Vec::with_capacity(n),
        apparent_elevation: Vec::with_capacity(n),
    };
    for (t, time) in times.iter().enumerate() {
        let refraction = refraction(pressure[t], air_temp[t]);
        let pos = spa::solar_position(*time, key.lat(), key.lon(), key.elevation(), delta_t, Some(refraction))
            .map_err(|e| SimError::NumericalDomain(format!("solar position at {}: {:?}", time, e)))?;
        out.apparent_zenith.push(pos.zenith_angle());
        out.azimuth.push(pos.azimuth());
        out.apparent_elevation.push(pos.elevation_angle());
    }
    Ok(out)
}

/// Refraction for the local atmosphere; standard conditions when the
/// weather values are missing or out of range.
fn refraction(pressure_pa: f64, air_temp_c: f64) -> RefractionCorrection {
    if pressure_pa.is_finite() && air_temp_c.is_finite() {
        if let Ok(r) = RefractionCorrection::new(pressure_pa / 100.0, air_temp_c) {
            return r;
        }
    }
    RefractionCorrection::standard()
}
