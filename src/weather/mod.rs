//! Weather access: point time series out of gridded reanalysis data, or
//! plain per-location matrices supplied by the caller.

pub mod gridded;
pub mod merra;

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::error::{Result, SimError};
use crate::models::location::LocationSet;
use crate::models::table::TimeSeries2D;

/// Spatial interpolation scheme used when sampling a grid at a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    #[serde(alias = "near")]
    Nearest,
    #[default]
    Bilinear,
    Cubic,
}

impl FromStr for Interpolation {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "near" | "nearest" => Ok(Interpolation::Nearest),
            "bilinear" => Ok(Interpolation::Bilinear),
            "cubic" => Ok(Interpolation::Cubic),
            other => Err(SimError::config(format!("interpolation scheme '{}' not understood", other))),
        }
    }
}

/// Fractional position of a point on a regular grid, in units of cells
/// from the first latitude / longitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridIndex {
    pub lat: f64,
    pub lon: f64,
}

/// A gridded weather source that can be sampled at arbitrary locations.
pub trait WeatherSource: Send + Sync {
    fn time_index(&self) -> &[DateTime<Utc>];

    fn has_variable(&self, name: &str) -> bool;

    /// Fractional grid indices of each location, in set order. Fails with
    /// `OutOfBounds` for a location outside the loaded window.
    fn loc_to_index(&self, locations: &LocationSet) -> Result<Vec<GridIndex>>;

    /// Samples `variable` at every location. Supplied `indices` are reused
    /// instead of being recomputed.
    fn get(
        &self,
        variable: &str,
        locations: &Arc<LocationSet>,
        interpolation: Interpolation,
        indices: Option<&[GridIndex]>,
    ) -> Result<TimeSeries2D>;
}

/// Weather already extracted per location, as `[time][location]` rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct WeatherFrame {
    pub times: Vec<DateTime<Utc>>,
    pub ghi: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhi: Option<Vec<Vec<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dni: Option<Vec<Vec<f64>>>,
    pub windspeed: Vec<Vec<f64>>,
    pub pressure: Vec<Vec<f64>>,
    pub air_temp: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub albedo: Option<Vec<Vec<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dew_temp: Option<Vec<Vec<f64>>>,
}

pub enum WeatherInput<'a> {
    Source(&'a dyn WeatherSource),
    Frame(WeatherFrame),
}

impl From<WeatherFrame> for WeatherInput<'_> {
    fn from(frame: WeatherFrame) -> Self {
        WeatherInput::Frame(frame)
    }
}

impl<'a> From<&'a dyn WeatherSource> for WeatherInput<'a> {
    fn from(source: &'a dyn WeatherSource) -> Self {
        WeatherInput::Source(source)
    }
}

/// Per-location weather tables sharing one time index and location set.
#[derive(Debug, Clone)]
pub struct WeatherSeries {
    pub ghi: TimeSeries2D,
    pub dhi: Option<TimeSeries2D>,
    pub dni: Option<TimeSeries2D>,
    pub windspeed: TimeSeries2D,
    pub pressure: TimeSeries2D,
    pub air_temp: TimeSeries2D,
    pub albedo: Option<TimeSeries2D>,
    pub dew_temp: Option<TimeSeries2D>,
}

impl WeatherSeries {
    pub fn times(&self) -> &[DateTime<Utc>] {
        self.ghi.times()
    }
}

impl WeatherInput<'_> {
    /// Pulls every variable the pipeline uses for the given locations.
    pub fn extract(&self, locations: &Arc<LocationSet>, interpolation: Interpolation) -> Result<WeatherSeries> {
        match self {
            WeatherInput::Source(source) => extract_from_source(*source, locations, interpolation),
            WeatherInput::Frame(frame) => extract_from_frame(frame, locations),
        }
    }
}

fn extract_from_source(
    source: &dyn WeatherSource,
    locations: &Arc<LocationSet>,
    interpolation: Interpolation,
) -> Result<WeatherSeries> {
    let indices = source.loc_to_index(locations)?;
    let required = |name: &str| {
        if !source.has_variable(name) {
            return Err(SimError::MissingVariable(name.to_string()));
        }
        source.get(name, locations, interpolation, Some(&indices))
    };
    let optional = |name: &str| -> Result<Option<TimeSeries2D>> {
        if source.has_variable(name) {
            Ok(Some(source.get(name, locations, interpolation, Some(&indices))?))
        } else {
            Ok(None)
        }
    };

    let series = WeatherSeries {
        ghi: required("ghi")?,
        dhi: optional("dhi")?,
        dni: optional("dni")?,
        windspeed: required("windspeed")?,
        pressure: required("pressure")?,
        air_temp: required("air_temp")?,
        albedo: optional("albedo")?,
        dew_temp: optional("dew_temp")?,
    };
    debug!(
        timesteps = series.times().len(),
        locations = locations.count(),
        has_dni = series.dni.is_some(),
        has_dhi = series.dhi.is_some(),
        "Extracted weather from gridded source"
    );
    Ok(series)
}

/// Rejects a time index that is not strictly increasing.
pub fn check_time_index(times: &[DateTime<Utc>], what: &str) -> Result<()> {
    match times.windows(2).position(|w| w[1] <= w[0]) {
        Some(i) => Err(SimError::config(format!(
            "{} time index must be strictly increasing: {} follows {}",
            what,
            times[i + 1],
            times[i]
        ))),
        None => Ok(()),
    }
}

/// Frames may carry one column per input location, repeats included. Those
/// are reduced to the first column of each distinct location.
fn distinct_columns(rows: &[Vec<f64>], locations: &LocationSet) -> Option<Vec<Vec<f64>>> {
    let width = locations.input_len();
    if width == locations.count() || rows.is_empty() || !rows.iter().all(|r| r.len() == width) {
        return None;
    }
    Some(
        rows.iter()
            .map(|row| locations.input_columns().iter().map(|&c| row[c]).collect())
            .collect(),
    )
}

fn extract_from_frame(frame: &WeatherFrame, locations: &Arc<LocationSet>) -> Result<WeatherSeries> {
    check_time_index(&frame.times, "weather frame")?;
    let times: Arc<[DateTime<Utc>]> = frame.times.clone().into();
    let table = |rows: &[Vec<f64>], what: &str| match distinct_columns(rows, locations) {
        Some(reduced) => TimeSeries2D::from_rows(times.clone(), locations.clone(), &reduced, what),
        None => TimeSeries2D::from_rows(times.clone(), locations.clone(), rows, what),
    };
    let optional = |rows: &Option<Vec<Vec<f64>>>, what: &str| -> Result<Option<TimeSeries2D>> {
        rows.as_deref().map(|r| table(r, what)).transpose()
    };

    Ok(WeatherSeries {
        ghi: table(&frame.ghi, "ghi")?,
        dhi: optional(&frame.dhi, "dhi")?,
        dni: optional(&frame.dni, "dni")?,
        windspeed: table(&frame.windspeed, "windspeed")?,
        pressure: table(&frame.pressure, "pressure")?,
        air_temp: table(&frame.air_temp, "air_temp")?,
        albedo: optional(&frame.albedo, "albedo")?,
        dew_temp: optional(&frame.dew_temp, "dew_temp")?,
    })
}
