//! MERRA-2 single-level diagnostics on the native 0.5° × 0.625° grid.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{Result, SimError};
use crate::models::location::{Extent, LocationSet};
use crate::models::table::TimeSeries2D;
use crate::weather::gridded::{GridWindow, GriddedSource, RawDataset};
use crate::weather::{GridIndex, Interpolation, WeatherSource};

/// Half the MERRA-2 longitude spacing (degrees).
pub const MAX_LON_DIFFERENCE: f64 = 0.3125;
/// Half the MERRA-2 latitude spacing (degrees).
pub const MAX_LAT_DIFFERENCE: f64 = 0.25;
pub const DEFAULT_PAD_FACTOR: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureKind {
    Air,
    Dew,
    Wet,
}

impl TemperatureKind {
    fn variable(&self, height: u32) -> String {
        match self {
            TemperatureKind::Air => format!("T{}M", height),
            TemperatureKind::Dew => format!("T{}MDEW", height),
            TemperatureKind::Wet => format!("T{}MWET", height),
        }
    }

    fn table_name(&self) -> &'static str {
        match self {
            TemperatureKind::Air => "air_temp",
            TemperatureKind::Dew => "dew_temp",
            TemperatureKind::Wet => "wet_temp",
        }
    }
}

impl FromStr for TemperatureKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "air" => Ok(TemperatureKind::Air),
            "dew" => Ok(TemperatureKind::Dew),
            "wet" => Ok(TemperatureKind::Wet),
            other => Err(SimError::config(format!("sub group '{}' not understood", other))),
        }
    }
}

fn kelvin_to_celsius(k: f64) -> f64 {
    k - 273.15
}

pub struct MerraSource {
    grid: GriddedSource,
}

impl MerraSource {
    /// Opens a MERRA-2 style dataset. `window.pad_factor` counts half grid
    /// cells around `window.bounds`; see [`DEFAULT_PAD_FACTOR`].
    pub fn open(dataset: impl RawDataset + 'static, window: &GridWindow) -> Result<Self> {
        let padded = GridWindow {
            bounds: window.bounds.map(|b| {
                b.pad(window.pad_factor * MAX_LON_DIFFERENCE, window.pad_factor * MAX_LAT_DIFFERENCE)
            }),
            pad_factor: 0.0,
            time_bounds: window.time_bounds,
        };
        let grid = GriddedSource::open(dataset, &padded)?
            .with_edge_tolerance(MAX_LON_DIFFERENCE, MAX_LAT_DIFFERENCE);
        Ok(Self { grid })
    }

    pub fn grid(&self) -> &GriddedSource {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut GriddedSource {
        &mut self.grid
    }

    /// Loads `U{h}M` and `V{h}M` and derives `windspeed` and, when asked,
    /// `winddir` in degrees counter-clockwise from east.
    pub fn load_wind_speed(&mut self, height: u32, with_direction: bool) -> Result<()> {
        let u_name = format!("U{}M", height);
        let v_name = format!("V{}M", height);
        self.grid.load(&u_name)?;
        self.grid.load(&v_name)?;

        let (speed, direction): (Vec<f64>, Vec<f64>) = {
            let u = self.grid.variable(&u_name).unwrap_or_default();
            let v = self.grid.variable(&v_name).unwrap_or_default();
            u.iter()
                .zip(v)
                .map(|(u, v)| ((u * u + v * v).sqrt(), v.atan2(*u).to_degrees()))
                .unzip()
        };
        self.grid.insert("windspeed", speed)?;
        if with_direction {
            self.grid.insert("winddir", direction)?;
        }
        Ok(())
    }

    /// Surface incoming shortwave flux `SWGDN` as `ghi`.
    pub fn load_radiation(&mut self) -> Result<()> {
        self.grid.load_as("SWGDN", "ghi", None)
    }

    /// Loads a temperature variable as `air_temp`, `dew_temp` or `wet_temp`
    /// in °C.
    pub fn load_temperature(&mut self, kind: TemperatureKind, height: u32) -> Result<()> {
        self.grid
            .load_as(&kind.variable(height), kind.table_name(), Some(kelvin_to_celsius))
    }

    /// Surface pressure `PS` (Pa) as `pressure`.
    pub fn load_pressure(&mut self) -> Result<()> {
        self.grid.load_as("PS", "pressure", None)
    }

    /// Everything a PV simulation needs: 2 m wind speed, GHI, 2 m air
    /// temperature and surface pressure.
    pub fn load_set_pv(&mut self) -> Result<()> {
        self.load_wind_speed(2, false)?;
        self.grid.remove("U2M");
        self.grid.remove("V2M");
        self.load_radiation()?;
        self.load_temperature(TemperatureKind::Air, 2)?;
        self.load_pressure()?;
        info!(variables = ?self.grid.variables().collect::<Vec<_>>(), "Loaded MERRA PV set");
        Ok(())
    }

    /// 50 m wind speed for wind simulations.
    pub fn load_set_wind(&mut self) -> Result<()> {
        self.load_wind_speed(50, false)?;
        self.grid.remove("U50M");
        self.grid.remove("V50M");
        Ok(())
    }

    /// The grid cell centred on a (lat, lon) index pair.
    pub fn context_area_at_index(&self, lat_index: usize, lon_index: usize) -> Option<Extent> {
        let lat = *self.grid.lats().get(lat_index)?;
        let lon = *self.grid.lons().get(lon_index)?;
        Some(Extent {
            lon_min: lon - MAX_LON_DIFFERENCE,
            lat_min: lat - MAX_LAT_DIFFERENCE,
            lon_max: lon + MAX_LON_DIFFERENCE,
            lat_max: lat + MAX_LAT_DIFFERENCE,
        })
    }
}

impl WeatherSource for MerraSource {
    fn time_index(&self) -> &[DateTime<Utc>] {
        self.grid.time_index()
    }

    fn has_variable(&self, name: &str) -> bool {
        self.grid.has_variable(name)
    }

    fn loc_to_index(&self, locations: &LocationSet) -> Result<Vec<GridIndex>> {
        self.grid.loc_to_index(locations)
    }

    fn get(
        &self,
        variable: &str,
        locations: &Arc<LocationSet>,
        interpolation: Interpolation,
        indices: Option<&[GridIndex]>,
    ) -> Result<TimeSeries2D> {
        self.grid.get(variable, locations, interpolation, indices)
    }
}
