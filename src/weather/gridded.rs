//! Regular lat/lon grids held in memory and sampled at arbitrary points.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{LocationResolutionError, Result, SimError};
use crate::models::location::{Extent, Location, LocationSet};
use crate::models::table::TimeSeries2D;
use crate::weather::{GridIndex, Interpolation, WeatherSource, check_time_index};

const AXIS_TOLERANCE: f64 = 1e-6;

/// Undecoded gridded data. Every variable is laid out `[time][lat][lon]`
/// on the dataset's own axes.
pub trait RawDataset: Send + Sync {
    fn times(&self) -> &[DateTime<Utc>];
    fn lats(&self) -> &[f64];
    fn lons(&self) -> &[f64];
    fn has_variable(&self, name: &str) -> bool;

    /// Reads the `[time][lat][lon]` block selected by the index ranges.
    fn read(&self, name: &str, time: Range<usize>, lat: Range<usize>, lon: Range<usize>) -> Result<Vec<f64>>;
}

/// A dataset assembled in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataset {
    times: Vec<DateTime<Utc>>,
    lats: Vec<f64>,
    lons: Vec<f64>,
    variables: BTreeMap<String, Vec<f64>>,
}

impl InMemoryDataset {
    pub fn new(times: Vec<DateTime<Utc>>, lats: Vec<f64>, lons: Vec<f64>) -> Self {
        Self { times, lats, lons, variables: BTreeMap::new() }
    }

    pub fn with_variable(mut self, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        let name = name.into();
        let expected = self.times.len() * self.lats.len() * self.lons.len();
        if values.len() != expected {
            return Err(SimError::shape(&name, expected, values.len()));
        }
        self.variables.insert(name, values);
        Ok(self)
    }

    /// Fills a variable from a function of (time index, lat, lon).
    pub fn with_field(mut self, name: impl Into<String>, f: impl Fn(usize, f64, f64) -> f64) -> Self {
        let mut values = Vec::with_capacity(self.times.len() * self.lats.len() * self.lons.len());
        for t in 0..self.times.len() {
            for &lat in &self.lats {
                for &lon in &self.lons {
                    values.push(f(t, lat, lon));
                }
            }
        }
        self.variables.insert(name.into(), values);
        self
    }
}

impl RawDataset for InMemoryDataset {
    fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    fn lats(&self) -> &[f64] {
        &self.lats
    }

    fn lons(&self) -> &[f64] {
        &self.lons
    }

    fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    fn read(&self, name: &str, time: Range<usize>, lat: Range<usize>, lon: Range<usize>) -> Result<Vec<f64>> {
        let data = self
            .variables
            .get(name)
            .ok_or_else(|| SimError::MissingVariable(name.to_string()))?;
        let (n_lat, n_lon) = (self.lats.len(), self.lons.len());
        let mut out = Vec::with_capacity(time.len() * lat.len() * lon.len());
        for t in time {
            for i in lat.clone() {
                let start = (t * n_lat + i) * n_lon;
                out.extend_from_slice(&data[start + lon.start..start + lon.end]);
            }
        }
        Ok(out)
    }
}

/// Which part of a dataset to keep in memory.
#[derive(Debug, Clone, Default)]
pub struct GridWindow {
    /// Area of interest; `None` keeps the whole grid.
    pub bounds: Option<Extent>,
    /// Grid cells of padding added around `bounds` on every side.
    pub pad_factor: f64,
    /// Inclusive time range; `None` keeps every timestep.
    pub time_bounds: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

/// A windowed, in-memory copy of selected variables of a [`RawDataset`].
pub struct GriddedSource {
    dataset: Box<dyn RawDataset>,
    times: Arc<[DateTime<Utc>]>,
    time_range: Range<usize>,
    lat_range: Range<usize>,
    lon_range: Range<usize>,
    lats: Vec<f64>,
    lons: Vec<f64>,
    dlat: f64,
    dlon: f64,
    /// Distance beyond the outermost grid points still accepted, in cells.
    edge_tolerance: (f64, f64),
    data: BTreeMap<String, Vec<f64>>,
}

impl GriddedSource {
    pub fn open(dataset: impl RawDataset + 'static, window: &GridWindow) -> Result<Self> {
        check_time_index(dataset.times(), "gridded dataset")?;
        let dlat = axis_spacing(dataset.lats(), "latitude")?;
        let dlon = axis_spacing(dataset.lons(), "longitude")?;

        let (lat_range, lon_range) = match window.bounds {
            Some(bounds) => {
                let padded = bounds.pad(window.pad_factor * dlon, window.pad_factor * dlat);
                (
                    axis_window(dataset.lats(), padded.lat_min, padded.lat_max, "latitude")?,
                    axis_window(dataset.lons(), padded.lon_min, padded.lon_max, "longitude")?,
                )
            }
            None => (0..dataset.lats().len(), 0..dataset.lons().len()),
        };

        let time_range = match window.time_bounds {
            Some((start, end)) => {
                let times = dataset.times();
                let first = times.iter().position(|t| *t >= start).unwrap_or(times.len());
                let last = times.iter().rposition(|t| *t <= end).map_or(0, |i| i + 1);
                if first >= last {
                    return Err(SimError::config(format!(
                        "no timesteps between {} and {}",
                        start, end
                    )));
                }
                first..last
            }
            None => 0..dataset.times().len(),
        };

        let times: Arc<[DateTime<Utc>]> = dataset.times()[time_range.clone()].to_vec().into();
        let lats = dataset.lats()[lat_range.clone()].to_vec();
        let lons = dataset.lons()[lon_range.clone()].to_vec();

        info!(
            timesteps = times.len(),
            lats = lats.len(),
            lons = lons.len(),
            "Opened gridded weather window"
        );

        Ok(Self {
            dataset: Box::new(dataset),
            times,
            time_range,
            lat_range,
            lon_range,
            lats,
            lons,
            dlat,
            dlon,
            edge_tolerance: (0.5, 0.5),
            data: BTreeMap::new(),
        })
    }

    /// Accepts points up to `dlon`/`dlat` degrees outside the outermost grid
    /// points.
    pub fn with_edge_tolerance(mut self, dlon: f64, dlat: f64) -> Self {
        self.edge_tolerance = (dlon / self.dlon, dlat / self.dlat);
        self
    }

    pub fn lats(&self) -> &[f64] {
        &self.lats
    }

    pub fn lons(&self) -> &[f64] {
        &self.lons
    }

    pub fn lat_spacing(&self) -> f64 {
        self.dlat
    }

    pub fn lon_spacing(&self) -> f64 {
        self.dlon
    }

    /// (timesteps, latitudes, longitudes) of the loaded window.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.times.len(), self.lats.len(), self.lons.len())
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn variable(&self, name: &str) -> Option<&[f64]> {
        self.data.get(name).map(Vec::as_slice)
    }

    /// Reads a dataset variable into memory under its own name.
    pub fn load(&mut self, variable: &str) -> Result<()> {
        self.load_as(variable, variable, None)
    }

    /// Reads a dataset variable into memory under `name`, optionally passing
    /// every value through `processor`.
    pub fn load_as(&mut self, variable: &str, name: &str, processor: Option<fn(f64) -> f64>) -> Result<()> {
        if !self.dataset.has_variable(variable) {
            return Err(SimError::MissingVariable(variable.to_string()));
        }
        let mut values = self.dataset.read(
            variable,
            self.time_range.clone(),
            self.lat_range.clone(),
            self.lon_range.clone(),
        )?;
        if let Some(f) = processor {
            values.iter_mut().for_each(|v| *v = f(*v));
        }
        debug!(variable, name, "Loaded gridded variable");
        self.insert(name, values)
    }

    /// Stores a derived variable laid out like the loaded window.
    pub fn insert(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        let (nt, nlat, nlon) = self.shape();
        let expected = nt * nlat * nlon;
        if values.len() != expected {
            return Err(SimError::shape(name, expected, values.len()));
        }
        self.data.insert(name.to_string(), values);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<f64>> {
        self.data.remove(name)
    }

    fn index_of(&self, loc: &Location) -> Result<GridIndex> {
        let (tol_lon, tol_lat) = self.edge_tolerance;
        let n_lat = self.lats.len() as f64;
        let n_lon = self.lons.len() as f64;

        let lat = (loc.lat() - self.lats[0]) / self.dlat;
        let mut lon = (loc.lon() - self.lons[0]) / self.dlon;
        // Grids and locations may disagree on the longitude convention.
        let turn = 360.0 / self.dlon;
        if lon > n_lon - 1.0 + tol_lon && lon - turn >= -tol_lon {
            lon -= turn;
        } else if lon < -tol_lon && lon + turn <= n_lon - 1.0 + tol_lon {
            lon += turn;
        }

        let inside = |x: f64, n: f64, tol: f64| x >= -tol && x <= n - 1.0 + tol;
        if !inside(lat, n_lat, tol_lat) || !inside(lon, n_lon, tol_lon) {
            return Err(LocationResolutionError::OutOfBounds {
                location: *loc,
                detail: format!(
                    "window spans lat {}..{}, lon {}..{}",
                    self.lats[0],
                    self.lats[self.lats.len() - 1],
                    self.lons[0],
                    self.lons[self.lons.len() - 1]
                ),
            }
            .into());
        }
        Ok(GridIndex { lat, lon })
    }

    fn sample(&self, values: &[f64], loc: &Location, idx: GridIndex, interpolation: Interpolation) -> Result<Vec<f64>> {
        let (_, n_lat, n_lon) = self.shape();
        let too_close = || -> SimError {
            LocationResolutionError::OutOfBounds {
                location: *loc,
                detail: format!("too close to the window edge for {:?} interpolation", interpolation),
            }
            .into()
        };
        let lat_stencil = stencil(idx.lat, n_lat, interpolation).ok_or_else(too_close)?;
        let lon_stencil = stencil(idx.lon, n_lon, interpolation).ok_or_else(too_close)?;

        let plane = n_lat * n_lon;
        let series = (0..self.times.len())
            .map(|t| {
                let base = t * plane;
                lat_stencil
                    .iter()
                    .map(|&(i, wi)| {
                        lon_stencil
                            .iter()
                            .map(|&(j, wj)| wi * wj * values[base + i * n_lon + j])
                            .sum::<f64>()
                    })
                    .sum()
            })
            .collect();
        Ok(series)
    }
}

impl WeatherSource for GriddedSource {
    fn time_index(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    fn has_variable(&self, name: &str) -> bool {
        self.data.contains_key(name)
    }

    fn loc_to_index(&self, locations: &LocationSet) -> Result<Vec<GridIndex>> {
        locations.iter().map(|loc| self.index_of(loc)).collect()
    }

    fn get(
        &self,
        variable: &str,
        locations: &Arc<LocationSet>,
        interpolation: Interpolation,
        indices: Option<&[GridIndex]>,
    ) -> Result<TimeSeries2D> {
        let values = self
            .data
            .get(variable)
            .ok_or_else(|| SimError::MissingVariable(variable.to_string()))?;

        let computed;
        let indices = match indices {
            Some(given) => {
                if given.len() != locations.count() {
                    return Err(SimError::shape("grid indices", locations.count(), given.len()));
                }
                given
            }
            None => {
                computed = self.loc_to_index(locations)?;
                &computed[..]
            }
        };

        let columns = locations
            .iter()
            .zip(indices)
            .map(|(loc, idx)| self.sample(values, loc, *idx, interpolation))
            .collect::<Result<Vec<_>>>()?;
        Ok(TimeSeries2D::from_columns(self.times.clone(), locations.clone(), &columns))
    }
}

/// Index/weight pairs along one axis for a fractional position `x` on an
/// axis of `n` points. `None` when the stencil would leave the axis.
fn stencil(x: f64, n: usize, interpolation: Interpolation) -> Option<Vec<(usize, f64)>> {
    let last = n as f64 - 1.0;
    match interpolation {
        Interpolation::Nearest => {
            let i = x.round().clamp(0.0, last);
            Some(vec![(i as usize, 1.0)])
        }
        Interpolation::Bilinear => {
            if n < 2 || x < 0.0 || x > last {
                return None;
            }
            let i0 = (x.floor() as usize).min(n - 2);
            let t = x - i0 as f64;
            Some(vec![(i0, 1.0 - t), (i0 + 1, t)])
        }
        Interpolation::Cubic => {
            // Four-point Lagrange stencil around the enclosing cell.
            if n < 4 || x < 1.0 || x > last - 1.0 {
                return None;
            }
            let i0 = (x.floor() as usize).min(n - 3);
            let t = x - i0 as f64;
            Some(vec![
                (i0 - 1, -t * (t - 1.0) * (t - 2.0) / 6.0),
                (i0, (t + 1.0) * (t - 1.0) * (t - 2.0) / 2.0),
                (i0 + 1, -(t + 1.0) * t * (t - 2.0) / 2.0),
                (i0 + 2, (t + 1.0) * t * (t - 1.0) / 6.0),
            ])
        }
    }
}

/// Spacing of a regular ascending axis.
fn axis_spacing(axis: &[f64], name: &str) -> Result<f64> {
    if axis.len() < 2 {
        return Err(SimError::config(format!("{} axis needs at least two points", name)));
    }
    let step = axis[1] - axis[0];
    if !(step > 0.0) {
        return Err(SimError::config(format!("{} axis must be ascending", name)));
    }
    let regular = axis
        .windows(2)
        .all(|w| ((w[1] - w[0]) - step).abs() <= AXIS_TOLERANCE * step.max(1.0));
    if !regular {
        return Err(SimError::config(format!("{} axis is not regularly spaced", name)));
    }
    Ok(step)
}

/// Contiguous index range of axis points within `[min, max]`.
fn axis_window(axis: &[f64], min: f64, max: f64, name: &str) -> Result<Range<usize>> {
    let first = axis.iter().position(|v| *v >= min - AXIS_TOLERANCE);
    let last = axis.iter().rposition(|v| *v <= max + AXIS_TOLERANCE);
    match (first, last) {
        (Some(a), Some(b)) if a <= b => Ok(a..b + 1),
        _ => Err(SimError::config(format!(
            "requested {} range {}..{} does not overlap the dataset",
            name, min, max
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn times() -> Vec<DateTime<Utc>> {
        (0..3)
            .map(|h| Utc.with_ymd_and_hms(2015, 6, 1, h, 0, 0).unwrap())
            .collect()
    }

    /// lat 40..50 every 0.5°, lon 0..10 every 0.625°, linear field.
    fn dataset() -> InMemoryDataset {
        let lats = (0..21).map(|i| 40.0 + 0.5 * i as f64).collect();
        let lons = (0..17).map(|i| 0.625 * i as f64).collect();
        InMemoryDataset::new(times(), lats, lons)
            .with_field("linear", |t, lat, lon| 2.0 * lat + 3.0 * lon + t as f64)
    }

    fn source() -> GriddedSource {
        let mut src = GriddedSource::open(dataset(), &GridWindow::default()).unwrap();
        src.load("linear").unwrap();
        src
    }

    fn locs(points: &[(f64, f64)]) -> Arc<LocationSet> {
        Arc::new(LocationSet::new(points.iter().map(|&(lon, lat)| Location::new(lon, lat).unwrap())))
    }

    #[test]
    fn test_interpolation_reproduces_linear_field() {
        let src = source();
        let locations = locs(&[(5.1, 45.3), (2.2, 43.05)]);
        for scheme in [Interpolation::Bilinear, Interpolation::Cubic] {
            let table = src.get("linear", &locations, scheme, None).unwrap();
            for t in 0..3 {
                let expected = 2.0 * 45.3 + 3.0 * 5.1 + t as f64;
                assert!((table.get(t, 0) - expected).abs() < 1e-9, "{:?}: {}", scheme, table.get(t, 0));
                let expected = 2.0 * 43.05 + 3.0 * 2.2 + t as f64;
                assert!((table.get(t, 1) - expected).abs() < 1e-9, "{:?}: {}", scheme, table.get(t, 1));
            }
        }
    }

    #[test]
    fn test_nearest_snaps_to_grid_point() {
        let src = source();
        let table = src.get("linear", &locs(&[(5.1, 45.3)]), Interpolation::Nearest, None).unwrap();
        // Nearest grid point is (5.0, 45.5).
        assert!((table.get(0, 0) - (91.0 + 15.0)).abs() < 1e-9, "got {}", table.get(0, 0));
    }

    #[test]
    fn test_out_of_window_is_rejected() {
        let src = source();
        let err = src.get("linear", &locs(&[(20.0, 45.0)]), Interpolation::Bilinear, None);
        assert!(matches!(
            err,
            Err(SimError::LocationResolution(LocationResolutionError::OutOfBounds { .. }))
        ));
    }

    #[test]
    fn test_cubic_needs_a_wider_stencil() {
        let src = source();
        let edge = locs(&[(5.0, 40.1)]);
        assert!(src.get("linear", &edge, Interpolation::Bilinear, None).is_ok());
        let err = src.get("linear", &edge, Interpolation::Cubic, None);
        assert!(matches!(
            err,
            Err(SimError::LocationResolution(LocationResolutionError::OutOfBounds { .. }))
        ));
    }

    #[test]
    fn test_open_rejects_unordered_times() {
        let mut shuffled = times();
        shuffled.swap(0, 2);
        let lats = vec![40.0, 40.5];
        let lons = vec![0.0, 0.625];
        let ds = InMemoryDataset::new(shuffled, lats, lons).with_field("x", |_, _, _| 1.0);
        let err = GriddedSource::open(ds, &GridWindow::default());
        assert!(matches!(err, Err(SimError::Configuration(_))), "unordered time axis must be rejected");
    }

    #[test]
    fn test_supplied_indices_are_reused() {
        let src = source();
        let locations = locs(&[(5.1, 45.3)]);
        let fake = [GridIndex { lat: 0.0, lon: 0.0 }];
        let table = src.get("linear", &locations, Interpolation::Bilinear, Some(&fake)).unwrap();
        assert!((table.get(2, 0) - (80.0 + 2.0)).abs() < 1e-9, "got {}", table.get(2, 0));
    }

    #[test]
    fn test_bounds_are_padded() {
        let window = GridWindow {
            bounds: Some(Extent { lon_min: 5.0, lat_min: 45.0, lon_max: 5.0, lat_max: 45.0 }),
            pad_factor: 2.0,
            time_bounds: None,
        };
        let mut src = GriddedSource::open(dataset(), &window).unwrap();
        src.load("linear").unwrap();
        assert_eq!(src.shape(), (3, 5, 5));
        assert_eq!(src.lats()[0], 44.0);
        assert_eq!(src.lons()[0], 3.75);

        let inside = src.get("linear", &locs(&[(4.4, 45.2)]), Interpolation::Bilinear, None).unwrap();
        assert!((inside.get(0, 0) - (90.4 + 13.2)).abs() < 1e-9);
        assert!(src.loc_to_index(&locs(&[(8.0, 45.0)])).is_err());
    }

    #[test]
    fn test_time_bounds_and_missing_variable() {
        let window = GridWindow {
            time_bounds: Some((
                Utc.with_ymd_and_hms(2015, 6, 1, 1, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2015, 6, 1, 5, 0, 0).unwrap(),
            )),
            ..GridWindow::default()
        };
        let mut src = GriddedSource::open(dataset(), &window).unwrap();
        assert_eq!(src.time_index().len(), 2);
        assert!(matches!(src.load("ghi"), Err(SimError::MissingVariable(_))));
        fn double(v: f64) -> f64 {
            2.0 * v
        }
        src.load_as("linear", "doubled", Some(double)).unwrap();
        let table = src.get("doubled", &locs(&[(0.0, 40.0)]), Interpolation::Nearest, None).unwrap();
        assert_eq!(table.get(0, 0), 2.0 * (80.0 + 1.0));
    }

    #[test]
    fn test_longitude_wraps() {
        let lats = vec![0.0, 1.0];
        let lons = (0..8).map(|i| -180.0 + 45.0 * i as f64).collect();
        let ds = InMemoryDataset::new(times(), lats, lons).with_field("x", |_, _, lon| lon);
        let mut src = GriddedSource::open(ds, &GridWindow::default()).unwrap();
        src.load("x").unwrap();
        let idx = src.loc_to_index(&locs(&[(270.0, 0.5)])).unwrap();
        assert!((idx[0].lon - 2.0).abs() < 1e-9, "lon index {}", idx[0].lon);
    }
}
