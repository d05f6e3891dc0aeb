use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::error::{Result, SimError};
use crate::models::location::{Location, LocationSet};

/// Dense (timestamp × location) table of `f64`, row-major.
///
/// NaN marks a value that is not available or not applicable (tracker
/// geometry before dawn, diode parameters at night). Tables built within
/// one run share the same `times` and `locations` allocations, so combining
/// two of them is a shape check plus an element-wise loop.
#[derive(Debug, Clone)]
pub struct TimeSeries2D {
    times: Arc<[DateTime<Utc>]>,
    locations: Arc<LocationSet>,
    values: Vec<f64>,
}

impl TimeSeries2D {
    pub fn from_values(
        times: Arc<[DateTime<Utc>]>,
        locations: Arc<LocationSet>,
        values: Vec<f64>,
    ) -> Result<Self> {
        let expected = times.len() * locations.count();
        if values.len() != expected {
            return Err(SimError::shape("table values", expected, values.len()));
        }
        Ok(Self { times, locations, values })
    }

    pub fn filled(times: Arc<[DateTime<Utc>]>, locations: Arc<LocationSet>, value: f64) -> Self {
        let n = times.len() * locations.count();
        Self { times, locations, values: vec![value; n] }
    }

    /// Builds a table from `[time][location]` rows.
    pub fn from_rows(
        times: Arc<[DateTime<Utc>]>,
        locations: Arc<LocationSet>,
        rows: &[Vec<f64>],
        what: &str,
    ) -> Result<Self> {
        if rows.len() != times.len() {
            return Err(SimError::shape(what, format!("{} rows", times.len()), rows.len()));
        }
        let n_locs = locations.count();
        let mut values = Vec::with_capacity(times.len() * n_locs);
        for row in rows {
            if row.len() != n_locs {
                return Err(SimError::shape(what, format!("{} columns", n_locs), row.len()));
            }
            values.extend_from_slice(row);
        }
        Ok(Self { times, locations, values })
    }

    /// Every row gets the same per-location vector.
    pub fn from_column_values(
        times: Arc<[DateTime<Utc>]>,
        locations: Arc<LocationSet>,
        per_location: &[f64],
    ) -> Self {
        assert_eq!(
            per_location.len(),
            locations.count(),
            "per-location vector does not match the location set"
        );
        let values = (0..times.len())
            .flat_map(|_| per_location.iter().copied())
            .collect();
        Self { times, locations, values }
    }

    /// Every column gets the same per-timestep vector.
    pub fn from_row_values(
        times: Arc<[DateTime<Utc>]>,
        locations: Arc<LocationSet>,
        per_time: &[f64],
    ) -> Self {
        assert_eq!(per_time.len(), times.len(), "per-time vector does not match the time index");
        let n_locs = locations.count();
        let values = per_time
            .iter()
            .flat_map(|&v| std::iter::repeat_n(v, n_locs))
            .collect();
        Self { times, locations, values }
    }

    /// Assembles a table column by column, in location-set order.
    pub fn from_columns(
        times: Arc<[DateTime<Utc>]>,
        locations: Arc<LocationSet>,
        columns: &[Vec<f64>],
    ) -> Self {
        let n_locs = locations.count();
        let n_times = times.len();
        assert_eq!(columns.len(), n_locs, "column count does not match the location set");
        let mut values = vec![f64::NAN; n_times * n_locs];
        for (j, col) in columns.iter().enumerate() {
            assert_eq!(col.len(), n_times, "column length does not match the time index");
            for (t, v) in col.iter().enumerate() {
                values[t * n_locs + j] = *v;
            }
        }
        Self { times, locations, values }
    }

    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    pub fn shared_times(&self) -> Arc<[DateTime<Utc>]> {
        Arc::clone(&self.times)
    }

    pub fn locations(&self) -> &LocationSet {
        &self.locations
    }

    pub fn shared_locations(&self) -> Arc<LocationSet> {
        Arc::clone(&self.locations)
    }

    pub fn n_times(&self) -> usize {
        self.times.len()
    }

    pub fn n_locations(&self) -> usize {
        self.locations.count()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    pub fn get(&self, t: usize, loc: usize) -> f64 {
        self.values[t * self.n_locations() + loc]
    }

    pub fn value_at(&self, t: usize, loc: &Location) -> Option<f64> {
        let j = self.locations.index_of(loc)?;
        (t < self.n_times()).then(|| self.get(t, j))
    }

    pub fn row(&self, t: usize) -> &[f64] {
        let n = self.n_locations();
        &self.values[t * n..(t + 1) * n]
    }

    pub fn column(&self, loc: usize) -> Vec<f64> {
        let n = self.n_locations();
        self.values.iter().skip(loc).step_by(n.max(1)).copied().collect()
    }

    pub fn same_shape(&self, other: &TimeSeries2D) -> bool {
        self.times.len() == other.times.len()
            && (Arc::ptr_eq(&self.locations, &other.locations) || *self.locations == *other.locations)
    }

    fn assert_same_shape(&self, other: &TimeSeries2D) {
        assert!(
            self.same_shape(other),
            "table shape mismatch: {}x{} vs {}x{}",
            self.n_times(),
            self.n_locations(),
            other.n_times(),
            other.n_locations()
        );
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> TimeSeries2D {
        self.with_values(self.values.iter().map(|&v| f(v)).collect())
    }

    pub fn map_in_place(&mut self, f: impl Fn(f64) -> f64) {
        for v in self.values.iter_mut() {
            *v = f(*v);
        }
    }

    /// Element-wise combination; panics if the shapes differ.
    pub fn zip_map(&self, other: &TimeSeries2D, f: impl Fn(f64, f64) -> f64) -> TimeSeries2D {
        self.assert_same_shape(other);
        let values = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(&a, &b)| f(a, b))
            .collect();
        self.with_values(values)
    }

    pub fn zip3_map(
        &self,
        b: &TimeSeries2D,
        c: &TimeSeries2D,
        f: impl Fn(f64, f64, f64) -> f64,
    ) -> TimeSeries2D {
        self.assert_same_shape(b);
        self.assert_same_shape(c);
        let values = self
            .values
            .iter()
            .zip(b.values.iter())
            .zip(c.values.iter())
            .map(|((&x, &y), &z)| f(x, y, z))
            .collect();
        self.with_values(values)
    }

    /// `f(t, loc, value)` for every cell.
    pub fn map_indexed(&self, f: impl Fn(usize, usize, f64) -> f64) -> TimeSeries2D {
        let n = self.n_locations().max(1);
        let values = self
            .values
            .iter()
            .enumerate()
            .map(|(i, &v)| f(i / n, i % n, v))
            .collect();
        self.with_values(values)
    }

    pub fn with_values(&self, values: Vec<f64>) -> TimeSeries2D {
        assert_eq!(values.len(), self.values.len(), "value count does not match table shape");
        TimeSeries2D {
            times: Arc::clone(&self.times),
            locations: Arc::clone(&self.locations),
            values,
        }
    }

    pub fn fill_nan(&self, value: f64) -> TimeSeries2D {
        self.map(|v| if v.is_nan() { value } else { v })
    }

    pub fn has_nan(&self) -> bool {
        self.values.iter().any(|v| v.is_nan())
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().filter(|v| !v.is_nan()).fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn min(&self) -> f64 {
        self.values.iter().copied().filter(|v| !v.is_nan()).fold(f64::INFINITY, f64::min)
    }
}

/// Serialised as `{ times, locations, values: [[...], ...] }` with one row per timestep.
impl Serialize for TimeSeries2D {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let rows: Vec<&[f64]> = (0..self.n_times()).map(|t| self.row(t)).collect();
        let mut s = serializer.serialize_struct("TimeSeries2D", 3)?;
        s.serialize_field("times", &*self.times)?;
        s.serialize_field("locations", self.locations.as_slice())?;
        s.serialize_field("values", &rows)?;
        s.end()
    }
}
