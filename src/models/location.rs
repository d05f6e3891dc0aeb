use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{Result, SimError};

/// Number of decimals used to decide whether two points are the same location.
pub const DEFAULT_PRECISION: i32 = 5;

// ─── Location ────────────────────────────────────────────────────────────────

/// A geographic point (WGS84 degrees), optionally with elevation above sea level in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "LocationRepr")]
pub struct Location {
    lon: f64,
    lat: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    elevation: Option<f64>,
}

impl Location {
    pub fn new(lon: f64, lat: f64) -> Result<Self> {
        if !lon.is_finite() || !lat.is_finite() {
            return Err(SimError::InvalidLocation(format!(
                "non-finite coordinates ({}, {})",
                lon, lat
            )));
        }
        if !(-180.0..=360.0).contains(&lon) {
            return Err(SimError::InvalidLocation(format!("longitude {} out of range", lon)));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(SimError::InvalidLocation(format!("latitude {} out of range", lat)));
        }
        Ok(Self { lon, lat, elevation: None })
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn elevation(&self) -> Option<f64> {
        self.elevation
    }

    /// Identity key: (lon, lat) rounded to `precision` decimals.
    pub fn key(&self, precision: i32) -> LocationKey {
        let scale = 10f64.powi(precision);
        LocationKey((self.lon * scale).round() as i64, (self.lat * scale).round() as i64)
    }
}

#[derive(Deserialize)]
struct LocationRepr {
    lon: f64,
    lat: f64,
    #[serde(default)]
    elevation: Option<f64>,
}

impl TryFrom<LocationRepr> for Location {
    type Error = SimError;

    fn try_from(raw: LocationRepr) -> Result<Self> {
        let loc = Location::new(raw.lon, raw.lat)?;
        Ok(match raw.elevation {
            Some(e) => loc.with_elevation(e),
            None => loc,
        })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lon, self.lat)
    }
}

/// Accepts `"lon,lat"`, `"(lon, lat)"` and `"lon,lat,elevation"`.
impl FromStr for Location {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_start_matches('(').trim_end_matches(')');
        let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(SimError::InvalidLocation(format!("cannot parse '{}'", s)));
        }
        let parse = |p: &str| {
            p.parse::<f64>()
                .map_err(|_| SimError::InvalidLocation(format!("cannot parse '{}'", s)))
        };
        let loc = Location::new(parse(parts[0])?, parse(parts[1])?)?;
        match parts.get(2) {
            Some(e) => Ok(loc.with_elevation(parse(e)?)),
            None => Ok(loc),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocationKey(i64, i64);

// ─── Extent ──────────────────────────────────────────────────────────────────

/// Lon/lat bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub lon_min: f64,
    pub lat_min: f64,
    pub lon_max: f64,
    pub lat_max: f64,
}

impl Extent {
    pub fn pad(&self, dlon: f64, dlat: f64) -> Self {
        Self {
            lon_min: self.lon_min - dlon,
            lat_min: self.lat_min - dlat,
            lon_max: self.lon_max + dlon,
            lat_max: self.lat_max + dlat,
        }
    }

    pub fn contains(&self, loc: &Location) -> bool {
        loc.lon() >= self.lon_min
            && loc.lon() <= self.lon_max
            && loc.lat() >= self.lat_min
            && loc.lat() <= self.lat_max
    }
}

// ─── LocationSet ─────────────────────────────────────────────────────────────

/// Ordered, deduplicated locations. This is the column order of every table
/// produced by a simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Vec<Location>", into = "Vec<Location>")]
pub struct LocationSet {
    locations: Vec<Location>,
    lookup: HashMap<LocationKey, usize>,
    precision: i32,
    /// Position in the caller's input of each kept location.
    input_columns: Vec<usize>,
    input_len: usize,
}

impl LocationSet {
    pub fn new<I: IntoIterator<Item = Location>>(locations: I) -> Self {
        Self::with_precision(locations, DEFAULT_PRECISION)
    }

    /// Keeps the first occurrence of every (lon, lat) pair at `precision` decimals.
    pub fn with_precision<I: IntoIterator<Item = Location>>(locations: I, precision: i32) -> Self {
        let mut set = Self {
            locations: Vec::new(),
            lookup: HashMap::new(),
            precision,
            input_columns: Vec::new(),
            input_len: 0,
        };
        for (position, loc) in locations.into_iter().enumerate() {
            let key = loc.key(precision);
            if !set.lookup.contains_key(&key) {
                set.lookup.insert(key, set.locations.len());
                set.locations.push(loc);
                set.input_columns.push(position);
            }
            set.input_len = position + 1;
        }
        set
    }

    pub fn from_input(input: impl Into<LocationInput>) -> Result<Self> {
        match input.into() {
            LocationInput::Set(set) => Ok(set),
            LocationInput::Single(loc) => Ok(Self::new([loc])),
            LocationInput::Many(locs) => Ok(Self::new(locs)),
            LocationInput::Coordinates(pairs) => {
                let locs = pairs
                    .into_iter()
                    .map(|(lon, lat)| Location::new(lon, lat))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::new(locs))
            }
            LocationInput::Text(items) => {
                let locs = items
                    .iter()
                    .map(|s| s.parse::<Location>())
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::new(locs))
            }
        }
    }

    pub fn count(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Number of locations the set was built from, duplicates included.
    pub fn input_len(&self) -> usize {
        self.input_len
    }

    /// For every kept location, its position in the original input.
    pub fn input_columns(&self) -> &[usize] {
        &self.input_columns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Location> {
        self.locations.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Location> {
        self.locations.get(index)
    }

    pub fn as_slice(&self) -> &[Location] {
        &self.locations
    }

    pub fn index_of(&self, loc: &Location) -> Option<usize> {
        self.lookup.get(&loc.key(self.precision)).copied()
    }

    pub fn contains(&self, loc: &Location) -> bool {
        self.index_of(loc).is_some()
    }

    pub fn extent(&self) -> Option<Extent> {
        let first = self.locations.first()?;
        let init = Extent {
            lon_min: first.lon(),
            lat_min: first.lat(),
            lon_max: first.lon(),
            lat_max: first.lat(),
        };
        Some(self.locations.iter().fold(init, |e, l| Extent {
            lon_min: e.lon_min.min(l.lon()),
            lat_min: e.lat_min.min(l.lat()),
            lon_max: e.lon_max.max(l.lon()),
            lat_max: e.lat_max.max(l.lat()),
        }))
    }
}

impl PartialEq for LocationSet {
    fn eq(&self, other: &Self) -> bool {
        self.count() == other.count()
            && self
                .iter()
                .zip(other.iter())
                .all(|(a, b)| a.key(self.precision) == b.key(self.precision))
    }
}

impl<'a> IntoIterator for &'a LocationSet {
    type Item = &'a Location;
    type IntoIter = std::slice::Iter<'a, Location>;

    fn into_iter(self) -> Self::IntoIter {
        self.locations.iter()
    }
}

impl From<Vec<Location>> for LocationSet {
    fn from(locations: Vec<Location>) -> Self {
        Self::new(locations)
    }
}

impl From<LocationSet> for Vec<Location> {
    fn from(set: LocationSet) -> Self {
        set.locations
    }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Anything a caller may hand over as "the locations to simulate".
#[derive(Debug, Clone)]
pub enum LocationInput {
    Single(Location),
    Many(Vec<Location>),
    Coordinates(Vec<(f64, f64)>),
    Text(Vec<String>),
    Set(LocationSet),
}

impl From<Location> for LocationInput {
    fn from(loc: Location) -> Self {
        LocationInput::Single(loc)
    }
}

impl From<Vec<Location>> for LocationInput {
    fn from(locs: Vec<Location>) -> Self {
        LocationInput::Many(locs)
    }
}

impl From<&[Location]> for LocationInput {
    fn from(locs: &[Location]) -> Self {
        LocationInput::Many(locs.to_vec())
    }
}

impl From<Vec<(f64, f64)>> for LocationInput {
    fn from(pairs: Vec<(f64, f64)>) -> Self {
        LocationInput::Coordinates(pairs)
    }
}

impl From<Vec<String>> for LocationInput {
    fn from(items: Vec<String>) -> Self {
        LocationInput::Text(items)
    }
}

impl From<LocationSet> for LocationInput {
    fn from(set: LocationSet) -> Self {
        LocationInput::Set(set)
    }
}

impl From<&LocationSet> for LocationInput {
    fn from(set: &LocationSet) -> Self {
        LocationInput::Set(set.clone())
    }
}

/// Reads terrain elevation (metres) for each location from a raster file.
/// Decoding the raster is left to the implementor.
pub trait TerrainSampler: Send + Sync {
    fn sample(&self, raster: &Path, locations: &LocationSet) -> Result<Vec<f64>>;
}
