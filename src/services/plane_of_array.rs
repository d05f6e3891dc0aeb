//! Module orientation and the transposition of horizontal irradiance onto it.

use tracing::{debug, instrument};

use crate::error::Result;
use crate::models::location::LocationSet;
use crate::models::simulation_config::{SimulationConfig, TrackingMode, TranspositionModel};
use crate::models::table::TimeSeries2D;
use crate::physics::irradiance::{aoi, ground_diffuse, haydavies_sky, isotropic_sky, poa_components};
use crate::physics::tracking::SingleAxisTracker;
use crate::services::decomposition::DecomposedIrradiance;
use crate::services::solar_geometry::SolarGeometry;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mounting {
    Fixed,
    SingleAxis { max_angle: f64, backtrack: bool, gcr: f64 },
}

/// Module orientation per (time, location), degrees. NaN where a tracker
/// has no defined position.
#[derive(Debug, Clone)]
pub struct SurfaceOrientation {
    pub surface_tilt: TimeSeries2D,
    pub surface_azimuth: TimeSeries2D,
    pub aoi: TimeSeries2D,
}

/// Irradiance on the module plane (W/m²) plus the geometry that produced it.
#[derive(Debug, Clone)]
pub struct PlaneOfArray {
    pub surface: SurfaceOrientation,
    pub global: TimeSeries2D,
    pub direct: TimeSeries2D,
    pub diffuse: TimeSeries2D,
}

/// `(|tilt|, azimuth)`, turning the azimuth by 180° when `tilt` is negative.
fn facing(tilt: f64, azimuth: f64) -> (f64, f64) {
    if tilt < 0.0 {
        (-tilt, (azimuth + 180.0).rem_euclid(360.0))
    } else {
        (tilt, azimuth)
    }
}

#[derive(Debug, Clone)]
pub struct PlaneOfArrayProjector {
    /// Module tilt, or tracker axis tilt.
    tilt: Vec<f64>,
    /// Module azimuth, or tracker axis azimuth.
    azimuth: Vec<f64>,
    mounting: Mounting,
    transposition: TranspositionModel,
}

impl PlaneOfArrayProjector {
    /// A negative tilt is stored as the same plane facing the opposite way.
    pub fn new(tilt: Vec<f64>, azimuth: Vec<f64>, mounting: Mounting, transposition: TranspositionModel) -> Self {
        let (tilt, azimuth): (Vec<f64>, Vec<f64>) = tilt.iter().zip(&azimuth).map(|(&t, &a)| facing(t, a)).unzip();
        Self { tilt, azimuth, mounting, transposition }
    }

    /// Broadcasts the orientation options of `config` over `locations`.
    pub fn from_config(config: &SimulationConfig, locations: &LocationSet, elevation: &[f64]) -> Result<Self> {
        let tilt = config.tilt.resolve(locations, elevation)?;
        let azimuth = config.azimuth.resolve(locations.count(), "azimuth")?;
        let mounting = match config.tracking {
            TrackingMode::Fixed => Mounting::Fixed,
            TrackingMode::SingleAxis => Mounting::SingleAxis {
                max_angle: config.tracking_max_angle,
                backtrack: config.tracking_backtrack,
                gcr: config.tracking_gcr,
            },
        };
        Ok(Self::new(tilt, azimuth, mounting, config.transposition_model))
    }

    pub fn tilt(&self) -> &[f64] {
        &self.tilt
    }

    pub fn azimuth(&self) -> &[f64] {
        &self.azimuth
    }

    /// Surface orientation and angle of incidence for every cell.
    pub fn surface(&self, geometry: &SolarGeometry) -> SurfaceOrientation {
        let zenith = &geometry.apparent_zenith;
        match self.mounting {
            Mounting::Fixed => {
                let times = zenith.shared_times();
                let locations = zenith.shared_locations();
                SurfaceOrientation {
                    surface_tilt: TimeSeries2D::from_column_values(times.clone(), locations.clone(), &self.tilt),
                    surface_azimuth: TimeSeries2D::from_column_values(times, locations, &self.azimuth),
                    aoi: zenith.map_indexed(|t, j, z| {
                        aoi(self.tilt[j], self.azimuth[j], z, geometry.azimuth.get(t, j))
                    }),
                }
            }
            Mounting::SingleAxis { max_angle, backtrack, gcr } => {
                let trackers: Vec<SingleAxisTracker> = self
                    .tilt
                    .iter()
                    .zip(&self.azimuth)
                    .map(|(&axis_tilt, &axis_azimuth)| SingleAxisTracker {
                        axis_tilt,
                        axis_azimuth,
                        max_angle,
                        backtrack,
                        gcr,
                    })
                    .collect();
                let n = zenith.values().len();
                let (mut tilt, mut azimuth, mut incidence) =
                    (Vec::with_capacity(n), Vec::with_capacity(n), Vec::with_capacity(n));
                for t in 0..zenith.n_times() {
                    for (j, tracker) in trackers.iter().enumerate() {
                        let o = tracker.orientation(zenith.get(t, j), geometry.azimuth.get(t, j));
                        tilt.push(o.surface_tilt);
                        azimuth.push(o.surface_azimuth);
                        incidence.push(o.aoi);
                    }
                }
                SurfaceOrientation {
                    surface_tilt: zenith.with_values(tilt),
                    surface_azimuth: zenith.with_values(azimuth),
                    aoi: zenith.with_values(incidence),
                }
            }
        }
    }

    /// Transposes horizontal irradiance onto the module plane. `albedo` is
    /// the ground reflectance per cell.
    #[instrument(skip_all, fields(mounting = ?self.mounting, transposition = ?self.transposition))]
    pub fn project(
        &self,
        geometry: &SolarGeometry,
        irradiance: &DecomposedIrradiance,
        albedo: &TimeSeries2D,
    ) -> PlaneOfArray {
        let surface = self.surface(geometry);
        let n = irradiance.ghi.values().len();
        let (mut global, mut direct, mut diffuse) =
            (Vec::with_capacity(n), Vec::with_capacity(n), Vec::with_capacity(n));

        for t in 0..irradiance.ghi.n_times() {
            for j in 0..irradiance.ghi.n_locations() {
                let tilt = surface.surface_tilt.get(t, j);
                let dhi = irradiance.dhi.get(t, j);
                let dni = irradiance.dni.get(t, j);
                let sky = match self.transposition {
                    TranspositionModel::HayDavies => haydavies_sky(
                        tilt,
                        surface.surface_azimuth.get(t, j),
                        dhi,
                        dni,
                        irradiance.dni_extra.get(t, j),
                        geometry.apparent_zenith.get(t, j),
                        geometry.azimuth.get(t, j),
                    ),
                    TranspositionModel::Isotropic => isotropic_sky(tilt, dhi),
                };
                let ground = ground_diffuse(tilt, irradiance.ghi.get(t, j), albedo.get(t, j));
                let poa = poa_components(surface.aoi.get(t, j), dni, sky, ground);
                global.push(poa.global);
                direct.push(poa.direct);
                diffuse.push(poa.diffuse);
            }
        }
        let global = irradiance.ghi.with_values(global);
        debug!(max_poa = global.max(), "Projected irradiance");

        PlaneOfArray {
            global,
            direct: irradiance.ghi.with_values(direct),
            diffuse: irradiance.ghi.with_values(diffuse),
            surface,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::location::Location;
    use crate::models::simulation_config::TiltPolicy;
    use crate::services::solar_geometry::SolarGeometryCache;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Arc;

    fn day(locs: &Arc<LocationSet>) -> SolarGeometry {
        let t0 = Utc.with_ymd_and_hms(2021, 6, 21, 0, 0, 0).unwrap();
        let times: Arc<[DateTime<Utc>]> =
            (0..96).map(|q| t0 + chrono::Duration::minutes(15 * q)).collect::<Vec<_>>().into();
        let pressure = TimeSeries2D::filled(times.clone(), locs.clone(), 101325.0);
        let temp = TimeSeries2D::filled(times.clone(), locs.clone(), 20.0);
        SolarGeometryCache::new(67.0)
            .positions(&times, locs, &vec![0.0; locs.count()], &pressure, &temp)
            .unwrap()
    }

    fn clear_sky(geometry: &SolarGeometry) -> DecomposedIrradiance {
        let up = geometry.apparent_elevation.map(|e| if e > 0.0 { 1.0 } else { 0.0 });
        DecomposedIrradiance {
            ghi: up.zip_map(&geometry.apparent_elevation, |u, e| u * (100.0 + 900.0 * e.to_radians().sin())),
            dni: up.map(|u| u * 900.0),
            dhi: up.map(|u| u * 100.0),
            dni_extra: up.map(|_| 1322.0),
        }
    }

    #[test]
    fn test_tracker_respects_max_angle() {
        let locs = Arc::new(LocationSet::new([
            Location::new(0.0, 0.0).unwrap(),
            Location::new(-110.0, 33.0).unwrap(),
            Location::new(15.0, -45.0).unwrap(),
        ]));
        let geometry = day(&locs);
        let config = SimulationConfig {
            tracking: TrackingMode::SingleAxis,
            tilt: TiltPolicy::Uniform(0.0),
            tracking_max_angle: 60.0,
            tracking_gcr: 2.0 / 7.0,
            ..SimulationConfig::default()
        };
        let projector = PlaneOfArrayProjector::from_config(&config, &locs, &[0.0, 0.0, 0.0]).unwrap();
        let surface = projector.surface(&geometry);
        let defined: Vec<f64> = surface.surface_tilt.values().iter().copied().filter(|v| !v.is_nan()).collect();
        assert!(!defined.is_empty());
        assert!(defined.iter().all(|t| t.abs() <= 60.0 + 1e-9), "max tilt {}", surface.surface_tilt.max());

        // Trackers have no orientation at night.
        for (e, tilt) in geometry.apparent_elevation.values().iter().zip(surface.surface_tilt.values()) {
            if *e < -1.0 {
                assert!(tilt.is_nan());
            }
        }
    }

    #[test]
    fn test_horizontal_plane_sees_ghi() {
        let locs = Arc::new(LocationSet::new([Location::new(0.0, 0.0).unwrap()]));
        let geometry = day(&locs);
        let irradiance = clear_sky(&geometry);
        let albedo = irradiance.ghi.map(|_| 0.2);
        for model in [TranspositionModel::HayDavies, TranspositionModel::Isotropic] {
            let projector = PlaneOfArrayProjector::new(vec![0.0], vec![180.0], Mounting::Fixed, model);
            let poa = projector.project(&geometry, &irradiance, &albedo);
            for t in 0..poa.global.n_times() {
                if geometry.apparent_elevation.get(t, 0) > 5.0 {
                    let diff = poa.global.get(t, 0) - irradiance.ghi.get(t, 0);
                    assert!(diff.abs() < 1e-6, "{:?} at {}: diff {}", model, t, diff);
                }
            }
            assert_eq!(poa.global.get(0, 0), 0.0, "midnight");
        }
    }

    #[test]
    fn test_fixed_geometry_is_constant() {
        let locs = Arc::new(LocationSet::new([
            Location::new(6.0, 50.0).unwrap(),
            Location::new(6.0, 40.0).unwrap(),
        ]));
        let geometry = day(&locs);
        let config = SimulationConfig { tilt: TiltPolicy::HalfLatitude, ..SimulationConfig::default() };
        let projector = PlaneOfArrayProjector::from_config(&config, &locs, &[0.0, 0.0]).unwrap();
        assert_eq!(projector.tilt(), &[25.0, 20.0]);
        assert_eq!(projector.azimuth(), &[180.0, 180.0]);
        let surface = projector.surface(&geometry);
        assert_eq!(surface.surface_tilt.column(0), vec![25.0; 96]);
        assert_eq!(surface.surface_azimuth.column(1), vec![180.0; 96]);
        // A south-facing panel at noon sees the sun closer than a flat one.
        let noon = 48;
        assert!(surface.aoi.get(noon, 0) < geometry.apparent_zenith.get(noon, 0));
    }

    #[test]
    fn test_southern_sites_face_the_equator() {
        let locs = Arc::new(LocationSet::new([Location::new(0.0, -45.0).unwrap()]));
        let geometry = day(&locs);
        let projector = PlaneOfArrayProjector::from_config(&SimulationConfig::default(), &locs, &[0.0]).unwrap();
        assert_eq!(projector.tilt(), &[45.0]);
        assert_eq!(projector.azimuth(), &[0.0], "negative latitude tilt turns the plane north");

        let irradiance = clear_sky(&geometry);
        let albedo = irradiance.ghi.map(|_| 0.2);
        let default = projector.project(&geometry, &irradiance, &albedo);
        let north = PlaneOfArrayProjector::new(vec![45.0], vec![0.0], Mounting::Fixed, TranspositionModel::HayDavies)
            .project(&geometry, &irradiance, &albedo);
        let south = PlaneOfArrayProjector::new(vec![45.0], vec![180.0], Mounting::Fixed, TranspositionModel::HayDavies)
            .project(&geometry, &irradiance, &albedo);
        assert_eq!(default.global.values(), north.global.values());
        let noon = 48;
        assert!(
            north.global.get(noon, 0) > south.global.get(noon, 0),
            "north {} vs south {}",
            north.global.get(noon, 0),
            south.global.get(noon, 0)
        );
    }

    #[test]
    fn test_tilted_plane_gains_at_high_latitude() {
        let locs = Arc::new(LocationSet::new([Location::new(0.0, 55.0).unwrap()]));
        let geometry = day(&locs);
        let irradiance = clear_sky(&geometry);
        let albedo = irradiance.ghi.map(|_| 0.2);
        let flat = PlaneOfArrayProjector::new(vec![0.0], vec![180.0], Mounting::Fixed, TranspositionModel::HayDavies)
            .project(&geometry, &irradiance, &albedo);
        let tilted = PlaneOfArrayProjector::new(vec![30.0], vec![180.0], Mounting::Fixed, TranspositionModel::HayDavies)
            .project(&geometry, &irradiance, &albedo);
        let noon = 48;
        assert!(tilted.global.get(noon, 0) > flat.global.get(noon, 0));
        assert!(tilted.diffuse.values().iter().all(|&v| v >= 0.0));
    }
}
