//! Horizontal irradiance components: optional Frank bias correction of GHI,
//! then DNI and DHI for the cells where the weather lacks them.

use chrono::{DateTime, Datelike, Utc};
use tracing::{debug, instrument};

use crate::models::table::TimeSeries2D;
use crate::physics::irradiance::{diffuse_horizontal, disc, extraterrestrial};
use crate::services::solar_geometry::SolarGeometry;
use crate::weather::WeatherSeries;

/// Cloudy-regime GHI factor by calendar month, January first.
const FRANK_CLOUDY_FACTORS: [f64; 12] = [
    0.7776553729824053,
    0.7897164461247639,
    0.8176553729824052,
    0.8406805293005672,
    0.8761808928311765,
    0.9094139886578452,
    0.9350856478115459,
    0.9191682419659737,
    0.912703795259561,
    0.8775035625999711,
    0.8283158353933402,
    0.7651417769376183,
];

/// Clear-sky GHI factor by 10° apparent elevation bin, starting at [10, 20).
const FRANK_CLEAR_FACTORS: [f64; 6] = [
    1.17612920884004,
    1.1384180020822825,
    1.1022951259566156,
    1.0856852748290704,
    1.0779254457050245,
    1.0715262914980628,
];

const FRANK_SIGMOID_CENTER: f64 = 0.5;
const FRANK_SIGMOID_SCALE: f64 = 0.03;

/// Horizontal and normal irradiance components on the simulation grid (W/m²).
#[derive(Debug, Clone)]
pub struct DecomposedIrradiance {
    pub ghi: TimeSeries2D,
    pub dni: TimeSeries2D,
    pub dhi: TimeSeries2D,
    pub dni_extra: TimeSeries2D,
}

fn clear_sky_factor(apparent_elevation: f64) -> f64 {
    if !(apparent_elevation >= 10.0) {
        return 1.0;
    }
    let bin = ((apparent_elevation - 10.0) / 10.0).floor() as usize;
    FRANK_CLEAR_FACTORS[bin.min(FRANK_CLEAR_FACTORS.len() - 1)]
}

/// Multiplier of the Frank bias correction for one cell.
pub fn frank_factor(ghi: f64, dni_extra: f64, apparent_elevation: f64, time: &DateTime<Utc>) -> f64 {
    let transmissivity = ghi / dni_extra;
    let sigmoid = 1.0 / (1.0 + (-(transmissivity - FRANK_SIGMOID_CENTER) / FRANK_SIGMOID_SCALE).exp());
    let cloudy = FRANK_CLOUDY_FACTORS[time.month0() as usize];
    clear_sky_factor(apparent_elevation) * sigmoid + cloudy * (1.0 - sigmoid)
}

/// Completes the irradiance components for every cell: optionally
/// bias-corrects GHI, then derives DNI (DISC) and DHI where the weather
/// lacks them. Supplied DNI / DHI pass through untouched.
#[instrument(skip_all, fields(frank_correction = frank_correction))]
pub fn decompose(weather: &WeatherSeries, geometry: &SolarGeometry, frank_correction: bool) -> DecomposedIrradiance {
    let times = weather.ghi.shared_times();
    let locations = weather.ghi.shared_locations();
    let day_of_year: Vec<u32> = times.iter().map(|t| t.ordinal()).collect();
    let per_time: Vec<f64> = day_of_year.iter().map(|&d| extraterrestrial(d)).collect();
    let dni_extra = TimeSeries2D::from_row_values(times.clone(), locations, &per_time);

    let ghi = if frank_correction {
        weather.ghi.map_indexed(|t, j, ghi| {
            ghi * frank_factor(ghi, dni_extra.get(t, j), geometry.apparent_elevation.get(t, j), &times[t])
        })
    } else {
        weather.ghi.clone()
    };

    let dni = match &weather.dni {
        Some(dni) => dni.clone(),
        None => {
            debug!("Deriving DNI with DISC");
            ghi.map_indexed(|t, j, g| {
                disc(g, geometry.apparent_zenith.get(t, j), day_of_year[t], Some(weather.pressure.get(t, j))).dni
            })
        }
    };

    let dhi = match &weather.dhi {
        Some(dhi) => dhi.clone(),
        None => {
            debug!("Deriving DHI from GHI and DNI");
            ghi.zip3_map(&dni, &geometry.apparent_elevation, diffuse_horizontal)
        }
    };

    DecomposedIrradiance { ghi, dni, dhi, dni_extra }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::location::{Location, LocationSet};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn grid(n_times: usize) -> (Arc<[DateTime<Utc>]>, Arc<LocationSet>) {
        let t0 = Utc.with_ymd_and_hms(2019, 6, 21, 6, 0, 0).unwrap();
        let times: Vec<_> = (0..n_times).map(|h| t0 + chrono::Duration::hours(h as i64)).collect();
        let locs = LocationSet::new([Location::new(6.0, 50.0).unwrap(), Location::new(7.0, 51.0).unwrap()]);
        (times.into(), Arc::new(locs))
    }

    fn series(times: &Arc<[DateTime<Utc>]>, locs: &Arc<LocationSet>, ghi: f64) -> WeatherSeries {
        let fill = |v| TimeSeries2D::filled(times.clone(), locs.clone(), v);
        WeatherSeries {
            ghi: fill(ghi),
            dhi: None,
            dni: None,
            windspeed: fill(1.0),
            pressure: fill(101325.0),
            air_temp: fill(20.0),
            albedo: None,
            dew_temp: None,
        }
    }

    fn geometry(times: &Arc<[DateTime<Utc>]>, locs: &Arc<LocationSet>, elevations: &[f64]) -> SolarGeometry {
        let elev = TimeSeries2D::from_row_values(times.clone(), locs.clone(), elevations);
        SolarGeometry {
            apparent_zenith: elev.map(|e| 90.0 - e),
            azimuth: TimeSeries2D::filled(times.clone(), locs.clone(), 180.0),
            apparent_elevation: elev,
        }
    }

    #[test]
    fn test_frank_factor_tables() {
        let june = Utc.with_ymd_and_hms(2019, 6, 1, 12, 0, 0).unwrap();
        let half = frank_factor(700.0, 1400.0, 65.0, &june);
        let expected = (1.0715262914980628 + 0.9094139886578452) / 2.0;
        assert!((half - expected).abs() < 1e-12, "factor {}", half);

        // Clear sky at low sun is left unscaled.
        let clear = frank_factor(1400.0, 1400.0, 5.0, &june);
        assert!((clear - 1.0).abs() < 1e-6, "factor {}", clear);

        let december = Utc.with_ymd_and_hms(2019, 12, 1, 12, 0, 0).unwrap();
        let cloudy = frank_factor(0.0, 1400.0, 15.0, &december);
        assert!((cloudy - 0.7651417769376183).abs() < 1e-6, "factor {}", cloudy);

        assert_eq!(clear_sky_factor(10.0), 1.17612920884004);
        assert_eq!(clear_sky_factor(59.99), 1.0779254457050245);
        assert_eq!(clear_sky_factor(89.0), 1.0715262914980628);
        assert_eq!(clear_sky_factor(f64::NAN), 1.0);
    }

    #[test]
    fn test_derived_dhi_is_never_negative() {
        let (times, locs) = grid(4);
        let mut weather = series(&times, &locs, 200.0);
        // Supplied DNI far larger than GHI would push GHI − DNI·sin(h) negative.
        weather.dni = Some(TimeSeries2D::filled(times.clone(), locs.clone(), 1000.0));
        let geo = geometry(&times, &locs, &[-5.0, 10.0, 45.0, 80.0]);
        let out = decompose(&weather, &geo, false);
        assert!(out.dhi.values().iter().all(|&v| v >= 0.0), "dhi {:?}", out.dhi.values());
        assert_eq!(out.dhi.get(2, 0), 0.0);
        assert_eq!(out.dhi.get(3, 1), 0.0);
    }

    #[test]
    fn test_disc_fills_missing_dni() {
        let (times, locs) = grid(3);
        let weather = series(&times, &locs, 800.0);
        let geo = geometry(&times, &locs, &[-10.0, 2.0, 60.0]);
        let out = decompose(&weather, &geo, false);
        assert_eq!(out.dni.get(0, 0), 0.0, "no beam below the horizon");
        assert_eq!(out.dni.get(1, 0), 0.0, "no beam past 87° zenith");
        assert!(out.dni.get(2, 1) > 500.0, "clear sky dni {}", out.dni.get(2, 1));
        let sum = out.dhi.get(2, 1) + out.dni.get(2, 1) * (60.0f64).to_radians().sin();
        assert!((sum - 800.0).abs() < 1e-9);
    }

    #[test]
    fn test_supplied_components_pass_through() {
        let (times, locs) = grid(2);
        let mut weather = series(&times, &locs, 500.0);
        weather.dni = Some(TimeSeries2D::filled(times.clone(), locs.clone(), 321.0));
        weather.dhi = Some(TimeSeries2D::filled(times.clone(), locs.clone(), 123.0));
        let geo = geometry(&times, &locs, &[30.0, 40.0]);
        let out = decompose(&weather, &geo, false);
        assert_eq!(out.dni.get(1, 1), 321.0);
        assert_eq!(out.dhi.get(0, 0), 123.0);
        assert!((out.dni_extra.get(0, 0) - extraterrestrial(172)).abs() < 1e-12);
    }

    #[test]
    fn test_frank_correction_precedes_decomposition() {
        let (times, locs) = grid(1);
        let weather = series(&times, &locs, 900.0);
        let geo = geometry(&times, &locs, &[50.0]);
        let plain = decompose(&weather, &geo, false);
        let corrected = decompose(&weather, &geo, true);
        let factor = frank_factor(900.0, plain.dni_extra.get(0, 0), 50.0, &times[0]);
        assert!((corrected.ghi.get(0, 0) - 900.0 * factor).abs() < 1e-9);
        assert_ne!(corrected.dni.get(0, 0), plain.dni.get(0, 0));
        assert_eq!(plain.ghi.get(0, 0), 900.0);
    }
}
