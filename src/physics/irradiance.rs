//! Extraterrestrial irradiance, decomposition and transposition models.

use std::f64::consts::PI;

use crate::models::simulation_config::AirmassModel;
use crate::physics::atmosphere::{STANDARD_PRESSURE, relative_airmass};
use crate::physics::{acosd, cosd, sind};

/// Solar constant used by the Spencer extraterrestrial model (W/m²).
pub const SOLAR_CONSTANT: f64 = 1366.1;

// ─── Extraterrestrial ────────────────────────────────────────────────────────

/// Day angle (Spencer 1971), radians.
#[inline]
fn day_angle(day_of_year: u32) -> f64 {
    2.0 * PI * (day_of_year as f64 - 1.0) / 365.0
}

/// Extraterrestrial normal irradiance for a day of year (Spencer 1971).
pub fn extraterrestrial(day_of_year: u32) -> f64 {
    let b = day_angle(day_of_year);
    SOLAR_CONSTANT
        * (1.00011
            + 0.034221 * b.cos()
            + 0.00128 * b.sin()
            + 0.000719 * (2.0 * b).cos()
            + 0.000077 * (2.0 * b).sin())
}

// ─── Decomposition ───────────────────────────────────────────────────────────

const DISC_MIN_COS_ZENITH: f64 = 0.065;
const DISC_MAX_CLEARNESS: f64 = 2.0;
const DISC_MAX_AIRMASS: f64 = 12.0;
const DISC_MAX_ZENITH: f64 = 87.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscOutput {
    pub dni: f64,
    pub clearness_index: f64,
    pub airmass: f64,
}

/// Direct normal irradiance from GHI with the DISC model (Maxwell 1987).
///
/// `pressure` in Pa scales the airmass; `None` assumes sea level. DNI is 0
/// for zenith > 87°, negative GHI, or a negative model result.
pub fn disc(ghi: f64, zenith: f64, day_of_year: u32, pressure: Option<f64>) -> DiscOutput {
    let i0 = extraterrestrial(day_of_year);
    let i0h = i0 * cosd(zenith).max(DISC_MIN_COS_ZENITH);
    let kt = (ghi / i0h).clamp(0.0, DISC_MAX_CLEARNESS);

    let mut am = relative_airmass(zenith, AirmassModel::Kasten1966);
    if let Some(p) = pressure {
        am *= p / STANDARD_PRESSURE;
    }
    let am = am.min(DISC_MAX_AIRMASS);

    let (a, b, c) = if kt <= 0.6 {
        (
            0.512 - 1.56 * kt + 2.286 * kt.powi(2) - 2.222 * kt.powi(3),
            0.37 + 0.962 * kt,
            -0.28 + 0.932 * kt - 2.048 * kt.powi(2),
        )
    } else {
        (
            -5.743 + 21.77 * kt - 27.49 * kt.powi(2) + 11.56 * kt.powi(3),
            41.4 - 118.5 * kt + 66.05 * kt.powi(2) + 31.9 * kt.powi(3),
            -47.01 + 184.2 * kt - 222.0 * kt.powi(2) + 73.81 * kt.powi(3),
        )
    };
    let delta_kn = a + b * (c * am).exp();
    let knc = 0.866 - 0.122 * am + 0.0121 * am.powi(2) - 0.000653 * am.powi(3)
        + 1.4e-05 * am.powi(4);
    let kn = knc - delta_kn;
    let mut dni = kn * i0;

    if zenith > DISC_MAX_ZENITH || ghi < 0.0 || dni < 0.0 {
        dni = 0.0;
    }
    DiscOutput { dni, clearness_index: kt, airmass: am }
}

/// `GHI − DNI·sin(elevation)`, clamped at zero.
pub fn diffuse_horizontal(ghi: f64, dni: f64, apparent_elevation: f64) -> f64 {
    let dhi = ghi - dni * sind(apparent_elevation);
    if dhi < 0.0 { 0.0 } else { dhi }
}

// ─── Transposition ───────────────────────────────────────────────────────────

/// Dot product of the surface normal and the sun vector.
pub fn aoi_projection(surface_tilt: f64, surface_azimuth: f64, zenith: f64, azimuth: f64) -> f64 {
    let p = cosd(surface_tilt) * cosd(zenith)
        + sind(surface_tilt) * sind(zenith) * cosd(azimuth - surface_azimuth);
    p.clamp(-1.0, 1.0)
}

/// Angle of incidence (degrees) between the sun and the surface normal.
pub fn aoi(surface_tilt: f64, surface_azimuth: f64, zenith: f64, azimuth: f64) -> f64 {
    acosd(aoi_projection(surface_tilt, surface_azimuth, zenith, azimuth))
}

pub fn ground_diffuse(surface_tilt: f64, ghi: f64, albedo: f64) -> f64 {
    ghi * albedo * (1.0 - cosd(surface_tilt)) * 0.5
}

pub fn isotropic_sky(surface_tilt: f64, dhi: f64) -> f64 {
    dhi * (1.0 + cosd(surface_tilt)) * 0.5
}

/// Hay & Davies (1980) anisotropic sky diffuse.
pub fn haydavies_sky(
    surface_tilt: f64,
    surface_azimuth: f64,
    dhi: f64,
    dni: f64,
    dni_extra: f64,
    zenith: f64,
    azimuth: f64,
) -> f64 {
    let cos_tt = aoi_projection(surface_tilt, surface_azimuth, zenith, azimuth).max(0.0);
    let cos_sz = cosd(zenith).max(0.01745);
    let rb = cos_tt / cos_sz;
    let ai = dni / dni_extra;
    let sky = dhi * (ai * rb + (1.0 - ai) * (1.0 + cosd(surface_tilt)) * 0.5);
    sky.max(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoaComponents {
    pub global: f64,
    pub direct: f64,
    pub diffuse: f64,
    pub sky_diffuse: f64,
    pub ground_diffuse: f64,
}

pub fn poa_components(aoi: f64, dni: f64, sky_diffuse: f64, ground_diffuse: f64) -> PoaComponents {
    let direct = (dni * cosd(aoi)).max(0.0);
    let direct = if aoi.is_nan() || dni.is_nan() { f64::NAN } else { direct };
    let diffuse = sky_diffuse + ground_diffuse;
    PoaComponents {
        global: direct + diffuse,
        direct,
        diffuse,
        sky_diffuse,
        ground_diffuse,
    }
}
