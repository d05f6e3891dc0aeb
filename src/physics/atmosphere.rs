//! Airmass formulas.

use crate::models::simulation_config::AirmassModel;
use crate::physics::cosd;

/// Standard sea-level pressure (Pa).
pub const STANDARD_PRESSURE: f64 = 101325.0;

/// Relative (pressure-independent) airmass at a zenith angle in degrees.
/// NaN once the sun is below the horizon.
pub fn relative_airmass(zenith: f64, model: AirmassModel) -> f64 {
    if !(zenith <= 90.0) {
        return f64::NAN;
    }
    match model {
        // Kasten & Young (1989)
        AirmassModel::KastenYoung1989 => {
            1.0 / (cosd(zenith) + 0.50572 * (96.07995 - zenith).powf(-1.6364))
        }
        // Kasten (1966)
        AirmassModel::Kasten1966 => 1.0 / (cosd(zenith) + 0.15 * (93.885 - zenith).powf(-1.253)),
    }
}

/// Scales a relative airmass to the site pressure (Pa).
pub fn absolute_airmass(relative: f64, pressure: f64) -> f64 {
    relative * pressure / STANDARD_PRESSURE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zenith_airmass_is_one() {
        let am = relative_airmass(0.0, AirmassModel::KastenYoung1989);
        assert!((am - 1.0).abs() < 0.001, "got {}", am);
        let am = relative_airmass(0.0, AirmassModel::Kasten1966);
        assert!((am - 1.0).abs() < 0.001, "got {}", am);
    }

    #[test]
    fn test_airmass_grows_toward_horizon() {
        let am60 = relative_airmass(60.0, AirmassModel::KastenYoung1989);
        let am85 = relative_airmass(85.0, AirmassModel::KastenYoung1989);
        assert!((am60 - 2.0).abs() < 0.01, "got {}", am60);
        assert!(am85 > 10.0 && am85 < 11.5, "got {}", am85);
        assert!(relative_airmass(95.0, AirmassModel::KastenYoung1989).is_nan());
        assert!(relative_airmass(f64::NAN, AirmassModel::Kasten1966).is_nan());
    }

    #[test]
    fn test_absolute_airmass() {
        assert_eq!(absolute_airmass(2.0, STANDARD_PRESSURE), 2.0);
        assert!((absolute_airmass(2.0, 80000.0) - 1.579).abs() < 0.001);
    }
}
