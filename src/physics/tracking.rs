//! Single-axis tracker geometry with optional backtracking.

use crate::physics::{acosd, cosd, sind};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SingleAxisTracker {
    /// Tilt of the rotation axis from horizontal (degrees).
    pub axis_tilt: f64,
    /// Compass direction of the axis (degrees, north = 0).
    pub axis_azimuth: f64,
    /// Rotation limit either side of horizontal (degrees).
    pub max_angle: f64,
    pub backtrack: bool,
    /// Ground coverage ratio: module width over row pitch.
    pub gcr: f64,
}

/// Orientation of the module surface at one instant. All fields are NaN
/// while the sun is below the horizon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerOrientation {
    pub tracker_theta: f64,
    pub surface_tilt: f64,
    pub surface_azimuth: f64,
    pub aoi: f64,
}

impl TrackerOrientation {
    fn undefined() -> Self {
        Self {
            tracker_theta: f64::NAN,
            surface_tilt: f64::NAN,
            surface_azimuth: f64::NAN,
            aoi: f64::NAN,
        }
    }
}

impl SingleAxisTracker {
    /// Tracker rotation for a sun position given as apparent zenith and azimuth.
    pub fn orientation(&self, apparent_zenith: f64, azimuth: f64) -> TrackerOrientation {
        if !(apparent_zenith <= 90.0) || azimuth.is_nan() {
            return TrackerOrientation::undefined();
        }

        // Sun vector in the tracker frame: x across the axis, z normal to it.
        let az_diff = azimuth - self.axis_azimuth;
        let sin_z = sind(apparent_zenith);
        let x = sin_z * sind(az_diff);
        let z = sin_z * cosd(az_diff) * sind(self.axis_tilt) + cosd(apparent_zenith) * cosd(self.axis_tilt);

        // Ideal rotation puts the panel normal in the plane of the sun vector.
        let mut theta = x.atan2(z).to_degrees();

        if self.backtrack {
            // Row shading starts once the cosine of the rotation drops below gcr.
            let axes_distance = 1.0 / self.gcr;
            let temp = (axes_distance * cosd(theta)).abs();
            if temp < 1.0 {
                let correction = -theta.signum() * acosd(temp);
                theta += correction;
            }
        }

        let theta = theta.clamp(-self.max_angle, self.max_angle);

        let surface_tilt = acosd(cosd(theta) * cosd(self.axis_tilt));
        let normal_x = sind(theta);
        let normal_y = cosd(theta) * sind(self.axis_tilt);
        let surface_azimuth = if normal_x == 0.0 && normal_y == 0.0 {
            self.axis_azimuth
        } else {
            (self.axis_azimuth + normal_x.atan2(normal_y).to_degrees()).rem_euclid(360.0)
        };

        // Panel normal in the tracker frame is (sin θ, 0, cos θ).
        let aoi = acosd(sind(theta) * x + cosd(theta) * z);

        TrackerOrientation {
            tracker_theta: theta,
            surface_tilt,
            surface_azimuth,
            aoi,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(backtrack: bool) -> SingleAxisTracker {
        SingleAxisTracker {
            axis_tilt: 0.0,
            axis_azimuth: 180.0,
            max_angle: 60.0,
            backtrack,
            gcr: 2.0 / 7.0,
        }
    }

    #[test]
    fn test_noon_is_flat() {
        let o = tracker(true).orientation(20.0, 180.0);
        assert!(o.tracker_theta.abs() < 1e-9);
        assert!(o.surface_tilt.abs() < 1e-9);
        assert!((o.aoi - 20.0).abs() < 1e-6, "aoi {}", o.aoi);
    }

    #[test]
    fn test_morning_sun_faces_east() {
        let o = tracker(false).orientation(40.0, 90.0);
        assert!((o.tracker_theta + 40.0).abs() < 1e-6, "theta {}", o.tracker_theta);
        assert!((o.surface_tilt - 40.0).abs() < 1e-6);
        assert!((o.surface_azimuth - 90.0).abs() < 1e-6, "azimuth {}", o.surface_azimuth);
        assert!(o.aoi.abs() < 1e-5);
    }

    #[test]
    fn test_rotation_is_limited() {
        let t = tracker(false);
        for zenith in [0.0, 30.0, 60.0, 75.0, 85.0, 89.9] {
            for azimuth in [45.0, 90.0, 135.0, 225.0, 270.0, 315.0] {
                let o = t.orientation(zenith, azimuth);
                assert!(o.tracker_theta.abs() <= 60.0 + 1e-9);
                assert!(o.surface_tilt <= 60.0 + 1e-9, "tilt {}", o.surface_tilt);
            }
        }
    }

    #[test]
    fn test_backtracking_flattens_at_low_sun() {
        let plain = tracker(false).orientation(85.0, 90.0);
        let back = tracker(true).orientation(85.0, 90.0);
        assert!(back.surface_tilt < plain.surface_tilt);
        assert!(back.surface_tilt < 30.0, "tilt {}", back.surface_tilt);
    }

    #[test]
    fn test_night_is_undefined() {
        let o = tracker(true).orientation(100.0, 300.0);
        assert!(o.surface_tilt.is_nan() && o.surface_azimuth.is_nan() && o.aoi.is_nan());
    }
}
