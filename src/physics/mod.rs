//! Pure physical and empirical PV sub-models.
//!
//! Every function here works on scalars in degrees / SI units and has no
//! knowledge of tables or locations; the pipeline stages in `services` map
//! them over the (time × location) grid.

pub mod atmosphere;
pub mod cell_temperature;
pub mod inverter;
pub mod irradiance;
pub mod sapm;
pub mod single_diode;
pub mod tracking;

#[inline]
pub(crate) fn sind(deg: f64) -> f64 {
    deg.to_radians().sin()
}

#[inline]
pub(crate) fn cosd(deg: f64) -> f64 {
    deg.to_radians().cos()
}

#[inline]
pub(crate) fn acosd(x: f64) -> f64 {
    x.clamp(-1.0, 1.0).acos().to_degrees()
}
