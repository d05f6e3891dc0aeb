//! Sandia Array Performance Model (King et al. 2004): effective irradiance
//! and the five-point DC output.

use crate::models::parameters::SapmModule;

const T0: f64 = 25.0;
const E0: f64 = 1000.0;
const BOLTZMANN: f64 = 1.38066e-23;
const ELEMENTARY_CHARGE: f64 = 1.60218e-19;

/// Empirical spectral modifier F1 as a function of absolute airmass.
/// Missing airmass (sun down) yields 0.
pub fn spectral_factor(airmass_absolute: f64, module: &SapmModule) -> f64 {
    if airmass_absolute.is_nan() {
        return 0.0;
    }
    polyval(&module.a, airmass_absolute).max(0.0)
}

/// Empirical angle-of-incidence modifier F2.
pub fn aoi_factor(aoi: f64, module: &SapmModule) -> f64 {
    polyval(&module.b, aoi).max(0.0)
}

/// Irradiance actually converted by the cells (W/m²).
pub fn effective_irradiance(
    poa_direct: f64,
    poa_diffuse: f64,
    airmass_absolute: f64,
    aoi: f64,
    module: &SapmModule,
) -> f64 {
    let f1 = spectral_factor(airmass_absolute, module);
    let f2 = aoi_factor(aoi, module);
    f1 * (poa_direct * f2 + module.fd * poa_diffuse)
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SapmOutput {
    pub i_sc: f64,
    pub i_mp: f64,
    pub v_oc: f64,
    pub v_mp: f64,
    pub p_mp: f64,
}

/// Module operating points for an effective irradiance (W/m²) and a cell
/// temperature (°C). Everything is zero where no light reaches the cells.
pub fn sapm(effective_irradiance: f64, temp_cell: f64, module: &SapmModule) -> SapmOutput {
    let ee = effective_irradiance / E0;
    if !(ee > 0.0) {
        return SapmOutput::default();
    }

    let dt = temp_cell - T0;
    let bvmpo = module.bvmpo + module.mbvmp * (1.0 - ee);
    let bvoco = module.bvoco + module.mbvoc * (1.0 - ee);
    let delta = module.n * BOLTZMANN * (temp_cell + 273.15) / ELEMENTARY_CHARGE;
    let log_ee = ee.ln();
    let ns = module.cells_in_series;

    let i_sc = module.isco * ee * (1.0 + module.aisc * dt);
    let i_mp = module.impo * (module.c0 * ee + module.c1 * ee * ee) * (1.0 + module.aimp * dt);
    let v_oc = (module.voco + ns * delta * log_ee + bvoco * dt).max(0.0);
    let v_mp = (module.vmpo
        + module.c2 * ns * delta * log_ee
        + module.c3 * ns * (delta * log_ee).powi(2)
        + bvmpo * dt)
        .max(0.0);

    SapmOutput { i_sc, i_mp, v_oc, v_mp, p_mp: i_mp * v_mp }
}

/// Evaluates `c[0] + c[1]·x + c[2]·x² + …`.
fn polyval(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}
