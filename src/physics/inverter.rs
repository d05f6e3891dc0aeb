//! DC to AC conversion: Sandia (King 2007) and Driesse ADR (2016) models.

use crate::models::parameters::{AdrInverter, SandiaInverter};

/// AC output (W) of a Sandia inverter for a DC voltage (V) and power (W).
/// Below the self-consumption threshold the night tare is returned as a
/// negative power.
pub fn sandia(v_dc: f64, p_dc: f64, inv: &SandiaInverter) -> f64 {
    if p_dc < inv.pso {
        return -inv.pnt.abs();
    }
    let dv = v_dc - inv.vdco;
    let a = inv.pdco * (1.0 + inv.c1 * dv);
    let b = inv.pso * (1.0 + inv.c2 * dv);
    let c = inv.c0 * (1.0 + inv.c3 * dv);

    let ac = (inv.paco / (a - b) - c * (a - b)) * (p_dc - b) + c * (p_dc - b).powi(2);
    ac.min(inv.paco)
}

const ADR_VOLTAGE_TOLERANCE: f64 = 0.1;

/// AC output (W) of an ADR inverter. NaN outside the DC voltage window.
pub fn adr(v_dc: f64, p_dc: f64, inv: &AdrInverter) -> f64 {
    let p_nt = -inv.pnt.abs();
    if v_dc == 0.0 {
        return p_nt;
    }

    let v_upper = inv.v_max.max(inv.v_dc_max).max(inv.mppt_hi) * (1.0 + ADR_VOLTAGE_TOLERANCE);
    let v_lower = inv.v_min.max(inv.mppt_low) * (1.0 - ADR_VOLTAGE_TOLERANCE);
    if v_dc > v_upper || v_dc < v_lower {
        return f64::NAN;
    }

    let pdc = p_dc / inv.p_nom;
    let vdc = v_dc / inv.v_nom;
    let dv = vdc - 1.0;
    let dinv = 1.0 / vdc - 1.0;
    let terms = [
        1.0,
        pdc,
        pdc * pdc,
        dv,
        pdc * dv,
        pdc * pdc * dv,
        dinv,
        pdc * dinv,
        pdc * pdc * dinv,
    ];
    let loss: f64 = inv.coefficients.iter().zip(terms).map(|(c, t)| c * t).sum();

    (inv.p_nom * (pdc - loss)).clamp(p_nt, inv.pac_max)
}
