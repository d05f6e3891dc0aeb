//! De Soto (2006) five-parameter single-diode model and its maximum power
//! point.

use crate::models::parameters::CecModule;

/// Boltzmann constant in eV/K.
const BOLTZMANN_EV: f64 = 8.617332478e-5;
const T_REF: f64 = 298.15;
const IRRAD_REF: f64 = 1000.0;

const MAX_ITERATIONS: usize = 100;
const CURRENT_TOL: f64 = 1e-12;
const VOLTAGE_TOL: f64 = 1e-9;

/// Parameters of the single-diode equation at one operating condition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiodeParameters {
    pub photocurrent: f64,
    pub saturation_current: f64,
    pub resistance_series: f64,
    pub resistance_shunt: f64,
    /// Product of diode factor, cells in series and thermal voltage (V).
    pub n_ns_vth: f64,
}

/// Translates reference CEC parameters to the given effective irradiance
/// (W/m²) and cell temperature (°C).
pub fn calcparams_desoto(effective_irradiance: f64, temp_cell: f64, module: &CecModule) -> DiodeParameters {
    let tcell = temp_cell + 273.15;
    let eg_ref = module.eg_ref();
    let eg = eg_ref * (1.0 + module.d_eg_dt() * (tcell - T_REF));

    let n_ns_vth = module.a_ref * tcell / T_REF;
    let photocurrent = effective_irradiance / IRRAD_REF * (module.i_l_ref + module.alpha_sc * (tcell - T_REF));
    let saturation_current = module.i_o_ref
        * (tcell / T_REF).powi(3)
        * (eg_ref / (BOLTZMANN_EV * T_REF) - eg / (BOLTZMANN_EV * tcell)).exp();
    let resistance_shunt = module.r_sh_ref * IRRAD_REF / effective_irradiance;

    DiodeParameters {
        photocurrent,
        saturation_current,
        resistance_series: module.r_s,
        resistance_shunt,
        n_ns_vth,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DiodeOutput {
    pub i_sc: f64,
    pub v_oc: f64,
    pub i_mp: f64,
    pub v_mp: f64,
    pub p_mp: f64,
}

impl DiodeParameters {
    /// Terminal current at voltage `v`, solving the implicit diode equation
    /// with Newton's method. The residual is concave and decreasing in the
    /// current, so iterating from the photocurrent approaches the root
    /// monotonically from above.
    pub fn current(&self, v: f64) -> f64 {
        let DiodeParameters {
            photocurrent: il,
            saturation_current: i0,
            resistance_series: rs,
            resistance_shunt: rsh,
            n_ns_vth: a,
        } = *self;

        let mut i = il;
        for _ in 0..MAX_ITERATIONS {
            let vd = v + i * rs;
            let e = (vd / a).exp();
            let f = il - i0 * (e - 1.0) - vd / rsh - i;
            let df = -i0 * rs / a * e - rs / rsh - 1.0;
            let step = f / df;
            i -= step;
            if step.abs() < CURRENT_TOL {
                break;
            }
        }
        i
    }

    /// Open-circuit voltage. Starts from the shunt-free closed form, which
    /// bounds the root from above.
    pub fn open_circuit_voltage(&self) -> f64 {
        let il = self.photocurrent;
        let i0 = self.saturation_current;
        let rsh = self.resistance_shunt;
        let a = self.n_ns_vth;

        let mut v = a * (il / i0 + 1.0).ln();
        for _ in 0..MAX_ITERATIONS {
            let e = (v / a).exp();
            let g = il - i0 * (e - 1.0) - v / rsh;
            let dg = -i0 / a * e - 1.0 / rsh;
            let step = g / dg;
            v -= step;
            if step.abs() < CURRENT_TOL {
                break;
            }
        }
        v.max(0.0)
    }

    /// Maximum power point by golden-section search of P(V) on [0, Voc].
    pub fn max_power_point(&self) -> DiodeOutput {
        if !(self.photocurrent > 0.0) {
            return DiodeOutput::default();
        }
        let v_oc = self.open_circuit_voltage();
        let power = |v: f64| v * self.current(v);

        let ratio = (5.0_f64.sqrt() - 1.0) / 2.0;
        let (mut lo, mut hi) = (0.0, v_oc);
        for _ in 0..MAX_ITERATIONS {
            if hi - lo < VOLTAGE_TOL {
                break;
            }
            let c = hi - ratio * (hi - lo);
            let d = lo + ratio * (hi - lo);
            if power(c) > power(d) {
                hi = d;
            } else {
                lo = c;
            }
        }

        let v_mp = 0.5 * (lo + hi);
        let i_mp = self.current(v_mp);
        DiodeOutput {
            i_sc: self.current(0.0),
            v_oc,
            i_mp,
            v_mp,
            p_mp: v_mp * i_mp,
        }
    }
}
