use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Band-gap reference used by the De Soto model when a module omits it (eV).
pub const DEFAULT_EG_REF: f64 = 1.121;
/// Band-gap temperature dependence used when a module omits it (1/K).
pub const DEFAULT_D_EG_DT: f64 = -0.0002677;

// ─── Modules ─────────────────────────────────────────────────────────────────

/// Sandia Array Performance Model coefficients of a single module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SapmModule {
    #[serde(rename = "Cells_in_Series")]
    pub cells_in_series: f64,
    #[serde(rename = "Isco")]
    pub isco: f64,
    #[serde(rename = "Voco")]
    pub voco: f64,
    #[serde(rename = "Impo")]
    pub impo: f64,
    #[serde(rename = "Vmpo")]
    pub vmpo: f64,
    #[serde(rename = "Aisc")]
    pub aisc: f64,
    #[serde(rename = "Aimp")]
    pub aimp: f64,
    #[serde(rename = "C0")]
    pub c0: f64,
    #[serde(rename = "C1")]
    pub c1: f64,
    #[serde(rename = "Bvoco")]
    pub bvoco: f64,
    #[serde(rename = "Mbvoc", default)]
    pub mbvoc: f64,
    #[serde(rename = "Bvmpo")]
    pub bvmpo: f64,
    #[serde(rename = "Mbvmp", default)]
    pub mbvmp: f64,
    #[serde(rename = "N")]
    pub n: f64,
    #[serde(rename = "C2")]
    pub c2: f64,
    #[serde(rename = "C3")]
    pub c3: f64,
    /// Airmass polynomial, A0..A4.
    #[serde(rename = "A")]
    pub a: [f64; 5],
    /// Angle-of-incidence polynomial, B0..B5.
    #[serde(rename = "B")]
    pub b: [f64; 6],
    #[serde(rename = "FD", default = "default_fd")]
    pub fd: f64,
}

fn default_fd() -> f64 {
    1.0
}

impl SapmModule {
    /// Rated power at standard test conditions (W).
    pub fn rated_power(&self) -> f64 {
        self.impo * self.vmpo
    }
}

/// CEC six-parameter single-diode coefficients of a single module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CecModule {
    #[serde(rename = "I_mp_ref")]
    pub i_mp_ref: f64,
    #[serde(rename = "V_mp_ref")]
    pub v_mp_ref: f64,
    #[serde(rename = "alpha_sc")]
    pub alpha_sc: f64,
    #[serde(rename = "a_ref")]
    pub a_ref: f64,
    #[serde(rename = "I_L_ref")]
    pub i_l_ref: f64,
    #[serde(rename = "I_o_ref")]
    pub i_o_ref: f64,
    #[serde(rename = "R_s")]
    pub r_s: f64,
    #[serde(rename = "R_sh_ref")]
    pub r_sh_ref: f64,
    #[serde(rename = "EgRef", default, skip_serializing_if = "Option::is_none")]
    pub eg_ref: Option<f64>,
    #[serde(rename = "dEgdT", default, skip_serializing_if = "Option::is_none")]
    pub d_eg_dt: Option<f64>,
}

impl CecModule {
    pub fn rated_power(&self) -> f64 {
        self.i_mp_ref * self.v_mp_ref
    }

    pub fn eg_ref(&self) -> f64 {
        self.eg_ref.unwrap_or(DEFAULT_EG_REF)
    }

    pub fn d_eg_dt(&self) -> f64 {
        self.d_eg_dt.unwrap_or(DEFAULT_D_EG_DT)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModuleParameters {
    Sapm(SapmModule),
    Cec(CecModule),
}

impl ModuleParameters {
    pub fn rated_power(&self) -> f64 {
        match self {
            ModuleParameters::Sapm(m) => m.rated_power(),
            ModuleParameters::Cec(m) => m.rated_power(),
        }
    }
}

// ─── Inverters ───────────────────────────────────────────────────────────────

/// Sandia grid-connected inverter model coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandiaInverter {
    #[serde(rename = "Paco")]
    pub paco: f64,
    #[serde(rename = "Pdco")]
    pub pdco: f64,
    #[serde(rename = "Vdco")]
    pub vdco: f64,
    #[serde(rename = "Pso")]
    pub pso: f64,
    #[serde(rename = "C0")]
    pub c0: f64,
    #[serde(rename = "C1")]
    pub c1: f64,
    #[serde(rename = "C2")]
    pub c2: f64,
    #[serde(rename = "C3")]
    pub c3: f64,
    #[serde(rename = "Pnt")]
    pub pnt: f64,
}

/// Driesse (ADR) inverter efficiency model coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdrInverter {
    #[serde(rename = "Pnom")]
    pub p_nom: f64,
    #[serde(rename = "Vnom")]
    pub v_nom: f64,
    #[serde(rename = "Vmax")]
    pub v_max: f64,
    #[serde(rename = "Vmin")]
    pub v_min: f64,
    #[serde(rename = "Vdcmax")]
    pub v_dc_max: f64,
    #[serde(rename = "MPPTHi")]
    pub mppt_hi: f64,
    #[serde(rename = "MPPTLow")]
    pub mppt_low: f64,
    #[serde(rename = "Pacmax")]
    pub pac_max: f64,
    #[serde(rename = "ADRCoefficients")]
    pub coefficients: [f64; 9],
    #[serde(rename = "Pnt")]
    pub pnt: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InverterParameters {
    Sandia(SandiaInverter),
    Adr(AdrInverter),
}

// ─── Library ─────────────────────────────────────────────────────────────────

/// Named module and inverter parameter sets. Read-only once built.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterLibrary {
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleParameters>,
    #[serde(default)]
    pub inverters: BTreeMap<String, InverterParameters>,
}

impl ParameterLibrary {
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Entries from `other` replace entries of the same name.
    pub fn merge(mut self, other: ParameterLibrary) -> Self {
        self.modules.extend(other.modules);
        self.inverters.extend(other.inverters);
        self
    }

    pub fn module(&self, name: &str) -> Result<&ModuleParameters> {
        self.modules
            .get(name)
            .ok_or_else(|| SimError::config(format!("unknown module '{}'", name)))
    }

    pub fn inverter(&self, name: &str) -> Result<&InverterParameters> {
        self.inverters
            .get(name)
            .ok_or_else(|| SimError::config(format!("could not load an inverter with name '{}'", name)))
    }

    /// A handful of published parameter sets, enough to run the defaults.
    pub fn builtin() -> Self {
        let mut lib = ParameterLibrary::default();
        lib.modules.insert(
            "Canadian_Solar_CS5P_220M".to_string(),
            ModuleParameters::Cec(CecModule {
                i_mp_ref: 4.69,
                v_mp_ref: 46.9,
                alpha_sc: 0.004539,
                a_ref: 2.6373,
                i_l_ref: 5.114,
                i_o_ref: 8.196e-10,
                r_s: 1.065,
                r_sh_ref: 381.68,
                eg_ref: None,
                d_eg_dt: None,
            }),
        );
        lib.modules.insert(
            "Canadian_Solar_CS5P_220M___2009_".to_string(),
            ModuleParameters::Sapm(SapmModule {
                cells_in_series: 96.0,
                isco: 5.09115,
                voco: 59.2608,
                impo: 4.54629,
                vmpo: 48.3156,
                aisc: 0.000397,
                aimp: 0.000181,
                c0: 1.01284,
                c1: -0.0128398,
                bvoco: -0.21696,
                mbvoc: 0.0,
                bvmpo: -0.235488,
                mbvmp: 0.0,
                n: 1.4032,
                c2: 0.279317,
                c3: -7.24463,
                a: [0.928385, 0.068093, -0.0157738, 0.0016606, -6.93e-05],
                b: [1.0, -0.002438, 0.0003103, -1.246e-05, 2.11e-07, -1.36e-09],
                fd: 1.0,
            }),
        );
        lib.inverters.insert(
            "ABB__MICRO_0_25_I_OUTD_US_208__208V_".to_string(),
            InverterParameters::Sandia(SandiaInverter {
                paco: 250.0,
                pdco: 259.5220505,
                vdco: 40.24260317,
                pso: 1.771614224,
                c0: -2.48e-05,
                c1: -9.01e-05,
                c2: 6.69e-04,
                c3: -0.0189,
                pnt: 0.02,
            }),
        );
        lib.inverters.insert(
            "Ablerex_Electronics_ES_2200_US_240".to_string(),
            InverterParameters::Adr(AdrInverter {
                p_nom: 2184.0,
                v_nom: 399.5,
                v_max: 500.0,
                v_min: 200.0,
                v_dc_max: 600.0,
                mppt_hi: 450.0,
                mppt_low: 150.0,
                pac_max: 2200.0,
                coefficients: [0.01385, 0.0152, 0.00794, 0.00286, -0.01872, -0.01305, 0.0, 0.0, 0.0],
                pnt: 0.65,
            }),
        );
        lib
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let lib = ParameterLibrary::builtin();
        let m = lib.module("Canadian_Solar_CS5P_220M").unwrap();
        assert!((m.rated_power() - 219.961).abs() < 0.01);
        assert!(matches!(lib.module("nope"), Err(SimError::Configuration(_))));
        assert!(lib.inverter("ABB__MICRO_0_25_I_OUTD_US_208__208V_").is_ok());
    }

    #[test]
    fn test_desoto_defaults() {
        let lib = ParameterLibrary::builtin();
        let ModuleParameters::Cec(m) = lib.module("Canadian_Solar_CS5P_220M").unwrap() else {
            panic!("expected CEC parameters");
        };
        assert_eq!(m.eg_ref(), 1.121);
        assert_eq!(m.d_eg_dt(), -0.0002677);
    }

    #[test]
    fn test_library_from_json() {
        let json = r#"{
            "modules": {
                "test": { "kind": "cec", "I_mp_ref": 5.0, "V_mp_ref": 30.0, "alpha_sc": 0.003,
                          "a_ref": 1.5, "I_L_ref": 5.5, "I_o_ref": 1e-10, "R_s": 0.3,
                          "R_sh_ref": 300.0, "EgRef": 1.5 }
            }
        }"#;
        let lib = ParameterLibrary::from_json(json).unwrap();
        let ModuleParameters::Cec(m) = lib.module("test").unwrap() else {
            panic!("expected CEC parameters");
        };
        assert_eq!(m.rated_power(), 150.0);
        assert_eq!(m.eg_ref(), 1.5);
        assert!(lib.inverters.is_empty());

        let merged = ParameterLibrary::builtin().merge(lib);
        assert!(merged.module("test").is_ok());
        assert!(merged.module("Canadian_Solar_CS5P_220M").is_ok());
    }
}
