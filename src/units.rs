use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    constants::{BOLTZMANN_K, PLANCK_H, T_CMB},
    error::MapsimsError,
};

/// Photometric unit of a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "K_CMB")]
    KCmb,
    #[serde(rename = "uK_CMB")]
    UKCmb,
    #[serde(rename = "K_RJ")]
    KRj,
    #[serde(rename = "uK_RJ")]
    UKRj,
}

impl Unit {
    fn scale(&self) -> f64 {
        match self {
            Unit::KCmb | Unit::KRj => 1.0,
            Unit::UKCmb | Unit::UKRj => 1E6,
        }
    }

    pub fn is_thermodynamic(&self) -> bool {
        matches!(self, Unit::KCmb | Unit::UKCmb)
    }
}

impl Default for Unit {
    fn default() -> Self {
        Unit::UKCmb
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Unit::KCmb => "K_CMB",
            Unit::UKCmb => "uK_CMB",
            Unit::KRj => "K_RJ",
            Unit::UKRj => "uK_RJ",
        })
    }
}

impl FromStr for Unit {
    type Err = MapsimsError;

    fn from_str(s: &str) -> Result<Self, MapsimsError> {
        match s.trim() {
            "K_CMB" => Ok(Unit::KCmb),
            "uK_CMB" => Ok(Unit::UKCmb),
            "K_RJ" => Ok(Unit::KRj),
            "uK_RJ" => Ok(Unit::UKRj),
            _ => Err(MapsimsError::UnknownUnit(s.to_string())),
        }
    }
}

/// Multiply a Rayleigh-Jeans brightness temperature by this factor to get
/// the thermodynamic (CMB) temperature at `freq_ghz`.
pub fn rj_to_cmb_factor(freq_ghz: f64) -> f64 {
    let x = PLANCK_H * freq_ghz * 1E9 / (BOLTZMANN_K * T_CMB);
    let ex = x.exp();
    (ex - 1.0).powi(2) / (x * x * ex)
}

pub fn cmb_to_rj_factor(freq_ghz: f64) -> f64 {
    1.0 / rj_to_cmb_factor(freq_ghz)
}

/// Amplitude factor converting a map from `from` to `to` at `freq_ghz`.
pub fn conversion_factor(from: Unit, to: Unit, freq_ghz: f64) -> f64 {
    let convention = match (from.is_thermodynamic(), to.is_thermodynamic()) {
        (false, true) => rj_to_cmb_factor(freq_ghz),
        (true, false) => cmb_to_rj_factor(freq_ghz),
        _ => 1.0,
    };
    convention * to.scale() / from.scale()
}
