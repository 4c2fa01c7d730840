pub const PLANCK_H: f64 = 6.626_070_15E-34;
pub const BOLTZMANN_K: f64 = 1.380_649E-23;

/// CMB monopole temperature in K.
pub const T_CMB: f64 = 2.7255;

/// Sentinel marking unobserved pixels, same value as the HEALPix convention.
pub const UNSEEN: f64 = -1.6375E30;

/// Normalized hit counts below this are treated as unobserved.
pub const HITMAP_THRESHOLD: f64 = 1E-3;

/// Integration time scaling for map-depth non-uniformity.
pub const KLUDGE_FACTOR: f64 = 0.85;

pub const SURVEY_YEARS: f64 = 5.0;

/// Fraction of the survey time retained after efficiency and cuts.
pub const OBSERVING_EFFICIENCY: f64 = 0.2;

pub const SECONDS_PER_DAY: f64 = 24.0 * 3600.0;

pub const MAX_ELL: usize = 20_000;

pub fn is_unseen(x: f64) -> bool {
    (x - UNSEEN).abs() <= UNSEEN.abs() * 1E-7
}
