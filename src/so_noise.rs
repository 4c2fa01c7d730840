//! Analytic noise power spectra of the large- and small-aperture telescopes.
//!
//! Curves are in uK_RJ^2 (RJ brightness), one row per band in the order of
//! [`crate::channel::BANDS`], one column per multipole `0..=ell_max`. The
//! monopole and dipole columns are zero.

use std::{
    f64::consts::PI,
    fmt,
    str::FromStr,
};

use log::{debug, warn};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::{
    channel::Telescope,
    constants::{KLUDGE_FACTOR, MAX_ELL, OBSERVING_EFFICIENCY, SECONDS_PER_DAY, SURVEY_YEARS},
    error::{MapsimsError, Result},
};

const NBANDS: usize = 6;

/// Sensitivity assigned to a detector class with no tubes, uK sqrt(s).
const NO_TUBES_SENSITIVITY: f64 = 1E9;

const LA_TUBES_TOTAL: u32 = 7;

/// [baseline, goal] sensitivities in uK sqrt(s) for a reference tube count.
const LA_SENSITIVITY: [[f64; 2]; NBANDS] = [
    [48.0, 35.0],
    [24.0, 18.0],
    [5.4, 3.9],
    [6.7, 4.2],
    [15.0, 10.0],
    [36.0, 25.0],
];
const SA_SENSITIVITY: [[f64; 2]; NBANDS] = [
    [21.0, 15.0],
    [13.0, 10.0],
    [3.4, 2.4],
    [4.3, 2.7],
    [8.6, 5.7],
    [22.0, 14.0],
];

/// Atmospheric temperature noise amplitudes at ell = 1000.
const LA_ATMOSPHERE: [f64; NBANDS] = [200.0, 7.7, 1800.0, 12000.0, 68000.0, 124000.0];
const LA_ATMOSPHERE_PIVOT: f64 = 1000.0;
const LA_ATMOSPHERE_SLOPE: f64 = -3.5;
const LA_POL_KNEE: f64 = 700.0;
const LA_POL_SLOPE: f64 = -1.4;

/// [pessimistic, optimistic] polarization knee multipoles.
const SA_KNEES: [[f64; 2]; NBANDS] = [
    [30.0, 15.0],
    [30.0, 15.0],
    [50.0, 25.0],
    [50.0, 25.0],
    [70.0, 35.0],
    [100.0, 40.0],
];
const SA_SLOPES: [f64; NBANDS] = [-2.4, -2.4, -2.5, -3.0, -3.0, -3.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensitivityMode {
    Baseline,
    Goal,
}

impl SensitivityMode {
    fn column(&self) -> usize {
        match self {
            SensitivityMode::Baseline => 0,
            SensitivityMode::Goal => 1,
        }
    }
}

impl Default for SensitivityMode {
    fn default() -> Self {
        SensitivityMode::Baseline
    }
}

impl fmt::Display for SensitivityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SensitivityMode::Baseline => "baseline",
            SensitivityMode::Goal => "goal",
        })
    }
}

impl FromStr for SensitivityMode {
    type Err = MapsimsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "baseline" => Ok(SensitivityMode::Baseline),
            "goal" => Ok(SensitivityMode::Goal),
            _ => Err(MapsimsError::UnknownSensitivityMode(s.to_string())),
        }
    }
}

/// Correlated (1/f) noise regime of the small-aperture detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OneOverFMode {
    Pessimistic,
    Optimistic,
    None,
}

impl OneOverFMode {
    fn column(&self) -> Option<usize> {
        match self {
            OneOverFMode::Pessimistic => Some(0),
            OneOverFMode::Optimistic => Some(1),
            OneOverFMode::None => None,
        }
    }
}

impl Default for OneOverFMode {
    fn default() -> Self {
        OneOverFMode::Pessimistic
    }
}

impl fmt::Display for OneOverFMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OneOverFMode::Pessimistic => "pessimistic",
            OneOverFMode::Optimistic => "optimistic",
            OneOverFMode::None => "none",
        })
    }
}

impl FromStr for OneOverFMode {
    type Err = MapsimsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pessimistic" => Ok(OneOverFMode::Pessimistic),
            "optimistic" => Ok(OneOverFMode::Optimistic),
            "none" => Ok(OneOverFMode::None),
            _ => Err(MapsimsError::UnknownOneOverFMode(s.to_string())),
        }
    }
}

/// Optics tubes per detector class on the large-aperture telescope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaTubes {
    pub lf: u32,
    pub mf: u32,
    pub uhf: u32,
}

impl Default for LaTubes {
    fn default() -> Self {
        LaTubes { lf: 1, mf: 4, uhf: 2 }
    }
}

impl LaTubes {
    pub fn total(&self) -> u32 {
        self.lf + self.mf + self.uhf
    }

    fn per_band(&self) -> [f64; NBANDS] {
        let (lf, mf, uhf) = (self.lf as f64, self.mf as f64, self.uhf as f64);
        [lf, lf, mf, mf, uhf, uhf]
    }
}

/// Multipole-domain noise model of one telescope.
#[derive(Debug, Clone)]
pub struct NoiseCurves {
    pub ell: Array1<f64>,
    /// temperature noise, `[band, ell]`
    pub n_t: Array2<f64>,
    /// polarization noise (E and B), `[band, ell]`
    pub n_p: Array2<f64>,
    /// white noise map depth per band in uK-arcmin
    pub white_noise_levels: Array1<f64>,
}

impl NoiseCurves {
    pub fn ell_max(&self) -> usize {
        self.ell.len() - 1
    }
}

struct SurveyGeometry {
    area_sr: f64,
    area_deg2: f64,
    area_arcmin2: f64,
}

impl SurveyGeometry {
    fn new(f_sky: f64) -> Self {
        let area_sr = 4.0 * PI * f_sky;
        let area_deg2 = area_sr * (180.0 / PI).powi(2);
        SurveyGeometry {
            area_sr,
            area_deg2,
            area_arcmin2: area_deg2 * 3600.0,
        }
    }
}

fn check_inputs(f_sky: f64, ell_max: usize) -> Result<()> {
    if !(f_sky > 0.0 && f_sky <= 1.0) {
        return Err(MapsimsError::InvalidConfig(format!(
            "sky fraction {} outside (0, 1]",
            f_sky
        )));
    }
    if ell_max > MAX_ELL {
        return Err(MapsimsError::InvalidConfig(format!(
            "ell_max {} above {}",
            ell_max, MAX_ELL
        )));
    }
    Ok(())
}

/// Effective integration time in seconds.
fn integration_time(days_per_year: f64, apply_kludge_correction: bool) -> f64 {
    let t = SURVEY_YEARS * days_per_year * SECONDS_PER_DAY * OBSERVING_EFFICIENCY;
    if apply_kludge_correction {
        t * KLUDGE_FACTOR
    } else {
        t
    }
}

/// Gaussian beam transfer `exp(l(l+1) sigma^2)` applied to noise power.
pub fn beam_correction(fwhm_arcmin: f64, ell: f64) -> f64 {
    let sigma = (fwhm_arcmin / 60.0).to_radians() / (8.0 * 2_f64.ln()).sqrt();
    (ell * (ell + 1.0) * sigma * sigma).exp()
}

fn multipoles(ell_max: usize) -> Array1<f64> {
    Array1::from_iter((0..=ell_max).map(|l| l as f64))
}

pub fn la_noise(
    sensitivity_mode: SensitivityMode,
    f_sky: f64,
    ell_max: usize,
    tubes: LaTubes,
    apply_beam_correction: bool,
    apply_kludge_correction: bool,
) -> Result<NoiseCurves> {
    check_inputs(f_sky, ell_max)?;
    if tubes.total() != LA_TUBES_TOTAL {
        warn!(
            "{} LA tubes requested, the telescope holds {}",
            tubes.total(),
            LA_TUBES_TOTAL
        );
    }
    let geometry = SurveyGeometry::new(f_sky);
    let t = integration_time(365.25, apply_kludge_correction);
    let ntubes = tubes.per_band();
    // reference tube counts of the tabulated sensitivities
    let reference = [1.0, 1.0, 4.0, 4.0, 2.0, 2.0];
    let beams = Telescope::LargeAperture.beams_arcmin();

    let ell = multipoles(ell_max);
    let mut n_t = Array2::<f64>::zeros((NBANDS, ell_max + 1));
    let mut n_p = Array2::<f64>::zeros((NBANDS, ell_max + 1));
    let mut white_noise_levels = Array1::<f64>::zeros(NBANDS);

    for b in 0..NBANDS {
        let sensitivity = if ntubes[b] > 0.0 {
            LA_SENSITIVITY[b][sensitivity_mode.column()] * (reference[b] / ntubes[b]).sqrt()
        } else {
            NO_TUBES_SENSITIVITY
        };
        let w = sensitivity / t.sqrt();
        white_noise_levels[b] = w * geometry.area_arcmin2.sqrt();
        let white_t = w * w * geometry.area_sr;
        let white_p = 2.0 * w * w * geometry.area_sr;

        for l in 2..=ell_max {
            let lf = l as f64;
            let atmosphere = if ntubes[b] > 0.0 {
                LA_ATMOSPHERE[b] * (lf / LA_ATMOSPHERE_PIVOT).powf(LA_ATMOSPHERE_SLOPE)
                    * geometry.area_deg2
                    / t
                    / (2.0 * ntubes[b])
            } else {
                0.0
            };
            let beam = if apply_beam_correction {
                beam_correction(beams[b], lf)
            } else {
                1.0
            };
            n_t[[b, l]] = (white_t + atmosphere) * beam;
            n_p[[b, l]] = white_p * ((lf / LA_POL_KNEE).powf(LA_POL_SLOPE) + 1.0) * beam;
        }
    }
    debug!("LA noise curves up to ell {}, t = {:.3e} s", ell_max, t);
    Ok(NoiseCurves {
        ell,
        n_t,
        n_p,
        white_noise_levels,
    })
}

/// Tube counts of the small-aperture telescopes given how many years the
/// low frequency detectors are deployed. Negative years describe a
/// deployment that does not displace mid frequency tubes.
fn sa_tubes(years_lf: f64) -> [f64; 3] {
    let lf = years_lf.abs() / SURVEY_YEARS + 1E-6;
    let mf = if years_lf > 0.0 {
        2.0 - years_lf / SURVEY_YEARS
    } else {
        2.0
    };
    [lf, mf, 1.0]
}

/// Polarization curves of the small-aperture telescopes; temperature is
/// taken as half the polarization noise.
pub fn sa_noise(
    sensitivity_mode: SensitivityMode,
    one_over_f_mode: OneOverFMode,
    years_lf: f64,
    f_sky: f64,
    ell_max: usize,
    apply_beam_correction: bool,
    apply_kludge_correction: bool,
) -> Result<NoiseCurves> {
    check_inputs(f_sky, ell_max)?;
    if years_lf > SURVEY_YEARS {
        return Err(MapsimsError::InvalidConfig(format!(
            "LF detectors deployed {} years, survey lasts {}",
            years_lf, SURVEY_YEARS
        )));
    }
    let geometry = SurveyGeometry::new(f_sky);
    let t = integration_time(365.0, apply_kludge_correction);
    let [n_lf, n_mf, n_uhf] = sa_tubes(years_lf);
    let scale = [
        (1.0 / n_lf).sqrt(),
        (1.0 / n_lf).sqrt(),
        (2.0 / n_mf).sqrt(),
        (2.0 / n_mf).sqrt(),
        (1.0 / n_uhf).sqrt(),
        (1.0 / n_uhf).sqrt(),
    ];
    let beams = Telescope::SmallAperture.beams_arcmin();

    let ell = multipoles(ell_max);
    let mut n_p = Array2::<f64>::zeros((NBANDS, ell_max + 1));
    let mut white_noise_levels = Array1::<f64>::zeros(NBANDS);

    for b in 0..NBANDS {
        let w = SA_SENSITIVITY[b][sensitivity_mode.column()] * scale[b] / t.sqrt();
        white_noise_levels[b] = w * geometry.area_arcmin2.sqrt();
        let white_p = 2.0 * w * w * geometry.area_sr;
        for l in 2..=ell_max {
            let lf = l as f64;
            let red = one_over_f_mode
                .column()
                .map_or(0.0, |c| (lf / SA_KNEES[b][c]).powf(SA_SLOPES[b]));
            let beam = if apply_beam_correction {
                beam_correction(beams[b], lf)
            } else {
                1.0
            };
            n_p[[b, l]] = white_p * (red + 1.0) * beam;
        }
    }
    let n_t = n_p.mapv(|x| x / 2.0);
    debug!("SA noise curves up to ell {}, t = {:.3e} s", ell_max, t);
    Ok(NoiseCurves {
        ell,
        n_t,
        n_p,
        white_noise_levels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_modes() {
        assert_eq!("goal".parse::<SensitivityMode>().unwrap(), SensitivityMode::Goal);
        assert_eq!("None".parse::<OneOverFMode>().unwrap(), OneOverFMode::None);
        let err = "ultra".parse::<SensitivityMode>().unwrap_err();
        assert!(err.is_configuration_error());
        assert!("threshold".parse::<SensitivityMode>().is_err());
        assert!("realistic".parse::<OneOverFMode>().is_err());
    }

    #[test]
    fn test_curve_shapes() {
        let la = la_noise(SensitivityMode::Baseline, 0.4, 48, LaTubes::default(), true, true).unwrap();
        let sa = sa_noise(
            SensitivityMode::Goal,
            OneOverFMode::Optimistic,
            1.0,
            0.1,
            48,
            true,
            true,
        )
        .unwrap();
        for c in [&la, &sa] {
            assert_eq!(c.ell.len(), 49);
            assert_eq!(c.ell_max(), 48);
            assert_eq!(c.n_t.dim(), (6, 49));
            assert_eq!(c.n_p.dim(), (6, 49));
            assert!(c.n_t.iter().all(|&x| x >= 0.0 && x.is_finite()));
            assert!(c.n_p.iter().all(|&x| x >= 0.0 && x.is_finite()));
            for b in 0..6 {
                assert_eq!(c.n_t[[b, 0]], 0.0);
                assert_eq!(c.n_p[[b, 1]], 0.0);
                assert!(c.n_p[[b, 2]] > 0.0);
            }
        }
    }

    #[test]
    fn test_sa_temperature_is_half_polarization() {
        let sa = sa_noise(
            SensitivityMode::Baseline,
            OneOverFMode::Pessimistic,
            1.0,
            0.2,
            100,
            true,
            false,
        )
        .unwrap();
        for (t, p) in sa.n_t.iter().zip(sa.n_p.iter()) {
            assert_eq!(*t, p / 2.0);
        }
    }

    #[test]
    fn test_kludge_scales_white_noise() {
        let plain = sa_noise(SensitivityMode::Baseline, OneOverFMode::None, 1.0, 0.1, 30, false, false).unwrap();
        let kludge = sa_noise(SensitivityMode::Baseline, OneOverFMode::None, 1.0, 0.1, 30, false, true).unwrap();
        for l in 2..=30 {
            assert_relative_eq!(
                kludge.n_p[[3, l]] / plain.n_p[[3, l]],
                1.0 / KLUDGE_FACTOR,
                epsilon = 1E-12
            );
        }
    }

    #[test]
    fn test_white_levels() {
        // no 1/f and no beam: flat at the white level
        let sa = sa_noise(SensitivityMode::Goal, OneOverFMode::None, 1.0, 0.1, 20, false, false).unwrap();
        let area_arcmin2 = 4.0 * PI * 0.1 * (180.0 / PI * 60.0).powi(2);
        for b in 0..6 {
            let level = sa.white_noise_levels[b];
            let expected = 2.0 * level * level * 4.0 * PI * 0.1 / area_arcmin2;
            assert_relative_eq!(sa.n_p[[b, 10]], expected, max_relative = 1E-12);
        }
        assert!(sa.white_noise_levels[3] < sa.white_noise_levels[0]);
    }

    #[test]
    fn test_la_atmosphere_and_empty_tubes() {
        let la = la_noise(SensitivityMode::Baseline, 0.4, 3000, LaTubes::default(), false, false).unwrap();
        // atmosphere dominates temperature at low ell
        assert!(la.n_t[[3, 100]] > 10.0 * la.n_t[[3, 2999]]);
        let no_lf = LaTubes { lf: 0, mf: 4, uhf: 2 };
        let la0 = la_noise(SensitivityMode::Baseline, 0.4, 100, no_lf, false, false).unwrap();
        assert!(la0.n_t[[0, 50]] > 1E6 * la.n_t[[0, 50]]);
        assert_relative_eq!(la0.n_t[[3, 50]], la.n_t[[3, 50]], max_relative = 1E-12);
    }

    #[test]
    fn test_beam_correction_grows() {
        assert_relative_eq!(beam_correction(30.0, 0.0), 1.0);
        assert!(beam_correction(30.0, 200.0) > beam_correction(30.0, 100.0));
        assert!(beam_correction(1.4, 100.0) < beam_correction(17.0, 100.0));
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(la_noise(SensitivityMode::Baseline, 0.0, 10, LaTubes::default(), true, true).is_err());
        assert!(la_noise(SensitivityMode::Baseline, 1.5, 10, LaTubes::default(), true, true).is_err());
        assert!(la_noise(SensitivityMode::Baseline, 0.5, 20_001, LaTubes::default(), true, true).is_err());
        assert!(sa_noise(SensitivityMode::Baseline, OneOverFMode::None, 6.0, 0.1, 10, true, true).is_err());
        assert!(sa_noise(SensitivityMode::Baseline, OneOverFMode::None, -1.0, 0.1, 10, true, true).is_ok());
    }
}
