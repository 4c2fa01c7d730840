//! Noise maps of a single channel.
//!
//! A [`NoiseSimulator`] is built once per channel: it loads the hit-count map,
//! derives the sky fraction and evaluates the analytic noise spectra. Every
//! call to [`NoiseSimulator::simulate`] then draws a fresh T, Q, U
//! realization and modulates it by the observing depth.

use log::{debug, info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    channel::{Channel, Telescope},
    constants::{is_unseen, SURVEY_YEARS, UNSEEN},
    error::{MapsimsError, Result},
    healpix::{check_nside, nside2npix},
    hitmap::HitMap,
    sht::{synfast, PowerSpectra},
    so_noise::{la_noise, sa_noise, LaTubes, OneOverFMode, SensitivityMode},
    units::{conversion_factor, Unit},
};

/// Instrument and survey settings of the noise model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NoiseConfig {
    pub sensitivity_mode: SensitivityMode,
    /// Deconvolve the beam from the noise spectra.
    pub apply_beam_correction: bool,
    /// Reduce the integration time by 0.85 for scan non-uniformity.
    pub apply_kludge_correction: bool,
    /// `classical`, `opportunistic` or the path of a hit-count map.
    pub scanning_strategy: String,
    pub la_number_lf: u32,
    pub la_number_mf: u32,
    pub la_number_uhf: u32,
    /// Years of small-aperture LF deployment, negative to keep all MF tubes.
    pub sa_years_lf: f64,
    pub sa_one_over_f_mode: OneOverFMode,
    pub unit: Unit,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        NoiseConfig {
            sensitivity_mode: SensitivityMode::Baseline,
            apply_beam_correction: true,
            apply_kludge_correction: true,
            scanning_strategy: "classical".to_string(),
            la_number_lf: 1,
            la_number_mf: 4,
            la_number_uhf: 2,
            sa_years_lf: 1.0,
            sa_one_over_f_mode: OneOverFMode::Pessimistic,
            unit: Unit::UKCmb,
        }
    }
}

impl NoiseConfig {
    pub fn la_tubes(&self) -> LaTubes {
        LaTubes {
            lf: self.la_number_lf,
            mf: self.la_number_mf,
            uhf: self.la_number_uhf,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.scanning_strategy.trim().is_empty() {
            return Err(MapsimsError::InvalidConfig(
                "empty scanning strategy".to_string(),
            ));
        }
        if self.la_tubes().total() == 0 {
            return Err(MapsimsError::InvalidConfig(
                "the LA needs at least one tube".to_string(),
            ));
        }
        if !self.sa_years_lf.is_finite() || self.sa_years_lf.abs() > SURVEY_YEARS {
            return Err(MapsimsError::InvalidConfig(format!(
                "sa_years_lf {} outside [-{}, {}]",
                self.sa_years_lf, SURVEY_YEARS, SURVEY_YEARS
            )));
        }
        Ok(())
    }
}

/// T, Q, U maps in RING order.
#[derive(Debug, Clone, PartialEq)]
pub struct PolMap {
    pub nside: usize,
    pub t: Vec<f64>,
    pub q: Vec<f64>,
    pub u: Vec<f64>,
}

impl PolMap {
    pub fn zeros(nside: usize) -> Self {
        let npix = nside2npix(nside);
        PolMap {
            nside,
            t: vec![0.0; npix],
            q: vec![0.0; npix],
            u: vec![0.0; npix],
        }
    }

    pub fn components(&self) -> [&[f64]; 3] {
        [&self.t, &self.q, &self.u]
    }

    pub fn from_components(nside: usize, components: Vec<Vec<f64>>) -> Result<Self> {
        let npix = nside2npix(check_nside(nside)?);
        let shape_error = || {
            MapsimsError::InvalidConfig(format!("expected 3 components of {} pixels", npix))
        };
        let [t, q, u]: [Vec<f64>; 3] = components.try_into().map_err(|_| shape_error())?;
        if [&t, &q, &u].iter().any(|c| c.len() != npix) {
            return Err(shape_error());
        }
        Ok(PolMap { nside, t, q, u })
    }

    /// Pixel-wise sum; UNSEEN in either operand stays UNSEEN.
    pub fn accumulate(&mut self, other: &PolMap) -> Result<()> {
        if other.nside != self.nside {
            return Err(MapsimsError::InvalidConfig(format!(
                "cannot add NSIDE {} map to NSIDE {} map",
                other.nside, self.nside
            )));
        }
        for (dst, src) in [&mut self.t, &mut self.q, &mut self.u]
            .into_iter()
            .zip(other.components())
        {
            dst.iter_mut().zip(src.iter()).for_each(|(a, &b)| {
                if is_unseen(*a) || is_unseen(b) {
                    *a = UNSEEN;
                } else {
                    *a += b;
                }
            });
        }
        Ok(())
    }
}

pub struct NoiseSimulator {
    channel: Channel,
    nside: usize,
    unit: Unit,
    hitmap: HitMap,
    noise_ell_t: Vec<f64>,
    noise_ell_p: Vec<f64>,
}

impl NoiseSimulator {
    pub fn new(channel: Channel, nside: usize, config: &NoiseConfig) -> Result<Self> {
        config.validate()?;
        check_nside(nside)?;
        let hitmap = HitMap::load(channel.telescope(), &config.scanning_strategy, nside)?;
        NoiseSimulator::with_hitmap(channel, hitmap, config)
    }

    /// Build from an already normalized hit map; NSIDE follows the hit map.
    pub fn with_hitmap(channel: Channel, hitmap: HitMap, config: &NoiseConfig) -> Result<Self> {
        config.validate()?;
        let nside = hitmap.nside();
        let ell_max = 3 * nside;
        let f_sky = hitmap.sky_fraction();
        let curves = match channel.telescope() {
            Telescope::LargeAperture => la_noise(
                config.sensitivity_mode,
                f_sky,
                ell_max,
                config.la_tubes(),
                config.apply_beam_correction,
                config.apply_kludge_correction,
            )?,
            Telescope::SmallAperture => sa_noise(
                config.sensitivity_mode,
                config.sa_one_over_f_mode,
                config.sa_years_lf,
                f_sky,
                ell_max,
                config.apply_beam_correction,
                config.apply_kludge_correction,
            )?,
        };
        if config.apply_kludge_correction {
            warn!(
                "{}: kludge correction and hit map modulation both account for scan non-uniformity",
                channel
            );
        }

        let band = channel.telescope().band_index(channel.band())?;
        let to_unit =
            conversion_factor(Unit::UKRj, config.unit, channel.center_frequency_ghz()).powi(2);
        let noise_ell_t: Vec<f64> = curves.n_t.row(band).iter().map(|x| x * to_unit).collect();
        let noise_ell_p: Vec<f64> = curves.n_p.row(band).iter().map(|x| x * to_unit).collect();
        info!(
            "{}: white noise {:.2} uK-arcmin, sky fraction {:.4}",
            channel, curves.white_noise_levels[band], f_sky
        );
        Ok(NoiseSimulator {
            channel,
            nside,
            unit: config.unit,
            hitmap,
            noise_ell_t,
            noise_ell_p,
        })
    }

    /// Build from precomputed spectra, already in `unit`.
    pub fn from_spectra(
        channel: Channel,
        hitmap: HitMap,
        unit: Unit,
        noise_ell_t: Vec<f64>,
        noise_ell_p: Vec<f64>,
    ) -> Result<Self> {
        let nside = hitmap.nside();
        let required = 3 * nside + 1;
        let available = noise_ell_t.len().min(noise_ell_p.len());
        if available < required {
            return Err(MapsimsError::ResolutionMismatch {
                nside,
                required,
                available,
            });
        }
        Ok(NoiseSimulator {
            channel,
            nside,
            unit,
            hitmap,
            noise_ell_t,
            noise_ell_p,
        })
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn nside(&self) -> usize {
        self.nside
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn hitmap(&self) -> &HitMap {
        &self.hitmap
    }

    pub fn sky_fraction(&self) -> f64 {
        self.hitmap.sky_fraction()
    }

    pub fn noise_ell_t(&self) -> &[f64] {
        &self.noise_ell_t
    }

    pub fn noise_ell_p(&self) -> &[f64] {
        &self.noise_ell_p
    }

    /// Draw one realization; the same seed gives the same map.
    pub fn simulate(&self, seed: Option<u64>) -> Result<PolMap> {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        debug!("{}: drawing noise with seed {:?}", self.channel, seed);
        self.simulate_with_rng(&mut rng)
    }

    pub fn simulate_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<PolMap> {
        let spectra = PowerSpectra::diagonal(self.noise_ell_t.clone(), self.noise_ell_p.clone())?;
        let [mut t, mut q, mut u] = synfast(&spectra, self.nside, rng)?;
        for map in [&mut t, &mut q, &mut u] {
            map.iter_mut()
                .zip(self.hitmap.values().iter())
                .for_each(|(x, &h)| {
                    if h == 0.0 {
                        *x = UNSEEN;
                    } else {
                        *x /= h.sqrt();
                    }
                });
        }
        Ok(PolMap {
            nside: self.nside,
            t,
            q,
            u,
        })
    }
}
