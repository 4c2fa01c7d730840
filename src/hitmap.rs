//! Observing-depth maps of the scanning strategies.

use std::{
    env,
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::{
    channel::Telescope,
    constants::{is_unseen, HITMAP_THRESHOLD, UNSEEN},
    error::{MapsimsError, Result},
    healpix::{check_nside, nside2npix, ud_grade},
    io::read_first_component,
};

/// Environment variable overriding the packaged data directory.
pub const DATA_DIR_ENV: &str = "MAPSIMS_DATA_DIR";

pub fn data_dir() -> PathBuf {
    env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")).join("data"))
}

/// Location of a packaged data file; the file may not exist.
pub fn get_resource_path(name: &str) -> PathBuf {
    data_dir().join(name)
}

pub fn packaged_hitmap_name(telescope: Telescope, strategy: &str) -> String {
    format!("total_hits_{}_{}.fits", telescope.tag(), strategy)
}

/// Resolve a scanning strategy to a hit-count file: an existing path wins,
/// otherwise the packaged map of that name for `telescope`.
pub fn resolve_strategy(telescope: Telescope, strategy: &str) -> Result<PathBuf> {
    let direct = Path::new(strategy);
    if direct.is_file() {
        return Ok(direct.to_path_buf());
    }
    let packaged = get_resource_path(&packaged_hitmap_name(telescope, strategy));
    if packaged.is_file() {
        Ok(packaged)
    } else {
        Err(MapsimsError::MissingResource(strategy.to_string()))
    }
}

/// Hit counts normalized to a peak of 1 on the target grid. Pixels with a
/// normalized depth below [`HITMAP_THRESHOLD`] are exactly zero.
#[derive(Debug, Clone, PartialEq)]
pub struct HitMap {
    nside: usize,
    values: Vec<f64>,
    sky_fraction: f64,
}

impl HitMap {
    pub fn load(telescope: Telescope, strategy: &str, nside: usize) -> Result<Self> {
        check_nside(nside)?;
        let path = resolve_strategy(telescope, strategy)?;
        debug!("reading hit counts from {}", path.display());
        let counts = read_first_component(&path)?;
        let hitmap = HitMap::from_counts(&counts, nside)?;
        info!(
            "{} {} hit map at NSIDE {}: sky fraction {:.4}",
            telescope,
            strategy,
            nside,
            hitmap.sky_fraction
        );
        Ok(hitmap)
    }

    /// Normalize raw counts at any resolution; negative and UNSEEN counts
    /// are unobserved.
    pub fn from_counts(counts: &[f64], nside: usize) -> Result<Self> {
        check_nside(nside)?;
        let cleaned: Vec<f64> = counts
            .iter()
            .map(|&x| if x.is_finite() && x >= 0.0 && !is_unseen(x) { x } else { UNSEEN })
            .collect();
        let mut values: Vec<f64> = ud_grade(&cleaned, nside)?
            .into_iter()
            .map(|x| if is_unseen(x) { 0.0 } else { x })
            .collect();

        let max = values.iter().cloned().fold(0.0, f64::max);
        if max <= 0.0 {
            return Err(MapsimsError::EmptyHitmap);
        }
        values.iter_mut().for_each(|x| {
            *x /= max;
            if *x < HITMAP_THRESHOLD {
                *x = 0.0;
            }
        });
        let observed = values.iter().filter(|&&x| x > 0.0).count();
        let sky_fraction = observed as f64 / nside2npix(nside) as f64;
        Ok(HitMap {
            nside,
            values,
            sky_fraction,
        })
    }

    pub fn nside(&self) -> usize {
        self.nside
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn sky_fraction(&self) -> f64 {
        self.sky_fraction
    }

    pub fn is_observed(&self, ipix: usize) -> bool {
        self.values[ipix] > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::write_map;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    fn ramp(nside: usize) -> Vec<f64> {
        (0..nside2npix(nside)).map(|i| i as f64).collect()
    }

    #[test]
    fn test_normalization() {
        let mut counts = ramp(8);
        counts[5] = -3.0;
        let hm = HitMap::from_counts(&counts, 8).unwrap();
        let max = hm.values().iter().cloned().fold(f64::MIN, f64::max);
        assert_eq!(max, 1.0);
        assert!(hm.values().iter().all(|&x| x == 0.0 || (HITMAP_THRESHOLD..=1.0).contains(&x)));
        // 0, the negative pixel and the smallest ramp values fall under threshold
        assert!(!hm.is_observed(0));
        assert!(!hm.is_observed(5));
        assert!(hm.is_observed(100));
        let observed = hm.values().iter().filter(|&&x| x > 0.0).count();
        assert_relative_eq!(hm.sky_fraction(), observed as f64 / 768.0);
        assert!(hm.sky_fraction() > 0.0 && hm.sky_fraction() <= 1.0);
    }

    #[test]
    fn test_degrade_keeps_peak() {
        let counts = vec![7.0; nside2npix(16)];
        let hm = HitMap::from_counts(&counts, 4).unwrap();
        assert_eq!(hm.nside(), 4);
        assert_eq!(hm.values().len(), nside2npix(4));
        assert!(hm.values().iter().all(|&x| x == 1.0));
        assert_eq!(hm.sky_fraction(), 1.0);
    }

    #[test]
    fn test_empty_hitmap() {
        let counts = vec![0.0; nside2npix(4)];
        assert!(matches!(
            HitMap::from_counts(&counts, 4),
            Err(MapsimsError::EmptyHitmap)
        ));
        assert!(HitMap::from_counts(&ramp(4), 3).is_err());
    }

    #[test]
    fn test_strategy_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom_hits.fits");
        let counts = ramp(4);
        write_map(&path, &[&counts[..]]).unwrap();
        let strategy = path.to_str().unwrap();
        let hm = HitMap::load(Telescope::SmallAperture, strategy, 2).unwrap();
        assert_eq!(hm.values().len(), nside2npix(2));
    }

    #[test]
    fn test_unknown_strategy() {
        let err = resolve_strategy(Telescope::LargeAperture, "zigzag-does-not-exist").unwrap_err();
        assert!(matches!(err, MapsimsError::MissingResource(_)));
        assert!(!err.is_configuration_error());
    }

    #[test]
    fn test_packaged_names() {
        assert_eq!(
            packaged_hitmap_name(Telescope::SmallAperture, "classical"),
            "total_hits_SA_classical.fits"
        );
    }
}
