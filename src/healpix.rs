//! RING-ordered HEALPix pixelization.
//!
//! Only what the noise simulation needs: pixel/ring geometry, angle lookups and
//! `ud_grade` style resampling between power-of-two resolutions.

use std::f64::consts::{FRAC_PI_2, PI};

use crate::{
    constants::{is_unseen, UNSEEN},
    error::{MapsimsError, Result},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphCoord {
    /// Colatitude in radians, 0 at the north pole.
    pub pol: f64,
    pub az: f64,
}

impl SphCoord {
    pub fn new(pol: f64, az: f64) -> Self {
        SphCoord { pol, az }
    }
}

/// One iso-latitude ring of pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ring {
    pub first_pixel: usize,
    pub npix: usize,
    /// cos(theta) of the ring
    pub z: f64,
    /// longitude of the first pixel centre
    pub phi0: f64,
}

pub fn is_valid_nside(nside: usize) -> bool {
    nside > 0 && nside.is_power_of_two()
}

pub fn check_nside(nside: usize) -> Result<usize> {
    if is_valid_nside(nside) {
        Ok(nside)
    } else {
        Err(MapsimsError::InvalidNside(nside))
    }
}

pub fn nside2npix(nside: usize) -> usize {
    12 * nside * nside
}

pub fn npix2nside(npix: usize) -> Result<usize> {
    if npix == 0 || npix % 12 != 0 {
        return Err(MapsimsError::InvalidPixelCount(npix));
    }
    let nside = isqrt(npix / 12);
    if nside2npix(nside) != npix || !is_valid_nside(nside) {
        return Err(MapsimsError::InvalidPixelCount(npix));
    }
    Ok(nside)
}

pub fn nside2nring(nside: usize) -> usize {
    4 * nside - 1
}

fn isqrt(n: usize) -> usize {
    let mut r = (n as f64).sqrt() as usize;
    while r * r > n {
        r -= 1;
    }
    while (r + 1) * (r + 1) <= n {
        r += 1;
    }
    r
}

/// Ring index (1-based, counted from the north pole) of a pixel.
pub fn pix2ring_ring(nside: usize, ipix: usize) -> usize {
    let npix = nside2npix(nside);
    let ncap = 2 * nside * (nside - 1);
    if ipix < ncap {
        (1 + isqrt(1 + 2 * ipix)) >> 1
    } else if ipix < npix - ncap {
        (ipix - ncap) / (4 * nside) + nside
    } else {
        let ip = npix - ipix;
        4 * nside - ((1 + isqrt(2 * ip - 1)) >> 1)
    }
}

/// cos(theta) of a 1-based ring index.
pub fn ring2z_ring(nside: usize, iring: usize) -> f64 {
    let fact2 = 4.0 / nside2npix(nside) as f64;
    if iring < nside {
        1.0 - (iring * iring) as f64 * fact2
    } else if iring <= 3 * nside {
        ((2 * nside) as f64 - iring as f64) * 2.0 / (3 * nside) as f64
    } else {
        let ir = 4 * nside - iring;
        -1.0 + (ir * ir) as f64 * fact2
    }
}

/// Ring table in pixel order, from the north pole to the south pole.
pub fn rings(nside: usize) -> Vec<Ring> {
    let npix = nside2npix(nside);
    let ncap = 2 * nside * (nside - 1);
    (1..=nside2nring(nside))
        .map(|iring| {
            let z = ring2z_ring(nside, iring);
            if iring < nside {
                Ring {
                    first_pixel: 2 * iring * (iring - 1),
                    npix: 4 * iring,
                    z,
                    phi0: PI / (4 * iring) as f64,
                }
            } else if iring <= 3 * nside {
                Ring {
                    first_pixel: ncap + (iring - nside) * 4 * nside,
                    npix: 4 * nside,
                    z,
                    phi0: if (iring - nside) % 2 == 0 {
                        PI / (4 * nside) as f64
                    } else {
                        0.0
                    },
                }
            } else {
                let ir = 4 * nside - iring;
                Ring {
                    first_pixel: npix - 2 * ir * (ir + 1),
                    npix: 4 * ir,
                    z,
                    phi0: PI / (4 * ir) as f64,
                }
            }
        })
        .collect()
}

pub fn pix2ang_ring(nside: usize, ipix: usize) -> SphCoord {
    let npix = nside2npix(nside);
    let ncap = 2 * nside * (nside - 1);
    let fact2 = 4.0 / npix as f64;
    let (z, phi) = if ipix < ncap {
        let iring = (1 + isqrt(1 + 2 * ipix)) >> 1;
        let iphi = ipix + 1 - 2 * iring * (iring - 1);
        (
            1.0 - (iring * iring) as f64 * fact2,
            (iphi as f64 - 0.5) * FRAC_PI_2 / iring as f64,
        )
    } else if ipix < npix - ncap {
        let ip = ipix - ncap;
        let iring = ip / (4 * nside) + nside;
        let iphi = ip % (4 * nside) + 1;
        let fodd = if (iring + nside) & 1 == 1 { 1.0 } else { 0.5 };
        (
            ((2 * nside) as f64 - iring as f64) * 2.0 / (3 * nside) as f64,
            (iphi as f64 - fodd) * PI / (2 * nside) as f64,
        )
    } else {
        let ip = npix - ipix;
        let iring = (1 + isqrt(2 * ip - 1)) >> 1;
        let iphi = 4 * iring + 1 - (ip - 2 * iring * (iring - 1));
        (
            -1.0 + (iring * iring) as f64 * fact2,
            (iphi as f64 - 0.5) * FRAC_PI_2 / iring as f64,
        )
    };
    SphCoord::new(z.clamp(-1.0, 1.0).acos(), phi)
}

pub fn ang2pix_ring(nside: usize, ptg: SphCoord) -> usize {
    let z = ptg.pol.cos();
    let za = z.abs();
    let tt = ptg.az.rem_euclid(2.0 * PI) / FRAC_PI_2;
    let nside_i = nside as i64;
    let npix = nside2npix(nside) as i64;
    let ncap = 2 * nside_i * (nside_i - 1);

    let ipix = if za <= 2.0 / 3.0 {
        let temp1 = nside as f64 * (0.5 + tt);
        let temp2 = nside as f64 * z * 0.75;
        let jp = (temp1 - temp2).floor() as i64;
        let jm = (temp1 + temp2).floor() as i64;
        // ring number counted from z=2/3
        let ir = nside_i + 1 + jp - jm;
        let kshift = 1 - (ir & 1);
        let ip = (jp + jm - nside_i + kshift + 1).div_euclid(2);
        let ip = ip.rem_euclid(4 * nside_i);
        ncap + (ir - 1) * 4 * nside_i + ip
    } else {
        let tp = tt - tt.floor();
        let tmp = nside as f64 * (3.0 * (1.0 - za)).sqrt();
        let jp = (tp * tmp).floor() as i64;
        let jm = ((1.0 - tp) * tmp).floor() as i64;
        // ring number counted from the closest pole
        let ir = jp + jm + 1;
        let ip = ((tt * ir as f64).floor() as i64).rem_euclid(4 * ir);
        if z > 0.0 {
            2 * ir * (ir - 1) + ip
        } else {
            npix - 2 * ir * (ir + 1) + ip
        }
    };
    ipix as usize
}

/// Resample a RING map to `nside_out`.
///
/// Degrading averages the valid children of every output pixel, upgrading
/// copies the parent value. UNSEEN and non-finite inputs are ignored; an
/// output pixel without any valid input becomes UNSEEN.
pub fn ud_grade(map: &[f64], nside_out: usize) -> Result<Vec<f64>> {
    let nside_in = npix2nside(map.len())?;
    check_nside(nside_out)?;
    let valid = |x: f64| x.is_finite() && !is_unseen(x);

    if nside_out == nside_in {
        return Ok(map
            .iter()
            .map(|&x| if valid(x) { x } else { UNSEEN })
            .collect());
    }

    let npix_out = nside2npix(nside_out);
    if nside_out < nside_in {
        let mut sum = vec![0.0; npix_out];
        let mut cnt = vec![0_usize; npix_out];
        map.iter()
            .enumerate()
            .filter(|&(_, &x)| valid(x))
            .for_each(|(ipix, &x)| {
                let parent = ang2pix_ring(nside_out, pix2ang_ring(nside_in, ipix));
                sum[parent] += x;
                cnt[parent] += 1;
            });
        Ok(sum
            .iter()
            .zip(cnt.iter())
            .map(|(&s, &c)| if c == 0 { UNSEEN } else { s / c as f64 })
            .collect())
    } else {
        Ok((0..npix_out)
            .map(|ipix| {
                let x = map[ang2pix_ring(nside_in, pix2ang_ring(nside_out, ipix))];
                if valid(x) {
                    x
                } else {
                    UNSEEN
                }
            })
            .collect())
    }
}
