use num::{Complex, Zero};

use rustfft::{FftDirection, FftNum, FftPlanner};

fn _fft<T: FftNum>(
    planner: &mut FftPlanner<T>,
    input: &mut [Complex<T>],
    output: &mut [Complex<T>],
    inverse: bool,
) {
    let len = input.len();
    let fft = planner.plan_fft(
        len,
        if inverse {
            FftDirection::Inverse
        } else {
            FftDirection::Forward
        },
    );
    let scratch_len = fft.get_outofplace_scratch_len();
    let mut scratch = vec![Complex::zero(); scratch_len];
    fft.process_outofplace_with_scratch(input, output, &mut scratch);
}

/// Unnormalized inverse transform, `output[j] = sum_k input[k] exp(2 pi i jk/n)`.
pub fn ifft<T: FftNum>(
    planner: &mut FftPlanner<T>,
    input: &mut [Complex<T>],
    output: &mut [Complex<T>],
) {
    _fft(planner, input, output, true);
}

/// Evaluate the real ring signal `Re sum_m c_m exp(i m (phi0 + 2 pi j / n))`
/// at the `n` pixels of a ring. Coefficients with `m >= n` alias onto
/// `m mod n`.
pub fn ring_synthesis(
    planner: &mut FftPlanner<f64>,
    coeffs: &[Complex<f64>],
    phi0: f64,
    n: usize,
) -> Vec<f64> {
    let mut bins = vec![Complex::<f64>::zero(); n];
    coeffs.iter().enumerate().for_each(|(m, c)| {
        bins[m % n] += *c * Complex::from_polar(1.0, m as f64 * phi0);
    });
    let mut out = vec![Complex::<f64>::zero(); n];
    ifft(planner, &mut bins, &mut out);
    out.iter().map(|x| x.re).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_fft_ifft_roundtrip() {
        let mut planner = FftPlanner::new();
        let mut input: Vec<Complex<f64>> = (0..8).map(|i| Complex::new(i as f64, 0.5)).collect();
        let orig = input.clone();
        let mut spec = vec![Complex::zero(); 8];
        _fft(&mut planner, &mut input, &mut spec, false);
        let mut back = vec![Complex::zero(); 8];
        ifft(&mut planner, &mut spec, &mut back);
        for (a, b) in orig.iter().zip(back.iter()) {
            assert!((*a - *b / 8.0).norm() < 1e-12);
        }
    }

    #[test]
    fn test_ring_synthesis_matches_direct_sum() {
        let mut planner = FftPlanner::new();
        let coeffs: Vec<Complex<f64>> = (0..11)
            .map(|m| Complex::new(1.0 / (m + 1) as f64, 0.3 * m as f64))
            .collect();
        let n = 8;
        let phi0 = PI / 8.0;
        let ring = ring_synthesis(&mut planner, &coeffs, phi0, n);
        for (j, v) in ring.iter().enumerate() {
            let phi = phi0 + 2.0 * PI * j as f64 / n as f64;
            let direct: f64 = coeffs
                .iter()
                .enumerate()
                .map(|(m, c)| (*c * Complex::from_polar(1.0, m as f64 * phi)).re)
                .sum();
            assert!((v - direct).abs() < 1e-10);
        }
    }
}
