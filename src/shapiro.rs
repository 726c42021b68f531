//! The Shapiro–Wilk normality test, ported from Applied Statistics algorithm
//! AS R94 (Royston, 1995). Covers complete samples of size 3 and up; the
//! censored-data extensions of the original algorithm are not ported.

use crate::error::{Error, Result};
use statrs::distribution::{ContinuousCDF, Normal};

// Polynomial coefficients from AS R94, lowest order first.
const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.071190, 4.434685, -2.706056];
const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];
const C3: [f64; 4] = [0.5440, -0.39978, 0.025054, -6.714e-4];
const C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
const C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
const C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];
const G: [f64; 2] = [-2.273, 0.459];

/// 6/pi, used by the exact n = 3 p-value.
const PI6: f64 = 1.909_859_317_102_744;
/// asin(sqrt(3/4)).
const STQR: f64 = 1.047_197_551_196_597_6;

/// Stores the result of a Shapiro–Wilk test: the W statistic and the
/// probability of a W at least this small under the normal null.
#[derive(Debug, Clone, Copy)]
pub struct ShapiroWilk {
    pub statistic: f64,
    pub p_value: f64,
}

/// Runs the Shapiro–Wilk test on `samples` (order does not matter).
///
/// Returns an error when fewer than 3 samples are given, when any sample is
/// non-finite, or when all samples are identical (W is undefined there).
pub fn shapiro_wilk(samples: &[f64]) -> Result<ShapiroWilk> {
    let n = samples.len();
    if n < 3 {
        return Err(Error::Validation(format!(
            "Shapiro-Wilk requires at least 3 samples, got {n}."
        )));
    }
    if samples.iter().any(|v| !v.is_finite()) {
        return Err(Error::Validation(
            "Shapiro-Wilk requires finite samples.".to_string(),
        ));
    }

    let mut x = samples.to_vec();
    x.sort_unstable_by(crate::stats::cmp_f64);
    let range = x[n - 1] - x[0];
    if range <= 0.0 {
        return Err(Error::Validation(
            "Shapiro-Wilk is undefined for identical samples.".to_string(),
        ));
    }

    let std_normal = Normal::new(0.0, 1.0).map_err(|e| Error::Validation(e.to_string()))?;
    let an = n as f64;
    let n2 = n / 2;

    // Approximate expected values of normal order statistics (Blom scores),
    // then normalize into the Shapiro-Wilk weight vector.
    let mut a = vec![0.0_f64; n2];
    if n == 3 {
        a[0] = std::f64::consts::FRAC_1_SQRT_2;
    } else {
        let an25 = an + 0.25;
        let mut summ2 = 0.0;
        for (i, ai) in a.iter_mut().enumerate() {
            *ai = std_normal.inverse_cdf((i as f64 + 1.0 - 0.375) / an25);
            summ2 += *ai * *ai;
        }
        summ2 *= 2.0;
        let ssumm2 = summ2.sqrt();
        let rsn = 1.0 / an.sqrt();
        let a1 = poly(&C1, rsn) - a[0] / ssumm2;

        let (i1, fac) = if n > 5 {
            let a2 = poly(&C2, rsn) - a[1] / ssumm2;
            let fac = ((summ2 - 2.0 * a[0] * a[0] - 2.0 * a[1] * a[1])
                / (1.0 - 2.0 * a1 * a1 - 2.0 * a2 * a2))
                .sqrt();
            a[1] = a2;
            (2, fac)
        } else {
            let fac = ((summ2 - 2.0 * a[0] * a[0]) / (1.0 - 2.0 * a1 * a1)).sqrt();
            (1, fac)
        };
        a[0] = a1;
        for ai in a.iter_mut().take(n2).skip(i1) {
            *ai /= -fac;
        }
    }

    // W is one minus the squared correlation between the scaled order
    // statistics and the antisymmetric weight vector.
    let scaled: Vec<f64> = x.iter().map(|v| v / range).collect();
    let sx = scaled.iter().sum::<f64>() / an;
    let mut sa = 0.0;
    for i in 0..n {
        sa += signed_weight(&a, i, n);
    }
    sa /= an;

    let (mut ssa, mut ssx, mut sax) = (0.0, 0.0, 0.0);
    for i in 0..n {
        let asa = signed_weight(&a, i, n) - sa;
        let xsx = scaled[i] - sx;
        ssa += asa * asa;
        ssx += xsx * xsx;
        sax += asa * xsx;
    }
    let ssassx = (ssa * ssx).sqrt();
    let w1 = (ssassx - sax) * (ssassx + sax) / (ssa * ssx);
    let w = 1.0 - w1;

    // A numerically perfect fit; W = 1 cannot reject normality.
    if w1 <= 0.0 || !w1.is_finite() {
        return Ok(ShapiroWilk {
            statistic: 1.0,
            p_value: 1.0,
        });
    }

    let p_value = if n == 3 {
        (PI6 * (w.sqrt().asin() - STQR)).clamp(0.0, 1.0)
    } else {
        let mut y = w1.ln();
        let (m, s) = if n <= 11 {
            let gamma = poly(&G, an);
            if y >= gamma {
                return Ok(ShapiroWilk {
                    statistic: w,
                    p_value: 1e-99,
                });
            }
            y = -(gamma - y).ln();
            (poly(&C3, an), poly(&C4, an).exp())
        } else {
            let log_n = an.ln();
            (poly(&C5, log_n), poly(&C6, log_n).exp())
        };
        1.0 - std_normal.cdf((y - m) / s)
    };

    Ok(ShapiroWilk {
        statistic: w,
        p_value,
    })
}

/// The antisymmetric weight applied to the i-th order statistic: `-a[i]` in
/// the lower half, `+a[n-1-i]` in the upper half, 0 at an odd-n midpoint.
fn signed_weight(a: &[f64], i: usize, n: usize) -> f64 {
    let j = n - 1 - i;
    match i.cmp(&j) {
        std::cmp::Ordering::Less => -a[i],
        std::cmp::Ordering::Greater => a[j],
        std::cmp::Ordering::Equal => 0.0,
    }
}

/// Evaluates a polynomial with coefficients ordered lowest first.
fn poly(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}
