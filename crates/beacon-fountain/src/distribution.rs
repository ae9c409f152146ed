//! # Degree Distributions
//!
//! Soliton distributions over packet degrees `1..=N` for an `N`-block message.
//!
//! The ideal soliton has its mode at 2. The robust soliton adds a ripple term
//! for every degree below a spike location `M` and a spike at `M` itself,
//! which keeps the decoder's set of degree-1 packets from running dry. The
//! smaller `delta` (the target failure probability), the more packets have to
//! be transmitted.
//!
//! All distributions are returned as probability masses indexed `0..=N`;
//! index 0 is always zero.

use crate::error::ConfigError;

/// Default target failure probability.
pub const DEFAULT_FAILURE_PROBABILITY: f64 = 0.01;

/// Ideal soliton distribution:
///
/// ```text
/// P(1) = 1 / N
/// P(k) = 1 / (k (k - 1)),   k = 2..=N
/// ```
pub fn ideal_soliton(n: usize) -> Result<Vec<f64>, ConfigError> {
    if n == 0 {
        return Err(ConfigError::ZeroBlockCount);
    }
    let mut p = Vec::with_capacity(n + 1);
    p.push(0.0);
    p.push(1.0 / n as f64);
    for k in 2..=n {
        let k = k as f64;
        p.push(1.0 / (k * (k - 1.0)));
    }
    Ok(p)
}

/// Robust soliton distribution with the spike at the default `M = ceil(N/2)`.
pub fn robust_soliton(n: usize, delta: f64) -> Result<Vec<f64>, ConfigError> {
    robust_soliton_with_spike(n, n.div_ceil(2), delta)
}

/// Robust soliton distribution with an explicit spike location `m`.
///
/// ```text
/// R    = N / M
/// t(i) = 1 / (i M),          i = 1..M-1
/// t(M) = ln(R / delta) / M
/// ```
///
/// `t` is added to the ideal soliton and the result normalized to sum to 1.
pub fn robust_soliton_with_spike(n: usize, m: usize, delta: f64) -> Result<Vec<f64>, ConfigError> {
    if n == 0 {
        return Err(ConfigError::ZeroBlockCount);
    }
    if m == 0 || m > n {
        return Err(ConfigError::InvalidSpike { m, n });
    }
    if !(delta.is_finite() && delta > 0.0 && delta < 1.0) {
        return Err(ConfigError::InvalidFailureProbability(delta));
    }

    let mut p = ideal_soliton(n)?;
    let m_f = m as f64;
    let r = n as f64 / m_f;

    for (i, mass) in p.iter_mut().enumerate().take(m).skip(1) {
        *mass += 1.0 / (i as f64 * m_f);
    }
    p[m] += (r / delta).ln() / m_f;

    let sum: f64 = p.iter().sum();
    for mass in &mut p {
        *mass /= sum;
    }
    Ok(p)
}
