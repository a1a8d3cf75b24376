//! Gaussian noise for simulated field maps
//!
//! Samples come in pairs from the Box-Muller transform over two uniform
//! draws. Seeded generators give bit-identical noise across runs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{QsmError, QsmResult};

/// Default noise level as a fraction of the peak clean-field magnitude
pub const DEFAULT_NOISE_FRACTION: f64 = 0.02;

/// Noise settings for the forward model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub enabled: bool,
    /// sigma = fraction * max|clean field|
    pub fraction: f64,
    /// Fixed seed for reproducible noise; `None` draws from OS entropy
    pub seed: Option<u64>,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self { enabled: true, fraction: DEFAULT_NOISE_FRACTION, seed: Some(42) }
    }
}

impl NoiseConfig {
    pub fn disabled() -> Self {
        Self { enabled: false, ..Self::default() }
    }

    pub fn validate(&self) -> QsmResult<()> {
        if !(0.0..=1.0).contains(&self.fraction) {
            return Err(QsmError::InvalidParameter(format!(
                "noise fraction {} outside [0, 1]",
                self.fraction
            )));
        }
        Ok(())
    }
}

/// Standard deviation for a clean field: fraction of its peak magnitude
pub fn noise_sigma(clean_field: &[f64], fraction: f64) -> f64 {
    fraction * crate::utils::simd_ops::max_abs_f64(clean_field)
}

/// Box-Muller Gaussian generator
pub struct GaussianNoise {
    rng: StdRng,
}

impl GaussianNoise {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// Pair of independent standard normal samples
    pub fn sample_pair(&mut self) -> (f64, f64) {
        let u1: f64 = self.rng.gen::<f64>().max(1e-300);
        let u2: f64 = self.rng.gen::<f64>();
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * std::f64::consts::PI * u2;
        (r * theta.cos(), r * theta.sin())
    }

    /// `n` independent samples with the given standard deviation
    pub fn generate(&mut self, n: usize, sigma: f64) -> Vec<f64> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            let (a, b) = self.sample_pair();
            out.push(a * sigma);
            if out.len() < n {
                out.push(b * sigma);
            }
        }
        out
    }
}
