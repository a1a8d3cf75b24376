//! Common test utilities for QSM-sim integration tests

#![allow(dead_code)]

use qsm_sim::utils::metrics::{correlation, masked_mean, nrmse, rmse};
use qsm_sim::{
    NoiseConfig, Regularization, SimulationConfig, SimulationEngine, SusceptibilitySource, Volume,
};

/// Single centred sphere on an isotropic cube grid
pub struct SphereScenario {
    pub n: usize,
    pub radius: f64,
    pub susceptibility: f64,
}

impl Default for SphereScenario {
    fn default() -> Self {
        Self { n: 32, radius: 6.0, susceptibility: 1.0 }
    }
}

impl SphereScenario {
    pub fn config(&self, regularization: Regularization, noise: NoiseConfig) -> SimulationConfig {
        SimulationConfig {
            dims: [self.n; 3],
            voxel_size: [1.0; 3],
            tilt_deg: 0.0,
            physical_kernel: false,
            regularization,
            noise,
            sources: vec![SusceptibilitySource::sphere([0.0; 3], self.radius, self.susceptibility)],
        }
    }

    /// Engine after its first full recompute
    pub fn run(&self, regularization: Regularization, noise: NoiseConfig) -> SimulationEngine {
        let mut engine = SimulationEngine::new(self.config(regularization, noise)).unwrap();
        engine.recompute().unwrap();
        engine
    }

    /// Voxels strictly inside `fraction * radius` of the centre
    pub fn inner_mask(&self, fraction: f64) -> Vec<u8> {
        let n = self.n;
        let c = (n / 2) as f64;
        let r = fraction * self.radius;
        let mut mask = vec![0u8; n * n * n];
        for k in 0..n {
            for j in 0..n {
                for i in 0..n {
                    let (dx, dy, dz) = (i as f64 - c, j as f64 - c, k as f64 - c);
                    if dx * dx + dy * dy + dz * dz < r * r {
                        mask[i + j * n + k * n * n] = 1;
                    }
                }
            }
        }
        mask
    }
}

/// Mean of a volume over a mask
pub fn mean_in(volume: &Volume, mask: &[u8]) -> f64 {
    masked_mean(volume.data(), mask)
}

/// Values along the z axis through (i, j)
pub fn z_profile(volume: &Volume, i: usize, j: usize) -> Vec<f64> {
    (0..volume.dims().nz).map(|k| volume.get(i, j, k)).collect()
}

/// Summary of a reconstruction against ground truth
#[derive(Debug)]
pub struct TestResult {
    pub name: String,
    pub rmse: f64,
    pub nrmse: f64,
    pub correlation: f64,
}

impl TestResult {
    pub fn new(name: &str, output: &[f64], ground_truth: &[f64], mask: &[u8]) -> Self {
        TestResult {
            name: name.to_string(),
            rmse: rmse(output, ground_truth, mask),
            nrmse: nrmse(output, ground_truth, mask),
            correlation: correlation(output, ground_truth, mask),
        }
    }

    pub fn print(&self) {
        println!(
            "{:<15} RMSE={:.6}  NRMSE={:.4}  r={:.4}",
            self.name, self.rmse, self.nrmse, self.correlation
        );
    }
}
