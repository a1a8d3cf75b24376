//! Forward model: susceptibility to field perturbation
//!
//! field = real(ifft(unshift(D · shift(fft(χ))))) followed by additive
//! Gaussian noise with sigma = fraction · max|field|. The clean field and
//! the noise realization are kept separately so inversions can be repeated
//! against the identical noise.

use num_complex::Complex64;
use std::time::Instant;
use tracing::{debug, info};

use crate::error::{QsmError, QsmResult};
use crate::fft::{fft2d, fftshift2d, ifft2d, Fft3dWorkspace};
use crate::kernels::dipole::{dipole_kernel_2d, DipoleKernel, SlicePlane};
use crate::noise::{noise_sigma, GaussianNoise, NoiseConfig};
use crate::utils::simd_ops::add_inplace_f64;
use crate::volume::Volume;

/// Output of one forward run
#[derive(Debug, Clone)]
pub struct ForwardResult {
    /// Field before noise
    pub clean: Volume,
    /// The noise realization that was added
    pub noise: Volume,
    /// clean + noise
    pub noisy: Volume,
    /// Standard deviation used to draw `noise`
    pub sigma: f64,
}

/// Clean field induced by a susceptibility volume
pub fn forward_field(
    chi: &Volume,
    kernel: &DipoleKernel,
    workspace: &mut Fft3dWorkspace,
) -> QsmResult<Volume> {
    if chi.dims() != kernel.dims() {
        return Err(QsmError::LengthMismatch { expected: kernel.dims().len(), actual: chi.len() });
    }
    workspace.apply_centered_kernel(chi, kernel.values())
}

/// Add calibrated Gaussian noise to a clean field
pub fn add_noise(clean: Volume, config: &NoiseConfig) -> QsmResult<ForwardResult> {
    config.validate()?;
    let dims = clean.dims();

    if !config.enabled {
        return Ok(ForwardResult {
            noisy: clean.clone(),
            clean,
            noise: Volume::zeros(dims),
            sigma: 0.0,
        });
    }

    let sigma = noise_sigma(clean.data(), config.fraction);
    let samples = GaussianNoise::new(config.seed).generate(dims.len(), sigma);
    let noise = Volume::from_vec(dims, samples)?;
    debug!(sigma, seeded = config.seed.is_some(), "drew field noise");

    let mut noisy = clean.clone();
    add_inplace_f64(noisy.data_mut(), noise.data());

    Ok(ForwardResult { clean, noise, noisy, sigma })
}

/// Full forward model: clean field plus noise
pub fn simulate_field(
    chi: &Volume,
    kernel: &DipoleKernel,
    workspace: &mut Fft3dWorkspace,
    noise: &NoiseConfig,
) -> QsmResult<ForwardResult> {
    let start = Instant::now();
    let clean = forward_field(chi, kernel, workspace)?;
    let result = add_noise(clean, noise)?;

    let d = chi.dims();
    info!(
        nx = d.nx, ny = d.ny, nz = d.nz,
        tilt_deg = kernel.tilt_deg(),
        sigma = result.sigma,
        elapsed = ?start.elapsed(),
        "forward model complete"
    );
    Ok(result)
}

/// Planar forward model on a single `n1` x `n2` slice (row-major)
///
/// Uses the 2D kernel for a fixed viewing plane; the axial plane returns the
/// slice scaled by 1/3 with its DC intact.
pub fn forward_slice_2d(
    slice: &[f64],
    n1: usize,
    n2: usize,
    plane: SlicePlane,
) -> QsmResult<Vec<f64>> {
    if slice.len() != n1 * n2 {
        return Err(QsmError::LengthMismatch { expected: n1 * n2, actual: slice.len() });
    }
    let kernel = dipole_kernel_2d(n1, n2, plane)?;

    let mut spectrum: Vec<Complex64> = slice.iter().map(|&x| Complex64::new(x, 0.0)).collect();
    fft2d(&mut spectrum, n1, n2)?;
    fftshift2d(&mut spectrum, n1, n2)?;
    for (c, &d) in spectrum.iter_mut().zip(kernel.iter()) {
        *c *= d;
    }
    fftshift2d(&mut spectrum, n1, n2)?;
    ifft2d(&mut spectrum, n1, n2)?;

    Ok(spectrum.iter().map(|c| c.re).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phantom::{rasterize, SusceptibilitySource};
    use crate::utils::metrics::std_dev;
    use crate::volume::{Dims, VoxelSize};

    fn sphere_setup(n: usize) -> (Volume, DipoleKernel, Fft3dWorkspace) {
        let dims = Dims::new(n, n, n);
        let chi = rasterize(
            &[SusceptibilitySource::sphere([0.0; 3], 4.0, 1.0)],
            dims,
            VoxelSize::isotropic(1.0),
        )
        .unwrap();
        let kernel = DipoleKernel::new(dims, 0.0).unwrap();
        let ws = Fft3dWorkspace::new(dims).unwrap();
        (chi, kernel, ws)
    }

    #[test]
    fn test_zero_chi_gives_zero_field() {
        let dims = Dims::new(8, 8, 8);
        let kernel = DipoleKernel::new(dims, 0.0).unwrap();
        let mut ws = Fft3dWorkspace::new(dims).unwrap();
        let field = forward_field(&Volume::zeros(dims), &kernel, &mut ws).unwrap();
        assert!(field.data().iter().all(|v| v.abs() < 1e-15));
    }

    #[test]
    fn test_field_has_zero_mean() {
        // DC of the kernel is 0, so the field carries no offset
        let (chi, kernel, mut ws) = sphere_setup(16);
        let field = forward_field(&chi, &kernel, &mut ws).unwrap();
        let mean: f64 = field.data().iter().sum::<f64>() / field.len() as f64;
        assert!(mean.abs() < 1e-12, "field mean {}", mean);
    }

    #[test]
    fn test_noise_calibration() {
        let (chi, kernel, mut ws) = sphere_setup(32);
        let result = simulate_field(&chi, &kernel, &mut ws, &NoiseConfig::default()).unwrap();

        let expected = 0.02 * result.clean.max_abs();
        assert!((result.sigma - expected).abs() < 1e-15);
        let sd = std_dev(result.noise.data());
        assert!(
            (sd - expected).abs() / expected < 0.05,
            "noise std {} vs sigma {}", sd, expected
        );

        for i in 0..result.noisy.len() {
            let sum = result.clean.data()[i] + result.noise.data()[i];
            assert!((result.noisy.data()[i] - sum).abs() < 1e-15);
        }
    }

    #[test]
    fn test_noise_disabled() {
        let (chi, kernel, mut ws) = sphere_setup(8);
        let result = simulate_field(&chi, &kernel, &mut ws, &NoiseConfig::disabled()).unwrap();
        assert_eq!(result.sigma, 0.0);
        assert_eq!(result.noisy, result.clean);
        assert!(result.noise.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_dimension_mismatch() {
        let dims = Dims::new(8, 8, 8);
        let kernel = DipoleKernel::new(dims, 0.0).unwrap();
        let mut ws = Fft3dWorkspace::new(dims).unwrap();
        let chi = Volume::zeros(Dims::new(8, 8, 4));
        assert!(matches!(
            forward_field(&chi, &kernel, &mut ws),
            Err(QsmError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_axial_slice_has_no_dipole_pattern() {
        let (n1, n2) = (16, 16);
        let slice: Vec<f64> = (0..n1 * n2).map(|i| ((i % 7) as f64) - 2.0).collect();
        let field = forward_slice_2d(&slice, n1, n2, SlicePlane::Axial).unwrap();
        for (f, s) in field.iter().zip(slice.iter()) {
            assert!((f - s / 3.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_coronal_slice_lobes() {
        // Disc in a coronal slice: positive lobes along the field (row) axis,
        // negative beside it
        let n = 32;
        let mut slice = vec![0.0; n * n];
        for y in 0..n {
            for x in 0..n {
                let dx = x as f64 - 16.0;
                let dy = y as f64 - 16.0;
                if dx * dx + dy * dy <= 16.0 {
                    slice[x + y * n] = 1.0;
                }
            }
        }
        let field = forward_slice_2d(&slice, n, n, SlicePlane::Coronal).unwrap();
        assert!(field[16 + 22 * n] > 0.0);
        assert!(field[22 + 16 * n] < 0.0);
    }
}
