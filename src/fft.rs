//! Radix-2 FFT engine for 1D, 2D and 3D transforms
//!
//! Iterative Cooley-Tukey with an in-place bit-reversal permutation followed
//! by log2(N) butterfly stages. Twiddles are advanced by complex rotation
//! from one exact unit root per stage. Higher-dimensional transforms are
//! successive 1D sweeps (x, then y, then z) over gathered lines.
//!
//! The inverse transform scales every 1D result by 1/N, so a 3D inverse
//! carries the full 1/(nx*ny*nz) normalization.

use num_complex::Complex64;
use std::f64::consts::PI;

use crate::error::{QsmError, QsmResult};
use crate::volume::{idx3d, ComplexVolume, Dims, Volume};

/// Transform direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FftDirection {
    /// Spatial to spectral, exp(-2πi nk/N)
    Forward,
    /// Spectral to spatial, exp(+2πi nk/N) and 1/N scaling
    Inverse,
}

/// Precomputed bit-reversal table and per-stage roots for one length
#[derive(Debug, Clone)]
pub struct Radix2Plan {
    n: usize,
    bitrev: Vec<usize>,
    // Forward unit root exp(-2πi/len) for len = 2, 4, ..., n
    stage_roots: Vec<Complex64>,
}

impl Radix2Plan {
    /// Plan a transform of length `n` along the named axis
    pub fn for_axis(axis: char, n: usize) -> QsmResult<Self> {
        if !n.is_power_of_two() {
            return Err(QsmError::NonPowerOfTwo { axis, len: n });
        }

        let bits = n.trailing_zeros();
        let bitrev = (0..n)
            .map(|i| if bits == 0 { 0 } else { i.reverse_bits() >> (usize::BITS - bits) })
            .collect();

        let mut stage_roots = Vec::with_capacity(bits as usize);
        let mut len = 2;
        while len <= n {
            let angle = -2.0 * PI / len as f64;
            stage_roots.push(Complex64::new(angle.cos(), angle.sin()));
            len <<= 1;
        }

        Ok(Self { n, bitrev, stage_roots })
    }

    /// Plan a transform of length `n`
    pub fn new(n: usize) -> QsmResult<Self> {
        Self::for_axis('x', n)
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// In-place transform of exactly `len()` samples
    pub fn process(&self, data: &mut [Complex64], direction: FftDirection) {
        let n = self.n;
        debug_assert_eq!(data.len(), n);
        if n <= 1 {
            return;
        }

        for i in 0..n {
            let j = self.bitrev[i];
            if i < j {
                data.swap(i, j);
            }
        }

        let mut len = 2;
        for &root in &self.stage_roots {
            let step = match direction {
                FftDirection::Forward => root,
                FftDirection::Inverse => root.conj(),
            };
            let half = len / 2;
            for start in (0..n).step_by(len) {
                let mut w = Complex64::new(1.0, 0.0);
                for k in 0..half {
                    let u = data[start + k];
                    let v = data[start + k + half] * w;
                    data[start + k] = u + v;
                    data[start + k + half] = u - v;
                    w *= step;
                }
            }
            len <<= 1;
        }

        if direction == FftDirection::Inverse {
            let scale = 1.0 / n as f64;
            for val in data.iter_mut() {
                *val *= scale;
            }
        }
    }
}

/// FFT workspace that caches per-axis plans and line buffers for one grid
pub struct Fft3dWorkspace {
    dims: Dims,
    plan_x: Radix2Plan,
    plan_y: Radix2Plan,
    plan_z: Radix2Plan,
    buffer_x: Vec<Complex64>,
    buffer_y: Vec<Complex64>,
    buffer_z: Vec<Complex64>,
}

impl Fft3dWorkspace {
    /// Create a workspace; every axis must be a power of two
    pub fn new(dims: Dims) -> QsmResult<Self> {
        let plan_x = Radix2Plan::for_axis('x', dims.nx)?;
        let plan_y = Radix2Plan::for_axis('y', dims.ny)?;
        let plan_z = Radix2Plan::for_axis('z', dims.nz)?;

        let zero = Complex64::new(0.0, 0.0);
        Ok(Self {
            dims,
            plan_x,
            plan_y,
            plan_z,
            buffer_x: vec![zero; dims.nx],
            buffer_y: vec![zero; dims.ny],
            buffer_z: vec![zero; dims.nz],
        })
    }

    pub fn dims(&self) -> Dims {
        self.dims
    }

    /// In-place forward 3D FFT
    pub fn fft3d(&mut self, data: &mut ComplexVolume) -> QsmResult<()> {
        self.transform(data, FftDirection::Forward)
    }

    /// In-place inverse 3D FFT (with normalization)
    pub fn ifft3d(&mut self, data: &mut ComplexVolume) -> QsmResult<()> {
        self.transform(data, FftDirection::Inverse)
    }

    /// Spectral filtering of a real volume by a centered real multiplier:
    /// out = real(ifft(unshift(M · shift(fft(x)))))
    pub fn apply_centered_kernel(
        &mut self,
        input: &Volume,
        multiplier: &[f64],
    ) -> QsmResult<Volume> {
        if input.dims() != self.dims {
            return Err(QsmError::LengthMismatch { expected: self.dims.len(), actual: input.len() });
        }

        let mut spectrum = ComplexVolume::from_real(input);
        self.fft3d(&mut spectrum)?;
        spectrum.fftshift()?;
        spectrum.scale_by(multiplier)?;
        spectrum.fftshift()?;
        self.ifft3d(&mut spectrum)?;

        Ok(spectrum.into_real())
    }

    fn transform(&mut self, data: &mut ComplexVolume, direction: FftDirection) -> QsmResult<()> {
        if data.dims() != self.dims {
            return Err(QsmError::LengthMismatch { expected: self.dims.len(), actual: data.len() });
        }
        let Dims { nx, ny, nz } = self.dims;

        // Transform along x-axis
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let idx = idx3d(i, j, k, nx, ny);
                    self.buffer_x[i] = Complex64::new(data.re[idx], data.im[idx]);
                }
                self.plan_x.process(&mut self.buffer_x, direction);
                for i in 0..nx {
                    let idx = idx3d(i, j, k, nx, ny);
                    data.re[idx] = self.buffer_x[i].re;
                    data.im[idx] = self.buffer_x[i].im;
                }
            }
        }

        // Transform along y-axis
        for k in 0..nz {
            for i in 0..nx {
                for j in 0..ny {
                    let idx = idx3d(i, j, k, nx, ny);
                    self.buffer_y[j] = Complex64::new(data.re[idx], data.im[idx]);
                }
                self.plan_y.process(&mut self.buffer_y, direction);
                for j in 0..ny {
                    let idx = idx3d(i, j, k, nx, ny);
                    data.re[idx] = self.buffer_y[j].re;
                    data.im[idx] = self.buffer_y[j].im;
                }
            }
        }

        // Transform along z-axis
        for j in 0..ny {
            for i in 0..nx {
                for k in 0..nz {
                    let idx = idx3d(i, j, k, nx, ny);
                    self.buffer_z[k] = Complex64::new(data.re[idx], data.im[idx]);
                }
                self.plan_z.process(&mut self.buffer_z, direction);
                for k in 0..nz {
                    let idx = idx3d(i, j, k, nx, ny);
                    data.re[idx] = self.buffer_z[k].re;
                    data.im[idx] = self.buffer_z[k].im;
                }
            }
        }

        Ok(())
    }
}

/// 1D forward FFT (in-place)
pub fn fft1d(data: &mut [Complex64]) -> QsmResult<()> {
    Radix2Plan::new(data.len())?.process(data, FftDirection::Forward);
    Ok(())
}

/// 1D inverse FFT (in-place, includes 1/N)
pub fn ifft1d(data: &mut [Complex64]) -> QsmResult<()> {
    Radix2Plan::new(data.len())?.process(data, FftDirection::Inverse);
    Ok(())
}

/// 2D FFT over a row-major `width` x `height` plane: every row, then every column
pub fn fft2d(data: &mut [Complex64], width: usize, height: usize) -> QsmResult<()> {
    transform2d(data, width, height, FftDirection::Forward)
}

/// 2D inverse FFT (includes 1/(width*height))
pub fn ifft2d(data: &mut [Complex64], width: usize, height: usize) -> QsmResult<()> {
    transform2d(data, width, height, FftDirection::Inverse)
}

fn transform2d(
    data: &mut [Complex64],
    width: usize,
    height: usize,
    direction: FftDirection,
) -> QsmResult<()> {
    if data.len() != width * height {
        return Err(QsmError::LengthMismatch { expected: width * height, actual: data.len() });
    }
    let plan_row = Radix2Plan::for_axis('x', width)?;
    let plan_col = Radix2Plan::for_axis('y', height)?;

    for row in data.chunks_exact_mut(width) {
        plan_row.process(row, direction);
    }

    let mut column = vec![Complex64::new(0.0, 0.0); height];
    for x in 0..width {
        for y in 0..height {
            column[y] = data[x + y * width];
        }
        plan_col.process(&mut column, direction);
        for y in 0..height {
            data[x + y * width] = column[y];
        }
    }
    Ok(())
}

/// 3D forward FFT (in-place); plans on the fly
pub fn fft3d(data: &mut ComplexVolume) -> QsmResult<()> {
    Fft3dWorkspace::new(data.dims())?.fft3d(data)
}

/// 3D inverse FFT (in-place, includes 1/N); plans on the fly
pub fn ifft3d(data: &mut ComplexVolume) -> QsmResult<()> {
    Fft3dWorkspace::new(data.dims())?.ifft3d(data)
}

/// 2D FFT shift: swap quadrants so zero frequency sits at (width/2, height/2)
///
/// Self-inverse for even dimensions, so the same call undoes it.
pub fn fftshift2d<T>(data: &mut [T], width: usize, height: usize) -> QsmResult<()> {
    fftshift3d(data, Dims::new(width, height, 1))
}

/// 3D FFT shift in-place: swap octants pairwise
///
/// Every axis must be even (a length-1 axis is left alone). Under that
/// condition the swap is its own inverse.
pub fn fftshift3d<T>(data: &mut [T], dims: Dims) -> QsmResult<()> {
    if data.len() != dims.len() {
        return Err(QsmError::LengthMismatch { expected: dims.len(), actual: data.len() });
    }
    dims.validate_shift()?;

    let Dims { nx, ny, nz } = dims;
    let (hx, hy, hz) = (nx / 2, ny / 2, nz / 2);

    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let src = idx3d(i, j, k, nx, ny);
                let dst = idx3d((i + hx) % nx, (j + hy) % ny, (k + hz) % nz, nx, ny);
                // Only swap once per pair
                if src < dst {
                    data.swap(src, dst);
                }
            }
        }
    }
    Ok(())
}

/// Centered frequency coordinate (i - n/2) / (n * spacing) for each index
///
/// Matches the layout produced by `fftshift3d` after a forward transform.
pub fn centered_freq(n: usize, spacing: f64) -> Vec<f64> {
    let c = (n / 2) as f64;
    let scale = 1.0 / (n as f64 * spacing);
    (0..n).map(|i| (i as f64 - c) * scale).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_dft(input: &[Complex64]) -> Vec<Complex64> {
        let n = input.len();
        (0..n)
            .map(|k| {
                input.iter().enumerate().fold(Complex64::new(0.0, 0.0), |acc, (t, &x)| {
                    let angle = -2.0 * PI * (k * t) as f64 / n as f64;
                    acc + x * Complex64::new(angle.cos(), angle.sin())
                })
            })
            .collect()
    }

    #[test]
    fn test_fft1d_matches_direct_dft() {
        let input: Vec<Complex64> = (0..16)
            .map(|i| Complex64::new((i as f64 * 0.7).sin(), (i as f64 * 0.3).cos()))
            .collect();
        let expected = naive_dft(&input);

        let mut data = input.clone();
        fft1d(&mut data).unwrap();

        for (i, (a, b)) in data.iter().zip(expected.iter()).enumerate() {
            assert!((a - b).norm() < 1e-10, "bin {}: {} vs {}", i, a, b);
        }
    }

    #[test]
    fn test_fft1d_impulse_is_flat() {
        let mut data = vec![Complex64::new(0.0, 0.0); 8];
        data[0] = Complex64::new(1.0, 0.0);
        fft1d(&mut data).unwrap();
        for v in &data {
            assert!((v.re - 1.0).abs() < 1e-12 && v.im.abs() < 1e-12);
        }
    }

    #[test]
    fn test_fft1d_length_one_is_identity() {
        let mut data = vec![Complex64::new(3.5, -1.0)];
        fft1d(&mut data).unwrap();
        assert_eq!(data[0], Complex64::new(3.5, -1.0));
    }

    #[test]
    fn test_non_power_of_two_rejected() {
        let mut data = vec![Complex64::new(0.0, 0.0); 12];
        assert!(matches!(fft1d(&mut data), Err(QsmError::NonPowerOfTwo { len: 12, .. })));

        let mut vol = ComplexVolume::zeros(Dims::new(8, 6, 4));
        assert!(matches!(
            fft3d(&mut vol),
            Err(QsmError::NonPowerOfTwo { axis: 'y', len: 6 })
        ));
    }

    #[test]
    fn test_fft_ifft_roundtrip() {
        let dims = Dims::new(8, 4, 2);
        let original: Vec<f64> =
            (0..dims.len()).map(|i| (i as f64 * 0.37).sin() + 0.1 * i as f64).collect();
        let mut data = ComplexVolume::from_real(&Volume::from_vec(dims, original.clone()).unwrap());

        let mut ws = Fft3dWorkspace::new(dims).unwrap();
        ws.fft3d(&mut data).unwrap();
        ws.ifft3d(&mut data).unwrap();

        for (i, &orig) in original.iter().enumerate() {
            assert!(
                (data.re[i] - orig).abs() < 1e-10,
                "Mismatch at index {}: expected {}, got {}",
                i, orig, data.re[i]
            );
            assert!(data.im[i].abs() < 1e-10, "Imaginary part not zero at index {}", i);
        }
    }

    #[test]
    fn test_fft3d_dc_is_sum() {
        let dims = Dims::new(4, 4, 4);
        let values: Vec<f64> = (0..dims.len()).map(|i| i as f64).collect();
        let sum: f64 = values.iter().sum();
        let mut data = ComplexVolume::from_real(&Volume::from_vec(dims, values).unwrap());
        fft3d(&mut data).unwrap();
        assert!((data.re[0] - sum).abs() < 1e-9);
        assert!(data.im[0].abs() < 1e-9);
    }

    #[test]
    fn test_fft2d_roundtrip() {
        let (w, h) = (8, 4);
        let original: Vec<Complex64> = (0..w * h)
            .map(|i| Complex64::new(i as f64, -(i as f64) * 0.5))
            .collect();
        let mut data = original.clone();
        fft2d(&mut data, w, h).unwrap();
        ifft2d(&mut data, w, h).unwrap();
        for (a, b) in data.iter().zip(original.iter()) {
            assert!((a - b).norm() < 1e-10);
        }
    }

    #[test]
    fn test_fftshift3d_moves_origin_to_center() {
        let dims = Dims::new(4, 4, 4);
        let mut data: Vec<f64> = (0..dims.len()).map(|i| i as f64).collect();
        fftshift3d(&mut data, dims).unwrap();

        // (0,0,0) -> (2,2,2) and (1,1,1) -> (3,3,3)
        assert_eq!(data[dims.index(2, 2, 2)], 0.0);
        assert_eq!(data[dims.index(3, 3, 3)], dims.index(1, 1, 1) as f64);

        // Second application restores the original
        fftshift3d(&mut data, dims).unwrap();
        for (i, &v) in data.iter().enumerate() {
            assert_eq!(v, i as f64);
        }
    }

    #[test]
    fn test_fftshift2d_quadrants() {
        let (w, h) = (4, 2);
        let mut data: Vec<u32> = (0..8).collect();
        fftshift2d(&mut data, w, h).unwrap();
        // Row 0 <- row 1 shifted by 2, row 1 <- row 0 shifted by 2
        assert_eq!(data, vec![6, 7, 4, 5, 2, 3, 0, 1]);
    }

    #[test]
    fn test_fftshift_rejects_odd_axis() {
        let dims = Dims::new(4, 3, 1);
        let mut data = vec![0.0; dims.len()];
        assert!(matches!(
            fftshift3d(&mut data, dims),
            Err(QsmError::OddShiftDimension { axis: 'y', len: 3 })
        ));
    }

    #[test]
    fn test_centered_freq() {
        let f = centered_freq(4, 1.0);
        assert_eq!(f, vec![-0.5, -0.25, 0.0, 0.25]);
        let f = centered_freq(4, 2.0);
        assert!((f[0] + 0.25).abs() < 1e-15);
    }
}
