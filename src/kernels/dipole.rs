//! Dipole kernel for QSM
//!
//! The dipole kernel describes the relationship between magnetic susceptibility
//! and the induced magnetic field in MRI. In k-space:
//!
//! D(k) = 1/3 - (k·B)² / |k|²
//!
//! where B is the unit main-field direction. The field is tilted within the
//! y-z plane, B = (0, sin θ, cos θ), so θ = 0 points along z.
//!
//! Kernels here are stored in the centered layout (zero frequency at
//! (nx/2, ny/2, nz/2)), i.e. they multiply a spectrum that has been passed
//! through `fftshift3d`.

use serde::{Deserialize, Serialize};

use crate::error::{QsmError, QsmResult};
use crate::fft::centered_freq;
use crate::volume::{ComplexVolume, Dims, VoxelSize};

const ONE_THIRD: f64 = 1.0 / 3.0;

/// Unit field direction for a tilt (degrees) in the y-z plane
pub fn field_direction(tilt_deg: f64) -> [f64; 3] {
    let t = tilt_deg.to_radians();
    [0.0, t.sin(), t.cos()]
}

/// Kernel metadata exposed for diagnostic display
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelInfo {
    pub tilt_deg: f64,
    pub direction: [f64; 3],
}

/// Real-valued frequency-domain dipole kernel over one grid
#[derive(Debug, Clone)]
pub struct DipoleKernel {
    dims: Dims,
    voxel_size: VoxelSize,
    tilt_deg: f64,
    direction: [f64; 3],
    values: Vec<f64>,
}

impl DipoleKernel {
    /// Kernel on normalized frequencies k = (index - center) / dimension
    pub fn new(dims: Dims, tilt_deg: f64) -> QsmResult<Self> {
        Self::build(dims, VoxelSize::isotropic(1.0), tilt_deg)
    }

    /// Kernel on physical frequencies k = (index - center) / (dimension * spacing)
    ///
    /// Identical to `new` for isotropic voxels; keeps the dipole geometry
    /// consistent with the rasterized sources on anisotropic grids.
    pub fn with_voxel_size(dims: Dims, voxel_size: VoxelSize, tilt_deg: f64) -> QsmResult<Self> {
        voxel_size.validate()?;
        Self::build(dims, voxel_size, tilt_deg)
    }

    fn build(dims: Dims, voxel_size: VoxelSize, tilt_deg: f64) -> QsmResult<Self> {
        if !tilt_deg.is_finite() {
            return Err(QsmError::InvalidParameter(format!("field tilt {tilt_deg} is not finite")));
        }
        dims.validate_shift()?;

        let Dims { nx, ny, nz } = dims;
        let kx = centered_freq(nx, voxel_size.x);
        let ky = centered_freq(ny, voxel_size.y);
        let kz = centered_freq(nz, voxel_size.z);

        let direction = field_direction(tilt_deg);
        let [bx, by, bz] = direction;

        let mut values = vec![0.0; dims.len()];
        for k in 0..nz {
            let kz_val = kz[k];
            for j in 0..ny {
                let ky_val = ky[j];
                for i in 0..nx {
                    let kx_val = kx[i];

                    let k_dot_b = kx_val * bx + ky_val * by + kz_val * bz;
                    let k_squared = kx_val * kx_val + ky_val * ky_val + kz_val * kz_val;

                    // DC term stays 0
                    if k_squared > 1e-20 {
                        values[dims.index(i, j, k)] = ONE_THIRD - (k_dot_b * k_dot_b) / k_squared;
                    }
                }
            }
        }

        Ok(Self { dims, voxel_size, tilt_deg, direction, values })
    }

    pub fn dims(&self) -> Dims {
        self.dims
    }

    pub fn voxel_size(&self) -> VoxelSize {
        self.voxel_size
    }

    pub fn tilt_deg(&self) -> f64 {
        self.tilt_deg
    }

    pub fn direction(&self) -> [f64; 3] {
        self.direction
    }

    pub fn info(&self) -> KernelInfo {
        KernelInfo { tilt_deg: self.tilt_deg, direction: self.direction }
    }

    /// Kernel values in centered layout
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize, k: usize) -> f64 {
        self.values[self.dims.index(i, j, k)]
    }

    /// True when this kernel can be reused for the given grid and direction
    pub fn matches(&self, dims: Dims, voxel_size: VoxelSize, tilt_deg: f64) -> bool {
        self.dims == dims && self.voxel_size == voxel_size && self.tilt_deg == tilt_deg
    }

    /// Kernel as a real-only complex volume (imaginary part all zero)
    pub fn as_complex(&self) -> ComplexVolume {
        ComplexVolume::real_only(self.dims, self.values.clone())
    }
}

/// Fixed viewing plane for the planar kernel approximation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlicePlane {
    /// Slice perpendicular to the field: no dipole pattern at all
    Axial,
    /// Field lies along the slice's second (row) axis
    Coronal,
    /// Field lies along the slice's second (row) axis
    Sagittal,
}

/// Planar dipole kernel for an `n1` x `n2` slice (row-major, centered layout)
///
/// Axial gives the constant 1/3 everywhere, including the zero-frequency
/// bin. Coronal and sagittal give D = 1/3 - k2² / (k1² + k2²), where k2 is
/// the frequency along the in-plane field axis, and 0 at DC.
pub fn dipole_kernel_2d(n1: usize, n2: usize, plane: SlicePlane) -> QsmResult<Vec<f64>> {
    Dims::new(n1, n2, 1).validate_shift()?;

    if plane == SlicePlane::Axial {
        return Ok(vec![ONE_THIRD; n1 * n2]);
    }

    let k1 = centered_freq(n1, 1.0);
    let k2 = centered_freq(n2, 1.0);

    let mut d = vec![0.0; n1 * n2];
    for j in 0..n2 {
        for i in 0..n1 {
            let k_squared = k1[i] * k1[i] + k2[j] * k2[j];
            if k_squared > 1e-20 {
                d[i + j * n1] = ONE_THIRD - (k2[j] * k2[j]) / k_squared;
            }
        }
    }
    Ok(d)
}
