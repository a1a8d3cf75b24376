//! Volume containers
//!
//! All volumes are flattened with x fastest:
//! index = x + y*nx + z*nx*ny

use serde::{Deserialize, Serialize};

use crate::error::{QsmError, QsmResult};

/// Index into a flattened 3D array (x fastest)
#[inline(always)]
pub fn idx3d(i: usize, j: usize, k: usize, nx: usize, ny: usize) -> usize {
    i + j * nx + k * nx * ny
}

/// Grid dimensions (nx, ny, nz)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dims {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl Dims {
    pub const fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self { nx, ny, nz }
    }

    /// Total voxel count
    #[inline]
    pub fn len(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline(always)]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        idx3d(i, j, k, self.nx, self.ny)
    }

    pub fn as_array(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    /// Grid centre in index space (zero frequency after shifting)
    pub fn center(&self) -> (usize, usize, usize) {
        (self.nx / 2, self.ny / 2, self.nz / 2)
    }

    fn axes(&self) -> [(char, usize); 3] {
        [('x', self.nx), ('y', self.ny), ('z', self.nz)]
    }

    /// Every axis must be a power of two for the radix-2 FFT
    pub fn validate_fft(&self) -> QsmResult<()> {
        for (axis, len) in self.axes() {
            if !len.is_power_of_two() {
                return Err(QsmError::NonPowerOfTwo { axis, len });
            }
        }
        Ok(())
    }

    /// Every axis must be even (or 1) for the octant swap
    pub fn validate_shift(&self) -> QsmResult<()> {
        for (axis, len) in self.axes() {
            if len != 1 && len % 2 != 0 {
                return Err(QsmError::OddShiftDimension { axis, len });
            }
        }
        Ok(())
    }
}

impl From<[usize; 3]> for Dims {
    fn from(d: [usize; 3]) -> Self {
        Dims::new(d[0], d[1], d[2])
    }
}

/// Physical voxel spacing in mm
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoxelSize {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl VoxelSize {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub const fn isotropic(v: f64) -> Self {
        Self { x: v, y: v, z: v }
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Spacing must be finite and positive, and the ratio of each axis to the
    /// finest one must be an integer (e.g. 1 x 1 x 2 mm slabs).
    pub fn validate(&self) -> QsmResult<()> {
        let v = self.as_array();
        for (axis, &s) in ['x', 'y', 'z'].iter().zip(v.iter()) {
            if !s.is_finite() || s <= 0.0 {
                return Err(QsmError::InvalidVoxelSize(format!("{axis} spacing {s}")));
            }
        }

        let finest = v.iter().cloned().fold(f64::INFINITY, f64::min);
        for &s in &v {
            let ratio = s / finest;
            if (ratio - ratio.round()).abs() > 1e-6 {
                return Err(QsmError::Anisotropy { ratio });
            }
        }
        Ok(())
    }
}

impl Default for VoxelSize {
    fn default() -> Self {
        Self::isotropic(1.0)
    }
}

impl From<[f64; 3]> for VoxelSize {
    fn from(v: [f64; 3]) -> Self {
        VoxelSize::new(v[0], v[1], v[2])
    }
}

/// Scalar field over a 3D grid
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    dims: Dims,
    data: Vec<f64>,
}

impl Volume {
    pub fn zeros(dims: Dims) -> Self {
        Self { dims, data: vec![0.0; dims.len()] }
    }

    /// Wrap an existing buffer; its length must equal nx*ny*nz
    pub fn from_vec(dims: Dims, data: Vec<f64>) -> QsmResult<Self> {
        if data.len() != dims.len() {
            return Err(QsmError::LengthMismatch { expected: dims.len(), actual: data.len() });
        }
        Ok(Self { dims, data })
    }

    pub fn dims(&self) -> Dims {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize, k: usize) -> f64 {
        self.data[self.dims.index(i, j, k)]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, k: usize, value: f64) {
        let idx = self.dims.index(i, j, k);
        self.data[idx] = value;
    }

    /// Largest absolute value (0 for an empty or all-zero volume)
    pub fn max_abs(&self) -> f64 {
        crate::utils::simd_ops::max_abs_f64(&self.data)
    }
}

/// Paired real/imaginary buffers used during spectral operations
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexVolume {
    dims: Dims,
    pub re: Vec<f64>,
    pub im: Vec<f64>,
}

impl ComplexVolume {
    pub fn zeros(dims: Dims) -> Self {
        Self { dims, re: vec![0.0; dims.len()], im: vec![0.0; dims.len()] }
    }

    /// Real volume with zero imaginary part
    pub fn from_real(volume: &Volume) -> Self {
        Self {
            dims: volume.dims(),
            re: volume.data().to_vec(),
            im: vec![0.0; volume.len()],
        }
    }

    pub fn from_parts(dims: Dims, re: Vec<f64>, im: Vec<f64>) -> QsmResult<Self> {
        if re.len() != dims.len() {
            return Err(QsmError::LengthMismatch { expected: dims.len(), actual: re.len() });
        }
        if im.len() != dims.len() {
            return Err(QsmError::LengthMismatch { expected: dims.len(), actual: im.len() });
        }
        Ok(Self { dims, re, im })
    }

    /// Real-only volume; `re.len()` must equal `dims.len()`
    pub(crate) fn real_only(dims: Dims, re: Vec<f64>) -> Self {
        debug_assert_eq!(re.len(), dims.len());
        let im = vec![0.0; re.len()];
        Self { dims, re, im }
    }

    pub fn dims(&self) -> Dims {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.re.len()
    }

    pub fn is_empty(&self) -> bool {
        self.re.is_empty()
    }

    /// Drop the imaginary part
    pub fn into_real(self) -> Volume {
        Volume { dims: self.dims, data: self.re }
    }

    /// Octant swap moving zero frequency to the grid centre (self-inverse)
    pub fn fftshift(&mut self) -> QsmResult<()> {
        crate::fft::fftshift3d(&mut self.re, self.dims)?;
        crate::fft::fftshift3d(&mut self.im, self.dims)
    }

    /// Element-wise multiply by a real multiplier of the same shape
    pub fn scale_by(&mut self, multiplier: &[f64]) -> QsmResult<()> {
        if multiplier.len() != self.len() {
            return Err(QsmError::LengthMismatch { expected: self.len(), actual: multiplier.len() });
        }
        crate::utils::simd_ops::multiply_inplace_f64(&mut self.re, multiplier);
        crate::utils::simd_ops::multiply_inplace_f64(&mut self.im, multiplier);
        Ok(())
    }
}
