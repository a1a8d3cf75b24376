//! Error types for the simulation pipeline

use thiserror::Error;

/// Result type for simulation operations
pub type QsmResult<T> = Result<T, QsmError>;

/// Errors raised while configuring or running the simulator
///
/// Every variant except `Io` and `Nifti` is a configuration error and is
/// reported before any transform starts.
#[derive(Error, Debug)]
pub enum QsmError {
    /// FFT axis length is not a power of two
    #[error("axis {axis} has length {len}, which is not a power of two")]
    NonPowerOfTwo { axis: char, len: usize },

    /// Centering shift needs even axes (length 1 is accepted)
    #[error("axis {axis} has odd length {len}; frequency shift needs even dimensions")]
    OddShiftDimension { axis: char, len: usize },

    /// Buffer length does not match the grid
    #[error("buffer length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Voxel size is zero, negative or non-finite
    #[error("invalid voxel size: {0}")]
    InvalidVoxelSize(String),

    /// Voxel spacing ratio between axes is not an integer
    #[error("voxel anisotropy ratio {ratio:.4} is not integral")]
    Anisotropy { ratio: f64 },

    /// Out-of-range simulation parameter
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Malformed configuration document
    #[error("configuration error: {0}")]
    Config(String),

    /// NIfTI encode/decode failure
    #[error("NIfTI error: {0}")]
    Nifti(String),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for QsmError {
    fn from(e: serde_json::Error) -> Self {
        QsmError::Config(e.to_string())
    }
}
