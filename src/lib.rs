//! QSM-Sim: forward and inverse Quantitative Susceptibility Mapping simulation
//!
//! Builds a susceptibility phantom from geometric sources, computes the field
//! perturbation it induces through the dipole kernel, adds calibrated noise,
//! and reconstructs susceptibility by regularized k-space division.
//!
//! # Modules
//! - `volume`: Volume and ComplexVolume containers, grid dims, voxel size
//! - `fft`: Radix-2 FFT (1D/2D/3D) and zero-frequency centering shifts
//! - `kernels`: Dipole kernel (3D and planar 2D)
//! - `phantom`: Susceptibility sources and rasterization
//! - `noise`: Seeded Box-Muller Gaussian noise
//! - `forward`: Forward model (susceptibility to field)
//! - `inversion`: Dipole inversion (Tikhonov, TKD)
//! - `engine`: Simulation engine with cached state and `recompute()`
//! - `config`: Serializable simulation configuration
//! - `nifti_io`: NIfTI export/import
//! - `utils`: SIMD element-wise ops, comparison metrics

pub mod error;

// Core modules
pub mod fft;
pub mod volume;

// Model modules
pub mod forward;
pub mod inversion;
pub mod kernels;
pub mod noise;
pub mod phantom;

// Pipeline
pub mod config;
pub mod engine;

// I/O modules
pub mod nifti_io;

pub mod utils;

pub use config::SimulationConfig;
pub use engine::{ChangeKind, PipelineState, RecomputeOutcome, SimulationEngine};
pub use error::{QsmError, QsmResult};
pub use inversion::{Regularization, RegularizationMethod};
pub use kernels::dipole::{DipoleKernel, KernelInfo, SlicePlane};
pub use noise::NoiseConfig;
pub use phantom::{Shape, SusceptibilitySource};
pub use volume::{ComplexVolume, Dims, Volume, VoxelSize};
