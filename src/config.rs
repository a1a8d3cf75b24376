//! Simulation configuration
//!
//! Every parameter the surrounding application hands to the engine, in one
//! serde-friendly struct. JSON documents may omit any field; missing fields
//! take the defaults below.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{QsmError, QsmResult};
use crate::inversion::Regularization;
use crate::noise::NoiseConfig;
use crate::phantom::SusceptibilitySource;
use crate::volume::{Dims, VoxelSize};

/// Complete input to one simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Grid size (nx, ny, nz); each must be a power of two
    pub dims: [usize; 3],
    /// Voxel spacing in mm
    pub voxel_size: [f64; 3],
    /// Main-field tilt in the y-z plane, degrees from z
    pub tilt_deg: f64,
    /// Build the kernel on physical frequencies (divided by voxel spacing)
    /// instead of normalized index frequencies
    pub physical_kernel: bool,
    pub regularization: Regularization,
    pub noise: NoiseConfig,
    pub sources: Vec<SusceptibilitySource>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dims: [64, 64, 32],
            voxel_size: [1.0, 1.0, 2.0],
            tilt_deg: 0.0,
            physical_kernel: false,
            regularization: Regularization::default(),
            noise: NoiseConfig::default(),
            sources: Vec::new(),
        }
    }
}

impl SimulationConfig {
    pub fn grid(&self) -> Dims {
        Dims::from(self.dims)
    }

    pub fn voxel(&self) -> VoxelSize {
        VoxelSize::from(self.voxel_size)
    }

    /// Spacing the dipole kernel is built on
    pub fn kernel_spacing(&self) -> VoxelSize {
        if self.physical_kernel {
            self.voxel()
        } else {
            VoxelSize::isotropic(1.0)
        }
    }

    /// Default configuration with the demonstration phantom
    ///
    /// Mixed-sign sources of every shape, placed well inside the default
    /// 64 x 64 x 64 mm field of view.
    pub fn with_default_phantom() -> Self {
        Self { sources: default_phantom(), ..Self::default() }
    }

    /// Reject anything the pipeline cannot run on
    pub fn validate(&self) -> QsmResult<()> {
        let dims = self.grid();
        dims.validate_fft()?;
        self.voxel().validate()?;
        if !self.tilt_deg.is_finite() {
            return Err(QsmError::InvalidParameter(format!(
                "field tilt {} is not finite",
                self.tilt_deg
            )));
        }
        self.regularization.validate()?;
        self.noise.validate()?;
        Ok(())
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> QsmResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> QsmResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> QsmResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn default_phantom() -> Vec<SusceptibilitySource> {
    vec![
        SusceptibilitySource::sphere([-12.0, -10.0, 0.0], 6.0, 0.10),
        SusceptibilitySource::cube([12.0, -10.0, 4.0], 5.0, [30.0, 15.0, 0.0], -0.05),
        SusceptibilitySource::cylinder([0.0, 12.0, 0.0], [0.0, 1.0, 1.0], 10.0, 3.0, 0.08),
        SusceptibilitySource::ellipsoid([14.0, 12.0, -8.0], [6.0, 3.0, 4.0], -0.03),
        SusceptibilitySource::sphere([-14.0, 14.0, -10.0], 3.0, 0.2),
    ]
}
