//! Simulation engine
//!
//! Owns every volume of the pipeline together with the cached dipole kernel
//! and noise realization. Callers mutate inputs through the methods below;
//! each mutation is classified as a geometry or regularization change and
//! moves the engine through a small state machine:
//!
//! - any state + Geometry -> ForwardDirty
//! - Clean or InverseDirty + Regularization -> InverseDirty
//! - ForwardDirty + Regularization -> ForwardDirty
//!
//! `recompute()` performs the least work the current state allows and
//! returns to `Clean`. A regularization change reuses the cached kernel and
//! the cached noisy field, so different inversions see the same noise.

use std::time::Instant;
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::error::QsmResult;
use crate::fft::Fft3dWorkspace;
use crate::forward::{simulate_field, ForwardResult};
use crate::inversion::{invert, Regularization};
use crate::kernels::dipole::{DipoleKernel, KernelInfo};
use crate::noise::NoiseConfig;
use crate::phantom::{rasterize, SusceptibilitySource};
use crate::volume::{Dims, Volume, VoxelSize};

/// What kind of input changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Sources, grid, voxel size, field direction or noise settings
    Geometry,
    /// Regularization method or λ only
    Regularization,
}

/// Freshness of the cached outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// All outputs reflect the current inputs
    Clean,
    /// Forward and inverse models must both run
    ForwardDirty,
    /// Only the inversion is stale
    InverseDirty,
}

impl PipelineState {
    /// Transition for one change event. Geometry dominates.
    pub fn on_change(self, change: ChangeKind) -> Self {
        match (self, change) {
            (_, ChangeKind::Geometry) => PipelineState::ForwardDirty,
            (PipelineState::ForwardDirty, ChangeKind::Regularization) => {
                PipelineState::ForwardDirty
            }
            (_, ChangeKind::Regularization) => PipelineState::InverseDirty,
        }
    }

    pub fn is_clean(self) -> bool {
        self == PipelineState::Clean
    }
}

/// Work performed by one `recompute()` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeOutcome {
    Unchanged,
    InverseOnly,
    Full { kernel_rebuilt: bool },
}

/// Forward/inverse QSM simulator with owned state
pub struct SimulationEngine {
    config: SimulationConfig,
    workspace: Fft3dWorkspace,
    kernel: Option<DipoleKernel>,
    susceptibility: Volume,
    clean_field: Volume,
    noise: Volume,
    field: Volume,
    noise_sigma: f64,
    reconstruction: Volume,
    state: PipelineState,
}

impl SimulationEngine {
    /// Validate the configuration and allocate an empty pipeline
    ///
    /// Nothing is computed until the first `recompute()`.
    pub fn new(config: SimulationConfig) -> QsmResult<Self> {
        config.validate()?;
        let dims = config.grid();
        let workspace = Fft3dWorkspace::new(dims)?;

        Ok(Self {
            config,
            workspace,
            kernel: None,
            susceptibility: Volume::zeros(dims),
            clean_field: Volume::zeros(dims),
            noise: Volume::zeros(dims),
            field: Volume::zeros(dims),
            noise_sigma: 0.0,
            reconstruction: Volume::zeros(dims),
            state: PipelineState::ForwardDirty,
        })
    }

    // ---- Mutators ----

    /// Record an externally classified change
    pub fn notify(&mut self, change: ChangeKind) {
        let next = self.state.on_change(change);
        if next != self.state {
            debug!(from = ?self.state, to = ?next, ?change, "pipeline state change");
        }
        self.state = next;
    }

    pub fn add_source(&mut self, source: SusceptibilitySource) {
        self.config.sources.push(source);
        self.notify(ChangeKind::Geometry);
    }

    /// Drop every source and the derived susceptibility volume
    pub fn clear_sources(&mut self) {
        self.config.sources.clear();
        self.susceptibility = Volume::zeros(self.config.grid());
        self.notify(ChangeKind::Geometry);
    }

    pub fn set_sources(&mut self, sources: Vec<SusceptibilitySource>) {
        self.config.sources = sources;
        self.notify(ChangeKind::Geometry);
    }

    pub fn set_field_tilt(&mut self, tilt_deg: f64) -> QsmResult<()> {
        let mut next = self.config.clone();
        next.tilt_deg = tilt_deg;
        next.validate()?;
        self.config = next;
        self.notify(ChangeKind::Geometry);
        Ok(())
    }

    /// Change grid size and voxel spacing; cached volumes are discarded
    pub fn set_grid(&mut self, dims: Dims, voxel_size: VoxelSize) -> QsmResult<()> {
        let mut next = self.config.clone();
        next.dims = dims.as_array();
        next.voxel_size = voxel_size.as_array();
        next.validate()?;

        if dims != self.workspace.dims() {
            self.workspace = Fft3dWorkspace::new(dims)?;
            self.susceptibility = Volume::zeros(dims);
            self.clean_field = Volume::zeros(dims);
            self.noise = Volume::zeros(dims);
            self.field = Volume::zeros(dims);
            self.noise_sigma = 0.0;
            self.reconstruction = Volume::zeros(dims);
        }
        self.config = next;
        self.notify(ChangeKind::Geometry);
        Ok(())
    }

    pub fn set_regularization(&mut self, regularization: Regularization) -> QsmResult<()> {
        regularization.validate()?;
        if regularization == self.config.regularization {
            return Ok(());
        }
        self.config.regularization = regularization;
        self.notify(ChangeKind::Regularization);
        Ok(())
    }

    /// New noise settings force a fresh draw on the next forward run
    pub fn set_noise(&mut self, noise: NoiseConfig) -> QsmResult<()> {
        noise.validate()?;
        self.config.noise = noise;
        self.notify(ChangeKind::Geometry);
        Ok(())
    }

    // ---- Recompute ----

    /// Bring every output up to date with the current inputs
    pub fn recompute(&mut self) -> QsmResult<RecomputeOutcome> {
        match self.state {
            PipelineState::Clean => {
                debug!("outputs up to date, nothing to recompute");
                Ok(RecomputeOutcome::Unchanged)
            }
            PipelineState::InverseDirty if self.kernel.is_some() => {
                self.run_inverse()?;
                self.state = PipelineState::Clean;
                Ok(RecomputeOutcome::InverseOnly)
            }
            PipelineState::InverseDirty | PipelineState::ForwardDirty => {
                let kernel_rebuilt = self.run_forward()?;
                self.run_inverse()?;
                self.state = PipelineState::Clean;
                Ok(RecomputeOutcome::Full { kernel_rebuilt })
            }
        }
    }

    /// Rasterize, refresh the kernel if needed, and simulate the field.
    /// Returns whether the kernel was rebuilt.
    fn run_forward(&mut self) -> QsmResult<bool> {
        let start = Instant::now();
        let dims = self.config.grid();
        let voxel_size = self.config.voxel();
        let kernel_spacing = self.config.kernel_spacing();
        let tilt = self.config.tilt_deg;

        self.susceptibility = rasterize(&self.config.sources, dims, voxel_size)?;

        let (kernel, rebuilt) = match self.kernel.take() {
            Some(k) if k.matches(dims, kernel_spacing, tilt) => {
                debug!(tilt_deg = tilt, "reusing cached dipole kernel");
                (k, false)
            }
            _ if self.config.physical_kernel => {
                (DipoleKernel::with_voxel_size(dims, voxel_size, tilt)?, true)
            }
            _ => (DipoleKernel::new(dims, tilt)?, true),
        };

        let ForwardResult { clean, noise, noisy, sigma } =
            simulate_field(&self.susceptibility, &kernel, &mut self.workspace, &self.config.noise)?;
        self.kernel = Some(kernel);
        self.clean_field = clean;
        self.noise = noise;
        self.field = noisy;
        self.noise_sigma = sigma;

        info!(
            sources = self.config.sources.len(),
            kernel_rebuilt = rebuilt,
            elapsed = ?start.elapsed(),
            "forward stage done"
        );
        Ok(rebuilt)
    }

    fn run_inverse(&mut self) -> QsmResult<()> {
        let Some(kernel) = self.kernel.as_ref() else {
            return Ok(());
        };
        debug!(sigma = self.noise_sigma, "inverting cached noisy field");
        self.reconstruction =
            invert(&self.field, kernel, &self.config.regularization, &mut self.workspace)?;
        Ok(())
    }

    // ---- Accessors ----

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn sources(&self) -> &[SusceptibilitySource] {
        &self.config.sources
    }

    /// Ground-truth susceptibility
    pub fn susceptibility(&self) -> &Volume {
        &self.susceptibility
    }

    /// Simulated (noisy) field
    pub fn field(&self) -> &Volume {
        &self.field
    }

    pub fn clean_field(&self) -> &Volume {
        &self.clean_field
    }

    pub fn noise(&self) -> &Volume {
        &self.noise
    }

    pub fn noise_sigma(&self) -> f64 {
        self.noise_sigma
    }

    pub fn reconstruction(&self) -> &Volume {
        &self.reconstruction
    }

    /// Field direction of the cached kernel; `None` before the first run
    pub fn kernel_info(&self) -> Option<KernelInfo> {
        self.kernel.as_ref().map(DipoleKernel::info)
    }

    pub fn kernel(&self) -> Option<&DipoleKernel> {
        self.kernel.as_ref()
    }
}
