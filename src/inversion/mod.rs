//! Dipole inversion for QSM
//!
//! Recovers susceptibility from a (noisy) field by regularized division by
//! the dipole kernel in k-space. Two per-bin policies are provided:
//! - Tikhonov: d / (d² + λ), or guarded 1/d when λ = 0
//! - TKD: truncated k-space division, |d| clipped up to the threshold λ
//!
//! Both are total: no bin ever divides by zero.

pub mod tikhonov;
pub mod tkd;

pub use tikhonov::*;
pub use tkd::*;

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

use crate::error::{QsmError, QsmResult};
use crate::fft::Fft3dWorkspace;
use crate::kernels::dipole::DipoleKernel;
use crate::volume::Volume;

/// Regularized division policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegularizationMethod {
    Tikhonov,
    /// Truncated k-space division (TKD)
    Truncated,
}

/// Regularization method and its strength
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Regularization {
    pub method: RegularizationMethod,
    /// Tikhonov weight, or the TKD threshold (0 selects the default)
    pub lambda: f64,
}

impl Default for Regularization {
    fn default() -> Self {
        Self::tikhonov(0.01)
    }
}

impl Regularization {
    pub fn tikhonov(lambda: f64) -> Self {
        Self { method: RegularizationMethod::Tikhonov, lambda }
    }

    pub fn truncated(threshold: f64) -> Self {
        Self { method: RegularizationMethod::Truncated, lambda: threshold }
    }

    pub fn validate(&self) -> QsmResult<()> {
        if !self.lambda.is_finite() || self.lambda < 0.0 {
            return Err(QsmError::InvalidParameter(format!(
                "regularization λ must be finite and non-negative, got {}",
                self.lambda
            )));
        }
        Ok(())
    }

    /// Inverse of one kernel value under this policy
    #[inline]
    pub fn inverse_kernel_value(&self, d: f64) -> f64 {
        match self.method {
            RegularizationMethod::Tikhonov => tikhonov_inverse(d, self.lambda),
            RegularizationMethod::Truncated => tkd_inverse(d, effective_threshold(self.lambda)),
        }
    }
}

/// Reconstruct susceptibility from a field volume
pub fn invert(
    field: &Volume,
    kernel: &DipoleKernel,
    regularization: &Regularization,
    workspace: &mut Fft3dWorkspace,
) -> QsmResult<Volume> {
    regularization.validate()?;
    if field.dims() != kernel.dims() {
        return Err(QsmError::LengthMismatch { expected: kernel.dims().len(), actual: field.len() });
    }

    let start = Instant::now();
    let chi = match regularization.method {
        RegularizationMethod::Tikhonov => {
            tikhonov(field, kernel, regularization.lambda, workspace)?
        }
        RegularizationMethod::Truncated => tkd(field, kernel, regularization.lambda, workspace)?,
    };

    info!(
        method = ?regularization.method,
        lambda = regularization.lambda,
        elapsed = ?start.elapsed(),
        "inversion complete"
    );
    Ok(chi)
}
