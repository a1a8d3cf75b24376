//! Tikhonov regularization for QSM
//!
//! Identity-regularized closed form per frequency bin:
//!
//! χ̂ = D · f̂ / (D² + λ)
//!
//! With λ = 0 this degrades to direct division, guarded at the kernel's
//! zero crossings (the magic-angle cone) by an epsilon cut-off.
//!
//! Reference:
//! Bilgic B, et al. Fast image reconstruction with L2-regularization.
//! JMRI 2014;40(1):181-91.

use crate::error::QsmResult;
use crate::fft::Fft3dWorkspace;
use crate::kernels::dipole::DipoleKernel;
use crate::volume::Volume;

/// Kernel magnitude below which unregularized division returns 0
pub const TIKHONOV_EPSILON: f64 = 1e-6;

/// Regularized inverse of one kernel value
#[inline]
pub fn tikhonov_inverse(d: f64, lambda: f64) -> f64 {
    if lambda > 0.0 {
        d / (d * d + lambda)
    } else if d.abs() > TIKHONOV_EPSILON {
        1.0 / d
    } else {
        0.0
    }
}

/// Tikhonov dipole inversion of a field volume
pub fn tikhonov(
    field: &Volume,
    kernel: &DipoleKernel,
    lambda: f64,
    workspace: &mut Fft3dWorkspace,
) -> QsmResult<Volume> {
    let inv_d: Vec<f64> = kernel.values().iter().map(|&d| tikhonov_inverse(d, lambda)).collect();
    workspace.apply_centered_kernel(field, &inv_d)
}
