//! Truncated k-space division (TKD) for QSM
//!
//! TKD is the simplest dipole inversion method. It directly divides the
//! field in k-space by the dipole kernel, with kernel values smaller than a
//! threshold clipped to ±threshold to avoid division near the magic angle.
//!
//! Reference:
//! Shmueli K, de Zwart JA, van Gelderen P, et al. Magnetic susceptibility mapping
//! of brain tissue in vivo using MRI phase data. MRM 2009;62(6):1510-22.

use crate::error::QsmResult;
use crate::fft::Fft3dWorkspace;
use crate::kernels::dipole::DipoleKernel;
use crate::volume::Volume;

/// Threshold used when λ = 0 is supplied
pub const DEFAULT_TKD_THRESHOLD: f64 = 0.05;

/// λ doubles as the truncation threshold; 0 selects the default
#[inline]
pub fn effective_threshold(lambda: f64) -> f64 {
    if lambda > 0.0 {
        lambda
    } else {
        DEFAULT_TKD_THRESHOLD
    }
}

/// Truncated inverse of one kernel value
///
/// |d| < threshold is replaced by sign(d)·threshold (zero counts as positive).
/// A non-positive threshold selects `DEFAULT_TKD_THRESHOLD`.
#[inline]
pub fn tkd_inverse(d: f64, threshold: f64) -> f64 {
    let threshold = effective_threshold(threshold);
    let clipped = if d.abs() < threshold {
        if d >= 0.0 { threshold } else { -threshold }
    } else {
        d
    };
    1.0 / clipped
}

/// Truncated k-space division of a field volume
pub fn tkd(
    field: &Volume,
    kernel: &DipoleKernel,
    threshold: f64,
    workspace: &mut Fft3dWorkspace,
) -> QsmResult<Volume> {
    let inv_d: Vec<f64> = kernel.values().iter().map(|&d| tkd_inverse(d, threshold)).collect();
    workspace.apply_centered_kernel(field, &inv_d)
}
