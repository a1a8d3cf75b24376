//! SIMD-accelerated element-wise operations on volume buffers
//!
//! The spectral multiply by a real kernel and the reductions used for noise
//! calibration run over every voxel on each recompute. When the `simd`
//! feature is enabled these use 256-bit lanes (f64x4) from `wide`.
//!
//! All operations have scalar fallbacks when SIMD is disabled.

#[cfg(feature = "simd")]
use wide::f64x4;

/// SIMD lane width (4 for f64x4)
#[cfg(feature = "simd")]
const SIMD_WIDTH: usize = 4;

#[cfg(feature = "simd")]
#[inline(always)]
fn load4(a: &[f64], idx: usize) -> f64x4 {
    f64x4::from([a[idx], a[idx + 1], a[idx + 2], a[idx + 3]])
}

// ============================================================================
// Element-wise Products
// ============================================================================

/// Multiply in place: a[i] *= b[i]
#[cfg(feature = "simd")]
#[inline]
pub fn multiply_inplace_f64(a: &mut [f64], b: &[f64]) {
    debug_assert_eq!(a.len(), b.len());
    let n = a.len();
    let chunks = n / SIMD_WIDTH;

    for c in 0..chunks {
        let idx = c * SIMD_WIDTH;
        let result = load4(a, idx) * load4(b, idx);
        a[idx..idx + SIMD_WIDTH].copy_from_slice(&result.to_array());
    }

    for i in chunks * SIMD_WIDTH..n {
        a[i] *= b[i];
    }
}

#[cfg(not(feature = "simd"))]
#[inline]
pub fn multiply_inplace_f64(a: &mut [f64], b: &[f64]) {
    debug_assert_eq!(a.len(), b.len());
    for (x, &y) in a.iter_mut().zip(b.iter()) {
        *x *= y;
    }
}

/// Add in place: a[i] += b[i]
#[cfg(feature = "simd")]
#[inline]
pub fn add_inplace_f64(a: &mut [f64], b: &[f64]) {
    debug_assert_eq!(a.len(), b.len());
    let n = a.len();
    let chunks = n / SIMD_WIDTH;

    for c in 0..chunks {
        let idx = c * SIMD_WIDTH;
        let result = load4(a, idx) + load4(b, idx);
        a[idx..idx + SIMD_WIDTH].copy_from_slice(&result.to_array());
    }

    for i in chunks * SIMD_WIDTH..n {
        a[i] += b[i];
    }
}

#[cfg(not(feature = "simd"))]
#[inline]
pub fn add_inplace_f64(a: &mut [f64], b: &[f64]) {
    debug_assert_eq!(a.len(), b.len());
    for (x, &y) in a.iter_mut().zip(b.iter()) {
        *x += y;
    }
}

// ============================================================================
// Reductions
// ============================================================================

/// Largest absolute value, 0.0 for an empty slice
#[cfg(feature = "simd")]
#[inline]
pub fn max_abs_f64(a: &[f64]) -> f64 {
    let n = a.len();
    let chunks = n / SIMD_WIDTH;

    let mut acc = f64x4::ZERO;
    for c in 0..chunks {
        acc = acc.max(load4(a, c * SIMD_WIDTH).abs());
    }

    let mut result = acc.to_array().iter().cloned().fold(0.0, f64::max);
    for &v in &a[chunks * SIMD_WIDTH..] {
        result = result.max(v.abs());
    }
    result
}

#[cfg(not(feature = "simd"))]
#[inline]
pub fn max_abs_f64(a: &[f64]) -> f64 {
    a.iter().fold(0.0, |m, &v| m.max(v.abs()))
}

/// Compute sum(a[i])
#[inline]
pub fn sum_f64(a: &[f64]) -> f64 {
    a.iter().sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiply_with_remainder() {
        let mut a: Vec<f64> = (0..7).map(|i| i as f64).collect();
        let b = vec![2.0; 7];
        multiply_inplace_f64(&mut a, &b);
        for (i, &v) in a.iter().enumerate() {
            assert_eq!(v, 2.0 * i as f64);
        }
    }

    #[test]
    fn test_add_inplace() {
        let mut a = vec![1.0; 9];
        let b: Vec<f64> = (0..9).map(|i| i as f64).collect();
        add_inplace_f64(&mut a, &b);
        assert_eq!(a[8], 9.0);
        assert_eq!(a[0], 1.0);
    }

    #[test]
    fn test_max_abs() {
        assert_eq!(max_abs_f64(&[]), 0.0);
        assert_eq!(max_abs_f64(&[0.5, -3.0, 2.0, 1.0, -0.1]), 3.0);
        assert_eq!(max_abs_f64(&[1.0, 2.0, 3.0, -4.0, 5.5, 0.0, 0.0, 0.0]), 5.5);
    }

    #[test]
    fn test_sum() {
        assert_eq!(sum_f64(&[1.0, -2.0, 3.0]), 2.0);
        assert_eq!(sum_f64(&[]), 0.0);
    }
}
